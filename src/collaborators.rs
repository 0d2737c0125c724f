//! External collaborators of the query shims
//!
//! Relation resolution, the full-text fallback search and the inverted-index
//! table are owned by other subsystems. The shims only call them through
//! these traits.

use async_trait::async_trait;

use crate::entity::{Entity, Loaded};
use crate::error::{BackendError, PolyglotError};
use crate::metadata::{EntityMetadata, MetadataContext};
use crate::query::FilterClauseQueue;
use crate::value::Value;

/// Attaches related entities to materialized rows
///
/// Receives rows whose deferred relations ([`Loaded::Enhanced`]) still hold
/// raw foreign keys.
#[async_trait]
pub trait RelationResolver<E: Entity>: Send + Sync {
	async fn resolve(
		&self,
		context: &MetadataContext,
		metadata: &EntityMetadata,
		loaded: Vec<Loaded<E>>,
	) -> Result<Vec<E>, PolyglotError>;
}

/// Resolver that drops deferred relations and returns the bare entities
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedRelations;

#[async_trait]
impl<E: Entity> RelationResolver<E> for DetachedRelations {
	async fn resolve(
		&self,
		_context: &MetadataContext,
		_metadata: &EntityMetadata,
		loaded: Vec<Loaded<E>>,
	) -> Result<Vec<E>, PolyglotError> {
		Ok(loaded.into_iter().map(Loaded::into_entity).collect())
	}
}

/// Full-text index used when secondary indexes are disabled
#[async_trait]
pub trait FullTextSearch: Send + Sync {
	/// Ids of the entities matching `filter`
	async fn search(
		&self,
		metadata: &EntityMetadata,
		filter: &FilterClauseQueue,
		max_results: usize,
	) -> Result<Vec<Value>, BackendError>;
}

/// Inverted-index table over embedded attributes
#[async_trait]
pub trait InvertedIndexReader: Send + Sync {
	/// Row keys of the entities whose embedded values match `filter`
	async fn read_keys(
		&self,
		metadata: &EntityMetadata,
		filter: &FilterClauseQueue,
	) -> Result<Vec<Value>, BackendError>;
}

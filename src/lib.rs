//! # Reinhardt Polyglot
//!
//! JPA-style entity mapping over NoSQL stores: Cassandra column families and
//! MongoDB collections.
//!
//! The crate turns a JPA-like query into backend-native selection criteria,
//! runs it through a backend client and rebuilds typed entities, including
//! embedded values and deferred relations, from the rows or documents that
//! come back.
//!
//! ## Layout
//!
//! - [`metadata`] - entity, attribute and embeddable metadata, shared through [`MetadataContext`]
//! - [`entity`] - accessor tables, the attribute walk and materialization results
//! - [`value`] - the dynamic [`Value`] model and its byte and BSON codecs
//! - [`query`] - filter clauses and the JPA-like [`QueryParser`]
//! - [`cassandra`] - index clause builder, row handler and the [`CassQuery`] shim
//! - [`mongodb`] - filter document builder, document handler and the [`MongoQuery`] shim
//! - [`collaborators`] - relation resolution, full-text search and inverted-index traits
//! - [`backends`] - in-memory backend clients
//! - [`config`] - persistence-unit settings loaded from TOML
//!
//! ## Feature Flags
//!
//! - `mongodb` - [`MongoDBBackend`](crate::mongodb::MongoDBBackend) over the official driver
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use reinhardt_polyglot::backends::memory::InMemoryColumnStore;
//! use reinhardt_polyglot::{CassQuery, MetadataContext, QueryParser};
//!
//! # async fn example(context: MetadataContext, store: InMemoryColumnStore) -> reinhardt_polyglot::Result<()> {
//! let spec = QueryParser::parse(
//!     "SELECT u FROM CassandraEntity u WHERE u.state = 'UT' AND u.birth_date > 1970",
//! )?;
//! let users = CassQuery::new(&context, &store, spec)
//!     .get_result_list::<CassandraEntity>()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod cassandra;
pub mod collaborators;
pub mod config;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod mongodb;
pub mod query;
pub mod value;

pub use cassandra::CassQuery;
pub use collaborators::{DetachedRelations, FullTextSearch, InvertedIndexReader, RelationResolver};
pub use config::{BackendKind, PersistenceUnitConfig, PolyglotSettings};
pub use entity::{Embeddable, EnhanceEntity, Entity, Loaded, Mapped, Materialized};
pub use error::{PolyglotError, Result};
pub use metadata::{Attribute, EmbeddableMetadata, EntityMetadata, MetadataContext, ValueType};
pub use mongodb::MongoQuery;
pub use query::{QueryParser, QuerySpec};
pub use value::Value;

//! Query executor shim for the column backend
//!
//! Native statements go to the backend verbatim. Everything else is either
//! translated into index clauses or, when the persistence unit has secondary
//! indexes switched off, resolved through the full-text collaborator.

use bytes::Bytes;

use super::client::ColumnBackend;
use super::handler::CassandraDataHandler;
use super::index::{IndexClauseSet, prepare_index_clause};
use super::row::ThriftRow;
use crate::collaborators::{FullTextSearch, InvertedIndexReader, RelationResolver};
use crate::entity::{Entity, Materialized};
use crate::error::{BackendError, PolyglotError, Result, SchemaError};
use crate::metadata::{EntityMetadata, MetadataContext};
use crate::query::{QueryKind, QuerySpec};
use crate::value::{Value, bytes as codec_bytes};

/// A parsed query bound to a column backend
pub struct CassQuery<'a, B: ColumnBackend + ?Sized> {
	context: &'a MetadataContext,
	backend: &'a B,
	spec: QuerySpec,
	full_text: Option<&'a dyn FullTextSearch>,
	inverted_index: Option<&'a dyn InvertedIndexReader>,
}

impl<'a, B: ColumnBackend + ?Sized> CassQuery<'a, B> {
	pub fn new(context: &'a MetadataContext, backend: &'a B, spec: QuerySpec) -> Self {
		Self {
			context,
			backend,
			spec,
			full_text: None,
			inverted_index: None,
		}
	}

	/// Search used when secondary indexes are disabled for the unit
	pub fn with_full_text_search(mut self, search: &'a dyn FullTextSearch) -> Self {
		self.full_text = Some(search);
		self
	}

	/// Inverted-index table consulted for entities with embedded attributes
	pub fn with_inverted_index(mut self, reader: &'a dyn InvertedIndexReader) -> Self {
		self.inverted_index = Some(reader);
		self
	}

	pub fn spec(&self) -> &QuerySpec {
		&self.spec
	}

	pub fn spec_mut(&mut self) -> &mut QuerySpec {
		&mut self.spec
	}

	/// Whether the query text runs verbatim on the backend
	pub fn is_native(&self) -> bool {
		self.spec.native || self.context.is_native(&self.spec.text)
	}

	/// Translate the query filter for the queried entity
	///
	/// # Errors
	///
	/// See [`prepare_index_clause`].
	pub fn prepare_index_clause(&self) -> Result<IndexClauseSet> {
		let metadata = self.metadata()?;
		prepare_index_clause(metadata, &self.spec.filter, self.max_results(metadata))
	}

	/// Fetch and materialize the matching rows without resolving relations
	///
	/// Rows that fail to materialize are returned as
	/// [`Materialized::Failed`] rather than aborting the batch.
	///
	/// # Errors
	///
	/// Translation, schema and backend failures.
	pub async fn populate_entities<E: Entity>(&self) -> Result<Vec<Materialized<E>>> {
		let metadata = self.metadata()?;
		let rows = self.fetch_rows(metadata).await?;
		let handler = CassandraDataHandler::new(self.context);
		Ok(rows
			.iter()
			.map(|row| handler.from_thrift_row(metadata, row, &[]))
			.collect())
	}

	/// Fetch the matching rows, capture their foreign keys and hand them to `resolver`
	///
	/// Entities with embedded attributes are looked up through the inverted
	/// index when the unit enables it and a reader is attached.
	///
	/// # Errors
	///
	/// Translation, schema and backend failures, and whatever `resolver` returns.
	pub async fn recursively_populate_entities<E, R>(&self, resolver: &R) -> Result<Vec<E>>
	where
		E: Entity,
		R: RelationResolver<E> + ?Sized,
	{
		let metadata = self.metadata()?;
		let rows = match self.inverted_index {
			Some(reader)
				if !self.is_native()
					&& !self.spec.filter.is_empty()
					&& self.context.use_inverted_index(metadata) =>
			{
				tracing::debug!(entity = metadata.entity_name(), "reading row keys from inverted index");
				let ids = reader.read_keys(metadata, &self.spec.filter).await?;
				self.rows_by_id(metadata, ids).await?
			}
			_ => self.fetch_rows(metadata).await?,
		};

		let relation_names = metadata.relation_names();
		let handler = CassandraDataHandler::new(self.context);
		let loaded = rows
			.iter()
			.filter_map(|row| {
				handler
					.from_thrift_row::<E>(metadata, row, &relation_names)
					.into_lenient()
			})
			.collect();
		resolver.resolve(self.context, metadata, loaded).await
	}

	/// Matching entities; rows that fail to materialize are logged and skipped
	pub async fn get_result_list<E: Entity>(&self) -> Result<Vec<E>> {
		Ok(self
			.populate_entities::<E>()
			.await?
			.into_iter()
			.filter_map(Materialized::into_lenient)
			.map(|loaded| loaded.into_entity())
			.collect())
	}

	/// Run a native statement or a `DELETE` query
	///
	/// Returns the number of rows removed by a `DELETE`. Native statements
	/// and `SELECT` queries report zero.
	pub async fn execute_update(&self) -> Result<usize> {
		let metadata = self.metadata()?;
		let keyspace = self.keyspace(metadata);
		if self.is_native() {
			tracing::debug!(statement = %self.spec.text, "executing native statement");
			self.backend.execute_native(keyspace, &self.spec.text).await?;
			return Ok(0);
		}
		if self.spec.kind != QueryKind::Delete {
			tracing::warn!(query = %self.spec.text, "execute_update called on a select query");
			return Ok(0);
		}

		let rows = self.fetch_rows(metadata).await?;
		let mut deleted = 0;
		for row in &rows {
			if self.backend.delete(keyspace, metadata.table(), &row.id).await? {
				deleted += 1;
			}
		}
		tracing::debug!(entity = metadata.entity_name(), deleted, "deleted rows");
		Ok(deleted)
	}

	fn metadata(&self) -> Result<&'a EntityMetadata> {
		Ok(self.context.entity_metadata(&self.spec.entity)?)
	}

	fn max_results(&self, metadata: &EntityMetadata) -> usize {
		self.spec
			.max_results
			.unwrap_or_else(|| self.context.max_results(metadata))
	}

	fn keyspace<'m>(&'m self, metadata: &'m EntityMetadata) -> &'m str {
		self.context
			.unit_of(metadata)
			.map(|unit| unit.keyspace.as_str())
			.unwrap_or_else(|_| metadata.schema())
	}

	async fn fetch_rows(&self, metadata: &EntityMetadata) -> Result<Vec<ThriftRow>> {
		let keyspace = self.keyspace(metadata);
		let max_results = self.max_results(metadata);

		let mut rows = if self.is_native() {
			tracing::debug!(statement = %self.spec.text, "executing native query");
			self.backend.execute_native(keyspace, &self.spec.text).await?
		} else if self.context.use_secondary_index(metadata) {
			match prepare_index_clause(metadata, &self.spec.filter, max_results)? {
				IndexClauseSet::RowKey(lookup) => {
					tracing::debug!(entity = metadata.entity_name(), "querying by row key");
					self.backend
						.find_by_key_range(keyspace, metadata.table(), &lookup)
						.await?
				}
				IndexClauseSet::SecondaryIndex(clauses) => {
					tracing::debug!(
						entity = metadata.entity_name(),
						clauses = clauses.len(),
						"querying secondary indexes"
					);
					self.backend
						.find_by_index(keyspace, metadata.table(), &clauses, max_results)
						.await?
				}
			}
		} else {
			let Some(search) = self.full_text else {
				return Err(BackendError::UnsupportedFeature(format!(
					"secondary indexes are disabled for {} and no full-text search is attached",
					metadata.entity_name()
				))
				.into());
			};
			tracing::debug!(entity = metadata.entity_name(), "querying full-text index");
			let ids = search.search(metadata, &self.spec.filter, max_results).await?;
			self.rows_by_id(metadata, ids).await?
		};

		if !self.spec.ordering.is_empty() {
			tracing::warn!(query = %self.spec.text, "ORDER BY is not supported within cassandra and is ignored");
		}
		rows.truncate(max_results);
		self.project(metadata, rows)
	}

	async fn rows_by_id(&self, metadata: &EntityMetadata, ids: Vec<Value>) -> Result<Vec<ThriftRow>> {
		let keys = ids
			.into_iter()
			.map(|id| codec_bytes::encode_attribute(metadata.id_attribute(), id))
			.collect::<std::result::Result<Vec<Bytes>, _>>()?;
		if keys.is_empty() {
			return Ok(Vec::new());
		}
		Ok(self
			.backend
			.find_by_keys(self.keyspace(metadata), metadata.table(), &keys)
			.await?)
	}

	fn project(&self, metadata: &EntityMetadata, rows: Vec<ThriftRow>) -> Result<Vec<ThriftRow>> {
		if self.spec.projection.is_empty() || self.is_native() {
			return Ok(rows);
		}
		let columns = self
			.spec
			.projection
			.iter()
			.map(|property| {
				metadata
					.resolve_column(property)
					.map(str::to_string)
					.ok_or_else(|| SchemaError::ColumnNotFound(property.clone()))
			})
			.collect::<std::result::Result<Vec<_>, _>>()
			.map_err(PolyglotError::from)?;
		Ok(rows.iter().map(|row| row.project(&columns)).collect())
	}
}

//! Filter document builder and query executor shim for the document backend
//!
//! Clauses are translated into a single filter document. Several clauses on
//! the same column merge into one operator document; a clause that cannot
//! merge (an equality next to a range) is moved under `$and`.

use bson::{Bson, Document, doc};

use super::client::{DocumentBackend, FindOptions};
use super::handler::{MongoDBDataHandler, document_key};
use crate::collaborators::RelationResolver;
use crate::entity::{Entity, Materialized};
use crate::error::{BackendError, PolyglotError, QueryError, QueryPath, Result, SchemaError};
use crate::metadata::{EntityMetadata, MetadataContext};
use crate::query::{Condition, Connector, FilterItem, FilterClauseQueue, OrderBy, QueryKind, QuerySpec, SortDirection};
use crate::value::bson::to_bson;
use crate::value::{Value, codec};

const BACKEND: &str = "mongodb";

/// Translate `filter` over `metadata` into a filter document
///
/// # Errors
///
/// - [`QueryError::UnsupportedConnector`] when an `OR` connector is present
/// - [`SchemaError`] when a property does not resolve to a typed column
/// - [`crate::error::CodecError`] when a literal does not convert to the column type
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use reinhardt_polyglot::metadata::{Attribute, EntityMetadata, ValueType};
/// use reinhardt_polyglot::mongodb::build_filter;
/// use reinhardt_polyglot::query::{Condition, FilterClause, FilterClauseQueue};
///
/// let users = EntityMetadata::builder("MongoEntity", "users")
///     .id(Attribute::scalar("key", ValueType::String))
///     .attribute(Attribute::scalar("birth_date", ValueType::Int))
///     .build();
/// let filter = FilterClauseQueue::new().clause(FilterClause::new("birth_date", Condition::Gt, "1970"));
///
/// assert_eq!(build_filter(&users, &filter).unwrap(), doc! { "birth_date": { "$gt": 1970 } });
/// ```
pub fn build_filter(metadata: &EntityMetadata, filter: &FilterClauseQueue) -> Result<Document> {
	let mut document = Document::new();
	let mut conjuncts = Vec::new();

	for item in filter.items() {
		let clause = match item {
			FilterItem::Connector(Connector::And) => continue,
			FilterItem::Connector(connector @ Connector::Or) => {
				tracing::error!("Support for OR clause is not enabled within mongodb");
				return Err(QueryError::UnsupportedConnector {
					connector: connector.to_string(),
					backend: BACKEND,
				}
				.into());
			}
			FilterItem::Clause(clause) => clause,
		};

		let column = metadata
			.resolve_column(clause.property())
			.ok_or_else(|| SchemaError::ColumnNotFound(clause.property().to_string()))?;
		let key = document_key(metadata, column).to_string();
		let literal = clause.literal()?.clone();

		let condition = match clause.condition() {
			Condition::Eq => {
				let value = literal_bson(metadata, column, literal)?;
				if document.contains_key(&key) {
					conjuncts.push(doc! { key: value });
				} else {
					document.insert(key, value);
				}
				continue;
			}
			Condition::Like => doc! { "$regex": like_to_regex(&literal.to_string()) },
			condition => {
				let operator = operator(condition)?;
				doc! { operator: literal_bson(metadata, column, literal)? }
			}
		};

		let mergeable = matches!(
			document.get(&key),
			Some(Bson::Document(existing))
				if is_operator_document(existing) && !shares_operator(existing, &condition)
		);
		if mergeable {
			if let Some(Bson::Document(existing)) = document.get_mut(&key) {
				for (op, value) in condition {
					existing.insert(op, value);
				}
			}
		} else if document.contains_key(&key) {
			conjuncts.push(doc! { key: condition });
		} else {
			document.insert(key, condition);
		}
	}

	if conjuncts.is_empty() {
		return Ok(document);
	}
	let mut terms: Vec<Bson> = Vec::with_capacity(conjuncts.len() + 1);
	if !document.is_empty() {
		terms.push(Bson::Document(document));
	}
	terms.extend(conjuncts.into_iter().map(Bson::Document));
	Ok(doc! { "$and": terms })
}

/// Sort document for `ordering`: `1` ascending, `-1` descending
///
/// # Errors
///
/// [`SchemaError::ColumnNotFound`] for an unknown property.
pub fn build_sort(metadata: &EntityMetadata, ordering: &[OrderBy]) -> std::result::Result<Document, SchemaError> {
	let mut sort = Document::new();
	for order in ordering {
		let column = metadata
			.resolve_column(&order.property)
			.ok_or_else(|| SchemaError::ColumnNotFound(order.property.clone()))?;
		let direction = match order.direction {
			SortDirection::Asc => 1,
			SortDirection::Desc => -1,
		};
		sort.insert(document_key(metadata, column), direction);
	}
	Ok(sort)
}

/// Anchored regular expression for a `LIKE` pattern
///
/// `%` matches any run of characters and `_` a single character; everything
/// else matches literally.
pub fn like_to_regex(pattern: &str) -> String {
	let mut regex = String::with_capacity(pattern.len() + 2);
	regex.push('^');
	let mut literal = String::new();
	for ch in pattern.chars() {
		let wildcard = match ch {
			'%' => ".*",
			'_' => ".",
			_ => {
				literal.push(ch);
				continue;
			}
		};
		regex.push_str(&regex::escape(&literal));
		literal.clear();
		regex.push_str(wildcard);
	}
	regex.push_str(&regex::escape(&literal));
	regex.push('$');
	regex
}

fn operator(condition: Condition) -> std::result::Result<&'static str, QueryError> {
	match condition {
		Condition::Gt => Ok("$gt"),
		Condition::Lt => Ok("$lt"),
		Condition::Gte => Ok("$gte"),
		Condition::Lte => Ok("$lte"),
		Condition::Ne => Ok("$ne"),
		condition => Err(QueryError::UnsupportedCondition {
			condition: condition.to_string(),
			path: QueryPath::Document,
		}),
	}
}

fn literal_bson(metadata: &EntityMetadata, column: &str, literal: Value) -> Result<Bson> {
	let attribute = codec::resolve_attribute(metadata, column)?;
	let value_type = codec::declared_type(attribute)?;
	let value = codec::translate(literal, value_type)?;
	Ok(to_bson(codec::normalize(value, value_type)))
}

fn is_operator_document(document: &Document) -> bool {
	!document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn shares_operator(existing: &Document, condition: &Document) -> bool {
	condition.keys().any(|key| existing.contains_key(key))
}

/// Parse a native query: a JSON filter document
fn native_filter(text: &str) -> std::result::Result<Document, QueryError> {
	let invalid = |reason: String| QueryError::InvalidNativeQuery {
		query: text.to_string(),
		reason,
	};
	let json: serde_json::Value = serde_json::from_str(text).map_err(|err| invalid(err.to_string()))?;
	if !json.is_object() {
		return Err(invalid("expected a JSON object".to_string()));
	}
	bson::serialize_to_document(&json).map_err(|err| invalid(err.to_string()))
}

/// A parsed query bound to a document backend
pub struct MongoQuery<'a, B: DocumentBackend + ?Sized> {
	context: &'a MetadataContext,
	backend: &'a B,
	spec: QuerySpec,
}

impl<'a, B: DocumentBackend + ?Sized> MongoQuery<'a, B> {
	pub fn new(context: &'a MetadataContext, backend: &'a B, spec: QuerySpec) -> Self {
		Self { context, backend, spec }
	}

	pub fn spec(&self) -> &QuerySpec {
		&self.spec
	}

	pub fn spec_mut(&mut self) -> &mut QuerySpec {
		&mut self.spec
	}

	/// Whether the query text is a filter document run verbatim
	pub fn is_native(&self) -> bool {
		self.spec.native || self.context.is_native(&self.spec.text)
	}

	/// Filter document of this query
	pub fn filter_document(&self) -> Result<Document> {
		if self.is_native() {
			return Ok(native_filter(&self.spec.text)?);
		}
		build_filter(self.metadata()?, &self.spec.filter)
	}

	/// Fetch and materialize the matching documents without resolving relations
	pub async fn populate_entities<E: Entity>(&self) -> Result<Vec<Materialized<E>>> {
		let metadata = self.metadata()?;
		let documents = self.fetch_documents(metadata).await?;
		let handler = MongoDBDataHandler::new(self.context);
		Ok(documents
			.iter()
			.map(|document| handler.from_document(metadata, document, &[]))
			.collect())
	}

	/// Fetch the matching documents, capture their foreign keys and hand them to `resolver`
	pub async fn recursively_populate_entities<E, R>(&self, resolver: &R) -> Result<Vec<E>>
	where
		E: Entity,
		R: RelationResolver<E> + ?Sized,
	{
		let metadata = self.metadata()?;
		let documents = self.fetch_documents(metadata).await?;
		let relation_names = metadata.relation_names();
		let handler = MongoDBDataHandler::new(self.context);
		let loaded = documents
			.iter()
			.filter_map(|document| {
				handler
					.from_document::<E>(metadata, document, &relation_names)
					.into_lenient()
			})
			.collect();
		resolver.resolve(self.context, metadata, loaded).await
	}

	/// Matching entities; documents that fail to materialize are logged and skipped
	pub async fn get_result_list<E: Entity>(&self) -> Result<Vec<E>> {
		Ok(self
			.populate_entities::<E>()
			.await?
			.into_iter()
			.filter_map(Materialized::into_lenient)
			.map(|loaded| loaded.into_entity())
			.collect())
	}

	/// Run a `DELETE` query; returns the number of documents removed
	///
	/// # Errors
	///
	/// [`BackendError::UnsupportedFeature`] for native statements, which are
	/// filter documents and carry no update.
	pub async fn execute_update(&self) -> Result<usize> {
		if self.is_native() {
			return Err(BackendError::UnsupportedFeature(
				"native update statements are not supported within mongodb".to_string(),
			)
			.into());
		}
		if self.spec.kind != QueryKind::Delete {
			tracing::warn!(query = %self.spec.text, "execute_update called on a select query");
			return Ok(0);
		}
		let metadata = self.metadata()?;
		let filter = build_filter(metadata, &self.spec.filter)?;
		let deleted = self.backend.delete_many(metadata.table(), filter).await?;
		tracing::debug!(entity = metadata.entity_name(), deleted, "deleted documents");
		Ok(usize::try_from(deleted).unwrap_or(usize::MAX))
	}

	fn metadata(&self) -> Result<&'a EntityMetadata> {
		Ok(self.context.entity_metadata(&self.spec.entity)?)
	}

	fn find_options(&self, metadata: &EntityMetadata) -> Result<FindOptions> {
		let max_results = self
			.spec
			.max_results
			.unwrap_or_else(|| self.context.max_results(metadata));
		let mut options = FindOptions::new().limit(i64::try_from(max_results).unwrap_or(i64::MAX));

		let sort = build_sort(metadata, &self.spec.ordering)?;
		if !sort.is_empty() {
			options = options.sort(sort);
		}
		if !self.spec.projection.is_empty() {
			let mut projection = Document::new();
			for property in &self.spec.projection {
				let column = metadata
					.resolve_column(property)
					.ok_or_else(|| SchemaError::ColumnNotFound(property.clone()))?;
				projection.insert(document_key(metadata, column), 1);
			}
			options = options.projection(projection);
		}
		Ok(options)
	}

	async fn fetch_documents(&self, metadata: &EntityMetadata) -> Result<Vec<Document>> {
		let filter = self.filter_document()?;
		let options = self.find_options(metadata)?;
		tracing::debug!(
			entity = metadata.entity_name(),
			native = self.is_native(),
			filter = %filter,
			"querying documents"
		);
		self.backend
			.find_many(metadata.table(), filter, options)
			.await
			.map_err(PolyglotError::from)
	}
}

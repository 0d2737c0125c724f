//! In-process document store

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use regex::Regex;
use tokio::sync::RwLock;

use crate::error::BackendError;
use crate::mongodb::client::id_to_string;
use crate::mongodb::{BackendResult, DocumentBackend, FindOptions, ID_KEY};

/// In-memory [`DocumentBackend`]
///
/// Evaluates the filter documents produced by
/// [`build_filter`](crate::mongodb::build_filter): equality, `$eq`, `$ne`,
/// `$gt`, `$gte`, `$lt`, `$lte`, `$regex` (with `$options`) and `$and`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
	collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of documents in a collection
	pub async fn len(&self, collection: &str) -> usize {
		self.collections
			.read()
			.await
			.get(collection)
			.map_or(0, Vec::len)
	}

	/// Remove every document
	pub async fn clear(&self) {
		self.collections.write().await.clear();
	}
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentStore {
	async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>> {
		let collections = self.collections.read().await;
		for document in collections.get(collection).into_iter().flatten() {
			if matches_filter(document, &filter)? {
				return Ok(Some(document.clone()));
			}
		}
		Ok(None)
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> BackendResult<Vec<Document>> {
		let collections = self.collections.read().await;
		let mut found = Vec::new();
		for document in collections.get(collection).into_iter().flatten() {
			if matches_filter(document, &filter)? {
				found.push(document.clone());
			}
		}
		drop(collections);

		if let Some(sort) = &options.sort {
			found.sort_by(|a, b| compare_by_sort(a, b, sort));
		}
		let skip = options
			.skip
			.and_then(|skip| usize::try_from(skip).ok())
			.unwrap_or(0);
		let limit = match options.limit {
			Some(0) | None => usize::MAX,
			Some(limit) => usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX),
		};
		Ok(found
			.into_iter()
			.skip(skip)
			.take(limit)
			.map(|document| match &options.projection {
				Some(projection) => project(document, projection),
				None => document,
			})
			.collect())
	}

	async fn insert_one(&self, collection: &str, mut document: Document) -> BackendResult<String> {
		let id = match document.get(ID_KEY) {
			Some(id) => id.clone(),
			None => {
				let id = Bson::ObjectId(ObjectId::new());
				document.insert(ID_KEY, id.clone());
				id
			}
		};

		let mut collections = self.collections.write().await;
		let documents = collections.entry(collection.to_string()).or_default();
		if documents.iter().any(|existing| existing.get(ID_KEY) == Some(&id)) {
			return Err(BackendError::ExecutionError(format!(
				"duplicate key in {}: {}",
				collection, id
			)));
		}
		documents.push(document);
		Ok(id_to_string(id))
	}

	async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64> {
		let mut collections = self.collections.write().await;
		let Some(documents) = collections.get_mut(collection) else {
			return Ok(0);
		};
		let mut kept = Vec::with_capacity(documents.len());
		let mut deleted = 0;
		for document in documents.drain(..) {
			if matches_filter(&document, &filter)? {
				deleted += 1;
			} else {
				kept.push(document);
			}
		}
		*documents = kept;
		Ok(deleted)
	}
}

/// Whether `document` satisfies every term of `filter`
fn matches_filter(document: &Document, filter: &Document) -> BackendResult<bool> {
	for (key, condition) in filter {
		let matched = if key == "$and" {
			let Bson::Array(terms) = condition else {
				return Err(unsupported("$and expects an array"));
			};
			let mut all = true;
			for term in terms {
				let Bson::Document(term) = term else {
					return Err(unsupported("$and terms must be documents"));
				};
				if !matches_filter(document, term)? {
					all = false;
					break;
				}
			}
			all
		} else if key.starts_with('$') {
			return Err(unsupported(format!("top-level operator {}", key)));
		} else {
			matches_condition(document.get(key), condition)?
		};
		if !matched {
			return Ok(false);
		}
	}
	Ok(true)
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> BackendResult<bool> {
	let Bson::Document(operators) = condition else {
		return Ok(value.is_some_and(|value| bson_eq(value, condition)));
	};
	if !operators.keys().all(|op| op.starts_with('$')) {
		return Ok(value.is_some_and(|value| bson_eq(value, condition)));
	}

	for (op, operand) in operators {
		let matched = match op.as_str() {
			"$eq" => value.is_some_and(|value| bson_eq(value, operand)),
			"$ne" => !value.is_some_and(|value| bson_eq(value, operand)),
			"$gt" => ordering(value, operand).is_some_and(|ord| ord == Ordering::Greater),
			"$gte" => ordering(value, operand).is_some_and(|ord| ord != Ordering::Less),
			"$lt" => ordering(value, operand).is_some_and(|ord| ord == Ordering::Less),
			"$lte" => ordering(value, operand).is_some_and(|ord| ord != Ordering::Greater),
			"$regex" => {
				let options = operators.get_str("$options").unwrap_or("");
				regex_matches(value, operand, options)?
			}
			"$options" => true,
			other => return Err(unsupported(format!("operator {}", other))),
		};
		if !matched {
			return Ok(false);
		}
	}
	Ok(true)
}

fn regex_matches(value: Option<&Bson>, pattern: &Bson, options: &str) -> BackendResult<bool> {
	let pattern = match pattern {
		Bson::String(pattern) => pattern.clone(),
		_ => return Err(unsupported("$regex expects a string")),
	};
	let pattern = if options.contains('i') {
		format!("(?i){}", pattern)
	} else {
		pattern
	};
	let regex = Regex::new(&pattern).map_err(|err| BackendError::ExecutionError(err.to_string()))?;
	Ok(matches!(value, Some(Bson::String(text)) if regex.is_match(text)))
}

fn ordering(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
	compare_bson(value?, operand)
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
	compare_bson(a, b).map_or(a == b, |ord| ord == Ordering::Equal)
}

/// Order two BSON values of comparable types
///
/// Numbers compare across their widths; strings, booleans and datetimes
/// compare within their own type.
fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
	match (a, b) {
		(Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
		(Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
		(Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
		(Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
			Some(as_i64(a)?.cmp(&as_i64(b)?))
		}
		_ => as_f64(a)?.partial_cmp(&as_f64(b)?),
	}
}

fn as_i64(value: &Bson) -> Option<i64> {
	match value {
		Bson::Int32(v) => Some(i64::from(*v)),
		Bson::Int64(v) => Some(*v),
		_ => None,
	}
}

fn as_f64(value: &Bson) -> Option<f64> {
	match value {
		Bson::Int32(v) => Some(f64::from(*v)),
		Bson::Int64(v) => Some(*v as f64),
		Bson::Double(v) => Some(*v),
		_ => None,
	}
}

/// Missing fields sort before present ones
fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
	for (key, direction) in sort {
		let ordering = match (a.get(key), b.get(key)) {
			(None, None) => Ordering::Equal,
			(None, Some(_)) => Ordering::Less,
			(Some(_), None) => Ordering::Greater,
			(Some(x), Some(y)) => compare_bson(x, y).unwrap_or(Ordering::Equal),
		};
		let descending = as_i64(direction).is_some_and(|d| d < 0);
		let ordering = if descending { ordering.reverse() } else { ordering };
		if ordering != Ordering::Equal {
			return ordering;
		}
	}
	Ordering::Equal
}

fn project(document: Document, projection: &Document) -> Document {
	document
		.into_iter()
		.filter(|(key, _)| {
			key == ID_KEY
				|| projection
					.get(key)
					.is_some_and(|flag| as_i64(flag).map_or(matches!(flag, Bson::Boolean(true)), |v| v != 0))
		})
		.collect()
}

fn unsupported(what: impl Into<String>) -> BackendError {
	BackendError::UnsupportedFeature(format!("in-memory document store: {}", what.into()))
}

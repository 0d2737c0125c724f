//! Materialization and serialization results
//!
//! A row that fails part-way is not thrown away: [`Materialized::Partial`]
//! carries the entity built so far together with the field errors, and the
//! caller decides with [`Materialized::into_lenient`] or
//! [`Materialized::into_strict`] whether that is acceptable.

use indexmap::IndexMap;

use crate::error::AccessError;
use crate::value::Value;

/// Entity whose associations are not resolved yet
///
/// `relations` maps the relation column to the raw foreign key, already
/// converted to the target entity's id type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceEntity<E> {
	pub entity: E,
	pub entity_id: Value,
	pub relations: IndexMap<String, Value>,
}

impl<E> EnhanceEntity<E> {
	pub fn new(entity: E, entity_id: Value, relations: IndexMap<String, Value>) -> Self {
		Self {
			entity,
			entity_id,
			relations,
		}
	}
}

/// A materialized row, with or without deferred relations
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<E> {
	Plain(E),
	Enhanced(EnhanceEntity<E>),
}

impl<E> Loaded<E> {
	pub fn entity(&self) -> &E {
		match self {
			Loaded::Plain(entity) => entity,
			Loaded::Enhanced(enhanced) => &enhanced.entity,
		}
	}

	pub fn into_entity(self) -> E {
		match self {
			Loaded::Plain(entity) => entity,
			Loaded::Enhanced(enhanced) => enhanced.entity,
		}
	}

	pub fn is_enhanced(&self) -> bool {
		matches!(self, Loaded::Enhanced(_))
	}

	/// Deferred relations, if any were captured
	pub fn relations(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Loaded::Plain(_) => None,
			Loaded::Enhanced(enhanced) => Some(&enhanced.relations),
		}
	}
}

/// Foreign key to write for one resolved relation
#[derive(Debug, Clone, PartialEq)]
pub struct RelationHolder {
	pub relation_name: String,
	pub relation_value: Value,
}

impl RelationHolder {
	pub fn new(relation_name: impl Into<String>, relation_value: impl Into<Value>) -> Self {
		Self {
			relation_name: relation_name.into(),
			relation_value: relation_value.into(),
		}
	}
}

/// Outcome of materializing one row
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized<E> {
	/// Every field was populated
	Complete(Loaded<E>),
	/// The entity was built but some fields could not be set
	Partial {
		loaded: Loaded<E>,
		errors: Vec<AccessError>,
	},
	/// Nothing usable was built
	Failed(AccessError),
}

impl<E> Materialized<E> {
	pub fn is_complete(&self) -> bool {
		matches!(self, Materialized::Complete(_))
	}

	/// Field errors of a partial row, or the failure of a failed one
	pub fn errors(&self) -> &[AccessError] {
		match self {
			Materialized::Complete(_) => &[],
			Materialized::Partial { errors, .. } => errors,
			Materialized::Failed(err) => std::slice::from_ref(err),
		}
	}

	/// Keep whatever was built, logging the errors
	///
	/// Returns `None` only for failed rows.
	pub fn into_lenient(self) -> Option<Loaded<E>> {
		match self {
			Materialized::Complete(loaded) => Some(loaded),
			Materialized::Partial { loaded, errors } => {
				for err in &errors {
					tracing::error!(error = %err, "error while populating entity field");
				}
				tracing::warn!(
					failed_fields = errors.len(),
					"returning partially materialized entity"
				);
				Some(loaded)
			}
			Materialized::Failed(err) => {
				tracing::error!(error = %err, "skipping row that could not be materialized");
				None
			}
		}
	}

	/// Accept only complete rows; the first error otherwise
	pub fn into_strict(self) -> Result<Loaded<E>, AccessError> {
		match self {
			Materialized::Complete(loaded) => Ok(loaded),
			Materialized::Partial { loaded, errors } => match errors.into_iter().next() {
				Some(err) => Err(err),
				None => Ok(loaded),
			},
			Materialized::Failed(err) => Err(err),
		}
	}
}

/// Serializer output together with the fields that were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct Serialized<T> {
	pub value: T,
	pub skipped: Vec<AccessError>,
}

impl<T> Serialized<T> {
	pub fn is_complete(&self) -> bool {
		self.skipped.is_empty()
	}

	/// Keep the output, logging skipped fields
	pub fn into_lenient(self) -> T {
		for err in &self.skipped {
			tracing::error!(error = %err, "field skipped while serializing entity");
		}
		self.value
	}

	/// Accept the output only when nothing was skipped
	pub fn into_strict(self) -> Result<T, AccessError> {
		match self.skipped.into_iter().next() {
			Some(err) => Err(err),
			None => Ok(self.value),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn mismatch() -> AccessError {
		AccessError::TypeMismatch {
			field: "birth_date".to_string(),
			expected: "int".to_string(),
			found: "string".to_string(),
		}
	}

	#[rstest]
	fn test_partial_is_kept_by_lenient_and_rejected_by_strict() {
		let partial = Materialized::Partial {
			loaded: Loaded::Plain("bsanderson"),
			errors: vec![mismatch()],
		};
		assert_eq!(partial.errors().len(), 1);
		assert_eq!(partial.clone().into_lenient(), Some(Loaded::Plain("bsanderson")));
		assert_eq!(partial.into_strict().unwrap_err(), mismatch());
	}

	#[rstest]
	fn test_failed_row_is_dropped_by_lenient() {
		let failed: Materialized<&str> = Materialized::Failed(AccessError::MissingId {
			entity: "CassandraEntity".to_string(),
		});
		assert_eq!(failed.into_lenient(), None);
	}

	#[rstest]
	fn test_loaded_exposes_relations_only_when_enhanced() {
		let mut relations = IndexMap::new();
		relations.insert("ADDRESS_ID".to_string(), Value::Int(7));
		let enhanced = Loaded::Enhanced(EnhanceEntity::new("p1", Value::Int(1), relations));

		assert!(enhanced.is_enhanced());
		assert_eq!(enhanced.relations().map(IndexMap::len), Some(1));
		assert_eq!(*enhanced.entity(), "p1");
		assert_eq!(Loaded::Plain("p2").relations(), None);
	}

	#[rstest]
	fn test_serialized_strictness() {
		let clean = Serialized {
			value: 1,
			skipped: vec![],
		};
		assert!(clean.is_complete());
		assert_eq!(clean.into_strict().unwrap(), 1);

		let skipped = Serialized {
			value: 2,
			skipped: vec![mismatch()],
		};
		assert_eq!(skipped.clone().into_lenient(), 2);
		assert!(skipped.into_strict().is_err());
	}
}

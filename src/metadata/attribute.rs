//! Attribute descriptors
//!
//! An [`Attribute`] describes one mapped field. Its [`AttributeKind`] is fixed
//! when metadata is built, so the materializer and serializer switch on it
//! instead of re-inspecting field types on every access.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Native type of a mapped scalar (or of the elements of a collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
	Boolean,
	Int,
	Long,
	Float,
	Double,
	/// Arbitrary precision decimal, transported in canonical string form
	Decimal,
	/// Arbitrary precision integer, transported in canonical string form
	BigInteger,
	String,
	Bytes,
	/// Calendar date without time
	Date,
	/// Instant in UTC, stored natively by the backend
	Timestamp,
	/// Instant in UTC, transported in canonical string form
	Calendar,
	Uuid,
}

impl ValueType {
	/// Whether values of this type travel as their canonical string form
	pub fn is_utf8_transported(self) -> bool {
		matches!(
			self,
			ValueType::Decimal | ValueType::BigInteger | ValueType::String | ValueType::Calendar
		)
	}

	/// Whether this is one of the date/calendar types
	pub fn is_temporal(self) -> bool {
		matches!(
			self,
			ValueType::Date | ValueType::Timestamp | ValueType::Calendar
		)
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ValueType::Boolean => "boolean",
			ValueType::Int => "int",
			ValueType::Long => "long",
			ValueType::Float => "float",
			ValueType::Double => "double",
			ValueType::Decimal => "decimal",
			ValueType::BigInteger => "big integer",
			ValueType::String => "string",
			ValueType::Bytes => "bytes",
			ValueType::Date => "date",
			ValueType::Timestamp => "timestamp",
			ValueType::Calendar => "calendar",
			ValueType::Uuid => "uuid",
		};
		f.write_str(name)
	}
}

/// Classification of a mapped field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
	Scalar,
	List,
	Set,
	/// String-keyed map
	Map,
	/// Value-type field group stored inside the owner's row/document
	Embedded {
		embeddable: String,
		collection: bool,
	},
	/// Reference to another entity, resolved outside this crate
	Association { target: String, collection: bool },
}

/// One mapped field of an entity or embeddable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	name: String,
	column: String,
	kind: AttributeKind,
	value_type: Option<ValueType>,
}

impl Attribute {
	/// Scalar attribute whose column name equals the field name
	pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Scalar,
			value_type: Some(value_type),
		}
	}

	/// List attribute with the given element type
	pub fn list(name: impl Into<String>, element: ValueType) -> Self {
		Self::scalar(name, element).with_kind(AttributeKind::List)
	}

	/// Set attribute with the given element type
	pub fn set(name: impl Into<String>, element: ValueType) -> Self {
		Self::scalar(name, element).with_kind(AttributeKind::Set)
	}

	/// String-keyed map attribute with the given value type
	pub fn map(name: impl Into<String>, value: ValueType) -> Self {
		Self::scalar(name, value).with_kind(AttributeKind::Map)
	}

	/// Single embedded value of the named embeddable
	pub fn embedded(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Embedded {
				embeddable: embeddable.into(),
				collection: false,
			},
			value_type: None,
		}
	}

	/// Collection of embedded values of the named embeddable
	pub fn embedded_collection(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Embedded {
				embeddable: embeddable.into(),
				collection: true,
			},
			value_type: None,
		}
	}

	/// Single-valued association to the named target entity
	pub fn association(name: impl Into<String>, target: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Association {
				target: target.into(),
				collection: false,
			},
			value_type: None,
		}
	}

	/// Collection-valued association to the named target entity
	pub fn association_collection(name: impl Into<String>, target: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Association {
				target: target.into(),
				collection: true,
			},
			value_type: None,
		}
	}

	/// Attribute with no determinable native type
	pub fn untyped(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			kind: AttributeKind::Scalar,
			value_type: None,
		}
	}

	/// Override the backend column name
	pub fn column(mut self, column: impl Into<String>) -> Self {
		self.column = column.into();
		self
	}

	fn with_kind(mut self, kind: AttributeKind) -> Self {
		self.kind = kind;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn column_name(&self) -> &str {
		&self.column
	}

	pub fn kind(&self) -> &AttributeKind {
		&self.kind
	}

	pub fn value_type(&self) -> Option<ValueType> {
		self.value_type
	}

	pub fn is_association(&self) -> bool {
		matches!(self.kind, AttributeKind::Association { .. })
	}

	pub fn is_collection(&self) -> bool {
		match &self.kind {
			AttributeKind::List | AttributeKind::Set => true,
			AttributeKind::Embedded { collection, .. }
			| AttributeKind::Association { collection, .. } => *collection,
			AttributeKind::Scalar | AttributeKind::Map => false,
		}
	}

	/// Name of the embeddable type when this attribute is embedded
	pub fn embeddable(&self) -> Option<&str> {
		match &self.kind {
			AttributeKind::Embedded { embeddable, .. } => Some(embeddable),
			_ => None,
		}
	}

	/// Name of the target entity when this attribute is an association
	pub fn association_target(&self) -> Option<&str> {
		match &self.kind {
			AttributeKind::Association { target, .. } => Some(target),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_scalar_defaults_column_to_field_name() {
		let attr = Attribute::scalar("full_name", ValueType::String);
		assert_eq!(attr.name(), "full_name");
		assert_eq!(attr.column_name(), "full_name");
		assert_eq!(attr.kind(), &AttributeKind::Scalar);
	}

	#[rstest]
	fn test_column_override() {
		let attr = Attribute::scalar("personName", ValueType::String).column("PERSON_NAME");
		assert_eq!(attr.name(), "personName");
		assert_eq!(attr.column_name(), "PERSON_NAME");
	}

	#[rstest]
	#[case(Attribute::list("tags", ValueType::String), true)]
	#[case(Attribute::set("tags", ValueType::String), true)]
	#[case(Attribute::map("props", ValueType::String), false)]
	#[case(Attribute::embedded("address", "Address"), false)]
	#[case(Attribute::embedded_collection("phones", "Phone"), true)]
	#[case(Attribute::scalar("age", ValueType::Int), false)]
	fn test_is_collection(#[case] attr: Attribute, #[case] expected: bool) {
		assert_eq!(attr.is_collection(), expected);
	}

	#[rstest]
	fn test_embedded_is_never_association() {
		let attr = Attribute::embedded("address", "Address");
		assert!(!attr.is_association());
		assert_eq!(attr.embeddable(), Some("Address"));
		assert_eq!(attr.association_target(), None);
	}

	#[rstest]
	#[case(ValueType::Decimal, true)]
	#[case(ValueType::BigInteger, true)]
	#[case(ValueType::String, true)]
	#[case(ValueType::Calendar, true)]
	#[case(ValueType::Timestamp, false)]
	#[case(ValueType::Int, false)]
	fn test_utf8_transported(#[case] ty: ValueType, #[case] expected: bool) {
		assert_eq!(ty.is_utf8_transported(), expected);
	}
}

//! Dynamic value model
//!
//! [`Value`] is the in-flight representation of a field between a typed Rust
//! struct and a backend's wire shape. Accessor tables move values in and out of
//! entities through [`IntoValue`] and [`FromValue`]; the [`codec`] module
//! converts between value types; [`bytes`] and [`bson`] map values onto the
//! Cassandra and MongoDB representations.

pub mod bson;
pub mod bytes;
pub mod codec;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AccessError;

/// Field name to value map describing one embeddable instance
pub type Record = IndexMap<String, Value>;

/// A field value in transit
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	Decimal(Decimal),
	BigInt(BigInt),
	Text(String),
	Bytes(::bytes::Bytes),
	Date(NaiveDate),
	Timestamp(DateTime<Utc>),
	Uuid(Uuid),
	List(Vec<Value>),
	Set(Vec<Value>),
	Map(BTreeMap<String, Value>),
	Record(Record),
}

impl Value {
	/// Short name of the variant, used in error messages
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "boolean",
			Value::Int(_) => "int",
			Value::Long(_) => "long",
			Value::Float(_) => "float",
			Value::Double(_) => "double",
			Value::Decimal(_) => "decimal",
			Value::BigInt(_) => "big integer",
			Value::Text(_) => "string",
			Value::Bytes(_) => "bytes",
			Value::Date(_) => "date",
			Value::Timestamp(_) => "timestamp",
			Value::Uuid(_) => "uuid",
			Value::List(_) => "list",
			Value::Set(_) => "set",
			Value::Map(_) => "map",
			Value::Record(_) => "record",
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Order two values of compatible types
	///
	/// Numeric variants compare across widths; other variants only compare
	/// with themselves. Returns `None` for incomparable pairs.
	pub fn compare(&self, other: &Value) -> Option<Ordering> {
		match (self, other) {
			(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
			(Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
			(Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
			(Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
			(Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
			(Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
			(Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
			(Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
			(a, b) => match (a.as_i64(), b.as_i64()) {
				(Some(x), Some(y)) => Some(x.cmp(&y)),
				_ => a.as_f64()?.partial_cmp(&b.as_f64()?),
			},
		}
	}

	fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(i64::from(*v)),
			Value::Long(v) => Some(*v),
			_ => None,
		}
	}

	fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(v) => Some(f64::from(*v)),
			Value::Long(v) => Some(*v as f64),
			Value::Float(v) => Some(f64::from(*v)),
			Value::Double(v) => Some(*v),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Bool(v) => write!(f, "{}", v),
			Value::Int(v) => write!(f, "{}", v),
			Value::Long(v) => write!(f, "{}", v),
			Value::Float(v) => write!(f, "{}", v),
			Value::Double(v) => write!(f, "{}", v),
			Value::Decimal(v) => write!(f, "{}", v),
			Value::BigInt(v) => write!(f, "{}", v),
			Value::Text(v) => f.write_str(v),
			Value::Bytes(v) => write!(f, "{:?}", v),
			Value::Date(v) => write!(f, "{}", v.format(codec::DATE_FORMAT)),
			Value::Timestamp(v) => f.write_str(&codec::format_timestamp(v)),
			Value::Uuid(v) => write!(f, "{}", v),
			Value::List(items) | Value::Set(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", item)?;
				}
				f.write_str("]")
			}
			Value::Map(entries) => {
				f.write_str("{")?;
				for (i, (key, item)) in entries.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", key, item)?;
				}
				f.write_str("}")
			}
			Value::Record(fields) => {
				f.write_str("{")?;
				for (i, (key, item)) in fields.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", key, item)?;
				}
				f.write_str("}")
			}
		}
	}
}

/// Conversion of a Rust field value into a [`Value`]
pub trait IntoValue {
	fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] into a Rust field value
///
/// Implementations accept lossless widenings only; anything else is a
/// [`AccessError::TypeMismatch`] whose field name is filled in by the caller.
pub trait FromValue: Sized {
	fn from_value(value: Value) -> Result<Self, AccessError>;
}

fn mismatch(expected: &str, found: &Value) -> AccessError {
	AccessError::TypeMismatch {
		field: String::new(),
		expected: expected.to_string(),
		found: found.type_name().to_string(),
	}
}

macro_rules! scalar_value {
	($ty:ty, $variant:ident, $expected:literal) => {
		impl IntoValue for $ty {
			fn into_value(self) -> Value {
				Value::$variant(self)
			}
		}

		impl FromValue for $ty {
			fn from_value(value: Value) -> Result<Self, AccessError> {
				match value {
					Value::$variant(v) => Ok(v),
					other => Err(mismatch($expected, &other)),
				}
			}
		}
	};
}

scalar_value!(bool, Bool, "boolean");
scalar_value!(String, Text, "string");
scalar_value!(Decimal, Decimal, "decimal");
scalar_value!(NaiveDate, Date, "date");
scalar_value!(DateTime<Utc>, Timestamp, "timestamp");
scalar_value!(Uuid, Uuid, "uuid");
scalar_value!(::bytes::Bytes, Bytes, "bytes");

impl IntoValue for i32 {
	fn into_value(self) -> Value {
		Value::Int(self)
	}
}

impl FromValue for i32 {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Int(v) => Ok(v),
			Value::Long(v) => i32::try_from(v).map_err(|_| mismatch("int", &Value::Long(v))),
			other => Err(mismatch("int", &other)),
		}
	}
}

impl IntoValue for i64 {
	fn into_value(self) -> Value {
		Value::Long(self)
	}
}

impl FromValue for i64 {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Long(v) => Ok(v),
			Value::Int(v) => Ok(i64::from(v)),
			other => Err(mismatch("long", &other)),
		}
	}
}

impl IntoValue for f32 {
	fn into_value(self) -> Value {
		Value::Float(self)
	}
}

impl FromValue for f32 {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Float(v) => Ok(v),
			other => Err(mismatch("float", &other)),
		}
	}
}

impl IntoValue for f64 {
	fn into_value(self) -> Value {
		Value::Double(self)
	}
}

impl FromValue for f64 {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Double(v) => Ok(v),
			Value::Float(v) => Ok(f64::from(v)),
			Value::Int(v) => Ok(f64::from(v)),
			other => Err(mismatch("double", &other)),
		}
	}
}

impl IntoValue for BigInt {
	fn into_value(self) -> Value {
		Value::BigInt(self)
	}
}

impl FromValue for BigInt {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::BigInt(v) => Ok(v),
			Value::Long(v) => Ok(BigInt::from(v)),
			Value::Int(v) => Ok(BigInt::from(v)),
			other => Err(mismatch("big integer", &other)),
		}
	}
}

impl IntoValue for Value {
	fn into_value(self) -> Value {
		self
	}
}

impl FromValue for Value {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		Ok(value)
	}
}

impl<T: IntoValue> IntoValue for Option<T> {
	fn into_value(self) -> Value {
		match self {
			Some(v) => v.into_value(),
			None => Value::Null,
		}
	}
}

impl<T: FromValue> FromValue for Option<T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Null => Ok(None),
			other => T::from_value(other).map(Some),
		}
	}
}

impl<T: IntoValue> IntoValue for Vec<T> {
	fn into_value(self) -> Value {
		Value::List(self.into_iter().map(IntoValue::into_value).collect())
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::List(items) | Value::Set(items) => {
				items.into_iter().map(T::from_value).collect()
			}
			Value::Null => Ok(Vec::new()),
			other => Err(mismatch("list", &other)),
		}
	}
}

impl<T: IntoValue> IntoValue for HashSet<T> {
	fn into_value(self) -> Value {
		Value::Set(self.into_iter().map(IntoValue::into_value).collect())
	}
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::List(items) | Value::Set(items) => {
				items.into_iter().map(T::from_value).collect()
			}
			Value::Null => Ok(HashSet::new()),
			other => Err(mismatch("set", &other)),
		}
	}
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
	fn into_value(self) -> Value {
		Value::Set(self.into_iter().map(IntoValue::into_value).collect())
	}
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::List(items) | Value::Set(items) => {
				items.into_iter().map(T::from_value).collect()
			}
			Value::Null => Ok(BTreeSet::new()),
			other => Err(mismatch("set", &other)),
		}
	}
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
	fn into_value(self) -> Value {
		Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
	}
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Map(entries) => entries
				.into_iter()
				.map(|(k, v)| T::from_value(v).map(|v| (k, v)))
				.collect(),
			Value::Null => Ok(BTreeMap::new()),
			other => Err(mismatch("map", &other)),
		}
	}
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
	fn into_value(self) -> Value {
		Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
	}
}

impl<T: FromValue> FromValue for HashMap<String, T> {
	fn from_value(value: Value) -> Result<Self, AccessError> {
		match value {
			Value::Map(entries) => entries
				.into_iter()
				.map(|(k, v)| T::from_value(v).map(|v| (k, v)))
				.collect(),
			Value::Null => Ok(HashMap::new()),
			other => Err(mismatch("map", &other)),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Long(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

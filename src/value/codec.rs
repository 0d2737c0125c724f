//! Value conversion between field types
//!
//! Query literals usually arrive as text and stored values arrive in whatever
//! shape the backend returned. Both are converted to the declared type of the
//! destination attribute here. Date and calendar values go through
//! [`translate_date`]; everything else goes through [`convert`]. Neither
//! truncates: a value that does not fit its target is an error.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::Value;
use crate::error::{CodecError, SchemaError};
use crate::metadata::{Attribute, AttributeKind, EntityMetadata, ValueType};

/// Textual form of [`ValueType::Date`]
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest integer magnitude an `f32` holds exactly
const F32_EXACT: u64 = 1 << 24;
/// Largest integer magnitude an `f64` holds exactly
const F64_EXACT: u64 = 1 << 53;

/// Canonical textual form of an instant (RFC 3339, millisecond precision, `Z`)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an instant from RFC 3339, `YYYY-MM-DD HH:MM:SS`, a bare date or epoch milliseconds
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
	let text = text.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
		return Some(ts.with_timezone(&Utc));
	}
	if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
		return Some(Utc.from_utc_datetime(&naive));
	}
	if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
		return midnight(date);
	}
	text.parse::<i64>()
		.ok()
		.and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
	date.and_hms_opt(0, 0, 0)
		.map(|naive| Utc.from_utc_datetime(&naive))
}

/// Resolve the attribute backing `column`
///
/// The id attribute answers for the id column; any other column is looked up
/// through the column→field map.
pub fn resolve_attribute<'a>(
	metadata: &'a EntityMetadata,
	column: &str,
) -> Result<&'a Attribute, SchemaError> {
	if metadata.is_id_column(column) {
		return Ok(metadata.id_attribute());
	}
	metadata
		.field_name(column)
		.and_then(|field| metadata.attribute(field))
		.ok_or_else(|| SchemaError::ColumnNotFound(column.to_string()))
}

/// Declared native type of an attribute
pub fn declared_type(attribute: &Attribute) -> Result<ValueType, SchemaError> {
	attribute
		.value_type()
		.ok_or_else(|| SchemaError::FieldTypeNull(attribute.column_name().to_string()))
}

/// Declared native type of the attribute backing `column`
pub fn column_type(metadata: &EntityMetadata, column: &str) -> Result<ValueType, SchemaError> {
	let attribute = resolve_attribute(metadata, column)?;
	declared_type(attribute).map_err(|err| {
		tracing::error!(column, entity = metadata.entity_name(), "error while handling data type");
		err
	})
}

/// Convert `value` to `target`, routing dates through [`translate_date`]
pub fn translate(value: Value, target: ValueType) -> Result<Value, CodecError> {
	match value {
		Value::Date(_) | Value::Timestamp(_) => translate_date(value, target),
		other => convert(other, target),
	}
}

/// Convert a value read for `attribute` according to its kind
///
/// Scalars convert to the declared type; list and set elements and map values
/// convert element-wise. Embedded and association attributes are handled by
/// the callers and pass through untouched.
pub fn translate_for(attribute: &Attribute, value: Value) -> Result<Value, CodecError> {
	let Some(target) = attribute.value_type() else {
		return Ok(value);
	};
	match (attribute.kind(), value) {
		(_, Value::Null) => Ok(Value::Null),
		(AttributeKind::Scalar, value) => translate(value, target),
		(AttributeKind::List, Value::List(items) | Value::Set(items)) => items
			.into_iter()
			.map(|item| translate(item, target))
			.collect::<Result<Vec<_>, _>>()
			.map(Value::List),
		(AttributeKind::Set, Value::List(items) | Value::Set(items)) => items
			.into_iter()
			.map(|item| translate(item, target))
			.collect::<Result<Vec<_>, _>>()
			.map(Value::Set),
		(AttributeKind::Map, Value::Map(entries)) => entries
			.into_iter()
			.map(|(key, item)| translate(item, target).map(|item| (key, item)))
			.collect::<Result<_, _>>()
			.map(Value::Map),
		(AttributeKind::Map, Value::Record(fields)) => fields
			.into_iter()
			.map(|(key, item)| translate(item, target).map(|item| (key, item)))
			.collect::<Result<_, _>>()
			.map(Value::Map),
		(AttributeKind::Embedded { .. } | AttributeKind::Association { .. }, value) => Ok(value),
		(_, value) => Err(unsupported(&value, target)),
	}
}

/// Convert `value` for `attribute` and bring it into transport form
///
/// Like [`translate_for`], then [`normalize`] per scalar, element or map value.
pub fn transport_for(attribute: &Attribute, value: Value) -> Result<Value, CodecError> {
	let Some(target) = attribute.value_type() else {
		return Ok(value);
	};
	let normalize_all =
		|items: Vec<Value>| items.into_iter().map(|item| normalize(item, target)).collect::<Vec<_>>();
	Ok(match (attribute.kind(), translate_for(attribute, value)?) {
		(AttributeKind::Embedded { .. } | AttributeKind::Association { .. }, value) => value,
		(_, Value::List(items)) => Value::List(normalize_all(items)),
		(_, Value::Set(items)) => Value::Set(normalize_all(items)),
		(_, Value::Map(entries)) => Value::Map(
			entries
				.into_iter()
				.map(|(key, item)| (key, normalize(item, target)))
				.collect(),
		),
		(_, value) => normalize(value, target),
	})
}

/// Canonical transport form: UTF-8 transported types become their string form
pub fn normalize(value: Value, value_type: ValueType) -> Value {
	match value {
		Value::Null => Value::Null,
		Value::Text(_) => value,
		other if value_type.is_utf8_transported() => Value::Text(other.to_string()),
		other => other,
	}
}

/// Translate a date or calendar value into `target`
pub fn translate_date(value: Value, target: ValueType) -> Result<Value, CodecError> {
	match (value, target) {
		(Value::Date(date), ValueType::Date) => Ok(Value::Date(date)),
		(Value::Date(date), ValueType::Timestamp | ValueType::Calendar) => midnight(date)
			.map(Value::Timestamp)
			.ok_or_else(|| out_of_range(&date, target)),
		(Value::Date(date), ValueType::String) => {
			Ok(Value::Text(date.format(DATE_FORMAT).to_string()))
		}
		(Value::Date(date), ValueType::Long) => midnight(date)
			.map(|ts| Value::Long(ts.timestamp_millis()))
			.ok_or_else(|| out_of_range(&date, target)),
		(Value::Timestamp(ts), ValueType::Timestamp | ValueType::Calendar) => {
			Ok(Value::Timestamp(ts))
		}
		(Value::Timestamp(ts), ValueType::Date) => Ok(Value::Date(ts.date_naive())),
		(Value::Timestamp(ts), ValueType::String) => Ok(Value::Text(format_timestamp(&ts))),
		(Value::Timestamp(ts), ValueType::Long) => Ok(Value::Long(ts.timestamp_millis())),
		(value, target) => Err(unsupported(&value, target)),
	}
}

/// Convert a non-date value into `target`
pub fn convert(value: Value, target: ValueType) -> Result<Value, CodecError> {
	match (value, target) {
		(Value::Null, _) => Ok(Value::Null),
		(Value::Text(text), target) => parse_text(&text, target),
		(value @ (Value::Date(_) | Value::Timestamp(_)), target) => translate_date(value, target),

		(Value::Bool(v), ValueType::Boolean) => Ok(Value::Bool(v)),

		(Value::Int(v), ValueType::Int) => Ok(Value::Int(v)),
		(Value::Int(v), ValueType::Long) => Ok(Value::Long(i64::from(v))),
		(Value::Int(v), ValueType::Float) => long_to_float(i64::from(v)),
		(Value::Int(v), ValueType::Double) => Ok(Value::Double(f64::from(v))),
		(Value::Int(v), ValueType::Decimal) => Ok(Value::Decimal(Decimal::from(v))),
		(Value::Int(v), ValueType::BigInteger) => Ok(Value::BigInt(BigInt::from(v))),

		(Value::Long(v), ValueType::Int) => i32::try_from(v)
			.map(Value::Int)
			.map_err(|_| out_of_range(&v, target)),
		(Value::Long(v), ValueType::Long) => Ok(Value::Long(v)),
		(Value::Long(v), ValueType::Float) => long_to_float(v),
		(Value::Long(v), ValueType::Double) => {
			if v.unsigned_abs() <= F64_EXACT {
				Ok(Value::Double(v as f64))
			} else {
				Err(out_of_range(&v, target))
			}
		}
		(Value::Long(v), ValueType::Decimal) => Ok(Value::Decimal(Decimal::from(v))),
		(Value::Long(v), ValueType::BigInteger) => Ok(Value::BigInt(BigInt::from(v))),
		(Value::Long(v), ValueType::Timestamp | ValueType::Calendar | ValueType::Date) => {
			let ts = Utc
				.timestamp_millis_opt(v)
				.single()
				.ok_or_else(|| out_of_range(&v, target))?;
			translate_date(Value::Timestamp(ts), target)
		}

		(Value::Float(v), ValueType::Float) => Ok(Value::Float(v)),
		(Value::Float(v), ValueType::Double) => Ok(Value::Double(f64::from(v))),
		(Value::Float(v), target) => convert(Value::Double(f64::from(v)), target),

		(Value::Double(v), ValueType::Double) => Ok(Value::Double(v)),
		(Value::Double(v), ValueType::Float) => {
			let narrowed = v as f32;
			if f64::from(narrowed) == v || v.is_nan() {
				Ok(Value::Float(narrowed))
			} else {
				Err(out_of_range(&v, target))
			}
		}
		(Value::Double(v), ValueType::Decimal) => Decimal::try_from(v)
			.map(Value::Decimal)
			.map_err(|_| out_of_range(&v, target)),
		(Value::Double(v), ValueType::Int | ValueType::Long) => {
			if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
				convert(Value::Long(v as i64), target)
			} else {
				Err(out_of_range(&v, target))
			}
		}

		(Value::Decimal(d), ValueType::Decimal) => Ok(Value::Decimal(d)),
		(Value::Decimal(d), ValueType::Double) => d
			.to_f64()
			.map(Value::Double)
			.ok_or_else(|| out_of_range(&d, target)),
		(Value::Decimal(d), ValueType::Float) => {
			let wide = d.to_f64().ok_or_else(|| out_of_range(&d, target))?;
			convert(Value::Double(wide), target)
		}
		(Value::Decimal(d), ValueType::Int | ValueType::Long | ValueType::BigInteger) => {
			if !d.fract().is_zero() {
				return Err(out_of_range(&d, target));
			}
			let whole = d.trunc().to_i128().ok_or_else(|| out_of_range(&d, target))?;
			match target {
				ValueType::BigInteger => Ok(Value::BigInt(BigInt::from(whole))),
				_ => {
					let long = i64::try_from(whole).map_err(|_| out_of_range(&d, target))?;
					convert(Value::Long(long), target)
				}
			}
		}

		(Value::BigInt(b), ValueType::BigInteger) => Ok(Value::BigInt(b)),
		(Value::BigInt(b), ValueType::Int | ValueType::Long) => {
			let long = i64::try_from(&b).map_err(|_| out_of_range(&b, target))?;
			convert(Value::Long(long), target)
		}
		(Value::BigInt(b), ValueType::Decimal) => Decimal::from_str(&b.to_string())
			.map(Value::Decimal)
			.map_err(|_| out_of_range(&b, target)),

		(Value::Bytes(b), ValueType::Bytes) => Ok(Value::Bytes(b)),
		(Value::Bytes(b), ValueType::String) => String::from_utf8(b.to_vec())
			.map(Value::Text)
			.map_err(|_| unsupported(&Value::Bytes(b), target)),

		(Value::Uuid(u), ValueType::Uuid) => Ok(Value::Uuid(u)),

		(
			value @ (Value::Bool(_)
			| Value::Int(_)
			| Value::Long(_)
			| Value::Double(_)
			| Value::Decimal(_)
			| Value::BigInt(_)
			| Value::Uuid(_)),
			ValueType::String,
		) => Ok(Value::Text(value.to_string())),

		(value, target) => Err(unsupported(&value, target)),
	}
}

fn long_to_float(v: i64) -> Result<Value, CodecError> {
	if v.unsigned_abs() <= F32_EXACT {
		Ok(Value::Float(v as f32))
	} else {
		Err(out_of_range(&v, ValueType::Float))
	}
}

/// Parse a textual literal into `target`
fn parse_text(text: &str, target: ValueType) -> Result<Value, CodecError> {
	let trimmed = text.trim();
	let parsed = match target {
		ValueType::String => return Ok(Value::Text(text.to_string())),
		ValueType::Bytes => return Ok(Value::Bytes(::bytes::Bytes::from(text.as_bytes().to_vec()))),
		ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
			"true" => Some(Value::Bool(true)),
			"false" => Some(Value::Bool(false)),
			_ => None,
		},
		ValueType::Int => trimmed.parse::<i32>().ok().map(Value::Int),
		ValueType::Long => trimmed.parse::<i64>().ok().map(Value::Long),
		ValueType::Float => trimmed.parse::<f32>().ok().map(Value::Float),
		ValueType::Double => trimmed.parse::<f64>().ok().map(Value::Double),
		ValueType::Decimal => Decimal::from_str(trimmed)
			.or_else(|_| Decimal::from_scientific(trimmed))
			.ok()
			.map(Value::Decimal),
		ValueType::BigInteger => trimmed.parse::<BigInt>().ok().map(Value::BigInt),
		ValueType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
			.ok()
			.or_else(|| parse_timestamp(trimmed).map(|ts| ts.date_naive()))
			.map(Value::Date),
		ValueType::Timestamp | ValueType::Calendar => parse_timestamp(trimmed).map(Value::Timestamp),
		ValueType::Uuid => Uuid::parse_str(trimmed).ok().map(Value::Uuid),
	};
	parsed.ok_or_else(|| CodecError::Parse {
		input: text.to_string(),
		target,
	})
}

fn unsupported(value: &Value, target: ValueType) -> CodecError {
	CodecError::Unsupported {
		from: value.type_name().to_string(),
		to: target,
	}
}

fn out_of_range(value: &dyn std::fmt::Display, target: ValueType) -> CodecError {
	CodecError::OutOfRange {
		value: value.to_string(),
		target,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::Attribute;
	use rstest::{fixture, rstest};

	#[fixture]
	fn users() -> EntityMetadata {
		EntityMetadata::builder("CassandraEntity", "users")
			.id(Attribute::scalar("key", ValueType::String))
			.attribute(Attribute::scalar("full_name", ValueType::String))
			.attribute(Attribute::scalar("birth_date", ValueType::Int))
			.attribute(Attribute::untyped("notes"))
			.build()
	}

	#[rstest]
	fn test_resolve_attribute_prefers_id(users: EntityMetadata) {
		let attr = resolve_attribute(&users, "key").unwrap();
		assert_eq!(attr.name(), "key");
		let attr = resolve_attribute(&users, "birth_date").unwrap();
		assert_eq!(attr.value_type(), Some(ValueType::Int));
	}

	#[rstest]
	fn test_column_not_found(users: EntityMetadata) {
		assert_eq!(
			resolve_attribute(&users, "nickname").unwrap_err(),
			SchemaError::ColumnNotFound("nickname".to_string())
		);
	}

	#[rstest]
	fn test_field_type_null(users: EntityMetadata) {
		assert_eq!(
			column_type(&users, "notes").unwrap_err(),
			SchemaError::FieldTypeNull("notes".to_string())
		);
	}

	#[rstest]
	#[case(Value::from("1975"), ValueType::Int, Value::Int(1975))]
	#[case(Value::from("1975"), ValueType::Long, Value::Long(1975))]
	#[case(Value::from(" true "), ValueType::Boolean, Value::Bool(true))]
	#[case(Value::from("12.50"), ValueType::Decimal, Value::Decimal(Decimal::new(1250, 2)))]
	#[case(Value::Int(7), ValueType::Long, Value::Long(7))]
	#[case(Value::Int(7), ValueType::Double, Value::Double(7.0))]
	#[case(Value::Long(7), ValueType::Int, Value::Int(7))]
	#[case(Value::Double(3.0), ValueType::Long, Value::Long(3))]
	#[case(Value::Decimal(Decimal::new(300, 2)), ValueType::Int, Value::Int(3))]
	#[case(Value::Int(12), ValueType::String, Value::from("12"))]
	fn test_convert(#[case] input: Value, #[case] target: ValueType, #[case] expected: Value) {
		assert_eq!(convert(input, target).unwrap(), expected);
	}

	#[rstest]
	#[case(Value::Long(i64::MAX), ValueType::Int)]
	#[case(Value::Double(3.5), ValueType::Long)]
	#[case(Value::Decimal(Decimal::new(35, 1)), ValueType::Int)]
	#[case(Value::Long((1 << 24) + 1), ValueType::Float)]
	#[case(Value::Double(0.1), ValueType::Float)]
	fn test_convert_never_truncates(#[case] input: Value, #[case] target: ValueType) {
		assert!(matches!(
			convert(input, target),
			Err(CodecError::OutOfRange { .. })
		));
	}

	#[rstest]
	fn test_convert_rejects_unparseable_text() {
		assert_eq!(
			convert(Value::from("abc"), ValueType::Int).unwrap_err(),
			CodecError::Parse {
				input: "abc".to_string(),
				target: ValueType::Int,
			}
		);
	}

	#[rstest]
	fn test_convert_rejects_unsupported_pairs() {
		assert!(matches!(
			convert(Value::Bool(true), ValueType::Int),
			Err(CodecError::Unsupported { .. })
		));
		assert!(matches!(
			convert(Value::List(vec![]), ValueType::String),
			Err(CodecError::Unsupported { .. })
		));
	}

	#[rstest]
	fn test_translate_date() {
		let date = NaiveDate::from_ymd_opt(1975, 4, 19).unwrap();
		let ts = midnight(date).unwrap();

		assert_eq!(
			translate(Value::Date(date), ValueType::Timestamp).unwrap(),
			Value::Timestamp(ts)
		);
		assert_eq!(
			translate(Value::Timestamp(ts), ValueType::Date).unwrap(),
			Value::Date(date)
		);
		assert_eq!(
			translate(Value::Timestamp(ts), ValueType::String).unwrap(),
			Value::from("1975-04-19T00:00:00.000Z")
		);
		assert!(translate(Value::Timestamp(ts), ValueType::Boolean).is_err());
	}

	#[rstest]
	fn test_calendar_parses_canonical_form() {
		let ts = parse_timestamp("1975-04-19T10:30:00.000Z").unwrap();
		assert_eq!(
			convert(Value::from("1975-04-19T10:30:00.000Z"), ValueType::Calendar).unwrap(),
			Value::Timestamp(ts)
		);
	}

	#[rstest]
	#[case(Value::Decimal(Decimal::new(1250, 2)), ValueType::Decimal, Value::from("12.50"))]
	#[case(Value::BigInt(BigInt::from(99)), ValueType::BigInteger, Value::from("99"))]
	#[case(Value::Int(5), ValueType::Int, Value::Int(5))]
	#[case(Value::Null, ValueType::String, Value::Null)]
	fn test_normalize(#[case] input: Value, #[case] ty: ValueType, #[case] expected: Value) {
		assert_eq!(normalize(input, ty), expected);
	}

	#[rstest]
	fn test_transport_for_writes_calendars_as_text() {
		let ts = parse_timestamp("1975-04-19T10:30:00Z").unwrap();
		let scalar = Attribute::scalar("at", ValueType::Calendar);
		let list = Attribute::list("history", ValueType::Calendar);

		assert_eq!(
			transport_for(&scalar, Value::Timestamp(ts)).unwrap(),
			Value::from("1975-04-19T10:30:00.000Z")
		);
		assert_eq!(
			transport_for(&list, Value::List(vec![Value::Timestamp(ts)])).unwrap(),
			Value::List(vec![Value::from("1975-04-19T10:30:00.000Z")])
		);
		assert_eq!(
			transport_for(&Attribute::scalar("born", ValueType::Timestamp), Value::Timestamp(ts)).unwrap(),
			Value::Timestamp(ts)
		);
	}

	#[rstest]
	fn test_translate_for_list_converts_elements() {
		let attr = Attribute::list("years", ValueType::Int);
		let converted =
			translate_for(&attr, Value::List(vec![Value::Long(1), Value::from("2")])).unwrap();
		assert_eq!(converted, Value::List(vec![Value::Int(1), Value::Int(2)]));
	}
}

//! Mapping between [`Value`] and BSON
//!
//! Types BSON has no native representation for (arbitrary precision numbers,
//! UUIDs) are stored as their canonical string. Dates are stored as BSON
//! datetimes at UTC midnight.

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use chrono::{TimeZone, Utc};

use super::{Record, Value};

/// Convert a value into its BSON representation
pub fn to_bson(value: Value) -> Bson {
	match value {
		Value::Null => Bson::Null,
		Value::Bool(v) => Bson::Boolean(v),
		Value::Int(v) => Bson::Int32(v),
		Value::Long(v) => Bson::Int64(v),
		Value::Float(v) => Bson::Double(f64::from(v)),
		Value::Double(v) => Bson::Double(v),
		Value::Decimal(v) => Bson::String(v.to_string()),
		Value::BigInt(v) => Bson::String(v.to_string()),
		Value::Text(v) => Bson::String(v),
		Value::Bytes(v) => Bson::Binary(Binary {
			subtype: BinarySubtype::Generic,
			bytes: v.to_vec(),
		}),
		Value::Date(date) => match date.and_hms_opt(0, 0, 0) {
			Some(naive) => Bson::DateTime(bson::DateTime::from_millis(
				Utc.from_utc_datetime(&naive).timestamp_millis(),
			)),
			None => Bson::Null,
		},
		Value::Timestamp(ts) => Bson::DateTime(bson::DateTime::from_millis(ts.timestamp_millis())),
		Value::Uuid(v) => Bson::String(v.to_string()),
		Value::List(items) | Value::Set(items) => {
			Bson::Array(items.into_iter().map(to_bson).collect())
		}
		Value::Map(entries) => Bson::Document(
			entries
				.into_iter()
				.map(|(key, item)| (key, to_bson(item)))
				.collect(),
		),
		Value::Record(fields) => Bson::Document(record_to_document(fields)),
	}
}

/// Convert a BSON value into a [`Value`]
///
/// Embedded documents become [`Value::Record`], preserving field order.
/// Object ids and decimal128 values become their string form; BSON types
/// with no counterpart are carried as their textual rendering.
pub fn from_bson(bson: Bson) -> Value {
	match bson {
		Bson::Null | Bson::Undefined => Value::Null,
		Bson::Boolean(v) => Value::Bool(v),
		Bson::Int32(v) => Value::Int(v),
		Bson::Int64(v) => Value::Long(v),
		Bson::Double(v) => Value::Double(v),
		Bson::String(v) => Value::Text(v),
		Bson::Array(items) => Value::List(items.into_iter().map(from_bson).collect()),
		Bson::Document(doc) => Value::Record(document_to_record(doc)),
		Bson::DateTime(dt) => match Utc.timestamp_millis_opt(dt.timestamp_millis()).single() {
			Some(ts) => Value::Timestamp(ts),
			None => Value::Long(dt.timestamp_millis()),
		},
		Bson::Binary(binary) => Value::Bytes(::bytes::Bytes::from(binary.bytes)),
		Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
		Bson::Decimal128(v) => Value::Text(v.to_string()),
		other => Value::Text(other.to_string()),
	}
}

/// Convert a record into a BSON document
pub fn record_to_document(record: Record) -> Document {
	record
		.into_iter()
		.map(|(key, item)| (key, to_bson(item)))
		.collect()
}

/// Convert a BSON document into a record
pub fn document_to_record(doc: Document) -> Record {
	doc.into_iter()
		.map(|(key, item)| (key, from_bson(item)))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use chrono::NaiveDate;
	use rstest::rstest;
	use rust_decimal::Decimal;

	#[rstest]
	fn test_decimal_travels_as_string() {
		assert_eq!(
			to_bson(Value::Decimal(Decimal::new(1250, 2))),
			Bson::String("12.50".to_string())
		);
	}

	#[rstest]
	fn test_date_is_stored_at_midnight() {
		let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
		assert_eq!(
			to_bson(Value::Date(date)),
			Bson::DateTime(bson::DateTime::from_millis(86_400_000))
		);
	}

	#[rstest]
	fn test_document_becomes_ordered_record() {
		let value = from_bson(Bson::Document(doc! { "street": "Main", "zip": 84101 }));
		let Value::Record(record) = value else {
			panic!("expected record");
		};
		assert_eq!(
			record.keys().collect::<Vec<_>>(),
			vec!["street", "zip"]
		);
		assert_eq!(record["zip"], Value::Int(84101));
	}

	#[rstest]
	fn test_object_id_becomes_hex() {
		let oid = bson::oid::ObjectId::new();
		assert_eq!(from_bson(Bson::ObjectId(oid)), Value::Text(oid.to_hex()));
	}
}

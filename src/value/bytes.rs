//! Cassandra column value encoding
//!
//! Column values are raw byte strings. Scalars use the fixed big-endian widths
//! of the Cassandra marshal types; UTF-8 transported types ([`ValueType::is_utf8_transported`])
//! are written as their canonical text. Collections use a length-prefixed
//! layout: an `i32` element count followed by `i32` length + bytes per element,
//! map entries prefixing each value with its length-prefixed UTF-8 key.

use std::cmp::Ordering;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::{Value, codec};
use crate::error::{CodecError, PolyglotError};
use crate::metadata::{Attribute, AttributeKind, EntityMetadata, ValueType};

/// Encode a scalar value as the column bytes of `value_type`
///
/// The value is translated to `value_type` first, so a textual literal such as
/// `"1970"` encodes as a 4-byte int for an `Int` column.
pub fn encode(value: Value, value_type: ValueType) -> Result<Bytes, CodecError> {
	let value = codec::translate(value, value_type)?;
	if value_type.is_utf8_transported() {
		return Ok(match value {
			Value::Null => Bytes::new(),
			other => Bytes::from(other.to_string().into_bytes()),
		});
	}

	let mut buf = BytesMut::new();
	match value {
		Value::Null => {}
		Value::Bool(v) => buf.put_u8(u8::from(v)),
		Value::Int(v) => buf.put_i32(v),
		Value::Long(v) => buf.put_i64(v),
		Value::Float(v) => buf.put_f32(v),
		Value::Double(v) => buf.put_f64(v),
		Value::Bytes(v) => buf.put_slice(&v),
		Value::Uuid(v) => buf.put_slice(v.as_bytes()),
		Value::Timestamp(ts) => buf.put_i64(ts.timestamp_millis()),
		Value::Date(date) => {
			let millis = codec::translate_date(Value::Date(date), ValueType::Long)?;
			if let Value::Long(millis) = millis {
				buf.put_i64(millis);
			}
		}
		other => {
			return Err(CodecError::Unsupported {
				from: other.type_name().to_string(),
				to: value_type,
			});
		}
	}
	Ok(buf.freeze())
}

/// Decode column bytes written by [`encode`]
pub fn decode(raw: &[u8], value_type: ValueType) -> Result<Value, CodecError> {
	if raw.is_empty() && !value_type.is_utf8_transported() && value_type != ValueType::Bytes {
		return Ok(Value::Null);
	}

	let mut buf = raw;
	let value = match value_type {
		ValueType::Boolean => {
			expect_len(raw, 1, value_type)?;
			Value::Bool(buf.get_u8() != 0)
		}
		ValueType::Int => {
			expect_len(raw, 4, value_type)?;
			Value::Int(buf.get_i32())
		}
		ValueType::Long => {
			expect_len(raw, 8, value_type)?;
			Value::Long(buf.get_i64())
		}
		ValueType::Float => {
			expect_len(raw, 4, value_type)?;
			Value::Float(buf.get_f32())
		}
		ValueType::Double => {
			expect_len(raw, 8, value_type)?;
			Value::Double(buf.get_f64())
		}
		ValueType::Bytes => Value::Bytes(Bytes::copy_from_slice(raw)),
		ValueType::Uuid => {
			let uuid = Uuid::from_slice(raw).map_err(|err| decode_error(value_type, raw, err))?;
			Value::Uuid(uuid)
		}
		ValueType::Timestamp | ValueType::Date => {
			expect_len(raw, 8, value_type)?;
			let millis = buf.get_i64();
			let ts = Utc
				.timestamp_millis_opt(millis)
				.single()
				.ok_or_else(|| decode_error(value_type, raw, "timestamp out of range"))?;
			codec::translate_date(Value::Timestamp(ts), value_type)?
		}
		ValueType::Decimal | ValueType::BigInteger | ValueType::String | ValueType::Calendar => {
			let text = std::str::from_utf8(raw).map_err(|err| decode_error(value_type, raw, err))?;
			codec::convert(Value::Text(text.to_string()), value_type)?
		}
	};
	Ok(value)
}

/// Encode the value of `attribute`, handling collection kinds
pub fn encode_attribute(attribute: &Attribute, value: Value) -> Result<Bytes, CodecError> {
	let value_type = attribute.value_type().ok_or_else(|| CodecError::Unsupported {
		from: value.type_name().to_string(),
		to: ValueType::Bytes,
	})?;
	match (attribute.kind(), value) {
		(AttributeKind::List | AttributeKind::Set, Value::List(items) | Value::Set(items)) => {
			let mut buf = BytesMut::new();
			put_len(&mut buf, items.len());
			for item in items {
				put_chunk(&mut buf, &encode(item, value_type)?);
			}
			Ok(buf.freeze())
		}
		(AttributeKind::Map, Value::Map(entries)) => {
			let mut buf = BytesMut::new();
			put_len(&mut buf, entries.len());
			for (key, item) in entries {
				put_chunk(&mut buf, key.as_bytes());
				put_chunk(&mut buf, &encode(item, value_type)?);
			}
			Ok(buf.freeze())
		}
		(AttributeKind::List | AttributeKind::Set | AttributeKind::Map, Value::Null) => {
			Ok(Bytes::new())
		}
		(AttributeKind::List | AttributeKind::Set | AttributeKind::Map, other) => {
			Err(CodecError::Unsupported {
				from: other.type_name().to_string(),
				to: value_type,
			})
		}
		(_, value) => encode(value, value_type),
	}
}

/// Decode the column bytes of `attribute`, handling collection kinds
pub fn decode_attribute(attribute: &Attribute, raw: &[u8]) -> Result<Value, CodecError> {
	let value_type = attribute.value_type().ok_or_else(|| CodecError::Decode {
		target: ValueType::Bytes,
		len: raw.len(),
		reason: format!("attribute {} has no declared type", attribute.name()),
	})?;
	match attribute.kind() {
		AttributeKind::List | AttributeKind::Set => {
			if raw.is_empty() {
				return Ok(Value::Null);
			}
			let mut buf = raw;
			let count = get_count(&mut buf, 4, value_type, raw)?;
			let mut items = Vec::with_capacity(count);
			for _ in 0..count {
				items.push(decode(get_chunk(&mut buf, value_type, raw)?, value_type)?);
			}
			Ok(match attribute.kind() {
				AttributeKind::Set => Value::Set(items),
				_ => Value::List(items),
			})
		}
		AttributeKind::Map => {
			if raw.is_empty() {
				return Ok(Value::Null);
			}
			let mut buf = raw;
			let count = get_count(&mut buf, 8, value_type, raw)?;
			let mut entries = std::collections::BTreeMap::new();
			for _ in 0..count {
				let key = get_chunk(&mut buf, value_type, raw)?;
				let key = std::str::from_utf8(key)
					.map_err(|err| decode_error(value_type, raw, err))?
					.to_string();
				let item = decode(get_chunk(&mut buf, value_type, raw)?, value_type)?;
				entries.insert(key, item);
			}
			Ok(Value::Map(entries))
		}
		_ => decode(raw, value_type),
	}
}

/// Encode a query literal for `column` of `metadata`
///
/// Resolves the column's declared type and converts the literal before
/// encoding. This is the value-side half of building an index clause.
pub fn encode_literal(
	metadata: &EntityMetadata,
	column: &str,
	value: Value,
) -> Result<Bytes, PolyglotError> {
	let value_type = codec::column_type(metadata, column)?;
	Ok(encode(value, value_type)?)
}

/// Type a scalar value encodes as when no column type is declared
pub fn natural_type(value: &Value) -> Option<ValueType> {
	match value {
		Value::Bool(_) => Some(ValueType::Boolean),
		Value::Int(_) => Some(ValueType::Int),
		Value::Long(_) => Some(ValueType::Long),
		Value::Float(_) => Some(ValueType::Float),
		Value::Double(_) => Some(ValueType::Double),
		Value::Decimal(_) => Some(ValueType::Decimal),
		Value::BigInt(_) => Some(ValueType::BigInteger),
		Value::Text(_) => Some(ValueType::String),
		Value::Bytes(_) => Some(ValueType::Bytes),
		Value::Date(_) => Some(ValueType::Date),
		Value::Timestamp(_) => Some(ValueType::Timestamp),
		Value::Uuid(_) => Some(ValueType::Uuid),
		Value::Null | Value::List(_) | Value::Set(_) | Value::Map(_) | Value::Record(_) => None,
	}
}

/// Order two encoded column values of `value_type`
///
/// Returns `None` when either side fails to decode or the values are not
/// comparable.
pub fn compare(a: &[u8], b: &[u8], value_type: ValueType) -> Option<Ordering> {
	if value_type == ValueType::Bytes {
		return Some(a.cmp(b));
	}
	let left = decode(a, value_type).ok()?;
	let right = decode(b, value_type).ok()?;
	left.compare(&right)
}

fn expect_len(raw: &[u8], expected: usize, target: ValueType) -> Result<(), CodecError> {
	if raw.len() == expected {
		Ok(())
	} else {
		Err(decode_error(target, raw, format!("expected {} bytes", expected)))
	}
}

fn put_len(buf: &mut BytesMut, len: usize) {
	buf.put_i32(i32::try_from(len).unwrap_or(i32::MAX));
}

fn put_chunk(buf: &mut BytesMut, chunk: &[u8]) {
	put_len(buf, chunk.len());
	buf.put_slice(chunk);
}

fn get_len(buf: &mut &[u8], target: ValueType, raw: &[u8]) -> Result<usize, CodecError> {
	if buf.remaining() < 4 {
		return Err(decode_error(target, raw, "truncated length prefix"));
	}
	usize::try_from(buf.get_i32()).map_err(|_| decode_error(target, raw, "negative length"))
}

/// Element count of a collection whose elements take at least `min_width` bytes each
fn get_count(buf: &mut &[u8], min_width: usize, target: ValueType, raw: &[u8]) -> Result<usize, CodecError> {
	let count = get_len(buf, target, raw)?;
	if count > buf.remaining() / min_width {
		return Err(decode_error(target, raw, format!("{} elements cannot fit", count)));
	}
	Ok(count)
}

fn get_chunk<'a>(buf: &mut &'a [u8], target: ValueType, raw: &[u8]) -> Result<&'a [u8], CodecError> {
	let len = get_len(buf, target, raw)?;
	if buf.len() < len {
		return Err(decode_error(target, raw, "truncated element"));
	}
	let slice: &'a [u8] = buf;
	let (chunk, rest) = slice.split_at(len);
	*buf = rest;
	Ok(chunk)
}

fn decode_error(target: ValueType, raw: &[u8], reason: impl ToString) -> CodecError {
	CodecError::Decode {
		target,
		len: raw.len(),
		reason: reason.to_string(),
	}
}

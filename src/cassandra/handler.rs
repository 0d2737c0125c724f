//! Row materializer and serializer for the column backend
//!
//! Scalars, collections and foreign keys are plain columns. An embedded
//! value is a super column named after the attribute's column; the elements
//! of an embedded collection are super columns `column#0`, `column#1`, ...

use bytes::Bytes;

use super::row::{Column, SuperColumn, ThriftRow};
use crate::entity::walk::{self, RowSink, RowSource, embedded_columns, embedded_record};
use crate::entity::{Entity, Materialized, RelationHolder, Serialized};
use crate::error::{AccessError, CodecError};
use crate::metadata::{Attribute, EmbeddableMetadata, EntityMetadata, MetadataContext, ValueType};
use crate::value::{Value, bytes as codec_bytes};

/// Separator between an embedded collection's column and the element index
pub const EMBEDDED_INDEX_SEPARATOR: char = '#';

/// Converts between entities and [`ThriftRow`]s
#[derive(Debug, Clone, Copy)]
pub struct CassandraDataHandler<'a> {
	context: &'a MetadataContext,
}

impl<'a> CassandraDataHandler<'a> {
	pub fn new(context: &'a MetadataContext) -> Self {
		Self { context }
	}

	/// Materialize an entity from `row`
	///
	/// Association columns listed in `relation_names` are captured as
	/// deferred relations.
	pub fn from_thrift_row<E: Entity>(
		&self,
		metadata: &EntityMetadata,
		row: &ThriftRow,
		relation_names: &[&str],
	) -> Materialized<E> {
		walk::materialize(self.context, metadata, &RowReader { row }, relation_names)
	}

	/// Serialize `entity` into a row of its column family
	///
	/// # Errors
	///
	/// Fails when the entity has no id value.
	pub fn to_thrift_row<E: Entity>(
		&self,
		metadata: &EntityMetadata,
		entity: &E,
		relations: &[RelationHolder],
	) -> Result<Serialized<ThriftRow>, AccessError> {
		let mut writer = RowWriter {
			row: ThriftRow::new(Bytes::new(), metadata.table()),
		};
		let skipped = walk::serialize(self.context, metadata, entity, relations, &mut writer)?;
		Ok(Serialized {
			value: writer.row,
			skipped,
		})
	}
}

/// Name of the super column holding element `index` of an embedded collection
pub fn embedded_element_name(column: &str, index: usize) -> String {
	format!("{}{}{}", column, EMBEDDED_INDEX_SEPARATOR, index)
}

/// Element index of `name` when it belongs to the embedded collection `column`
fn embedded_element_index(name: &str, column: &str) -> Option<usize> {
	name.strip_prefix(column)?
		.strip_prefix(EMBEDDED_INDEX_SEPARATOR)?
		.parse()
		.ok()
}

struct RowReader<'r> {
	row: &'r ThriftRow,
}

impl RowReader<'_> {
	fn super_column_record(super_column: &SuperColumn, embeddable: &EmbeddableMetadata) -> Result<Value, CodecError> {
		embedded_record(embeddable, |attr| {
			super_column
				.column(attr.column_name())
				.map(|col| codec_bytes::decode_attribute(attr, &col.value))
				.transpose()
		})
		.map(Value::Record)
	}
}

impl RowSource for RowReader<'_> {
	fn read_id(&self, id: &Attribute) -> Result<Option<Value>, CodecError> {
		if self.row.id.is_empty() {
			return Ok(None);
		}
		codec_bytes::decode_attribute(id, &self.row.id).map(Some)
	}

	fn read(&self, attribute: &Attribute) -> Result<Option<Value>, CodecError> {
		self.row
			.column(attribute.column_name())
			.map(|col| codec_bytes::decode_attribute(attribute, &col.value))
			.transpose()
	}

	fn read_embedded(
		&self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
	) -> Result<Option<Value>, CodecError> {
		let column = attribute.column_name();
		if !attribute.is_collection() {
			return self
				.row
				.super_column(column)
				.map(|sc| Self::super_column_record(sc, embeddable))
				.transpose();
		}

		let mut elements: Vec<(usize, &SuperColumn)> = self
			.row
			.super_columns
			.iter()
			.filter_map(|sc| embedded_element_index(&sc.name, column).map(|index| (index, sc)))
			.collect();
		if elements.is_empty() {
			return Ok(None);
		}
		elements.sort_by_key(|(index, _)| *index);
		elements
			.into_iter()
			.map(|(_, sc)| Self::super_column_record(sc, embeddable))
			.collect::<Result<Vec<_>, _>>()
			.map(|records| Some(Value::List(records)))
	}

	fn read_relation(&self, attribute: &Attribute, target_id: &Attribute) -> Result<Option<Value>, CodecError> {
		match self.row.column(attribute.column_name()) {
			Some(col) if !col.value.is_empty() => codec_bytes::decode_attribute(target_id, &col.value).map(Some),
			_ => Ok(None),
		}
	}
}

struct RowWriter {
	row: ThriftRow,
}

impl RowWriter {
	fn super_column(name: String, embeddable: &EmbeddableMetadata, value: &Value) -> Result<SuperColumn, CodecError> {
		let Value::Record(record) = value else {
			return Err(CodecError::Unsupported {
				from: value.type_name().to_string(),
				to: ValueType::Bytes,
			});
		};
		let mut super_column = SuperColumn::new(name);
		for (attr, item) in embedded_columns(embeddable, record) {
			let encoded = codec_bytes::encode_attribute(attr, item.clone())?;
			super_column.columns.push(Column::new(attr.column_name(), encoded));
		}
		Ok(super_column)
	}
}

impl RowSink for RowWriter {
	fn write_id(&mut self, id: &Attribute, value: Value) -> Result<(), CodecError> {
		self.row.id = codec_bytes::encode_attribute(id, value)?;
		Ok(())
	}

	fn write(&mut self, attribute: &Attribute, value: Value) -> Result<(), CodecError> {
		let encoded = codec_bytes::encode_attribute(attribute, value)?;
		self.row.put_column(Column::new(attribute.column_name(), encoded));
		Ok(())
	}

	fn write_embedded(
		&mut self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
		value: Value,
	) -> Result<(), CodecError> {
		let column = attribute.column_name();
		if !attribute.is_collection() {
			let super_column = Self::super_column(column.to_string(), embeddable, &value)?;
			self.row.put_super_column(super_column);
			return Ok(());
		}

		let Value::List(items) = value else {
			return Err(CodecError::Unsupported {
				from: value.type_name().to_string(),
				to: ValueType::Bytes,
			});
		};
		for (index, item) in items.iter().enumerate() {
			let super_column = Self::super_column(embedded_element_name(column, index), embeddable, item)?;
			self.row.put_super_column(super_column);
		}
		Ok(())
	}

	fn write_relation(&mut self, column: &str, value: Value) -> Result<(), CodecError> {
		let Some(value_type) = codec_bytes::natural_type(&value) else {
			return Err(CodecError::Unsupported {
				from: value.type_name().to_string(),
				to: ValueType::Bytes,
			});
		};
		let encoded = codec_bytes::encode(value, value_type)?;
		self.row.put_column(Column::new(column, encoded));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("phones#0", "phones", Some(0))]
	#[case("phones#12", "phones", Some(12))]
	#[case("phones", "phones", None)]
	#[case("phonesx#1", "phones", None)]
	#[case("address#1", "phones", None)]
	fn test_embedded_element_index(#[case] name: &str, #[case] column: &str, #[case] expected: Option<usize>) {
		assert_eq!(embedded_element_index(name, column), expected);
	}

	#[rstest]
	fn test_embedded_element_name() {
		assert_eq!(embedded_element_name("phones", 3), "phones#3");
	}
}

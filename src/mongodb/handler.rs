//! Document materializer and serializer
//!
//! The id lives under `_id`. Embedded values are nested documents and
//! embedded collections arrays of documents, keyed by column name.

use bson::{Bson, Document};

use super::mapper;
use crate::entity::walk::{self, RowSink, RowSource};
use crate::entity::{Embeddable, Entity, Materialized, RelationHolder, Serialized, from_record};
use crate::error::{AccessError, CodecError};
use crate::metadata::{Attribute, EmbeddableMetadata, EntityMetadata, MetadataContext, ValueType};
use crate::value::bson::{from_bson, to_bson};
use crate::value::{Value, codec};

/// Reserved key of the document id
pub const ID_KEY: &str = "_id";

/// Converts between entities and BSON documents
#[derive(Debug, Clone, Copy)]
pub struct MongoDBDataHandler<'a> {
	context: &'a MetadataContext,
}

impl<'a> MongoDBDataHandler<'a> {
	pub fn new(context: &'a MetadataContext) -> Self {
		Self { context }
	}

	/// Materialize an entity from `document`
	pub fn from_document<E: Entity>(
		&self,
		metadata: &EntityMetadata,
		document: &Document,
		relation_names: &[&str],
	) -> Materialized<E> {
		walk::materialize(self.context, metadata, &DocumentReader { document }, relation_names)
	}

	/// Serialize `entity` into a document
	///
	/// # Errors
	///
	/// Fails when the entity has no id value.
	pub fn to_document<E: Entity>(
		&self,
		metadata: &EntityMetadata,
		entity: &E,
		relations: &[RelationHolder],
	) -> Result<Serialized<Document>, AccessError> {
		let mut writer = DocumentWriter {
			document: Document::new(),
		};
		let skipped = walk::serialize(self.context, metadata, entity, relations, &mut writer)?;
		Ok(Serialized {
			value: writer.document,
			skipped,
		})
	}

	/// Embedded objects stored under `field` across `documents`
	///
	/// Elements of embedded collections are flattened into the result.
	/// Documents without the field are skipped.
	///
	/// # Errors
	///
	/// - [`AccessError::NoAccessor`] when `field` is not an embedded attribute
	/// - [`AccessError::TypeMismatch`] when a stored value is not a document
	pub fn embedded_objects<M: Embeddable>(
		&self,
		metadata: &EntityMetadata,
		field: &str,
		documents: &[Document],
	) -> Result<Vec<M>, AccessError> {
		let no_accessor = || AccessError::NoAccessor {
			owner: metadata.entity_name().to_string(),
			field: field.to_string(),
		};
		let attribute = metadata
			.attribute(field)
			.or_else(|| metadata.attribute_by_column(field))
			.ok_or_else(no_accessor)?;
		let embeddable = attribute
			.embeddable()
			.and_then(|name| self.context.embeddable(name).ok())
			.ok_or_else(no_accessor)?;

		let mut objects = Vec::new();
		for document in documents {
			let records = match document.get(attribute.column_name()) {
				None | Some(Bson::Null) => continue,
				Some(Bson::Document(embedded)) => vec![Value::Record(
					mapper::document_to_record(embeddable, embedded).map_err(|err| codec_error(attribute, err))?,
				)],
				Some(Bson::Array(items)) => {
					mapper::documents_to_records(embeddable, items).map_err(|err| codec_error(attribute, err))?
				}
				Some(other) => {
					tracing::error!(
						entity = metadata.entity_name(),
						field = attribute.name(),
						"embedded value is not a document"
					);
					return Err(AccessError::TypeMismatch {
						field: attribute.name().to_string(),
						expected: "document".to_string(),
						found: format!("{:?}", other.element_type()),
					});
				}
			};
			for record in records {
				if let Value::Record(record) = record {
					objects.push(from_record::<M>(record)?);
				}
			}
		}
		Ok(objects)
	}
}

/// Key a column is stored under in a document of `metadata`
pub fn document_key<'m>(metadata: &'m EntityMetadata, column: &'m str) -> &'m str {
	if metadata.is_id_column(column) {
		ID_KEY
	} else {
		column
	}
}

fn codec_error(attribute: &Attribute, source: CodecError) -> AccessError {
	AccessError::Codec {
		field: attribute.name().to_string(),
		source,
	}
}

struct DocumentReader<'d> {
	document: &'d Document,
}

impl RowSource for DocumentReader<'_> {
	fn read_id(&self, id: &Attribute) -> Result<Option<Value>, CodecError> {
		match self.document.get(ID_KEY) {
			None | Some(Bson::Null) => Ok(None),
			Some(bson) => codec::translate_for(id, from_bson(bson.clone())).map(Some),
		}
	}

	fn read(&self, attribute: &Attribute) -> Result<Option<Value>, CodecError> {
		mapper::read_column(self.document, attribute)
	}

	fn read_embedded(
		&self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
	) -> Result<Option<Value>, CodecError> {
		match self.document.get(attribute.column_name()) {
			None | Some(Bson::Null) => Ok(None),
			Some(Bson::Document(embedded)) => mapper::document_to_record(embeddable, embedded)
				.map(|record| Some(Value::Record(record))),
			Some(Bson::Array(items)) => {
				mapper::documents_to_records(embeddable, items).map(|records| Some(Value::List(records)))
			}
			Some(other) => Err(mapper::not_a_document(other)),
		}
	}

	fn read_relation(&self, attribute: &Attribute, target_id: &Attribute) -> Result<Option<Value>, CodecError> {
		match self.document.get(attribute.column_name()) {
			None | Some(Bson::Null) => Ok(None),
			Some(bson) => codec::translate_for(target_id, from_bson(bson.clone())).map(Some),
		}
	}
}

struct DocumentWriter {
	document: Document,
}

impl RowSink for DocumentWriter {
	fn write_id(&mut self, id: &Attribute, value: Value) -> Result<(), CodecError> {
		let value = codec::transport_for(id, value)?;
		self.document.insert(ID_KEY, to_bson(value));
		Ok(())
	}

	fn write(&mut self, attribute: &Attribute, value: Value) -> Result<(), CodecError> {
		let value = codec::transport_for(attribute, value)?;
		self.document.insert(attribute.column_name(), to_bson(value));
		Ok(())
	}

	fn write_embedded(
		&mut self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
		value: Value,
	) -> Result<(), CodecError> {
		let bson = match value {
			Value::Record(record) => Bson::Document(mapper::record_to_document(embeddable, &record)?),
			Value::List(items) | Value::Set(items) => {
				Bson::Array(mapper::records_to_documents(embeddable, &items)?)
			}
			other => {
				return Err(CodecError::Unsupported {
					from: other.type_name().to_string(),
					to: ValueType::Bytes,
				});
			}
		};
		self.document.insert(attribute.column_name(), bson);
		Ok(())
	}

	fn write_relation(&mut self, column: &str, value: Value) -> Result<(), CodecError> {
		self.document.insert(column, to_bson(value));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use rstest::rstest;

	#[rstest]
	fn test_document_key_maps_id_column() {
		let metadata = EntityMetadata::builder("MongoEntity", "users")
			.id(Attribute::scalar("key", ValueType::String))
			.attribute(Attribute::scalar("state", ValueType::String))
			.build();
		assert_eq!(document_key(&metadata, "key"), "_id");
		assert_eq!(document_key(&metadata, "state"), "state");
	}

	#[rstest]
	fn test_embedded_value_must_be_document() {
		let phone = EmbeddableMetadata::new("Phone", vec![Attribute::scalar("number", ValueType::String)]);
		let attribute = Attribute::embedded("phone", "Phone");
		let document = doc! { "phone": 5 };
		let reader = DocumentReader { document: &document };

		assert!(reader.read_embedded(&attribute, &phone).is_err());
	}
}

//! Embeddable records to and from BSON documents
//!
//! Records are keyed by field name; documents by column name.

use bson::{Bson, Document};

use crate::entity::walk::{embedded_columns, embedded_record};
use crate::error::CodecError;
use crate::metadata::{Attribute, EmbeddableMetadata, ValueType};
use crate::value::bson::{from_bson, to_bson};
use crate::value::{Record, Value, codec};

/// Document holding the columns of one embedded record
pub fn record_to_document(embeddable: &EmbeddableMetadata, record: &Record) -> Result<Document, CodecError> {
	let mut document = Document::new();
	for (attr, value) in embedded_columns(embeddable, record) {
		let value = codec::transport_for(attr, value.clone())?;
		document.insert(attr.column_name(), to_bson(value));
	}
	Ok(document)
}

/// Field-name keyed record of one embedded document
pub fn document_to_record(embeddable: &EmbeddableMetadata, document: &Document) -> Result<Record, CodecError> {
	embedded_record(embeddable, |attr| read_column(document, attr))
}

/// Documents of an embedded collection given as records
pub fn records_to_documents(embeddable: &EmbeddableMetadata, items: &[Value]) -> Result<Vec<Bson>, CodecError> {
	items
		.iter()
		.map(|item| match item {
			Value::Record(record) => record_to_document(embeddable, record).map(Bson::Document),
			other => Err(not_a_record(other)),
		})
		.collect()
}

/// Records of an embedded collection stored as an array of documents
pub fn documents_to_records(embeddable: &EmbeddableMetadata, items: &[Bson]) -> Result<Vec<Value>, CodecError> {
	items
		.iter()
		.map(|item| match item {
			Bson::Document(document) => document_to_record(embeddable, document).map(Value::Record),
			other => Err(not_a_document(other)),
		})
		.collect()
}

/// Value of `attribute`'s column in `document`, translated to its declared type
///
/// Missing columns and BSON nulls read as absent.
pub(crate) fn read_column(document: &Document, attribute: &Attribute) -> Result<Option<Value>, CodecError> {
	match document.get(attribute.column_name()) {
		None | Some(Bson::Null) => Ok(None),
		Some(bson) => codec::translate_for(attribute, from_bson(bson.clone())).map(Some),
	}
}

pub(crate) fn not_a_document(bson: &Bson) -> CodecError {
	CodecError::Unsupported {
		from: format!("{:?}", bson.element_type()),
		to: ValueType::Bytes,
	}
}

fn not_a_record(value: &Value) -> CodecError {
	CodecError::Unsupported {
		from: value.type_name().to_string(),
		to: ValueType::Bytes,
	}
}

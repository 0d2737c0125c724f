//! Attribute walk shared by the backend handlers
//!
//! [`materialize`] and [`serialize`] drive one entity through its metadata.
//! The backend-specific part (where a column lives in a row or document and
//! how it is encoded) sits behind [`RowSource`] and [`RowSink`].

use indexmap::IndexMap;

use super::{EnhanceEntity, Loaded, Mapped, Materialized, RelationHolder};
use crate::error::{AccessError, CodecError};
use crate::metadata::{Attribute, AttributeKind, EmbeddableMetadata, EntityMetadata, MetadataContext};
use crate::value::{Record, Value, codec};

/// Read side of a backend row or document
pub trait RowSource {
	/// Value stored in the reserved id slot, in `id`'s declared type
	fn read_id(&self, id: &Attribute) -> Result<Option<Value>, CodecError>;

	/// Value of a scalar, collection or map attribute in its declared type
	fn read(&self, attribute: &Attribute) -> Result<Option<Value>, CodecError>;

	/// Embedded value as a [`Value::Record`] (or list of records) keyed by field name
	fn read_embedded(
		&self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
	) -> Result<Option<Value>, CodecError>;

	/// Foreign key stored for an association, in the target's id type
	fn read_relation(&self, attribute: &Attribute, target_id: &Attribute) -> Result<Option<Value>, CodecError>;
}

/// Write side of a backend row or document
pub trait RowSink {
	fn write_id(&mut self, id: &Attribute, value: Value) -> Result<(), CodecError>;

	fn write(&mut self, attribute: &Attribute, value: Value) -> Result<(), CodecError>;

	/// Write an embedded value given as a record (or list of records) keyed by field name
	fn write_embedded(
		&mut self,
		attribute: &Attribute,
		embeddable: &EmbeddableMetadata,
		value: Value,
	) -> Result<(), CodecError>;

	fn write_relation(&mut self, column: &str, value: Value) -> Result<(), CodecError>;
}

/// Populate a new `E` from `source`
///
/// Associations whose column is listed in `relation_names` are captured as
/// raw foreign keys; when any are found the result is
/// [`Loaded::Enhanced`].
pub fn materialize<E, S>(
	context: &MetadataContext,
	metadata: &EntityMetadata,
	source: &S,
	relation_names: &[&str],
) -> Materialized<E>
where
	E: Mapped,
	S: RowSource + ?Sized,
{
	let table = E::accessors();
	let mut entity = match E::instantiate() {
		Ok(entity) => entity,
		Err(err) => return Materialized::Failed(err),
	};
	let mut errors = Vec::new();

	let id_attr = metadata.id_attribute();
	let entity_id = match source.read_id(id_attr) {
		Ok(Some(id)) => id,
		Ok(None) => {
			return Materialized::Failed(AccessError::MissingId {
				entity: metadata.entity_name().to_string(),
			});
		}
		Err(err) => return Materialized::Failed(codec_error(id_attr, err)),
	};
	if let Err(err) = table.set(&mut entity, id_attr.name(), entity_id.clone()) {
		return Materialized::Failed(err);
	}

	let mut relations = IndexMap::new();
	for attr in metadata.attributes() {
		let read = match attr.kind() {
			AttributeKind::Embedded { embeddable, .. } => match context.embeddable(embeddable) {
				Ok(embeddable) => source.read_embedded(attr, embeddable),
				Err(err) => {
					errors.push(AccessError::Instantiation {
						entity: embeddable.clone(),
						reason: err.to_string(),
					});
					continue;
				}
			},
			AttributeKind::Association { target, .. } => {
				let column = attr.column_name();
				if !relation_names.contains(&column) || metadata.is_id_column(column) {
					continue;
				}
				match context.entity_metadata(target) {
					Ok(target) => match source.read_relation(attr, target.id_attribute()) {
						Ok(Some(key)) => {
							relations.insert(column.to_string(), key);
						}
						Ok(None) => {}
						Err(err) => errors.push(codec_error(attr, err)),
					},
					Err(err) => errors.push(AccessError::Instantiation {
						entity: target.clone(),
						reason: err.to_string(),
					}),
				}
				continue;
			}
			AttributeKind::Scalar | AttributeKind::List | AttributeKind::Set | AttributeKind::Map => {
				source.read(attr)
			}
		};

		match read {
			Ok(Some(value)) => {
				if let Err(err) = table.set(&mut entity, attr.name(), value) {
					errors.push(err);
				}
			}
			Ok(None) => {}
			Err(err) => errors.push(codec_error(attr, err)),
		}
	}

	let loaded = if relations.is_empty() {
		Loaded::Plain(entity)
	} else {
		Loaded::Enhanced(EnhanceEntity::new(entity, entity_id, relations))
	};
	if errors.is_empty() {
		Materialized::Complete(loaded)
	} else {
		for err in &errors {
			tracing::error!(entity = metadata.entity_name(), error = %err, "error while populating entity");
		}
		Materialized::Partial { loaded, errors }
	}
}

/// Write `entity` and its resolved relations into `sink`
///
/// Returns the field errors that caused fields to be skipped.
///
/// # Errors
///
/// Fails when the id cannot be read or written; a row without id cannot be
/// stored at all.
pub fn serialize<E, S>(
	context: &MetadataContext,
	metadata: &EntityMetadata,
	entity: &E,
	relations: &[RelationHolder],
	sink: &mut S,
) -> Result<Vec<AccessError>, AccessError>
where
	E: Mapped,
	S: RowSink + ?Sized,
{
	let table = E::accessors();
	let id_attr = metadata.id_attribute();
	let id = table.get(entity, id_attr.name())?;
	if id.is_null() {
		return Err(AccessError::MissingId {
			entity: metadata.entity_name().to_string(),
		});
	}
	let id = match id_attr.value_type() {
		Some(value_type) => codec::normalize(id, value_type),
		None => id,
	};
	sink.write_id(id_attr, id)
		.map_err(|err| codec_error(id_attr, err))?;

	let mut skipped = Vec::new();
	for attr in metadata.attributes() {
		if attr.is_association() {
			continue;
		}
		let value = match table.get(entity, attr.name()) {
			Ok(Value::Null) => continue,
			Ok(value) => value,
			Err(err) => {
				skipped.push(err);
				continue;
			}
		};
		let written = match attr.kind() {
			AttributeKind::Embedded { embeddable, .. } => match context.embeddable(embeddable) {
				Ok(embeddable) => sink.write_embedded(attr, embeddable, value),
				Err(err) => {
					skipped.push(AccessError::Instantiation {
						entity: embeddable.clone(),
						reason: err.to_string(),
					});
					continue;
				}
			},
			_ => sink.write(attr, value),
		};
		if let Err(err) = written {
			skipped.push(codec_error(attr, err));
		}
	}

	for holder in relations {
		let value = match relation_id_type(context, metadata, &holder.relation_name) {
			Some(value_type) => codec::translate(holder.relation_value.clone(), value_type)
				.map(|value| codec::normalize(value, value_type)),
			None => Ok(holder.relation_value.clone()),
		};
		let written = value.and_then(|value| sink.write_relation(&holder.relation_name, value));
		if let Err(err) = written {
			skipped.push(AccessError::Codec {
				field: holder.relation_name.clone(),
				source: err,
			});
		}
	}

	for err in &skipped {
		tracing::error!(entity = metadata.entity_name(), error = %err, "field skipped while serializing");
	}
	Ok(skipped)
}

/// Id type of the entity targeted by the relation stored in `column`
fn relation_id_type(
	context: &MetadataContext,
	metadata: &EntityMetadata,
	column: &str,
) -> Option<crate::metadata::ValueType> {
	let target = metadata
		.attribute_by_column(column)
		.or_else(|| metadata.attribute(column))?
		.association_target()?;
	context
		.entity_metadata(target)
		.ok()?
		.id_attribute()
		.value_type()
}

/// Build a field-name keyed record of an embeddable from per-attribute reads
///
/// Attributes the reader reports as absent are left out of the record.
pub fn embedded_record<F>(embeddable: &EmbeddableMetadata, mut read: F) -> Result<Record, CodecError>
where
	F: FnMut(&Attribute) -> Result<Option<Value>, CodecError>,
{
	let mut record = Record::new();
	for attr in embeddable.attributes() {
		if let Some(value) = read(attr)? {
			record.insert(attr.name().to_string(), value);
		}
	}
	Ok(record)
}

/// Column-keyed view of a field-name keyed embeddable record
///
/// Yields each embeddable attribute with its value; fields missing from the
/// record or holding null are skipped.
pub fn embedded_columns<'a>(
	embeddable: &'a EmbeddableMetadata,
	record: &'a Record,
) -> impl Iterator<Item = (&'a Attribute, &'a Value)> + 'a {
	embeddable.attributes().iter().filter_map(move |attr| {
		record
			.get(attr.name())
			.filter(|value| !value.is_null())
			.map(|value| (attr, value))
	})
}

fn codec_error(attribute: &Attribute, source: CodecError) -> AccessError {
	AccessError::Codec {
		field: attribute.name().to_string(),
		source,
	}
}

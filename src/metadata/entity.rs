//! Entity and embeddable metadata

use std::collections::HashMap;

use super::attribute::{Attribute, AttributeKind};

/// Mapping description of one entity type
///
/// Immutable once built. Every core component borrows it from the
/// [`MetadataContext`](super::MetadataContext).
#[derive(Debug, Clone)]
pub struct EntityMetadata {
	entity_name: String,
	table: String,
	schema: String,
	persistence_unit: String,
	id: Attribute,
	attributes: Vec<Attribute>,
	column_to_field: HashMap<String, String>,
	field_index: HashMap<String, usize>,
}

impl EntityMetadata {
	/// Start describing an entity stored in `table`
	///
	/// # Example
	///
	/// ```rust
	/// use reinhardt_polyglot::metadata::{Attribute, EntityMetadata, ValueType};
	///
	/// let users = EntityMetadata::builder("CassandraEntity", "users")
	///     .schema("kunderaexamples")
	///     .persistence_unit("cassandra")
	///     .id(Attribute::scalar("key", ValueType::String))
	///     .attribute(Attribute::scalar("full_name", ValueType::String))
	///     .build();
	/// assert_eq!(users.id_column(), "key");
	/// ```
	pub fn builder(entity_name: impl Into<String>, table: impl Into<String>) -> EntityMetadataBuilder {
		EntityMetadataBuilder {
			entity_name: entity_name.into(),
			table: table.into(),
			schema: String::new(),
			persistence_unit: String::new(),
			id: None,
			attributes: Vec::new(),
		}
	}

	pub fn entity_name(&self) -> &str {
		&self.entity_name
	}

	/// Column family or collection name
	pub fn table(&self) -> &str {
		&self.table
	}

	/// Keyspace or database name
	pub fn schema(&self) -> &str {
		&self.schema
	}

	pub fn persistence_unit(&self) -> &str {
		&self.persistence_unit
	}

	pub fn id_attribute(&self) -> &Attribute {
		&self.id
	}

	pub fn id_column(&self) -> &str {
		self.id.column_name()
	}

	/// Whether `column` names the id column (case-insensitive)
	pub fn is_id_column(&self, column: &str) -> bool {
		self.id.column_name().eq_ignore_ascii_case(column)
	}

	/// Non-id attributes in declaration order
	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	/// Attribute by field name
	pub fn attribute(&self, field_name: &str) -> Option<&Attribute> {
		self.field_index
			.get(field_name)
			.map(|&index| &self.attributes[index])
	}

	/// Field name mapped to `column`
	pub fn field_name(&self, column: &str) -> Option<&str> {
		self.column_to_field.get(column).map(String::as_str)
	}

	/// Attribute mapped to `column`
	pub fn attribute_by_column(&self, column: &str) -> Option<&Attribute> {
		self.field_name(column)
			.and_then(|field| self.attribute(field))
	}

	/// Resolve a query property (field or column name) to its column name
	pub fn resolve_column(&self, property: &str) -> Option<&str> {
		if self.is_id_column(property) || self.id.name() == property {
			return Some(self.id.column_name());
		}
		if let Some(attr) = self.attribute_by_column(property) {
			return Some(attr.column_name());
		}
		self.attribute(property).map(Attribute::column_name)
	}

	/// Column names of association attributes
	pub fn relation_names(&self) -> Vec<&str> {
		self.attributes
			.iter()
			.filter(|attr| attr.is_association())
			.map(Attribute::column_name)
			.collect()
	}

	pub fn has_embedded_attributes(&self) -> bool {
		self.attributes
			.iter()
			.any(|attr| matches!(attr.kind(), AttributeKind::Embedded { .. }))
	}
}

/// Builder for [`EntityMetadata`]
#[derive(Debug)]
pub struct EntityMetadataBuilder {
	entity_name: String,
	table: String,
	schema: String,
	persistence_unit: String,
	id: Option<Attribute>,
	attributes: Vec<Attribute>,
}

impl EntityMetadataBuilder {
	pub fn schema(mut self, schema: impl Into<String>) -> Self {
		self.schema = schema.into();
		self
	}

	pub fn persistence_unit(mut self, unit: impl Into<String>) -> Self {
		self.persistence_unit = unit.into();
		self
	}

	pub fn id(mut self, id: Attribute) -> Self {
		self.id = Some(id);
		self
	}

	pub fn attribute(mut self, attribute: Attribute) -> Self {
		self.attributes.push(attribute);
		self
	}

	/// Finish the description
	///
	/// # Panics
	///
	/// Panics if no id attribute was declared. Every entity has exactly one id.
	pub fn build(self) -> EntityMetadata {
		let id = self
			.id
			.unwrap_or_else(|| panic!("entity {} declares no id attribute", self.entity_name));

		let mut column_to_field = HashMap::with_capacity(self.attributes.len() + 1);
		let mut field_index = HashMap::with_capacity(self.attributes.len());
		column_to_field.insert(id.column_name().to_string(), id.name().to_string());
		for (index, attr) in self.attributes.iter().enumerate() {
			column_to_field.insert(attr.column_name().to_string(), attr.name().to_string());
			field_index.insert(attr.name().to_string(), index);
		}

		EntityMetadata {
			entity_name: self.entity_name,
			table: self.table,
			schema: self.schema,
			persistence_unit: self.persistence_unit,
			id,
			attributes: self.attributes,
			column_to_field,
			field_index,
		}
	}
}

/// Mapping description of an embeddable value type
#[derive(Debug, Clone)]
pub struct EmbeddableMetadata {
	name: String,
	attributes: Vec<Attribute>,
}

impl EmbeddableMetadata {
	pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
		Self {
			name: name.into(),
			attributes,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	/// Attribute mapped to `column`
	pub fn attribute_by_column(&self, column: &str) -> Option<&Attribute> {
		self.attributes
			.iter()
			.find(|attr| attr.column_name() == column)
	}
}

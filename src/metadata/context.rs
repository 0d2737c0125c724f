//! Shared, immutable metadata context
//!
//! The context is assembled once at startup with [`MetadataContextBuilder`]
//! and then passed by handle to every query and materialization call. It is
//! never mutated after [`MetadataContextBuilder::build`].

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::attribute::{Attribute, AttributeKind};
use super::entity::{EmbeddableMetadata, EntityMetadata};
use crate::config::PersistenceUnitConfig;
use crate::entity::{Embeddable, Entity};
use crate::error::SchemaError;

#[derive(Debug, Default)]
struct ContextInner {
	entities: HashMap<String, EntityMetadata>,
	entity_types: HashMap<TypeId, String>,
	embeddables: HashMap<String, EmbeddableMetadata>,
	units: HashMap<String, PersistenceUnitConfig>,
	native_queries: HashSet<String>,
}

/// Read-only handle over all entity, embeddable and persistence-unit metadata
///
/// Cloning is cheap; clones share the same data.
#[derive(Debug, Clone)]
pub struct MetadataContext {
	inner: Arc<ContextInner>,
}

impl MetadataContext {
	pub fn builder() -> MetadataContextBuilder {
		MetadataContextBuilder::default()
	}

	/// Metadata registered under `entity_name`
	pub fn entity_metadata(&self, entity_name: &str) -> Result<&EntityMetadata, SchemaError> {
		self.inner
			.entities
			.get(entity_name)
			.ok_or_else(|| SchemaError::UnknownEntity(entity_name.to_string()))
	}

	/// Metadata registered for the Rust type `E`
	pub fn metadata_of<E: Entity>(&self) -> Result<&EntityMetadata, SchemaError> {
		let name = self
			.inner
			.entity_types
			.get(&TypeId::of::<E>())
			.ok_or_else(|| SchemaError::UnknownEntity(E::NAME.to_string()))?;
		self.entity_metadata(name)
	}

	pub fn embeddable(&self, name: &str) -> Result<&EmbeddableMetadata, SchemaError> {
		self.inner
			.embeddables
			.get(name)
			.ok_or_else(|| SchemaError::UnknownEmbeddable(name.to_string()))
	}

	pub fn persistence_unit(&self, name: &str) -> Result<&PersistenceUnitConfig, SchemaError> {
		self.inner
			.units
			.get(name)
			.ok_or_else(|| SchemaError::UnknownPersistenceUnit(name.to_string()))
	}

	/// Persistence unit the entity is stored in
	pub fn unit_of(&self, metadata: &EntityMetadata) -> Result<&PersistenceUnitConfig, SchemaError> {
		self.persistence_unit(metadata.persistence_unit())
	}

	/// Whether `query` was registered as a backend-native statement
	pub fn is_native(&self, query: &str) -> bool {
		self.inner.native_queries.contains(query)
	}

	/// Whether non-native queries on this entity go through secondary indexes
	pub fn use_secondary_index(&self, metadata: &EntityMetadata) -> bool {
		self.unit_of(metadata)
			.map(|unit| unit.use_secondary_index)
			.unwrap_or(true)
	}

	/// Whether embedded attributes of this entity are read through the inverted index
	pub fn use_inverted_index(&self, metadata: &EntityMetadata) -> bool {
		metadata.has_embedded_attributes()
			&& self
				.unit_of(metadata)
				.map(|unit| unit.inverted_indexing)
				.unwrap_or(false)
	}

	/// Row limit used when a query does not set one
	pub fn max_results(&self, metadata: &EntityMetadata) -> usize {
		self.unit_of(metadata)
			.map(|unit| unit.max_results)
			.unwrap_or(100)
	}
}

/// Registered type awaiting validation
struct Pending {
	owner: String,
	attributes: Vec<Attribute>,
	accessor_fields: HashSet<String>,
}

/// Builder for [`MetadataContext`]
#[derive(Default)]
pub struct MetadataContextBuilder {
	inner: ContextInner,
	pending: Vec<Pending>,
	errors: Vec<SchemaError>,
}

impl MetadataContextBuilder {
	/// Register entity type `E` with its metadata
	pub fn entity<E: Entity>(mut self, metadata: EntityMetadata) -> Self {
		let name = metadata.entity_name().to_string();
		if self.inner.entities.contains_key(&name) {
			self.errors.push(SchemaError::DuplicateEntity(name));
			return self;
		}

		let mut attributes = vec![metadata.id_attribute().clone()];
		attributes.extend(metadata.attributes().iter().cloned());
		self.pending.push(Pending {
			owner: name.clone(),
			attributes,
			accessor_fields: E::accessors().field_names().map(str::to_string).collect(),
		});
		self.inner.entity_types.insert(TypeId::of::<E>(), name.clone());
		self.inner.entities.insert(name, metadata);
		self
	}

	/// Register embeddable type `M` with its metadata
	pub fn embeddable<M: Embeddable>(mut self, metadata: EmbeddableMetadata) -> Self {
		let name = metadata.name().to_string();
		if self.inner.embeddables.contains_key(&name) {
			self.errors.push(SchemaError::DuplicateEntity(name));
			return self;
		}

		self.pending.push(Pending {
			owner: name.clone(),
			attributes: metadata.attributes().to_vec(),
			accessor_fields: M::accessors().field_names().map(str::to_string).collect(),
		});
		self.inner.embeddables.insert(name, metadata);
		self
	}

	pub fn persistence_unit(mut self, config: PersistenceUnitConfig) -> Self {
		self.inner.units.insert(config.name.clone(), config);
		self
	}

	/// Register a backend-native query string
	pub fn native_query(mut self, query: impl Into<String>) -> Self {
		self.inner.native_queries.insert(query.into());
		self
	}

	/// Validate and freeze the context
	///
	/// # Errors
	///
	/// Returns the first problem found: a type registered twice, an attribute
	/// without accessor, an embedded attribute naming an unregistered
	/// embeddable or an association naming an unregistered entity.
	pub fn build(mut self) -> Result<MetadataContext, SchemaError> {
		if !self.errors.is_empty() {
			return Err(self.errors.remove(0));
		}

		for pending in &self.pending {
			for attr in &pending.attributes {
				match attr.kind() {
					AttributeKind::Association { target, .. } => {
						if !self.inner.entities.contains_key(target) {
							return Err(SchemaError::UnknownEntity(target.clone()));
						}
						continue;
					}
					AttributeKind::Embedded { embeddable, .. } => {
						if !self.inner.embeddables.contains_key(embeddable) {
							return Err(SchemaError::UnknownEmbeddable(embeddable.clone()));
						}
					}
					_ => {}
				}
				if !pending.accessor_fields.contains(attr.name()) {
					return Err(SchemaError::MissingAccessor {
						owner: pending.owner.clone(),
						field: attr.name().to_string(),
					});
				}
			}
		}

		Ok(MetadataContext {
			inner: Arc::new(self.inner),
		})
	}
}

//! Entity metadata
//!
//! Describes how mapped types lay out in the backend: the id attribute, the
//! field⇄column maps and the classification of every attribute. All of it is
//! built once and shared read-only through [`MetadataContext`].

pub mod attribute;
pub mod context;
pub mod entity;

pub use attribute::{Attribute, AttributeKind, ValueType};
pub use context::{MetadataContext, MetadataContextBuilder};
pub use entity::{EmbeddableMetadata, EntityMetadata, EntityMetadataBuilder};

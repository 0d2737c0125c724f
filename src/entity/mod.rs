//! Typed entities and their materialization results
//!
//! A Rust type takes part in mapping by implementing [`Mapped`], which hands
//! out a static [`AccessorTable`]. Entities additionally implement [`Entity`],
//! embeddable value types implement [`Embeddable`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::OnceLock;
//! use reinhardt_polyglot::entity::{AccessorTable, Entity, Mapped};
//!
//! #[derive(Debug, Default)]
//! struct CassandraEntity {
//!     key: String,
//!     state: String,
//! }
//!
//! impl Mapped for CassandraEntity {
//!     const NAME: &'static str = "CassandraEntity";
//!
//!     fn accessors() -> &'static AccessorTable<Self> {
//!         static TABLE: OnceLock<AccessorTable<CassandraEntity>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             AccessorTable::<Self>::builder(Self::NAME)
//!                 .field("key", |e| e.key.clone(), |e, v| e.key = v)
//!                 .field("state", |e| e.state.clone(), |e, v| e.state = v)
//!                 .build()
//!         })
//!     }
//! }
//!
//! impl Entity for CassandraEntity {}
//! ```

pub mod accessor;
pub mod enhance;
pub mod walk;

pub use accessor::{AccessorTable, AccessorTableBuilder, FieldAccessor, from_record, to_record};
pub use enhance::{EnhanceEntity, Loaded, Materialized, RelationHolder, Serialized};
pub use walk::{RowSink, RowSource, materialize, serialize};

use crate::error::AccessError;

/// A type with a field accessor table
pub trait Mapped: Default + Send + Sync + 'static {
	/// Name used to register the type's metadata
	const NAME: &'static str;

	/// Accessor table, built once per type
	fn accessors() -> &'static AccessorTable<Self>;

	/// Construct an empty instance to be populated field by field
	fn instantiate() -> Result<Self, AccessError> {
		Ok(Self::default())
	}
}

/// A mapped type stored as its own row or document
pub trait Entity: Mapped {}

/// A mapped value type stored inside its owner's row or document
pub trait Embeddable: Mapped {}

//! In-process backends
//!
//! Reference implementations of [`ColumnBackend`](crate::cassandra::ColumnBackend)
//! and [`DocumentBackend`](crate::mongodb::DocumentBackend) holding their data
//! in memory.

pub mod column;
pub mod document;

pub use column::InMemoryColumnStore;
pub use document::InMemoryDocumentStore;

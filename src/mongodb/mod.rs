//! Document backend
//!
//! Filter document translation, the document handler and the query shim.
//! The driver is abstracted by [`DocumentBackend`]; [`MongoDBBackend`]
//! (feature `mongodb`) implements it over the official client.

pub mod client;
pub mod handler;
pub mod mapper;
pub mod query;

pub use client::{BackendResult, DocumentBackend, FindOptions};
#[cfg(feature = "mongodb")]
pub use client::{MongoDBBackend, MongoDBBackendBuilder};
pub use handler::{ID_KEY, MongoDBDataHandler, document_key};
pub use query::{MongoQuery, build_filter, build_sort, like_to_regex};

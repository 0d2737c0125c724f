//! Column-family backend
//!
//! Index clause translation, the row model, the row handler and the query
//! shim. The wire client is abstracted by [`ColumnBackend`].

pub mod client;
pub mod handler;
pub mod index;
pub mod query;
pub mod row;

pub use client::{BackendResult, ColumnBackend};
pub use handler::{CassandraDataHandler, EMBEDDED_INDEX_SEPARATOR, embedded_element_name};
pub use index::{
	IndexClause, IndexClauseSet, IndexExpression, IndexOperator, KeyRange, RowKeyLookup,
	prepare_index_clause,
};
pub use query::CassQuery;
pub use row::{Column, SuperColumn, ThriftRow};

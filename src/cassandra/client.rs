//! Column backend contract
//!
//! The wire client (Thrift, CQL) lives outside this crate. Anything that can
//! answer these calls can back [`CassQuery`](super::CassQuery);
//! [`InMemoryColumnStore`](crate::backends::memory::InMemoryColumnStore) is
//! the in-process implementation.

use async_trait::async_trait;
use bytes::Bytes;

use super::index::{IndexClause, RowKeyLookup};
use super::row::ThriftRow;
use crate::error::BackendError;

/// Result type for column backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Column-family store operations used by the query shim
///
/// # Example
///
/// ```rust,ignore
/// use reinhardt_polyglot::cassandra::ColumnBackend;
///
/// async fn count_users(backend: &dyn ColumnBackend) -> usize {
///     backend.find_by_index("KunderaExamples", "users", &[], 100).await.map(|rows| rows.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait ColumnBackend: Send + Sync {
	/// Rows matching every expression of each clause
	///
	/// An empty clause list returns every row of the column family, up to
	/// `max_results`.
	async fn find_by_index(
		&self,
		keyspace: &str,
		column_family: &str,
		clauses: &[IndexClause],
		max_results: usize,
	) -> BackendResult<Vec<ThriftRow>>;

	/// Rows whose key falls in the lookup's key range
	async fn find_by_key_range(
		&self,
		keyspace: &str,
		column_family: &str,
		lookup: &RowKeyLookup,
	) -> BackendResult<Vec<ThriftRow>>;

	/// Rows with the given keys; missing keys are skipped
	async fn find_by_keys(
		&self,
		keyspace: &str,
		column_family: &str,
		keys: &[Bytes],
	) -> BackendResult<Vec<ThriftRow>>;

	/// Run a backend-native statement verbatim
	async fn execute_native(&self, keyspace: &str, statement: &str) -> BackendResult<Vec<ThriftRow>>;

	/// Insert or overwrite a row
	async fn insert(&self, keyspace: &str, row: ThriftRow) -> BackendResult<()>;

	/// Remove the row with `key`; returns whether it existed
	async fn delete(&self, keyspace: &str, column_family: &str, key: &Bytes) -> BackendResult<bool>;
}

//! Query model shared by the backends
//!
//! [`QueryParser`] turns JPA-like text into a [`QuerySpec`] whose filter is a
//! [`FilterClauseQueue`]. The Cassandra and MongoDB modules translate that
//! queue into their own selection criteria.

pub mod clause;
pub mod parser;

pub use clause::{
	ClauseValue, Condition, Connector, FilterClause, FilterClauseQueue, FilterItem, OrderBy,
	QueryKind, QuerySpec, SortDirection,
};
pub use parser::QueryParser;

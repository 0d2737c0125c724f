//! Index clause builder
//!
//! Translates a [`FilterClauseQueue`] into either a row-key lookup or a list
//! of secondary-index clauses. A query is one or the other: predicates on the
//! id column cannot be combined with predicates on other columns, and `OR`
//! is not supported at all.

use std::fmt;

use bytes::Bytes;

use crate::error::{PolyglotError, QueryError, QueryPath, SchemaError};
use crate::metadata::{EntityMetadata, ValueType};
use crate::query::{Condition, Connector, FilterItem, FilterClauseQueue};
use crate::value::{bytes as codec_bytes, codec};

const BACKEND: &str = "cassandra";

/// Operator of an index expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOperator {
	Eq,
	Gt,
	Lt,
	Gte,
	Lte,
}

impl IndexOperator {
	/// Backend operator for `condition` on the given path
	///
	/// The row-key path accepts only `=`, `>=` and `<=`.
	///
	/// # Errors
	///
	/// Returns [`QueryError::UnsupportedCondition`] for any other condition.
	pub fn for_condition(condition: Condition, row_key: bool) -> Result<Self, QueryError> {
		match (condition, row_key) {
			(Condition::Eq, _) => Ok(IndexOperator::Eq),
			(Condition::Gt, false) => Ok(IndexOperator::Gt),
			(Condition::Lt, false) => Ok(IndexOperator::Lt),
			(Condition::Gte, _) => Ok(IndexOperator::Gte),
			(Condition::Lte, _) => Ok(IndexOperator::Lte),
			(condition, row_key) => Err(QueryError::UnsupportedCondition {
				condition: condition.to_string(),
				path: if row_key {
					QueryPath::RowKey
				} else {
					QueryPath::SecondaryIndex
				},
			}),
		}
	}

	/// Whether `ordering` (stored compared to probe) satisfies this operator
	pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
		use std::cmp::Ordering::*;
		match self {
			IndexOperator::Eq => ordering == Equal,
			IndexOperator::Gt => ordering == Greater,
			IndexOperator::Lt => ordering == Less,
			IndexOperator::Gte => ordering != Less,
			IndexOperator::Lte => ordering != Greater,
		}
	}
}

impl fmt::Display for IndexOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IndexOperator::Eq => write!(f, "EQ"),
			IndexOperator::Gt => write!(f, "GT"),
			IndexOperator::Lt => write!(f, "LT"),
			IndexOperator::Gte => write!(f, "GTE"),
			IndexOperator::Lte => write!(f, "LTE"),
		}
	}
}

/// One `column op value` expression with its value already encoded
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
	pub column: String,
	pub op: IndexOperator,
	pub value: Bytes,
	/// Validator of the column, used to compare encoded values
	pub value_type: ValueType,
}

/// Conjunction of index expressions, bounded by `count` rows
#[derive(Debug, Clone, PartialEq)]
pub struct IndexClause {
	pub expressions: Vec<IndexExpression>,
	pub start_key: Bytes,
	pub count: usize,
}

/// Inclusive row-key range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
	Exact(Bytes),
	Bounded {
		start: Option<Bytes>,
		end: Option<Bytes>,
	},
}

/// Row-key query: id expressions and the row limit
#[derive(Debug, Clone, PartialEq)]
pub struct RowKeyLookup {
	pub expressions: Vec<IndexExpression>,
	pub key_type: ValueType,
	pub count: usize,
}

impl RowKeyLookup {
	/// Key range selected by the id expressions
	///
	/// An `EQ` expression pins the range to one key; otherwise the last
	/// `GTE`/`LTE` expression bounds each side.
	pub fn key_range(&self) -> KeyRange {
		if let Some(exact) = self
			.expressions
			.iter()
			.find(|expr| expr.op == IndexOperator::Eq)
		{
			return KeyRange::Exact(exact.value.clone());
		}
		let mut start = None;
		let mut end = None;
		for expr in &self.expressions {
			match expr.op {
				IndexOperator::Gte => start = Some(expr.value.clone()),
				IndexOperator::Lte => end = Some(expr.value.clone()),
				_ => {}
			}
		}
		KeyRange::Bounded { start, end }
	}
}

/// Translated selection: row-key lookup or secondary-index clauses, never both
#[derive(Debug, Clone, PartialEq)]
pub enum IndexClauseSet {
	RowKey(RowKeyLookup),
	/// An empty list selects every row, up to the row limit
	SecondaryIndex(Vec<IndexClause>),
}

impl IndexClauseSet {
	pub fn is_row_key_query(&self) -> bool {
		matches!(self, IndexClauseSet::RowKey(_))
	}
}

/// Translate `filter` over `metadata` into an [`IndexClauseSet`]
///
/// # Errors
///
/// - [`QueryError::UnsupportedConnector`] when an `OR` connector is present
/// - [`QueryError::MixedRowKeyPredicate`] when the id column is combined with other columns
/// - [`QueryError::UnsupportedCondition`] for an operator the path does not support
/// - [`SchemaError`] when a property does not resolve to a typed column
/// - [`crate::error::CodecError`] when a literal does not convert to the column type
pub fn prepare_index_clause(
	metadata: &EntityMetadata,
	filter: &FilterClauseQueue,
	max_results: usize,
) -> Result<IndexClauseSet, PolyglotError> {
	let mut resolved = Vec::new();
	let mut id_column = None;
	let mut other_column = None;

	for item in filter.items() {
		match item {
			FilterItem::Connector(Connector::And) => {}
			FilterItem::Connector(connector @ Connector::Or) => {
				tracing::error!("Support for OR clause is not enabled within cassandra");
				return Err(QueryError::UnsupportedConnector {
					connector: connector.to_string(),
					backend: BACKEND,
				}
				.into());
			}
			FilterItem::Clause(clause) => {
				let column = metadata
					.resolve_column(clause.property())
					.ok_or_else(|| SchemaError::ColumnNotFound(clause.property().to_string()))?;
				if metadata.is_id_column(column) {
					id_column.get_or_insert(column);
				} else {
					other_column.get_or_insert(column);
				}
				resolved.push((column, clause));
			}
		}
	}

	if let (Some(id_column), Some(column)) = (id_column, other_column) {
		tracing::error!("Support for search on rowKey and indexed column is not enabled within cassandra");
		return Err(QueryError::MixedRowKeyPredicate {
			id_column: id_column.to_string(),
			column: column.to_string(),
			backend: BACKEND,
		}
		.into());
	}

	let row_key = id_column.is_some();
	let mut expressions = Vec::with_capacity(resolved.len());
	for (column, clause) in resolved {
		let op = IndexOperator::for_condition(clause.condition(), row_key).inspect_err(|err| {
			tracing::error!(error = %err, "unsupported condition for cassandra");
		})?;
		let value_type = codec::column_type(metadata, column)?;
		let value = codec_bytes::encode(clause.literal()?.clone(), value_type)?;
		expressions.push(IndexExpression {
			column: column.to_string(),
			op,
			value,
			value_type,
		});
	}

	if row_key {
		let key_type = codec::declared_type(metadata.id_attribute())?;
		return Ok(IndexClauseSet::RowKey(RowKeyLookup {
			expressions,
			key_type,
			count: max_results,
		}));
	}

	let clauses = if expressions.is_empty() {
		Vec::new()
	} else {
		vec![IndexClause {
			expressions,
			start_key: Bytes::new(),
			count: max_results,
		}]
	};
	Ok(IndexClauseSet::SecondaryIndex(clauses))
}

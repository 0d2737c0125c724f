//! In-process column-family store

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use regex::Regex;
use tokio::sync::RwLock;

use crate::cassandra::{
	BackendResult, ColumnBackend, IndexClause, IndexExpression, KeyRange, RowKeyLookup, ThriftRow,
};
use crate::error::BackendError;
use crate::metadata::{AttributeKind, EntityMetadata, ValueType};
use crate::query::parser::parse_literal;
use crate::value::{Value, bytes as codec_bytes};

/// Rows of one column family in insertion order, keyed by encoded row key
type Family = IndexMap<Bytes, ThriftRow>;

/// Comparators of one column family
#[derive(Debug, Clone)]
struct Validators {
	key_column: String,
	key_type: ValueType,
	columns: HashMap<String, ValueType>,
}

/// In-memory [`ColumnBackend`]
///
/// Column families registered with [`with_column_family`](Self::with_column_family)
/// compare values with the types declared in their entity metadata; other
/// families compare raw bytes.
///
/// # Example
///
/// ```rust
/// use reinhardt_polyglot::backends::memory::InMemoryColumnStore;
/// use reinhardt_polyglot::metadata::{Attribute, EntityMetadata, ValueType};
///
/// let users = EntityMetadata::builder("CassandraEntity", "users")
///     .id(Attribute::scalar("key", ValueType::String))
///     .attribute(Attribute::scalar("birth_date", ValueType::Int))
///     .build();
/// let store = InMemoryColumnStore::new().with_column_family(&users);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryColumnStore {
	families: Arc<RwLock<HashMap<(String, String), Family>>>,
	validators: HashMap<String, Validators>,
}

impl InMemoryColumnStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register the comparators of `metadata`'s column family
	pub fn with_column_family(mut self, metadata: &EntityMetadata) -> Self {
		let columns = metadata
			.attributes()
			.iter()
			.filter_map(|attr| match (attr.kind(), attr.value_type()) {
				(AttributeKind::Scalar, Some(value_type)) => Some((attr.column_name().to_string(), value_type)),
				_ => None,
			})
			.collect();
		self.validators.insert(
			metadata.table().to_string(),
			Validators {
				key_column: metadata.id_column().to_string(),
				key_type: metadata.id_attribute().value_type().unwrap_or(ValueType::Bytes),
				columns,
			},
		);
		self
	}

	/// Number of rows stored in a column family
	pub async fn len(&self, keyspace: &str, column_family: &str) -> usize {
		self.families
			.read()
			.await
			.get(&family_key(keyspace, column_family))
			.map_or(0, IndexMap::len)
	}

	/// Remove every row
	pub async fn clear(&self) {
		self.families.write().await.clear();
	}

	fn validators(&self, column_family: &str) -> Option<&Validators> {
		self.validators.get(column_family)
	}

	fn key_type(&self, column_family: &str) -> ValueType {
		self.validators(column_family)
			.map_or(ValueType::Bytes, |v| v.key_type)
	}

	fn column_type(&self, column_family: &str, column: &str) -> Option<ValueType> {
		self.validators(column_family)?.columns.get(column).copied()
	}

	fn select_native(&self, statement: &str, family: Option<&Family>, select: NativeSelect) -> BackendResult<Vec<ThriftRow>> {
		let Some(family) = family else {
			return Ok(Vec::new());
		};
		let validators = self.validators(&select.column_family);

		let mut predicates = Vec::with_capacity(select.predicates.len());
		for (column, literal) in select.predicates {
			let is_key = column.eq_ignore_ascii_case("KEY")
				|| validators.is_some_and(|v| v.key_column.eq_ignore_ascii_case(&column));
			let value_type = if is_key {
				Some(self.key_type(&select.column_family))
			} else {
				self.column_type(&select.column_family, &column)
			}
			.or_else(|| codec_bytes::natural_type(&literal))
			.ok_or_else(|| native_error(statement, format!("cannot compare column `{}`", column)))?;
			let encoded = codec_bytes::encode(literal, value_type)
				.map_err(|err| native_error(statement, err.to_string()))?;
			predicates.push((is_key, column, encoded, value_type));
		}

		let rows = family
			.values()
			.filter(|row| {
				predicates.iter().all(|(is_key, column, probe, value_type)| {
					let stored = if *is_key {
						Some(&row.id)
					} else {
						row.column(column).map(|col| &col.value)
					};
					stored.and_then(|stored| codec_bytes::compare(stored, probe, *value_type)) == Some(Ordering::Equal)
				})
			})
			.take(select.limit.unwrap_or(usize::MAX))
			.map(|row| match &select.columns {
				Some(columns) => row.project(columns),
				None => row.clone(),
			})
			.collect();
		Ok(rows)
	}
}

#[async_trait]
impl ColumnBackend for InMemoryColumnStore {
	async fn find_by_index(
		&self,
		keyspace: &str,
		column_family: &str,
		clauses: &[IndexClause],
		max_results: usize,
	) -> BackendResult<Vec<ThriftRow>> {
		let families = self.families.read().await;
		let Some(family) = families.get(&family_key(keyspace, column_family)) else {
			return Ok(Vec::new());
		};

		if clauses.is_empty() {
			return Ok(family.values().take(max_results).cloned().collect());
		}

		let mut matched: IndexMap<Bytes, ThriftRow> = IndexMap::new();
		for clause in clauses {
			let hits = family
				.values()
				.filter(|row| clause.expressions.iter().all(|expr| expression_matches(row, expr)))
				.take(clause.count);
			for row in hits {
				matched.entry(row.id.clone()).or_insert_with(|| row.clone());
			}
		}
		Ok(matched.into_values().take(max_results).collect())
	}

	async fn find_by_key_range(
		&self,
		keyspace: &str,
		column_family: &str,
		lookup: &RowKeyLookup,
	) -> BackendResult<Vec<ThriftRow>> {
		let families = self.families.read().await;
		let Some(family) = families.get(&family_key(keyspace, column_family)) else {
			return Ok(Vec::new());
		};

		let rows = match lookup.key_range() {
			KeyRange::Exact(key) => family.get(&key).cloned().into_iter().collect(),
			KeyRange::Bounded { start, end } => {
				let in_range = |id: &Bytes| {
					let above = start.as_ref().is_none_or(|start| {
						codec_bytes::compare(id, start, lookup.key_type).is_some_and(|ord| ord != Ordering::Less)
					});
					let below = end.as_ref().is_none_or(|end| {
						codec_bytes::compare(id, end, lookup.key_type).is_some_and(|ord| ord != Ordering::Greater)
					});
					above && below
				};
				family
					.values()
					.filter(|row| in_range(&row.id))
					.take(lookup.count)
					.cloned()
					.collect()
			}
		};
		Ok(rows)
	}

	async fn find_by_keys(
		&self,
		keyspace: &str,
		column_family: &str,
		keys: &[Bytes],
	) -> BackendResult<Vec<ThriftRow>> {
		let families = self.families.read().await;
		let Some(family) = families.get(&family_key(keyspace, column_family)) else {
			return Ok(Vec::new());
		};
		Ok(keys.iter().filter_map(|key| family.get(key).cloned()).collect())
	}

	async fn execute_native(&self, keyspace: &str, statement: &str) -> BackendResult<Vec<ThriftRow>> {
		let select = NativeSelect::parse(statement)?;
		let families = self.families.read().await;
		let family = families.get(&family_key(keyspace, &select.column_family));
		self.select_native(statement, family, select)
	}

	async fn insert(&self, keyspace: &str, row: ThriftRow) -> BackendResult<()> {
		if row.id.is_empty() {
			return Err(BackendError::ExecutionError(format!(
				"row of {} has an empty key",
				row.column_family
			)));
		}
		let mut families = self.families.write().await;
		let family = families
			.entry(family_key(keyspace, &row.column_family))
			.or_default();
		match family.get_mut(&row.id) {
			Some(existing) => {
				for column in row.columns {
					existing.put_column(column);
				}
				for super_column in row.super_columns {
					existing.put_super_column(super_column);
				}
			}
			None => {
				family.insert(row.id.clone(), row);
			}
		}
		Ok(())
	}

	async fn delete(&self, keyspace: &str, column_family: &str, key: &Bytes) -> BackendResult<bool> {
		let mut families = self.families.write().await;
		Ok(families
			.get_mut(&family_key(keyspace, column_family))
			.and_then(|family| family.shift_remove(key))
			.is_some())
	}
}

fn family_key(keyspace: &str, column_family: &str) -> (String, String) {
	(keyspace.to_string(), column_family.to_string())
}

fn expression_matches(row: &ThriftRow, expr: &IndexExpression) -> bool {
	row.column(&expr.column)
		.and_then(|col| codec_bytes::compare(&col.value, &expr.value, expr.value_type))
		.is_some_and(|ordering| expr.op.matches(ordering))
}

fn native_error(statement: &str, reason: impl Into<String>) -> BackendError {
	BackendError::ExecutionError(format!("cannot execute `{}`: {}", statement, reason.into()))
}

/// Supported native statement:
/// `SELECT * | col, ... FROM cf [WHERE col = literal [AND ...]] [LIMIT n]`
struct NativeSelect {
	column_family: String,
	/// `None` selects every column
	columns: Option<Vec<String>>,
	predicates: Vec<(String, Value)>,
	limit: Option<usize>,
}

struct NativePatterns {
	select: Regex,
	predicate: Regex,
	and: Regex,
}

static NATIVE_PATTERNS: OnceLock<NativePatterns> = OnceLock::new();

fn native_patterns() -> &'static NativePatterns {
	NATIVE_PATTERNS.get_or_init(|| NativePatterns {
		select: Regex::new(
			r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+([\w.]+)(?:\s+WHERE\s+(.+?))?(?:\s+LIMIT\s+(\d+))?\s*;?\s*$",
		)
		.unwrap(),
		predicate: Regex::new(r"^\s*(\w+)\s*=\s*(.+?)\s*$").unwrap(),
		and: Regex::new(r"(?i)\s+AND\s+").unwrap(),
	})
}

impl NativeSelect {
	fn parse(statement: &str) -> BackendResult<Self> {
		let patterns = native_patterns();
		let caps = patterns
			.select
			.captures(statement)
			.ok_or_else(|| native_error(statement, "only SELECT statements are supported"))?;

		let column_family = caps[2]
			.rsplit('.')
			.next()
			.unwrap_or(&caps[2])
			.to_string();
		let columns = match caps[1].trim() {
			"*" => None,
			list => Some(list.split(',').map(|c| c.trim().to_string()).collect()),
		};

		let mut predicates = Vec::new();
		if let Some(condition) = caps.get(3) {
			for term in patterns.and.split(condition.as_str()) {
				let term_caps = patterns
					.predicate
					.captures(term)
					.ok_or_else(|| native_error(statement, format!("unsupported condition `{}`", term.trim())))?;
				predicates.push((term_caps[1].to_string(), parse_literal(&term_caps[2])));
			}
		}

		let limit = caps.get(4).and_then(|m| m.as_str().parse().ok());
		Ok(Self {
			column_family,
			columns,
			predicates,
			limit,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cassandra::{Column, IndexOperator};
	use crate::metadata::Attribute;
	use rstest::{fixture, rstest};

	#[fixture]
	fn users() -> EntityMetadata {
		EntityMetadata::builder("CassandraEntity", "users")
			.id(Attribute::scalar("key", ValueType::String))
			.attribute(Attribute::scalar("full_name", ValueType::String))
			.attribute(Attribute::scalar("birth_date", ValueType::Int))
			.attribute(Attribute::scalar("state", ValueType::String))
			.build()
	}

	fn user(key: &'static str, name: &'static str, birth_date: i32, state: &'static str) -> ThriftRow {
		let mut row = ThriftRow::new(Bytes::from_static(key.as_bytes()), "users");
		row.put_column(Column::new("full_name", Bytes::from_static(name.as_bytes())));
		row.put_column(Column::new("birth_date", Bytes::copy_from_slice(&birth_date.to_be_bytes())));
		row.put_column(Column::new("state", Bytes::from_static(state.as_bytes())));
		row
	}

	async fn seeded(users: &EntityMetadata) -> InMemoryColumnStore {
		let store = InMemoryColumnStore::new().with_column_family(users);
		for row in [
			user("bsanderson", "Brandon Sanderson", 1975, "UT"),
			user("prothfuss", "Patrick Rothfuss", 1973, "WI"),
			user("htayler", "Howard Tayler", 1968, "UT"),
		] {
			store.insert("KunderaExamples", row).await.unwrap();
		}
		store
	}

	#[rstest]
	#[tokio::test]
	async fn test_index_expressions_compare_typed(users: EntityMetadata) {
		let store = seeded(&users).await;
		let clause = IndexClause {
			expressions: vec![
				IndexExpression {
					column: "state".to_string(),
					op: IndexOperator::Eq,
					value: Bytes::from_static(b"UT"),
					value_type: ValueType::String,
				},
				IndexExpression {
					column: "birth_date".to_string(),
					op: IndexOperator::Gt,
					value: Bytes::copy_from_slice(&1970_i32.to_be_bytes()),
					value_type: ValueType::Int,
				},
			],
			start_key: Bytes::new(),
			count: 100,
		};

		let rows = store
			.find_by_index("KunderaExamples", "users", &[clause], 100)
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(&rows[0].id[..], b"bsanderson");
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_clause_list_scans(users: EntityMetadata) {
		let store = seeded(&users).await;
		let rows = store.find_by_index("KunderaExamples", "users", &[], 2).await.unwrap();
		assert_eq!(rows.len(), 2);
	}

	#[rstest]
	#[case("SELECT * FROM users WHERE state = 'UT'", 2, 3)]
	#[case("SELECT full_name FROM users WHERE KEY = 'prothfuss'", 1, 1)]
	#[case("SELECT full_name, state FROM KunderaExamples.users LIMIT 1", 1, 2)]
	#[tokio::test]
	async fn test_native_select(
		users: EntityMetadata,
		#[case] statement: &str,
		#[case] expected_rows: usize,
		#[case] expected_columns: usize,
	) {
		let store = seeded(&users).await;
		let rows = store.execute_native("KunderaExamples", statement).await.unwrap();
		assert_eq!(rows.len(), expected_rows);
		assert_eq!(rows[0].columns.len(), expected_columns);
	}

	#[rstest]
	#[tokio::test]
	async fn test_native_rejects_updates(users: EntityMetadata) {
		let store = seeded(&users).await;
		assert!(matches!(
			store
				.execute_native("KunderaExamples", "UPDATE users SET state = 'CA'")
				.await,
			Err(BackendError::ExecutionError(_))
		));
	}

	#[rstest]
	#[tokio::test]
	async fn test_insert_merges_columns_and_delete_removes(users: EntityMetadata) {
		let store = seeded(&users).await;
		let mut update = ThriftRow::new(Bytes::from_static(b"htayler"), "users");
		update.put_column(Column::new("state", Bytes::from_static(b"CA")));
		store.insert("KunderaExamples", update).await.unwrap();

		let rows = store
			.find_by_keys("KunderaExamples", "users", &[Bytes::from_static(b"htayler")])
			.await
			.unwrap();
		assert_eq!(rows[0].columns.len(), 3);
		assert_eq!(&rows[0].column("state").unwrap().value[..], b"CA");

		assert!(store.delete("KunderaExamples", "users", &Bytes::from_static(b"htayler")).await.unwrap());
		assert!(!store.delete("KunderaExamples", "users", &Bytes::from_static(b"htayler")).await.unwrap());
		assert_eq!(store.len("KunderaExamples", "users").await, 2);
	}
}

//! Column-family row model

use bytes::Bytes;
use chrono::Utc;

/// One named column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
	pub name: String,
	pub value: Bytes,
	/// Write timestamp in microseconds
	pub timestamp: i64,
}

impl Column {
	/// Column stamped with the current time
	pub fn new(name: impl Into<String>, value: Bytes) -> Self {
		Self {
			name: name.into(),
			value,
			timestamp: Utc::now().timestamp_micros(),
		}
	}
}

/// Named group of columns; holds one embedded value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperColumn {
	pub name: String,
	pub columns: Vec<Column>,
}

impl SuperColumn {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			columns: Vec::new(),
		}
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|col| col.name == name)
	}
}

/// A row as returned by the column backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThriftRow {
	/// Encoded row key
	pub id: Bytes,
	pub column_family: String,
	pub columns: Vec<Column>,
	pub super_columns: Vec<SuperColumn>,
}

impl ThriftRow {
	pub fn new(id: Bytes, column_family: impl Into<String>) -> Self {
		Self {
			id,
			column_family: column_family.into(),
			columns: Vec::new(),
			super_columns: Vec::new(),
		}
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|col| col.name == name)
	}

	pub fn super_column(&self, name: &str) -> Option<&SuperColumn> {
		self.super_columns.iter().find(|sc| sc.name == name)
	}

	/// Add or replace a column
	pub fn put_column(&mut self, column: Column) {
		match self.columns.iter_mut().find(|col| col.name == column.name) {
			Some(existing) => *existing = column,
			None => self.columns.push(column),
		}
	}

	/// Add or replace a super column
	pub fn put_super_column(&mut self, super_column: SuperColumn) {
		match self
			.super_columns
			.iter_mut()
			.find(|sc| sc.name == super_column.name)
		{
			Some(existing) => *existing = super_column,
			None => self.super_columns.push(super_column),
		}
	}

	/// Copy of this row keeping only the named columns
	pub fn project(&self, columns: &[String]) -> ThriftRow {
		ThriftRow {
			id: self.id.clone(),
			column_family: self.column_family.clone(),
			columns: self
				.columns
				.iter()
				.filter(|col| columns.contains(&col.name))
				.cloned()
				.collect(),
			super_columns: self
				.super_columns
				.iter()
				.filter(|sc| columns.contains(&sc.name))
				.cloned()
				.collect(),
		}
	}
}

//! Filter clause model
//!
//! A parsed `WHERE` becomes a [`FilterClauseQueue`]: clauses and connectors in
//! source order. Backends translate the queue; they never see query text.

use std::fmt;

use crate::error::QueryError;
use crate::value::Value;

/// Comparison operator of a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
	Eq,
	Gt,
	Lt,
	Gte,
	Lte,
	/// `<>` or `!=`
	Ne,
	Like,
}

impl Condition {
	/// Parse an operator token (`LIKE` is case-insensitive)
	pub fn parse(token: &str) -> Option<Self> {
		match token {
			"=" => Some(Condition::Eq),
			">" => Some(Condition::Gt),
			"<" => Some(Condition::Lt),
			">=" => Some(Condition::Gte),
			"<=" => Some(Condition::Lte),
			"<>" | "!=" => Some(Condition::Ne),
			other if other.eq_ignore_ascii_case("LIKE") => Some(Condition::Like),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Condition::Eq => "=",
			Condition::Gt => ">",
			Condition::Lt => "<",
			Condition::Gte => ">=",
			Condition::Lte => "<=",
			Condition::Ne => "<>",
			Condition::Like => "LIKE",
		}
	}
}

impl fmt::Display for Condition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Logical connector between clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connector {
	And,
	Or,
}

impl fmt::Display for Connector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Connector::And => write!(f, "AND"),
			Connector::Or => write!(f, "OR"),
		}
	}
}

/// Right-hand side of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
	Literal(Value),
	/// Named (`:name`) or positional (`?1`) parameter awaiting a value
	Parameter(String),
}

/// One `property <condition> value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
	property: String,
	condition: Condition,
	value: ClauseValue,
}

impl FilterClause {
	pub fn new(property: impl Into<String>, condition: Condition, value: impl Into<Value>) -> Self {
		Self {
			property: property.into(),
			condition,
			value: ClauseValue::Literal(value.into()),
		}
	}

	pub fn parameter(property: impl Into<String>, condition: Condition, name: impl Into<String>) -> Self {
		Self {
			property: property.into(),
			condition,
			value: ClauseValue::Parameter(name.into()),
		}
	}

	pub fn property(&self) -> &str {
		&self.property
	}

	pub fn condition(&self) -> Condition {
		self.condition
	}

	pub fn value(&self) -> &ClauseValue {
		&self.value
	}

	/// Bound literal of this clause
	pub fn literal(&self) -> Result<&Value, QueryError> {
		match &self.value {
			ClauseValue::Literal(value) => Ok(value),
			ClauseValue::Parameter(name) => Err(QueryError::UnboundParameter(name.clone())),
		}
	}

	fn bind(&mut self, name: &str, value: &Value) -> bool {
		match &self.value {
			ClauseValue::Parameter(param) if param == name => {
				self.value = ClauseValue::Literal(value.clone());
				true
			}
			_ => false,
		}
	}
}

/// Entry of a [`FilterClauseQueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterItem {
	Clause(FilterClause),
	Connector(Connector),
}

/// Clauses and connectors of a query filter in source order
///
/// # Example
///
/// ```rust
/// use reinhardt_polyglot::query::{Condition, FilterClause, FilterClauseQueue};
///
/// let filter = FilterClauseQueue::new()
///     .clause(FilterClause::new("state", Condition::Eq, "UT"))
///     .and()
///     .clause(FilterClause::new("birth_date", Condition::Gt, 1970));
/// assert_eq!(filter.clauses().count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClauseQueue {
	items: Vec<FilterItem>,
}

impl FilterClauseQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn clause(mut self, clause: FilterClause) -> Self {
		self.push_clause(clause);
		self
	}

	pub fn and(mut self) -> Self {
		self.push_connector(Connector::And);
		self
	}

	pub fn or(mut self) -> Self {
		self.push_connector(Connector::Or);
		self
	}

	pub fn push_clause(&mut self, clause: FilterClause) {
		self.items.push(FilterItem::Clause(clause));
	}

	pub fn push_connector(&mut self, connector: Connector) {
		self.items.push(FilterItem::Connector(connector));
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn items(&self) -> &[FilterItem] {
		&self.items
	}

	pub fn clauses(&self) -> impl Iterator<Item = &FilterClause> {
		self.items.iter().filter_map(|item| match item {
			FilterItem::Clause(clause) => Some(clause),
			FilterItem::Connector(_) => None,
		})
	}

	/// Parameter names still awaiting a value
	pub fn parameters(&self) -> impl Iterator<Item = &str> {
		self.clauses().filter_map(|clause| match clause.value() {
			ClauseValue::Parameter(name) => Some(name.as_str()),
			ClauseValue::Literal(_) => None,
		})
	}

	/// Bind `value` to every clause using parameter `name`; returns the count bound
	pub fn bind(&mut self, name: &str, value: &Value) -> usize {
		let mut bound = 0;
		for item in &mut self.items {
			if let FilterItem::Clause(clause) = item
				&& clause.bind(name, value)
			{
				bound += 1;
			}
		}
		bound
	}
}

/// Statement kind of a JPA-like query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
	Select,
	Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
	Asc,
	Desc,
}

/// One `ORDER BY` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
	pub property: String,
	pub direction: SortDirection,
}

/// A query ready for translation or native execution
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
	/// Original query text
	pub text: String,
	/// Whether `text` is a backend-native statement
	pub native: bool,
	pub kind: QueryKind,
	/// Name of the queried entity
	pub entity: String,
	pub alias: Option<String>,
	/// Selected properties; empty selects the whole entity
	pub projection: Vec<String>,
	pub filter: FilterClauseQueue,
	pub ordering: Vec<OrderBy>,
	pub max_results: Option<usize>,
}

impl QuerySpec {
	/// Select over `entity` with the given filter
	pub fn select(entity: impl Into<String>, filter: FilterClauseQueue) -> Self {
		let entity = entity.into();
		Self {
			text: format!("SELECT e FROM {} e", entity),
			native: false,
			kind: QueryKind::Select,
			entity,
			alias: None,
			projection: Vec::new(),
			filter,
			ordering: Vec::new(),
			max_results: None,
		}
	}

	/// Backend-native statement executed verbatim for `entity`
	pub fn native(text: impl Into<String>, entity: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			native: true,
			kind: QueryKind::Select,
			entity: entity.into(),
			alias: None,
			projection: Vec::new(),
			filter: FilterClauseQueue::new(),
			ordering: Vec::new(),
			max_results: None,
		}
	}

	/// Bind a named (`:name`) or positional (`?1`, given as `"1"`) parameter
	///
	/// # Errors
	///
	/// Fails when no clause uses the parameter.
	pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, QueryError> {
		let name = name.trim_start_matches([':', '?']);
		if self.filter.bind(name, &value.into()) == 0 {
			return Err(QueryError::Parse {
				query: self.text.clone(),
				reason: format!("no parameter named `{}`", name),
			});
		}
		Ok(self)
	}

	pub fn set_max_results(&mut self, max_results: usize) -> &mut Self {
		self.max_results = Some(max_results);
		self
	}

	pub fn order_by(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
		self.ordering.push(OrderBy {
			property: property.into(),
			direction,
		});
		self
	}
}

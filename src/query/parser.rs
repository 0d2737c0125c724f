//! JPA-like query parser
//!
//! Understands the subset the backends can translate:
//!
//! ```text
//! SELECT a | a.f1, a.f2 | * FROM Entity [AS] a [WHERE cond {AND|OR} cond ...] [ORDER BY a.f [ASC|DESC], ...]
//! DELETE FROM Entity [AS] a [WHERE ...]
//! ```
//!
//! Conditions are `property op value` with `op` one of `=`, `!=`, `<>`, `<`,
//! `>`, `<=`, `>=`, `LIKE`, or `property BETWEEN low AND high` (read as
//! `>=` and `<=`). Values are quoted strings, numbers, booleans, or `:name` /
//! `?1` parameters. Parenthesised groups are not supported.

use std::sync::OnceLock;

use regex::Regex;

use super::clause::{
	Condition, Connector, FilterClause, FilterClauseQueue, OrderBy, QueryKind, QuerySpec,
	SortDirection,
};
use crate::error::QueryError;
use crate::value::Value;

/// Compiled regex patterns for query parsing
struct Patterns {
	select: Regex,
	delete: Regex,
	between: Regex,
	like: Regex,
	comparison: Regex,
	order_term: Regex,
}

impl Patterns {
	fn new() -> Self {
		Self {
			// SELECT: "SELECT projection FROM Entity [AS] alias"
			select: Regex::new(r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+(\w+)(?:\s+(?:AS\s+)?(\w+))?\s*$").unwrap(),
			// DELETE: "DELETE FROM Entity [AS] alias"
			delete: Regex::new(r"(?i)^\s*DELETE\s+FROM\s+(\w+)(?:\s+(?:AS\s+)?(\w+))?\s*$").unwrap(),
			// BETWEEN: "field BETWEEN low" (the high bound follows the next AND)
			between: Regex::new(r"(?i)^\s*([\w.]+)\s+BETWEEN\s+(.+?)\s*$").unwrap(),
			// LIKE: "field LIKE 'pattern'"
			like: Regex::new(r"(?i)^\s*([\w.]+)\s+LIKE\s+(.+?)\s*$").unwrap(),
			// Comparison: "field op value" where op is =, !=, <, >, <=, >=, <>
			comparison: Regex::new(r"^\s*([\w.]+)\s*(=|!=|<>|<=|>=|<|>)\s*(.+?)\s*$").unwrap(),
			// ORDER BY term: "field [ASC|DESC]"
			order_term: Regex::new(r"(?i)^\s*([\w.]+)(?:\s+(ASC|DESC))?\s*$").unwrap(),
		}
	}
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
	PATTERNS.get_or_init(Patterns::new)
}

/// Parser for JPA-like query strings
pub struct QueryParser;

impl QueryParser {
	/// Parse a query string into a [`QuerySpec`]
	///
	/// # Example
	///
	/// ```rust
	/// use reinhardt_polyglot::query::{Condition, QueryParser};
	///
	/// let spec = QueryParser::parse(
	///     "SELECT u FROM CassandraEntity u WHERE u.state = 'UT' AND u.birth_date > 1970",
	/// )
	/// .unwrap();
	/// let clauses: Vec<_> = spec.filter.clauses().collect();
	/// assert_eq!(clauses[0].property(), "state");
	/// assert_eq!(clauses[1].condition(), Condition::Gt);
	/// ```
	pub fn parse(query: &str) -> Result<QuerySpec, QueryError> {
		let trimmed = query.trim();
		let order_pos = find_keyword(trimmed, " ORDER BY ");
		let (body, order) = match order_pos {
			Some(pos) => (&trimmed[..pos], Some(&trimmed[pos + " ORDER BY ".len()..])),
			None => (trimmed, None),
		};
		let (head, condition) = match find_keyword(body, " WHERE ") {
			Some(pos) => (&body[..pos], Some(&body[pos + " WHERE ".len()..])),
			None => (body, None),
		};

		let mut spec = Self::parse_head(query, head.trim())?;
		if let Some(condition) = condition {
			spec.filter = Self::parse_filter(query, condition, spec.alias.as_deref())?;
		}
		if let Some(order) = order {
			spec.ordering = Self::parse_order(query, order, spec.alias.as_deref())?;
		}
		Ok(spec)
	}

	/// Parse the statement head: kind, entity, alias and projection
	fn parse_head(query: &str, head: &str) -> Result<QuerySpec, QueryError> {
		if let Some(caps) = patterns().select.captures(head) {
			let entity = caps[2].to_string();
			let alias = caps.get(3).map(|m| m.as_str().to_string());
			let projection = Self::parse_projection(&caps[1], alias.as_deref());

			let mut spec = QuerySpec::select(entity, FilterClauseQueue::new());
			spec.text = query.to_string();
			spec.alias = alias;
			spec.projection = projection;
			return Ok(spec);
		}

		if let Some(caps) = patterns().delete.captures(head) {
			let mut spec = QuerySpec::select(&caps[1], FilterClauseQueue::new());
			spec.text = query.to_string();
			spec.kind = QueryKind::Delete;
			spec.alias = caps.get(2).map(|m| m.as_str().to_string());
			return Ok(spec);
		}

		Err(parse_error(query, "expected SELECT ... FROM or DELETE FROM"))
	}

	/// Selected properties; the alias alone or `*` selects the whole entity
	fn parse_projection(projection: &str, alias: Option<&str>) -> Vec<String> {
		let projection = projection.trim();
		if projection == "*" || Some(projection) == alias {
			return Vec::new();
		}
		projection
			.split(',')
			.map(|item| strip_alias(item.trim(), alias).to_string())
			.collect()
	}

	/// Split a WHERE body into clauses and connectors
	fn parse_filter(query: &str, condition: &str, alias: Option<&str>) -> Result<FilterClauseQueue, QueryError> {
		if outside_quotes(condition).any(|ch| ch == '(' || ch == ')') {
			return Err(parse_error(query, "parenthesised conditions are not supported"));
		}

		let mut filter = FilterClauseQueue::new();
		let mut rest = condition.trim();
		loop {
			let (fragment, connector, tail) = next_fragment(rest);

			if let Some(caps) = patterns().between.captures(fragment) {
				// The high bound is the fragment after the following AND
				if connector != Some(Connector::And) {
					return Err(parse_error(query, "BETWEEN without AND"));
				}
				let (high, next_connector, next_tail) = next_fragment(tail);
				let property = strip_alias(&caps[1], alias);
				filter.push_clause(Self::clause(property, Condition::Gte, &caps[2]));
				filter.push_connector(Connector::And);
				filter.push_clause(Self::clause(property, Condition::Lte, high));
				match next_connector {
					Some(connector) => {
						filter.push_connector(connector);
						rest = next_tail;
						continue;
					}
					None => break,
				}
			}

			filter.push_clause(Self::parse_condition(query, fragment, alias)?);
			match connector {
				Some(connector) => {
					filter.push_connector(connector);
					rest = tail;
				}
				None => break,
			}
		}
		Ok(filter)
	}

	/// Parse a single `property op value` condition
	fn parse_condition(query: &str, fragment: &str, alias: Option<&str>) -> Result<FilterClause, QueryError> {
		if let Some(caps) = patterns().like.captures(fragment) {
			return Ok(Self::clause(strip_alias(&caps[1], alias), Condition::Like, &caps[2]));
		}
		if let Some(caps) = patterns().comparison.captures(fragment) {
			let condition = Condition::parse(&caps[2])
				.ok_or_else(|| parse_error(query, &format!("unknown operator {}", &caps[2])))?;
			return Ok(Self::clause(strip_alias(&caps[1], alias), condition, &caps[3]));
		}
		Err(parse_error(query, &format!("cannot parse condition `{}`", fragment.trim())))
	}

	fn clause(property: &str, condition: Condition, raw_value: &str) -> FilterClause {
		let raw_value = raw_value.trim();
		if let Some(name) = raw_value
			.strip_prefix(':')
			.or_else(|| raw_value.strip_prefix('?'))
		{
			return FilterClause::parameter(property, condition, name);
		}
		FilterClause::new(property, condition, parse_literal(raw_value))
	}

	fn parse_order(query: &str, order: &str, alias: Option<&str>) -> Result<Vec<OrderBy>, QueryError> {
		order
			.split(',')
			.map(|term| {
				let caps = patterns()
					.order_term
					.captures(term)
					.ok_or_else(|| parse_error(query, &format!("cannot parse ORDER BY term `{}`", term.trim())))?;
				let direction = match caps.get(2) {
					Some(dir) if dir.as_str().eq_ignore_ascii_case("DESC") => SortDirection::Desc,
					_ => SortDirection::Asc,
				};
				Ok(OrderBy {
					property: strip_alias(&caps[1], alias).to_string(),
					direction,
				})
			})
			.collect()
	}
}

/// Literal value: quoted string, boolean, integer, decimal, or bare text
pub(crate) fn parse_literal(raw: &str) -> Value {
	if let Some(inner) = raw
		.strip_prefix('\'')
		.and_then(|s| s.strip_suffix('\''))
	{
		return Value::Text(inner.replace("''", "'"));
	}
	if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
		return Value::Text(inner.to_string());
	}
	if raw.eq_ignore_ascii_case("true") {
		return Value::Bool(true);
	}
	if raw.eq_ignore_ascii_case("false") {
		return Value::Bool(false);
	}
	if raw.eq_ignore_ascii_case("null") {
		return Value::Null;
	}
	if let Ok(v) = raw.parse::<i32>() {
		return Value::Int(v);
	}
	if let Ok(v) = raw.parse::<i64>() {
		return Value::Long(v);
	}
	if let Ok(v) = raw.parse::<f64>() {
		return Value::Double(v);
	}
	Value::Text(raw.to_string())
}

/// Drop a leading `alias.` from a property path
fn strip_alias<'a>(property: &'a str, alias: Option<&str>) -> &'a str {
	match property.split_once('.') {
		Some((prefix, rest)) if alias.is_none_or(|alias| alias == prefix) => rest,
		_ => property,
	}
}

/// Next condition fragment, the connector after it and the remaining text
fn next_fragment(text: &str) -> (&str, Option<Connector>, &str) {
	let and = find_keyword(text, " AND ");
	let or = find_keyword(text, " OR ");
	match (and, or) {
		(Some(a), Some(o)) if o < a => (&text[..o], Some(Connector::Or), text[o + 4..].trim()),
		(Some(a), _) => (&text[..a], Some(Connector::And), text[a + 5..].trim()),
		(None, Some(o)) => (&text[..o], Some(Connector::Or), text[o + 4..].trim()),
		(None, None) => (text, None, ""),
	}
}

/// Byte position of `keyword` (case-insensitive) outside quotes
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
	let upper = text.to_ascii_uppercase();
	let keyword = keyword.to_ascii_uppercase();
	let mut quote = None;

	for (i, ch) in text.char_indices() {
		match quote {
			Some(q) if ch == q => quote = None,
			Some(_) => continue,
			None if ch == '\'' || ch == '"' => quote = Some(ch),
			None => {
				if upper[i..].starts_with(&keyword) {
					return Some(i);
				}
			}
		}
	}
	None
}

/// Characters of `text` that are not inside a quoted literal
fn outside_quotes(text: &str) -> impl Iterator<Item = char> + '_ {
	let mut quote = None;
	text.chars().filter(move |&ch| match quote {
		Some(q) => {
			if ch == q {
				quote = None;
			}
			false
		}
		None if ch == '\'' || ch == '"' => {
			quote = Some(ch);
			false
		}
		None => true,
	})
}

fn parse_error(query: &str, reason: &str) -> QueryError {
	QueryError::Parse {
		query: query.to_string(),
		reason: reason.to_string(),
	}
}

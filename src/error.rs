//! Error types for query translation, schema resolution, value conversion and
//! backend execution.
//!
//! Translation and schema errors abort the current query. Access errors are
//! carried per row (see [`crate::entity::Materialized`]) so that one bad row
//! does not abort a result set. Backend errors are propagated unchanged.

use std::fmt;

use thiserror::Error;

use crate::metadata::ValueType;

/// Result type for polyglot operations
pub type Result<T> = std::result::Result<T, PolyglotError>;

/// Execution path a predicate was being translated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPath {
	/// Cassandra secondary-index query
	SecondaryIndex,
	/// Cassandra row-key (id) query
	RowKey,
	/// MongoDB filter document
	Document,
}

impl fmt::Display for QueryPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			QueryPath::SecondaryIndex => write!(f, "secondary index query"),
			QueryPath::RowKey => write!(f, "row key query"),
			QueryPath::Document => write!(f, "document query"),
		}
	}
}

/// Unsupported query shapes, detected while translating a filter clause queue
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
	#[error("unsupported clause {connector} for {backend}")]
	UnsupportedConnector {
		connector: String,
		backend: &'static str,
	},

	#[error(
		"search on row key column `{id_column}` cannot be combined with indexed column `{column}` in {backend}"
	)]
	MixedRowKeyPredicate {
		id_column: String,
		column: String,
		backend: &'static str,
	},

	#[error("condition {condition} is not supported for {path}")]
	UnsupportedCondition { condition: String, path: QueryPath },

	#[error("no value bound for query parameter `{0}`")]
	UnboundParameter(String),

	#[error("cannot parse query `{query}`: {reason}")]
	Parse { query: String, reason: String },

	#[error("invalid native query `{query}`: {reason}")]
	InvalidNativeQuery { query: String, reason: String },
}

/// Failures resolving a name or type through entity metadata
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
	#[error("column not found: {0}")]
	ColumnNotFound(String),

	#[error("field type is null for: {0}")]
	FieldTypeNull(String),

	#[error("unknown entity: {0}")]
	UnknownEntity(String),

	#[error("unknown embeddable: {0}")]
	UnknownEmbeddable(String),

	#[error("unknown persistence unit: {0}")]
	UnknownPersistenceUnit(String),

	#[error("no accessor registered for {owner}.{field}")]
	MissingAccessor { owner: String, field: String },

	#[error("{0} registered twice")]
	DuplicateEntity(String),
}

/// Value conversion failures. Conversions never truncate silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
	#[error("cannot convert {from} to {to}")]
	Unsupported { from: String, to: ValueType },

	#[error("cannot parse `{input}` as {target}")]
	Parse { input: String, target: ValueType },

	#[error("value {value} is out of range for {target}")]
	OutOfRange { value: String, target: ValueType },

	#[error("cannot decode {target} from {len} bytes: {reason}")]
	Decode {
		target: ValueType,
		len: usize,
		reason: String,
	},
}

/// Per-entity or per-field access failures during (de)materialization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
	#[error("cannot instantiate {entity}: {reason}")]
	Instantiation { entity: String, reason: String },

	#[error("no accessor for field {owner}.{field}")]
	NoAccessor { owner: String, field: String },

	#[error("field {field} expects {expected}, found {found}")]
	TypeMismatch {
		field: String,
		expected: String,
		found: String,
	},

	#[error("field {field}: {source}")]
	Codec {
		field: String,
		#[source]
		source: CodecError,
	},

	#[error("{entity} has no id value")]
	MissingId { entity: String },
}

impl AccessError {
	/// Attach a field name to a type mismatch raised by a setter
	pub(crate) fn for_field(self, field: &str) -> Self {
		match self {
			AccessError::TypeMismatch {
				expected, found, ..
			} => AccessError::TypeMismatch {
				field: field.to_string(),
				expected,
				found,
			},
			other => other,
		}
	}
}

/// Error raised by a backend client
#[derive(Debug)]
pub enum BackendError {
	/// Connection error
	ConnectionError(String),

	/// Query/operation execution error
	ExecutionError(String),

	/// Document/row not found
	NotFound(String),

	/// Serialization/deserialization error
	SerializationError(String),

	/// Feature not supported by this backend
	UnsupportedFeature(String),
}

impl fmt::Display for BackendError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackendError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
			BackendError::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
			BackendError::NotFound(msg) => write!(f, "Not found: {}", msg),
			BackendError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
			BackendError::UnsupportedFeature(msg) => write!(f, "Unsupported feature: {}", msg),
		}
	}
}

impl std::error::Error for BackendError {}

impl From<serde_json::Error> for BackendError {
	fn from(err: serde_json::Error) -> Self {
		BackendError::SerializationError(err.to_string())
	}
}

#[cfg(feature = "mongodb")]
impl From<::mongodb::error::Error> for BackendError {
	fn from(err: ::mongodb::error::Error) -> Self {
		use ::mongodb::error::ErrorKind;

		match *err.kind {
			ErrorKind::Io(_) => BackendError::ConnectionError(err.to_string()),
			_ => BackendError::ExecutionError(err.to_string()),
		}
	}
}

// In bson v3.x, both ser::Error and de::Error are type aliases for bson::error::Error
impl From<bson::error::Error> for BackendError {
	fn from(err: bson::error::Error) -> Self {
		BackendError::SerializationError(err.to_string())
	}
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid configuration: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("persistence unit `{0}` declared twice")]
	DuplicateUnit(String),
}

/// Top-level error for polyglot operations
#[derive(Debug, Error)]
pub enum PolyglotError {
	#[error(transparent)]
	Query(#[from] QueryError),

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	Codec(#[from] CodecError),

	#[error(transparent)]
	Access(#[from] AccessError),

	#[error(transparent)]
	Backend(#[from] BackendError),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

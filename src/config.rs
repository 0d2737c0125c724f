//! Persistence-unit configuration.
//!
//! Settings are loaded once from TOML and handed to
//! [`MetadataContextBuilder::persistence_unit`](crate::metadata::MetadataContextBuilder::persistence_unit).
//!
//! ```toml
//! [[persistence_units]]
//! name = "cassandra"
//! backend = "cassandra"
//! keyspace = "KunderaExamples"
//! nodes = ["localhost"]
//! port = 9160
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Store a persistence unit talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	Cassandra,
	#[serde(rename = "mongodb")]
	MongoDB,
}

impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackendKind::Cassandra => write!(f, "Cassandra"),
			BackendKind::MongoDB => write!(f, "MongoDB"),
		}
	}
}

/// Configuration of one persistence unit
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceUnitConfig {
	/// Unit name referenced by entity metadata
	pub name: String,

	pub backend: BackendKind,

	/// Keyspace (Cassandra) or database (MongoDB)
	pub keyspace: String,

	#[serde(default = "default_nodes")]
	pub nodes: Vec<String>,

	#[serde(default)]
	pub port: Option<u16>,

	/// Query through secondary indexes; when off, non-native queries go to full-text search
	#[serde(default = "default_true")]
	pub use_secondary_index: bool,

	/// Read embedded attributes through the inverted-index table
	#[serde(default)]
	pub inverted_indexing: bool,

	/// Row limit applied when a query does not set one
	#[serde(default = "default_max_results")]
	pub max_results: usize,
}

fn default_nodes() -> Vec<String> {
	vec!["localhost".to_string()]
}

fn default_true() -> bool {
	true
}

fn default_max_results() -> usize {
	100
}

impl PersistenceUnitConfig {
	/// Unit with default connection settings
	pub fn new(name: impl Into<String>, backend: BackendKind, keyspace: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			backend,
			keyspace: keyspace.into(),
			nodes: default_nodes(),
			port: None,
			use_secondary_index: true,
			inverted_indexing: false,
			max_results: default_max_results(),
		}
	}

	pub fn with_secondary_index(mut self, enabled: bool) -> Self {
		self.use_secondary_index = enabled;
		self
	}

	pub fn with_inverted_indexing(mut self, enabled: bool) -> Self {
		self.inverted_indexing = enabled;
		self
	}

	pub fn with_max_results(mut self, max_results: usize) -> Self {
		self.max_results = max_results;
		self
	}

	/// Connection URI for MongoDB units
	pub fn mongodb_uri(&self) -> String {
		let port = self.port.unwrap_or(27017);
		let hosts: Vec<String> = self
			.nodes
			.iter()
			.map(|node| format!("{}:{}", node, port))
			.collect();
		format!("mongodb://{}", hosts.join(","))
	}
}

/// All configured persistence units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyglotSettings {
	#[serde(default)]
	pub persistence_units: Vec<PersistenceUnitConfig>,
}

impl PolyglotSettings {
	/// Load settings from a TOML file.
	///
	/// # Errors
	///
	/// Returns error if the file cannot be read or parsed.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
			path: path.as_ref().display().to_string(),
			source: e,
		})?;

		Self::from_toml_str(&content)
	}

	/// Parse settings from a TOML string.
	pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
		let settings: Self = toml::from_str(content)?;

		let mut seen = HashSet::new();
		for unit in &settings.persistence_units {
			if !seen.insert(unit.name.as_str()) {
				return Err(ConfigError::DuplicateUnit(unit.name.clone()));
			}
		}
		Ok(settings)
	}

	pub fn unit(&self, name: &str) -> Option<&PersistenceUnitConfig> {
		self.persistence_units.iter().find(|unit| unit.name == name)
	}
}

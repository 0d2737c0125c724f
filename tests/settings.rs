//! Settings Tests
//!
//! Loads persistence units from TOML and builds metadata contexts from them.

mod common;

use std::io::Write;

use common::{Author, CassandraEntity, author_metadata, keys, seeded_column_store, user_metadata};
use reinhardt_polyglot::error::{ConfigError, SchemaError};
use reinhardt_polyglot::metadata::{Attribute, EntityMetadata, MetadataContext, ValueType};
use reinhardt_polyglot::query::QueryParser;
use reinhardt_polyglot::{BackendKind, CassQuery, PolyglotSettings};
use rstest::rstest;

const SETTINGS: &str = r#"
[[persistence_units]]
name = "cassandra_pu"
backend = "cassandra"
keyspace = "KunderaExamples"
port = 9160
max_results = 1

[[persistence_units]]
name = "mongo_pu"
backend = "mongodb"
keyspace = "KunderaExamples"
nodes = ["db1", "db2"]
use_secondary_index = false
"#;

/// Test loading settings from a file
///
/// This test verifies that:
/// 1. Every unit is read with its backend and defaults
/// 2. A unit's row limit applies to queries that set none
#[rstest]
#[tokio::test]
async fn test_settings_file_drives_context() {
	// Arrange
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(SETTINGS.as_bytes()).unwrap();
	let settings = PolyglotSettings::from_file(file.path()).unwrap();
	let unit = settings.unit("cassandra_pu").unwrap().clone();
	let context = common::context(unit);
	let store = seeded_column_store(&context).await;
	let spec = QueryParser::parse("SELECT u FROM CassandraEntity u WHERE u.state = 'UT'").unwrap();

	// Act
	let found = CassQuery::new(&context, &store, spec)
		.get_result_list::<CassandraEntity>()
		.await
		.unwrap();

	// Assert
	let mongo = settings.unit("mongo_pu").unwrap();
	assert_eq!(mongo.backend, BackendKind::MongoDB);
	assert!(!mongo.use_secondary_index);
	assert_eq!(mongo.max_results, 100);
	assert_eq!(mongo.mongodb_uri(), "mongodb://db1:27017,db2:27017");
	assert_eq!(keys(&found), vec!["bsanderson"]);
}

/// Test duplicate unit names
///
/// This test verifies that:
/// 1. A unit name may only be configured once
#[rstest]
fn test_duplicate_unit_rejected() {
	// Arrange
	let settings = format!("{}{}", SETTINGS, SETTINGS);

	// Act
	let result = PolyglotSettings::from_toml_str(&settings);

	// Assert
	assert!(matches!(result, Err(ConfigError::DuplicateUnit(name)) if name == "cassandra_pu"));
}

/// Test context validation
///
/// This test verifies that:
/// 1. Associations must target a registered entity
/// 2. Every mapped attribute needs an accessor
#[rstest]
#[case::unknown_target(
	EntityMetadata::builder("Author", "authors")
		.id(Attribute::scalar("id", ValueType::String))
		.attribute(Attribute::association("publisher", "Publisher"))
		.build(),
	"Publisher"
)]
#[case::missing_accessor(
	EntityMetadata::builder("Author", "authors")
		.id(Attribute::scalar("id", ValueType::String))
		.attribute(Attribute::scalar("born", ValueType::Int))
		.build(),
	"born"
)]
fn test_context_validation(#[case] metadata: EntityMetadata, #[case] offending: &str) {
	// Act
	let result = MetadataContext::builder()
		.entity::<Author>(metadata)
		.build();

	// Assert
	match result {
		Err(SchemaError::UnknownEntity(name)) => assert_eq!(name, offending),
		Err(SchemaError::MissingAccessor { field, .. }) => assert_eq!(field, offending),
		other => panic!("unexpected result: {:?}", other.map(|_| ())),
	}
}

/// Test metadata lookups
///
/// This test verifies that:
/// 1. Entities are found by name and by type
/// 2. Unknown entities are reported
#[rstest]
fn test_metadata_lookup() {
	// Arrange
	let context = MetadataContext::builder()
		.entity::<Author>(author_metadata("cassandra_pu"))
		.build()
		.unwrap();

	// Act
	let by_type = context.metadata_of::<Author>().unwrap();
	let unknown = context.entity_metadata(user_metadata("cassandra_pu").entity_name());

	// Assert
	assert_eq!(by_type.table(), "authors");
	assert!(matches!(unknown, Err(SchemaError::UnknownEntity(_))));
}

//! MongoDB Query Tests
//!
//! Runs JPA-like queries through `MongoQuery` against the in-memory document store.

mod common;

use bson::doc;
use common::{CassandraEntity, Phone, keys, mongo_context, seeded_document_store, users};
use reinhardt_polyglot::error::{AccessError, BackendError, QueryError};
use reinhardt_polyglot::metadata::MetadataContext;
use reinhardt_polyglot::mongodb::{DocumentBackend, FindOptions, ID_KEY, MongoDBDataHandler, MongoQuery};
use reinhardt_polyglot::query::{QueryParser, QuerySpec};
use reinhardt_polyglot::PolyglotError;
use rstest::{fixture, rstest};

#[fixture]
fn context() -> MetadataContext {
	mongo_context()
}

/// Test filter translation and execution
///
/// This test verifies that:
/// 1. Clauses on different fields become one filter document
/// 2. Only documents matching every clause are returned
/// 3. Embedded values and collections survive the document round trip
#[rstest]
#[tokio::test]
async fn test_select_by_state_and_birth_date(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec = QueryParser::parse(
		"SELECT u FROM CassandraEntity u WHERE u.state = 'UT' AND u.birth_date > 1970",
	)
	.unwrap();
	let query = MongoQuery::new(&context, &store, spec);

	// Act
	let filter = query.filter_document().unwrap();
	let found = query.get_result_list::<CassandraEntity>().await.unwrap();

	// Assert
	assert_eq!(filter, doc! { "state": "UT", "birth_date": { "$gt": 1970 } });
	assert_eq!(keys(&found), vec!["bsanderson"]);
	assert_eq!(found[0], users()[0]);
}

/// Test id storage
///
/// This test verifies that:
/// 1. The id attribute is stored under `_id`
/// 2. Id predicates combine freely with other predicates
#[rstest]
#[tokio::test]
async fn test_id_is_stored_as_document_key(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec = QueryParser::parse(
		"SELECT u FROM CassandraEntity u WHERE u.key = 'bsanderson' AND u.state = 'UT'",
	)
	.unwrap();

	// Act
	let raw = store
		.find_one("users", doc! { "_id": "prothfuss" })
		.await
		.unwrap()
		.unwrap();
	let found = MongoQuery::new(&context, &store, spec)
		.get_result_list::<CassandraEntity>()
		.await
		.unwrap();

	// Assert
	assert_eq!(raw.get_str(ID_KEY).unwrap(), "prothfuss");
	assert!(!raw.contains_key("key"));
	assert_eq!(raw.get_str("full_name").unwrap(), "Patrick Rothfuss");
	assert_eq!(keys(&found), vec!["bsanderson"]);
}

/// Test ordering and LIKE
///
/// This test verifies that:
/// 1. ORDER BY becomes a sort document
/// 2. LIKE patterns match as anchored regular expressions
#[rstest]
#[case("SELECT u FROM CassandraEntity u WHERE u.state = 'UT' ORDER BY u.birth_date", vec!["htayler", "bsanderson"])]
#[case("SELECT u FROM CassandraEntity u WHERE u.state = 'UT' ORDER BY u.birth_date DESC", vec!["bsanderson", "htayler"])]
#[case("SELECT u FROM CassandraEntity u WHERE u.full_name LIKE '%Tay%'", vec!["htayler"])]
#[case("SELECT u FROM CassandraEntity u WHERE u.full_name LIKE 'P_trick%'", vec!["prothfuss"])]
#[case("SELECT u FROM CassandraEntity u WHERE u.full_name LIKE 'Tay%'", vec![])]
#[tokio::test]
async fn test_ordering_and_like(context: MetadataContext, #[case] query: &str, #[case] expected: Vec<&str>) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec = QueryParser::parse(query).unwrap();

	// Act
	let found = MongoQuery::new(&context, &store, spec)
		.get_result_list::<CassandraEntity>()
		.await
		.unwrap();

	// Assert
	assert_eq!(keys(&found), expected);
}

/// Test OR connector
///
/// This test verifies that:
/// 1. OR cannot be translated and the query fails
#[rstest]
#[tokio::test]
async fn test_or_connector_rejected(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec =
		QueryParser::parse("SELECT u FROM CassandraEntity u WHERE u.state = 'UT' OR u.state = 'WI'").unwrap();

	// Act
	let result = MongoQuery::new(&context, &store, spec)
		.get_result_list::<CassandraEntity>()
		.await;

	// Assert
	assert!(matches!(
		result,
		Err(PolyglotError::Query(QueryError::UnsupportedConnector { .. }))
	));
}

/// Test projection
///
/// This test verifies that:
/// 1. Only the selected fields are fetched
/// 2. The id is always populated
#[rstest]
#[tokio::test]
async fn test_projection(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec =
		QueryParser::parse("SELECT u.full_name FROM CassandraEntity u WHERE u.state = 'WI'").unwrap();

	// Act
	let found = MongoQuery::new(&context, &store, spec)
		.get_result_list::<CassandraEntity>()
		.await
		.unwrap();

	// Assert
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].key, "prothfuss");
	assert_eq!(found[0].full_name, "Patrick Rothfuss");
	assert!(found[0].state.is_empty());
}

/// Test native filter documents
///
/// This test verifies that:
/// 1. A native query is a JSON filter document run verbatim
/// 2. Native statements cannot be executed as updates
/// 3. Malformed native text is reported as an invalid native query
#[rstest]
#[tokio::test]
async fn test_native_filter(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let native = QuerySpec::native(r#"{"state": "WI"}"#, "CassandraEntity");
	let malformed = QuerySpec::native("[1, 2]", "CassandraEntity");

	// Act
	let found = MongoQuery::new(&context, &store, native.clone())
		.get_result_list::<CassandraEntity>()
		.await
		.unwrap();
	let update = MongoQuery::new(&context, &store, native).execute_update().await;
	let invalid = MongoQuery::new(&context, &store, malformed)
		.get_result_list::<CassandraEntity>()
		.await;

	// Assert
	assert_eq!(keys(&found), vec!["prothfuss"]);
	assert!(matches!(
		update,
		Err(PolyglotError::Backend(BackendError::UnsupportedFeature(_)))
	));
	assert!(matches!(
		invalid,
		Err(PolyglotError::Query(QueryError::InvalidNativeQuery { .. }))
	));
}

/// Test embedded object extraction
///
/// This test verifies that:
/// 1. Elements of embedded collections are flattened across documents
/// 2. Asking for a non-embedded field fails
#[rstest]
#[tokio::test]
async fn test_embedded_objects(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let metadata = context.entity_metadata("CassandraEntity").unwrap();
	let documents = store
		.find_many("users", doc! {}, FindOptions::new())
		.await
		.unwrap();
	let handler = MongoDBDataHandler::new(&context);

	// Act
	let phones = handler
		.embedded_objects::<Phone>(metadata, "phones", &documents)
		.unwrap();
	let not_embedded = handler.embedded_objects::<Phone>(metadata, "full_name", &documents);

	// Assert
	assert_eq!(phones, users()[0].phones);
	assert!(matches!(not_embedded, Err(AccessError::NoAccessor { .. })));
}

/// Test DELETE queries
///
/// This test verifies that:
/// 1. Matching documents are removed and counted
#[rstest]
#[tokio::test]
async fn test_delete_removes_matching_documents(context: MetadataContext) {
	// Arrange
	let store = seeded_document_store(&context).await;
	let spec = QueryParser::parse("DELETE FROM CassandraEntity u WHERE u.birth_date < 1975").unwrap();

	// Act
	let deleted = MongoQuery::new(&context, &store, spec).execute_update().await.unwrap();

	// Assert
	assert_eq!(deleted, 2);
	assert_eq!(store.len("users").await, 1);
}

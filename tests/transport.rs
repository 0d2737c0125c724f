//! Transport Form Tests
//!
//! Stores an entity carrying arbitrary precision, calendar, date and timestamp
//! fields on both backends and reads it back.

mod common;

use bson::{Bson, doc};
use common::{Event, cassandra_context, column_store, event, mongo_context, put_document, put_row};
use reinhardt_polyglot::backends::memory::InMemoryDocumentStore;
use reinhardt_polyglot::cassandra::{CassQuery, CassandraDataHandler};
use reinhardt_polyglot::mongodb::{DocumentBackend, ID_KEY, MongoDBDataHandler, MongoQuery};
use reinhardt_polyglot::query::QueryParser;
use reinhardt_polyglot::{Loaded, Materialized};
use rstest::rstest;

const BY_START: &str = "SELECT e FROM Event e WHERE e.starts_at = '2010-08-31T19:30:00Z'";

/// Test the row form of string-transported and temporal fields
///
/// This test verifies that:
/// 1. Calendar ids and fields, decimals and big integers are written as text
/// 2. Dates and timestamps are written as epoch milliseconds
/// 3. Every field reads back unchanged
/// 4. A calendar literal finds the row by key
#[rstest]
#[tokio::test]
async fn test_row_round_trip() {
	// Arrange
	let context = cassandra_context();
	let metadata = context.entity_metadata("Event").unwrap();
	let handler = CassandraDataHandler::new(&context);
	let store = column_store(&context);
	put_row(&context, &store, &event(), &[]).await;

	// Act
	let row = handler
		.to_thrift_row(metadata, &event(), &[])
		.unwrap()
		.into_strict()
		.unwrap();
	let read = handler.from_thrift_row::<Event>(metadata, &row, &[]);
	let found = CassQuery::new(&context, &store, QueryParser::parse(BY_START).unwrap())
		.get_result_list::<Event>()
		.await
		.unwrap();

	// Assert
	assert_eq!(&row.id[..], b"2010-08-31T19:30:00.000Z");
	assert_eq!(&row.column("budget").unwrap().value[..], b"1250.50");
	assert_eq!(
		&row.column("attendance").unwrap().value[..],
		b"123456789012345678901234567890"
	);
	assert_eq!(
		&row.column("day").unwrap().value[..],
		&1_283_212_800_000_i64.to_be_bytes()
	);
	assert_eq!(row.column("logged_at").unwrap().value.len(), 8);
	assert!(matches!(read, Materialized::Complete(Loaded::Plain(ref e)) if *e == event()));
	assert_eq!(found, vec![event()]);
}

/// Test the document form of string-transported and temporal fields
///
/// This test verifies that:
/// 1. Calendar ids, calendar fields and calendar list elements are stored as strings
/// 2. Decimals and big integers are stored as strings
/// 3. Dates and timestamps are stored as BSON datetimes
/// 4. Every field reads back unchanged
/// 5. A calendar literal in a filter matches the stored id
#[rstest]
#[tokio::test]
async fn test_document_round_trip() {
	// Arrange
	let context = mongo_context();
	let metadata = context.entity_metadata("Event").unwrap();
	let handler = MongoDBDataHandler::new(&context);
	let store = InMemoryDocumentStore::new();
	put_document(&context, &store, &event(), &[]).await;
	let query = MongoQuery::new(&context, &store, QueryParser::parse(BY_START).unwrap());

	// Act
	let document = handler
		.to_document(metadata, &event(), &[])
		.unwrap()
		.into_strict()
		.unwrap();
	let read = handler.from_document::<Event>(metadata, &document, &[]);
	let stored = store
		.find_one("events", doc! { "_id": "2010-08-31T19:30:00.000Z" })
		.await
		.unwrap();
	let filter = query.filter_document().unwrap();
	let found = query.get_result_list::<Event>().await.unwrap();

	// Assert
	assert_eq!(document.get_str(ID_KEY).unwrap(), "2010-08-31T19:30:00.000Z");
	assert_eq!(document.get_str("budget").unwrap(), "1250.50");
	assert_eq!(document.get_str("attendance").unwrap(), "123456789012345678901234567890");
	assert_eq!(
		document.get_array("reminders").unwrap(),
		&vec![Bson::String("2010-08-30T09:00:00.000Z".to_string())]
	);
	assert!(matches!(document.get("day"), Some(Bson::DateTime(_))));
	assert!(matches!(document.get("logged_at"), Some(Bson::DateTime(_))));
	assert!(matches!(read, Materialized::Complete(Loaded::Plain(ref e)) if *e == event()));
	assert!(stored.is_some());
	assert_eq!(filter, doc! { "_id": "2010-08-31T19:30:00.000Z" });
	assert_eq!(found, vec![event()]);
}

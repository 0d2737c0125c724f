//! Shared entities, metadata and seed data for the integration tests

#![allow(dead_code)]

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;

use reinhardt_polyglot::backends::memory::{InMemoryColumnStore, InMemoryDocumentStore};
use reinhardt_polyglot::cassandra::{CassandraDataHandler, ColumnBackend};
use reinhardt_polyglot::config::{BackendKind, PersistenceUnitConfig};
use reinhardt_polyglot::entity::{AccessorTable, Embeddable, Entity, Mapped, RelationHolder};
use reinhardt_polyglot::metadata::{
	Attribute, EmbeddableMetadata, EntityMetadata, MetadataContext, ValueType,
};
use reinhardt_polyglot::mongodb::{DocumentBackend, MongoDBDataHandler};

pub const CASSANDRA_UNIT: &str = "cassandra_pu";
pub const MONGO_UNIT: &str = "mongo_pu";
pub const KEYSPACE: &str = "KunderaExamples";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
	pub street: String,
	pub city: String,
}

impl Mapped for Address {
	const NAME: &'static str = "Address";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Address>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("street", |a| a.street.clone(), |a, v| a.street = v)
				.field("city", |a| a.city.clone(), |a, v| a.city = v)
				.build()
		})
	}
}

impl Embeddable for Address {}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Phone {
	pub kind: String,
	pub number: String,
}

impl Mapped for Phone {
	const NAME: &'static str = "Phone";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Phone>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("kind", |p| p.kind.clone(), |p, v| p.kind = v)
				.field("number", |p| p.number.clone(), |p, v| p.number = v)
				.build()
		})
	}
}

impl Embeddable for Phone {}

/// User row of the `users` column family / collection
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CassandraEntity {
	pub key: String,
	pub full_name: String,
	pub birth_date: i32,
	pub state: String,
	pub tags: Vec<String>,
	pub address: Address,
	pub phones: Vec<Phone>,
}

impl Mapped for CassandraEntity {
	const NAME: &'static str = "CassandraEntity";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<CassandraEntity>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("key", |e| e.key.clone(), |e, v| e.key = v)
				.field("full_name", |e| e.full_name.clone(), |e, v| e.full_name = v)
				.field("birth_date", |e| e.birth_date, |e, v| e.birth_date = v)
				.field("state", |e| e.state.clone(), |e, v| e.state = v)
				.field("tags", |e| e.tags.clone(), |e, v| e.tags = v)
				.embedded("address", |e| e.address.clone(), |e, v| e.address = v)
				.embedded_collection("phones", |e| e.phones.clone(), |e, v| e.phones = v)
				.build()
		})
	}
}

impl Entity for CassandraEntity {}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Author {
	pub id: String,
	pub name: String,
}

impl Mapped for Author {
	const NAME: &'static str = "Author";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Author>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("id", |a| a.id.clone(), |a, v| a.id = v)
				.field("name", |a| a.name.clone(), |a, v| a.name = v)
				.build()
		})
	}
}

impl Entity for Author {}

/// Book whose author is attached by a relation resolver
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Book {
	pub isbn: String,
	pub title: String,
	pub author: Option<Author>,
}

impl Mapped for Book {
	const NAME: &'static str = "Book";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Book>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("isbn", |b| b.isbn.clone(), |b, v| b.isbn = v)
				.field("title", |b| b.title.clone(), |b, v| b.title = v)
				.build()
		})
	}
}

impl Entity for Book {}

/// Publisher keyed by a numeric id
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Publisher {
	pub id: i64,
	pub name: String,
}

impl Mapped for Publisher {
	const NAME: &'static str = "Publisher";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Publisher>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("id", |p| p.id, |p, v| p.id = v)
				.field("name", |p| p.name.clone(), |p, v| p.name = v)
				.build()
		})
	}
}

impl Entity for Publisher {}

/// Event keyed by its calendar start, with arbitrary precision and temporal fields
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Event {
	pub starts_at: DateTime<Utc>,
	pub budget: Decimal,
	pub attendance: BigInt,
	pub day: NaiveDate,
	pub logged_at: DateTime<Utc>,
	pub reminders: Vec<DateTime<Utc>>,
}

impl Mapped for Event {
	const NAME: &'static str = "Event";

	fn accessors() -> &'static AccessorTable<Self> {
		static TABLE: OnceLock<AccessorTable<Event>> = OnceLock::new();
		TABLE.get_or_init(|| {
			AccessorTable::<Self>::builder(Self::NAME)
				.field("starts_at", |e| e.starts_at, |e, v| e.starts_at = v)
				.field("budget", |e| e.budget, |e, v| e.budget = v)
				.field("attendance", |e| e.attendance.clone(), |e, v| e.attendance = v)
				.field("day", |e| e.day, |e, v| e.day = v)
				.field("logged_at", |e| e.logged_at, |e, v| e.logged_at = v)
				.field("reminders", |e| e.reminders.clone(), |e, v| e.reminders = v)
				.build()
		})
	}
}

impl Entity for Event {}

pub fn user_metadata(unit: &str) -> EntityMetadata {
	EntityMetadata::builder("CassandraEntity", "users")
		.persistence_unit(unit)
		.id(Attribute::scalar("key", ValueType::String))
		.attribute(Attribute::scalar("full_name", ValueType::String))
		.attribute(Attribute::scalar("birth_date", ValueType::Int))
		.attribute(Attribute::scalar("state", ValueType::String))
		.attribute(Attribute::list("tags", ValueType::String))
		.attribute(Attribute::embedded("address", "Address"))
		.attribute(Attribute::embedded_collection("phones", "Phone"))
		.build()
}

pub fn author_metadata(unit: &str) -> EntityMetadata {
	EntityMetadata::builder("Author", "authors")
		.persistence_unit(unit)
		.id(Attribute::scalar("id", ValueType::String))
		.attribute(Attribute::scalar("name", ValueType::String))
		.build()
}

pub fn book_metadata(unit: &str) -> EntityMetadata {
	EntityMetadata::builder("Book", "books")
		.persistence_unit(unit)
		.id(Attribute::scalar("isbn", ValueType::String))
		.attribute(Attribute::scalar("title", ValueType::String))
		.attribute(Attribute::association("author", "Author").column("author_id"))
		.attribute(Attribute::association("publisher", "Publisher").column("publisher_id"))
		.build()
}

pub fn publisher_metadata(unit: &str) -> EntityMetadata {
	EntityMetadata::builder("Publisher", "publishers")
		.persistence_unit(unit)
		.id(Attribute::scalar("id", ValueType::Long))
		.attribute(Attribute::scalar("name", ValueType::String))
		.build()
}

pub fn event_metadata(unit: &str) -> EntityMetadata {
	EntityMetadata::builder("Event", "events")
		.persistence_unit(unit)
		.id(Attribute::scalar("starts_at", ValueType::Calendar))
		.attribute(Attribute::scalar("budget", ValueType::Decimal))
		.attribute(Attribute::scalar("attendance", ValueType::BigInteger))
		.attribute(Attribute::scalar("day", ValueType::Date))
		.attribute(Attribute::scalar("logged_at", ValueType::Timestamp))
		.attribute(Attribute::list("reminders", ValueType::Calendar))
		.build()
}

/// Context with every test entity bound to one persistence unit
pub fn context(unit: PersistenceUnitConfig) -> MetadataContext {
	let name = unit.name.clone();
	MetadataContext::builder()
		.persistence_unit(unit)
		.embeddable::<Address>(EmbeddableMetadata::new(
			"Address",
			vec![
				Attribute::scalar("street", ValueType::String),
				Attribute::scalar("city", ValueType::String),
			],
		))
		.embeddable::<Phone>(EmbeddableMetadata::new(
			"Phone",
			vec![
				Attribute::scalar("kind", ValueType::String),
				Attribute::scalar("number", ValueType::String),
			],
		))
		.entity::<CassandraEntity>(user_metadata(&name))
		.entity::<Author>(author_metadata(&name))
		.entity::<Book>(book_metadata(&name))
		.entity::<Publisher>(publisher_metadata(&name))
		.entity::<Event>(event_metadata(&name))
		.native_query("SELECT full_name FROM users WHERE state = 'UT'")
		.build()
		.unwrap()
}

pub fn cassandra_context() -> MetadataContext {
	context(PersistenceUnitConfig::new(CASSANDRA_UNIT, BackendKind::Cassandra, KEYSPACE))
}

pub fn mongo_context() -> MetadataContext {
	context(PersistenceUnitConfig::new(MONGO_UNIT, BackendKind::MongoDB, KEYSPACE))
}

pub fn user(key: &str, full_name: &str, birth_date: i32, state: &str) -> CassandraEntity {
	CassandraEntity {
		key: key.to_string(),
		full_name: full_name.to_string(),
		birth_date,
		state: state.to_string(),
		..Default::default()
	}
}

/// The three users every query scenario runs against
pub fn users() -> Vec<CassandraEntity> {
	vec![
		CassandraEntity {
			tags: vec!["mistborn".to_string(), "stormlight".to_string()],
			address: Address {
				street: "1 Cosmere Way".to_string(),
				city: "Provo".to_string(),
			},
			phones: vec![
				Phone {
					kind: "home".to_string(),
					number: "555-0100".to_string(),
				},
				Phone {
					kind: "work".to_string(),
					number: "555-0101".to_string(),
				},
			],
			..user("bsanderson", "Brandon Sanderson", 1975, "UT")
		},
		user("prothfuss", "Patrick Rothfuss", 1973, "WI"),
		user("htayler", "Howard Tayler", 1968, "UT"),
	]
}

/// Launch party of a book, stored with every string-transported and temporal type
pub fn event() -> Event {
	Event {
		starts_at: Utc.with_ymd_and_hms(2010, 8, 31, 19, 30, 0).unwrap(),
		budget: Decimal::new(125_050, 2),
		attendance: "123456789012345678901234567890".parse().unwrap(),
		day: NaiveDate::from_ymd_opt(2010, 8, 31).unwrap(),
		logged_at: Utc.with_ymd_and_hms(2010, 9, 1, 8, 0, 0).unwrap(),
		reminders: vec![Utc.with_ymd_and_hms(2010, 8, 30, 9, 0, 0).unwrap()],
	}
}

pub fn column_store(context: &MetadataContext) -> InMemoryColumnStore {
	let mut store = InMemoryColumnStore::new();
	for entity in ["CassandraEntity", "Author", "Book", "Publisher", "Event"] {
		store = store.with_column_family(context.entity_metadata(entity).unwrap());
	}
	store
}

/// Write `entity` to the column store through the row handler
pub async fn put_row<E: Entity>(
	context: &MetadataContext,
	store: &InMemoryColumnStore,
	entity: &E,
	relations: &[RelationHolder],
) {
	let metadata = context.metadata_of::<E>().unwrap();
	let row = CassandraDataHandler::new(context)
		.to_thrift_row(metadata, entity, relations)
		.unwrap()
		.into_strict()
		.unwrap();
	store.insert(KEYSPACE, row).await.unwrap();
}

/// Write `entity` to the document store through the document handler
pub async fn put_document<E: Entity>(
	context: &MetadataContext,
	store: &InMemoryDocumentStore,
	entity: &E,
	relations: &[RelationHolder],
) {
	let metadata = context.metadata_of::<E>().unwrap();
	let document = MongoDBDataHandler::new(context)
		.to_document(metadata, entity, relations)
		.unwrap()
		.into_strict()
		.unwrap();
	store.insert_one(metadata.table(), document).await.unwrap();
}

pub async fn seeded_column_store(context: &MetadataContext) -> InMemoryColumnStore {
	let store = column_store(context);
	for user in users() {
		put_row(context, &store, &user, &[]).await;
	}
	store
}

pub async fn seeded_document_store(context: &MetadataContext) -> InMemoryDocumentStore {
	let store = InMemoryDocumentStore::new();
	for user in users() {
		put_document(context, &store, &user, &[]).await;
	}
	store
}

pub fn keys(users: &[CassandraEntity]) -> Vec<&str> {
	users.iter().map(|user| user.key.as_str()).collect()
}

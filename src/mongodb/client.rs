//! Document backend contract and the MongoDB driver implementation
//!
//! The query shim talks to [`DocumentBackend`]. [`MongoDBBackend`] implements
//! it over the official driver and is compiled with the `mongodb` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use reinhardt_polyglot::mongodb::{DocumentBackend, FindOptions, MongoDBBackend};
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MongoDBBackend::connect("mongodb://localhost:27017")
//!     .await?
//!     .with_database("KunderaExamples");
//!
//! let users = backend
//!     .find_many("users", doc! { "state": "UT" }, FindOptions::new().limit(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::error::BackendError;

/// Result type for document backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Options for [`DocumentBackend::find_many`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
	pub limit: Option<i64>,
	pub skip: Option<u64>,
	pub sort: Option<Document>,
	pub projection: Option<Document>,
	pub batch_size: Option<u32>,
}

impl FindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn skip(mut self, skip: u64) -> Self {
		self.skip = Some(skip);
		self
	}

	/// Sort document, e.g. `{ "birth_date": -1 }`
	pub fn sort(mut self, sort: Document) -> Self {
		self.sort = Some(sort);
		self
	}

	/// Projection document, e.g. `{ "full_name": 1 }`
	pub fn projection(mut self, projection: Document) -> Self {
		self.projection = Some(projection);
		self
	}

	pub fn batch_size(mut self, batch_size: u32) -> Self {
		self.batch_size = Some(batch_size);
		self
	}
}

/// Collection operations used by the query shim
#[async_trait]
pub trait DocumentBackend: Send + Sync {
	/// Find a single document matching the filter
	///
	/// # Returns
	///
	/// `Some(document)` if found, `None` otherwise
	async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>>;

	/// Find documents matching the filter
	///
	/// # Arguments
	///
	/// * `collection` - Collection name
	/// * `filter` - Query filter document
	/// * `options` - Limit, skip, sort and projection
	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> BackendResult<Vec<Document>>;

	/// Insert a document
	///
	/// # Returns
	///
	/// The inserted `_id` rendered as a string
	async fn insert_one(&self, collection: &str, document: Document) -> BackendResult<String>;

	/// Delete every document matching the filter
	///
	/// # Returns
	///
	/// Number of documents deleted
	async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64>;
}

/// Render an inserted `_id` as a string
pub(crate) fn id_to_string(id: Bson) -> String {
	match id {
		Bson::ObjectId(oid) => oid.to_hex(),
		Bson::String(s) => s,
		other => other.to_string(),
	}
}

#[cfg(feature = "mongodb")]
pub use driver::{MongoDBBackend, MongoDBBackendBuilder};

#[cfg(feature = "mongodb")]
mod driver {
	use std::sync::Arc;
	use std::time::Duration;

	use async_trait::async_trait;
	use bson::Document;
	use ::mongodb::options::ClientOptions;
	use ::mongodb::{Client, Database};

	use super::{BackendResult, DocumentBackend, FindOptions, id_to_string};
	use crate::config::PersistenceUnitConfig;
	use crate::error::BackendError;

	/// MongoDB backend over the official driver
	///
	/// # Example
	///
	/// ```rust,no_run
	/// use reinhardt_polyglot::mongodb::MongoDBBackend;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let backend = MongoDBBackend::builder()
	///     .url("mongodb://localhost:27017")
	///     .database("KunderaExamples")
	///     .max_pool_size(100)
	///     .build()
	///     .await?;
	/// # Ok(())
	/// # }
	/// ```
	#[derive(Clone)]
	pub struct MongoDBBackend {
		client: Arc<Client>,
		database_name: String,
	}

	/// Builder for configuring MongoDB connections
	pub struct MongoDBBackendBuilder {
		pub(super) url: String,
		pub(super) database: String,
		pub(super) max_pool_size: Option<u32>,
		pub(super) min_pool_size: Option<u32>,
		pub(super) max_idle_time_secs: Option<u64>,
	}

	impl Default for MongoDBBackendBuilder {
		fn default() -> Self {
			Self::new()
		}
	}

	impl MongoDBBackendBuilder {
		pub fn new() -> Self {
			Self {
				url: "mongodb://localhost:27017".to_string(),
				database: "test".to_string(),
				max_pool_size: None,
				min_pool_size: None,
				max_idle_time_secs: None,
			}
		}

		/// Builder pointing at the nodes and keyspace of a persistence unit
		pub fn from_unit(unit: &PersistenceUnitConfig) -> Self {
			Self::new().url(unit.mongodb_uri()).database(unit.keyspace.clone())
		}

		pub fn url(mut self, url: impl Into<String>) -> Self {
			self.url = url.into();
			self
		}

		pub fn database(mut self, database: impl Into<String>) -> Self {
			self.database = database.into();
			self
		}

		pub fn max_pool_size(mut self, size: u32) -> Self {
			self.max_pool_size = Some(size);
			self
		}

		pub fn min_pool_size(mut self, size: u32) -> Self {
			self.min_pool_size = Some(size);
			self
		}

		/// Set the maximum idle time for connections in seconds
		pub fn max_idle_time_secs(mut self, secs: u64) -> Self {
			self.max_idle_time_secs = Some(secs);
			self
		}

		/// Build the MongoDB backend
		///
		/// # Errors
		///
		/// [`BackendError::ConnectionError`] when the URL cannot be parsed or
		/// the client cannot be created.
		pub async fn build(self) -> BackendResult<MongoDBBackend> {
			let mut options = ClientOptions::parse(&self.url)
				.await
				.map_err(|e| BackendError::ConnectionError(e.to_string()))?;

			if let Some(max_size) = self.max_pool_size {
				options.max_pool_size = Some(max_size);
			}
			if let Some(min_size) = self.min_pool_size {
				options.min_pool_size = Some(min_size);
			}
			if let Some(idle_time) = self.max_idle_time_secs {
				options.max_idle_time = Some(Duration::from_secs(idle_time));
			}

			let client =
				Client::with_options(options).map_err(|e| BackendError::ConnectionError(e.to_string()))?;

			Ok(MongoDBBackend {
				client: Arc::new(client),
				database_name: self.database,
			})
		}
	}

	impl MongoDBBackend {
		/// Connect using a connection string; the database defaults to `test`
		pub async fn connect(url: &str) -> BackendResult<Self> {
			let client = Client::with_uri_str(url)
				.await
				.map_err(|e| BackendError::ConnectionError(e.to_string()))?;

			Ok(Self {
				client: Arc::new(client),
				database_name: "test".to_string(),
			})
		}

		pub fn builder() -> MongoDBBackendBuilder {
			MongoDBBackendBuilder::new()
		}

		pub fn with_database(mut self, database_name: &str) -> Self {
			self.database_name = database_name.to_string();
			self
		}

		pub fn database(&self) -> Database {
			self.client.database(&self.database_name)
		}
	}

	#[async_trait]
	impl DocumentBackend for MongoDBBackend {
		async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>> {
			let coll = self.database().collection::<Document>(collection);
			coll.find_one(filter)
				.await
				.map_err(|e| BackendError::ExecutionError(e.to_string()))
		}

		async fn find_many(
			&self,
			collection: &str,
			filter: Document,
			options: FindOptions,
		) -> BackendResult<Vec<Document>> {
			use futures::stream::TryStreamExt;

			let coll = self.database().collection::<Document>(collection);

			let mut mongo_options = ::mongodb::options::FindOptions::default();
			mongo_options.limit = options.limit;
			mongo_options.skip = options.skip;
			mongo_options.sort = options.sort;
			mongo_options.projection = options.projection;
			mongo_options.batch_size = options.batch_size;

			let cursor = coll
				.find(filter)
				.with_options(mongo_options)
				.await
				.map_err(|e| BackendError::ExecutionError(e.to_string()))?;

			cursor
				.try_collect()
				.await
				.map_err(|e| BackendError::ExecutionError(e.to_string()))
		}

		async fn insert_one(&self, collection: &str, document: Document) -> BackendResult<String> {
			let coll = self.database().collection::<Document>(collection);
			let result = coll
				.insert_one(document)
				.await
				.map_err(|e| BackendError::ExecutionError(e.to_string()))?;
			Ok(id_to_string(result.inserted_id))
		}

		async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64> {
			let coll = self.database().collection::<Document>(collection);
			let result = coll
				.delete_many(filter)
				.await
				.map_err(|e| BackendError::ExecutionError(e.to_string()))?;
			Ok(result.deleted_count)
		}
	}
}

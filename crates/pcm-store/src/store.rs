//! Document-store seam and its MongoDB implementation.
//!
//! The DAOs talk to a [`DocumentStore`]: `find`, `find_one`, `aggregate` and
//! `count` against named collections. [`MongoStore`] is the production
//! backend; [`crate::memory::MemoryStore`] runs the same queries in process.

use std::future::Future;

use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::pipeline::{FindQuery, Stage, to_pipeline};

/// Configuration for connecting to MongoDB.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// MongoDB connection string.
    pub uri: String,
    /// Database holding the product collections.
    pub database: String,
    /// Maximum number of pooled connections.
    pub max_pool_size: u32,
    /// Minimum number of pooled connections to maintain.
    pub min_pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "pcm-local".to_string(),
            max_pool_size: 10,
            min_pool_size: 1,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `MONGODB_URI` - Required connection string
    /// - `MONGODB_DATABASE` - Optional, defaults to `pcm-<env>` where `<env>`
    ///   is the lowercased `APP_ENV` (default `local`)
    /// - `MONGODB_MAX_POOL_SIZE` - Optional, defaults to 10
    /// - `MONGODB_MIN_POOL_SIZE` - Optional, defaults to 1
    pub fn from_env() -> StoreResult<Self> {
        let uri = std::env::var("MONGODB_URI").map_err(|_| {
            StoreError::ConfigError("MONGODB_URI environment variable not set".to_string())
        })?;

        let database = std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| {
            let env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
            format!("pcm-{}", env.to_lowercase())
        });

        let max_pool_size = std::env::var("MONGODB_MAX_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("MONGODB_MIN_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Ok(Self {
            uri,
            database,
            max_pool_size,
            min_pool_size,
        })
    }
}

/// Asynchronous access to named document collections.
///
/// Implementations report their own failures; the DAOs decide how those
/// surface to callers.
pub trait DocumentStore: Send + Sync {
    /// Documents matching a filtered, projected, sorted and paged query.
    fn find(
        &self,
        collection: &str,
        query: FindQuery,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// First document matching `filter`, if any.
    fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Run an aggregation pipeline.
    fn aggregate(
        &self,
        collection: &str,
        stages: Vec<Stage>,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Number of documents matching `filter`.
    fn count(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// MongoDB-backed document store.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connect with the given configuration and verify the server answers.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        tracing::info!(database = %config.database, "Connecting to MongoDB...");

        let mut options = ClientOptions::parse(&config.uri).await?;
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.app_name = Some("pcm-api".to_string());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }).await?;

        tracing::info!("Connected to MongoDB");
        Ok(Self { database })
    }

    /// Wrap an existing database handle.
    pub fn from_database(database: Database) -> Self {
        Self { database }
    }

    /// Get a reference to the database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, query: FindQuery) -> StoreResult<Vec<Document>> {
        let coll = self.collection(collection);
        let mut find = coll.find(query.filter);
        if let Some(projection) = query.projection {
            find = find.projection(projection);
        }
        if let Some(sort) = query.sort {
            find = find.sort(sort);
        }
        if let Some(skip) = query.skip {
            let skip = u64::try_from(skip)
                .map_err(|_| StoreError::InvalidQuery("skip must be non-negative".into()))?;
            find = find.skip(skip);
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit);
        }
        let cursor = find.await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        let coll = self.collection(collection);
        let mut find = coll.find_one(filter);
        if let Some(projection) = projection {
            find = find.projection(projection);
        }
        Ok(find.await?)
    }

    async fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .aggregate(to_pipeline(&stages))
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn count(&self, collection: &str, filter: Document) -> StoreResult<u64> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }
}

/// The store backend selected at startup.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Mongo(MongoStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    /// Human-readable backend name for logs and health output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mongo(_) => "mongo",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<MongoStore> for StoreBackend {
    fn from(store: MongoStore) -> Self {
        Self::Mongo(store)
    }
}

impl From<MemoryStore> for StoreBackend {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl DocumentStore for StoreBackend {
    async fn find(&self, collection: &str, query: FindQuery) -> StoreResult<Vec<Document>> {
        match self {
            Self::Mongo(s) => s.find(collection, query).await,
            Self::Memory(s) => s.find(collection, query).await,
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        match self {
            Self::Mongo(s) => s.find_one(collection, filter, projection).await,
            Self::Memory(s) => s.find_one(collection, filter, projection).await,
        }
    }

    async fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> StoreResult<Vec<Document>> {
        match self {
            Self::Mongo(s) => s.aggregate(collection, stages).await,
            Self::Memory(s) => s.aggregate(collection, stages).await,
        }
    }

    async fn count(&self, collection: &str, filter: Document) -> StoreResult<u64> {
        match self {
            Self::Mongo(s) => s.count(collection, filter).await,
            Self::Memory(s) => s.count(collection, filter).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.min_pool_size, 1);
        assert_eq!(config.database, "pcm-local");
    }

    #[tokio::test]
    async fn test_backend_dispatches_to_memory() {
        let memory = MemoryStore::new();
        memory.insert_one("books", doc! { "_id": "B1" }).await;
        let backend = StoreBackend::from(memory);
        assert_eq!(backend.name(), "memory");
        assert_eq!(backend.count("books", doc! {}).await.unwrap(), 1);
    }
}

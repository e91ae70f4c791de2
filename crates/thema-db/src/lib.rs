//! # thema-db
//!
//! PostgreSQL + pgvector storage layer for the Thema ETL + RAG chat engine.
//!
//! This crate provides:
//! - Connection pool management
//! - `PgJobStore` — ETL job tracking + lazy user creation (§4.A)
//! - `PgDocumentRepository` — transactional replace-by-user document storage (§4.G)
//! - `LegacyQueryExecutor` — named source-query catalog with retry (§4.D)
//! - In-memory fakes of both trait seams for fast unit tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use thema_db::{Database, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/thema").await?;
//!     let user_id = db.jobs.ensure_user(123456).await?;
//!     Ok(())
//! }
//! ```

pub mod documents;
pub mod jobs;
pub mod legacy;
pub mod memory;
pub mod pool;

pub use documents::PgDocumentRepository;
pub use jobs::PgJobStore;
pub use legacy::{LegacyQueryExecutor, QueryResult, CORE_QUERIES, PADDED_QUERIES};
pub use memory::{MemoryDocumentRepository, MemoryJobStore};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

use thema_core::Result;

/// Combined database context with both repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self { pool }
    }

    pub fn jobs(&self) -> PgJobStore {
        PgJobStore::new(self.pool.clone())
    }

    pub fn documents(&self) -> PgDocumentRepository {
        PgDocumentRepository::new(self.pool.clone())
    }

    pub fn legacy_queries(&self) -> LegacyQueryExecutor {
        LegacyQueryExecutor::new(self.pool.clone())
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| thema_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

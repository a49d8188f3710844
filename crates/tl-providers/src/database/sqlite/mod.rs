//! SQLite metadata store.
//!
//! The database handle is the factory for repository instances; all of them
//! share one connection pool. The schema is applied idempotently on connect,
//! WAL mode keeps concurrent readers cheap.

mod ddl;
mod item_repository;
mod pipeline_run_repository;
mod plugin_health_repository;
mod row;
mod source_repository;
mod topic_repository;
mod trend_repository;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use tl_domain::error::Result;
use tl_domain::ports::{
    CollectorSourceRepository, ItemRepository, PipelineRunRepository, PluginHealthRepository,
    TopicRepository, TrendRepository,
};

pub use item_repository::SqliteItemRepository;
pub use pipeline_run_repository::SqlitePipelineRunRepository;
pub use plugin_health_repository::SqlitePluginHealthRepository;
pub use source_repository::SqliteCollectorSourceRepository;
pub use topic_repository::SqliteTopicRepository;
pub use trend_repository::SqliteTrendRepository;

use row::db_err;

/// Pool wrapper and repository factory.
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) a database file and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns a database error when the file cannot be opened or the DDL
    /// fails to apply.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);
        Self::connect_with(options).await
    }

    /// In-memory database, for tests and ephemeral runs.
    ///
    /// # Errors
    ///
    /// Returns a database error when the DDL fails to apply.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_err)?
            .foreign_keys(true);
        // One connection: every pooled connection of a :memory: database is
        // its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(ddl::DDL).execute(&pool).await.map_err(db_err)?;
        Ok(Self { pool })
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(ddl::DDL).execute(&pool).await.map_err(db_err)?;
        Ok(Self { pool })
    }

    /// The underlying pool, for repository constructors.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Trend repository over this database.
    #[must_use]
    pub fn trend_repository(&self) -> Arc<dyn TrendRepository> {
        Arc::new(SqliteTrendRepository::new(self.pool.clone()))
    }

    /// Topic repository over this database.
    #[must_use]
    pub fn topic_repository(&self) -> Arc<dyn TopicRepository> {
        Arc::new(SqliteTopicRepository::new(self.pool.clone()))
    }

    /// Item repository over this database.
    #[must_use]
    pub fn item_repository(&self) -> Arc<dyn ItemRepository> {
        Arc::new(SqliteItemRepository::new(self.pool.clone()))
    }

    /// Plugin-health repository over this database.
    #[must_use]
    pub fn plugin_health_repository(&self) -> Arc<dyn PluginHealthRepository> {
        Arc::new(SqlitePluginHealthRepository::new(self.pool.clone()))
    }

    /// Collector-source repository over this database.
    #[must_use]
    pub fn collector_source_repository(&self) -> Arc<dyn CollectorSourceRepository> {
        Arc::new(SqliteCollectorSourceRepository::new(self.pool.clone()))
    }

    /// Pipeline-run repository over this database.
    #[must_use]
    pub fn pipeline_run_repository(&self) -> Arc<dyn PipelineRunRepository> {
        Arc::new(SqlitePipelineRunRepository::new(self.pool.clone()))
    }
}

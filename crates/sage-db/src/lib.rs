//! # sage-db
//!
//! SQLite persistence for datasage: the conversation ledger and ingested
//! business records, plus pool management and embedded migrations.

pub mod conversations;
pub mod pool;
pub mod records;

use sqlx::SqlitePool;
use tracing::info;

use sage_core::Result;

pub use conversations::SqliteConversationStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use records::{BusinessRecord, ChartDataset, ChartPayload, SqliteRecordStore, TopCustomer};

/// Database handle bundling the pool with its repositories.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    conversations: SqliteConversationStore,
    records: SqliteRecordStore,
}

impl Database {
    /// Connect to the database and run pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running pending migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| sage_core::Error::Database(e.into()))?;

        info!(
            subsystem = "ledger",
            component = "database",
            op = "migrate",
            "Database migrations applied"
        );

        Ok(Self {
            conversations: SqliteConversationStore::new(pool.clone()),
            records: SqliteRecordStore::new(pool.clone()),
            pool,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn conversations(&self) -> &SqliteConversationStore {
        &self.conversations
    }

    pub fn records(&self) -> &SqliteRecordStore {
        &self.records
    }
}

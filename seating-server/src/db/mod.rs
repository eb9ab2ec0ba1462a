//! Database Module
//!
//! redb 存储 + 有界句柄池

pub mod pool;
pub mod storage;

pub use pool::{ConnectionPool, HandleFactory, PoolStatus, PooledHandle, StorageConnector, StorageHandle, StoragePool};
pub use storage::{Guarded, ReservationStorage, StorageError, StorageResult};

use std::path::Path;
use std::time::Duration;

use crate::utils::AppResult;

/// Database service, owns the storage pool
#[derive(Clone, Debug)]
pub struct DbService {
    pub pool: StoragePool,
}

impl DbService {
    /// 打开数据库，按配置同步桌台，建立句柄池
    pub async fn new(
        db_path: &Path,
        table_capacities: &[u32],
        pool_size: usize,
        pool_timeout: Duration,
    ) -> AppResult<Self> {
        let storage = ReservationStorage::open(db_path)?;
        Self::with_storage(storage, table_capacities, pool_size, pool_timeout).await
    }

    pub async fn with_storage(
        storage: ReservationStorage,
        table_capacities: &[u32],
        pool_size: usize,
        pool_timeout: Duration,
    ) -> AppResult<Self> {
        let tables = storage.sync_tables(table_capacities)?;
        tracing::info!(
            tables = tables.len(),
            occupied = tables.iter().filter(|t| t.is_occupied()).count(),
            "Table inventory synchronized"
        );

        let pool = StoragePool::for_storage(storage, pool_size, pool_timeout).await?;
        tracing::info!(pool_size, timeout_ms = pool_timeout.as_millis() as u64, "Database pool established");

        Ok(Self { pool })
    }
}

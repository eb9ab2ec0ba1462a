//! 有界连接池
//!
//! 固定数量的长连接句柄，启动时建立：
//! - [`ConnectionPool::borrow`] 最多等待 `timeout`，超时返回可重试的
//!   [`AppError::ResourceExhausted`]
//! - 借出前做存活检查，失效句柄关闭并透明重建
//! - [`PooledHandle`] 在 `Drop` 时归还；池已关闭则直接关闭句柄

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::storage::ReservationStorage;
use crate::utils::{AppError, AppResult};

/// 句柄工厂：建立、探活、关闭
#[async_trait]
pub trait HandleFactory: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    async fn connect(&self) -> AppResult<Self::Handle>;

    async fn is_alive(&self, handle: &Self::Handle) -> bool;

    fn close(&self, handle: Self::Handle);
}

struct PoolInner<F: HandleFactory> {
    factory: F,
    idle: Mutex<VecDeque<F::Handle>>,
    permits: Arc<Semaphore>,
    size: usize,
    timeout: Duration,
    closed: AtomicBool,
}

impl<F: HandleFactory> PoolInner<F> {
    fn release(&self, handle: F::Handle) {
        if self.closed.load(Ordering::Acquire) {
            self.factory.close(handle);
        } else {
            self.idle.lock().push_back(handle);
        }
    }
}

/// 池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub idle: usize,
    pub in_use: usize,
}

pub struct ConnectionPool<F: HandleFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: HandleFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: HandleFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("status", &self.status())
            .finish()
    }
}

impl<F: HandleFactory> ConnectionPool<F> {
    /// 创建连接池并预建 `size` 个句柄
    pub async fn new(factory: F, size: usize, timeout: Duration) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::invalid("Pool size must be at least 1"));
        }
        let mut idle = VecDeque::with_capacity(size);
        for _ in 0..size {
            idle.push_back(factory.connect().await?);
        }
        tracing::debug!(size, ?timeout, "Connection pool ready");
        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                idle: Mutex::new(idle),
                permits: Arc::new(Semaphore::new(size)),
                size,
                timeout,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// 借出句柄，最多等待 `timeout`
    pub async fn borrow(&self) -> AppResult<PooledHandle<F>> {
        let inner = &self.inner;
        let permit = match tokio::time::timeout(inner.timeout, inner.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AppError::exhausted("Connection pool is shut down")),
            Err(_) => {
                tracing::warn!(timeout_ms = inner.timeout.as_millis() as u64, "Connection pool borrow timed out");
                return Err(AppError::exhausted("Timed out waiting for a database connection"));
            }
        };

        let pooled = inner.idle.lock().pop_front();
        let handle = match pooled {
            Some(handle) if inner.factory.is_alive(&handle).await => handle,
            Some(dead) => {
                tracing::warn!("Dead pooled handle replaced");
                inner.factory.close(dead);
                inner.factory.connect().await?
            }
            // 之前重建失败留下的空位
            None => inner.factory.connect().await?,
        };

        Ok(PooledHandle {
            handle: Some(handle),
            pool: inner.clone(),
            _permit: permit,
        })
    }

    /// 关闭连接池：关闭空闲句柄，之后归还的句柄直接关闭
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();
        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        let count = drained.len();
        for handle in drained {
            self.inner.factory.close(handle);
        }
        tracing::info!(closed = count, "Connection pool shut down");
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.inner.permits.available_permits();
        PoolStatus {
            size: self.inner.size,
            idle: self.inner.idle.lock().len(),
            in_use: self.inner.size.saturating_sub(available),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// 借出的句柄，离开作用域即归还
pub struct PooledHandle<F: HandleFactory> {
    handle: Option<F::Handle>,
    pool: Arc<PoolInner<F>>,
    // 在 handle 归还之后才释放
    _permit: OwnedSemaphorePermit,
}

impl<F: HandleFactory> Deref for PooledHandle<F> {
    type Target = F::Handle;

    fn deref(&self) -> &Self::Target {
        // handle 只在 drop 时取走
        self.handle.as_ref().unwrap_or_else(|| unreachable!("pooled handle already released"))
    }
}

impl<F: HandleFactory> DerefMut for PooledHandle<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle.as_mut().unwrap_or_else(|| unreachable!("pooled handle already released"))
    }
}

impl<F: HandleFactory> Drop for PooledHandle<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

// ========== redb 句柄 ==========

/// 一个共享 redb 数据库的存储句柄
#[derive(Debug)]
pub struct StorageHandle {
    id: u64,
    storage: ReservationStorage,
}

impl StorageHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Deref for StorageHandle {
    type Target = ReservationStorage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

/// 为连接池提供 [`StorageHandle`]
#[derive(Debug)]
pub struct StorageConnector {
    storage: ReservationStorage,
    next_id: AtomicU64,
}

impl StorageConnector {
    pub fn new(storage: ReservationStorage) -> Self {
        Self {
            storage,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl HandleFactory for StorageConnector {
    type Handle = StorageHandle;

    async fn connect(&self) -> AppResult<StorageHandle> {
        self.storage.ping()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle_id = id, "Storage handle opened");
        Ok(StorageHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    async fn is_alive(&self, handle: &StorageHandle) -> bool {
        handle.storage.ping().is_ok()
    }

    fn close(&self, handle: StorageHandle) {
        tracing::trace!(handle_id = handle.id, "Storage handle closed");
    }
}

pub type StoragePool = ConnectionPool<StorageConnector>;

impl StoragePool {
    pub async fn for_storage(storage: ReservationStorage, size: usize, timeout: Duration) -> AppResult<Self> {
        ConnectionPool::new(StorageConnector::new(storage), size, timeout).await
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{Result, StoreError};

/// Bounded access to the store
///
/// Each operation holds one permit for its whole duration; the permit is
/// released when the operation finishes, fails, times out or is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
    acquire_timeout: Duration,
    command_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, acquire_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_connections)),
            acquire_timeout,
            command_timeout,
        }
    }

    /// Wait for a free connection, up to the acquire timeout
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        match tokio::time::timeout(self.acquire_timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Closed),
            Err(_) => Err(StoreError::PoolTimeout(self.acquire_timeout)),
        }
    }

    /// Run `operation` on a pooled connection under the command timeout
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.acquire().await?;

        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| StoreError::CommandTimeout {
                operation,
                timeout: self.command_timeout,
            })?
    }

    /// Reject all current waiters and future operations
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Connections currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

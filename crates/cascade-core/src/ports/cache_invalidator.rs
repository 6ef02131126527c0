//! CacheInvalidator port - downstream caches of task readiness.
//!
//! The engine computes exactly which task ids were touched by a change and
//! hands them over one by one. Implementations must be idempotent and must
//! not fail the caller: errors are logged and swallowed.

use async_trait::async_trait;

use crate::domain::TaskId;

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, task_id: TaskId);
}

/// Invalidator for deployments without a readiness cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate(&self, _task_id: TaskId) {}
}

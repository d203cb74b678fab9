//! In-process [`Allocator`]: a mutex around a `username -> in-use count`
//! map, consulting a [`UserLimitSource`] for the quota at request time so a
//! `container_limit` edit takes effect without restarting the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zeusci_core::{Allocator, Result};

/// Resolves a user's current container quota. Implemented by the database
/// crate's user repository; kept as a trait here so the allocator does not
/// depend on the database layer directly.
#[async_trait]
pub trait UserLimitSource: Send + Sync {
    async fn container_limit(&self, username: &str) -> Result<i32>;
}

pub struct InProcessAllocator {
    counts: Mutex<HashMap<String, i32>>,
    limits: Arc<dyn UserLimitSource>,
}

impl InProcessAllocator {
    pub fn new(limits: Arc<dyn UserLimitSource>) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            limits,
        }
    }
}

#[async_trait]
impl Allocator for InProcessAllocator {
    async fn request_container(&self, username: &str) -> Result<bool> {
        let limit = self.limits.container_limit(username).await?;
        let mut counts = self.counts.lock().await;
        let count = counts.entry(username.to_string()).or_insert(0);
        if *count < limit {
            *count += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn return_container(&self, username: &str) {
        let mut counts = self.counts.lock().await;
        if let Some(count) = counts.get_mut(username) {
            *count = (*count - 1).max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLimit(i32);

    #[async_trait]
    impl UserLimitSource for FixedLimit {
        async fn container_limit(&self, _username: &str) -> Result<i32> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn grants_up_to_limit_then_refuses() {
        let alloc = InProcessAllocator::new(Arc::new(FixedLimit(2)));
        assert!(alloc.request_container("alice").await.unwrap());
        assert!(alloc.request_container("alice").await.unwrap());
        assert!(!alloc.request_container("alice").await.unwrap());
    }

    #[tokio::test]
    async fn return_frees_a_slot() {
        let alloc = InProcessAllocator::new(Arc::new(FixedLimit(1)));
        assert!(alloc.request_container("bob").await.unwrap());
        assert!(!alloc.request_container("bob").await.unwrap());
        alloc.return_container("bob").await;
        assert!(alloc.request_container("bob").await.unwrap());
    }

    #[tokio::test]
    async fn return_clamps_at_zero() {
        let alloc = InProcessAllocator::new(Arc::new(FixedLimit(3)));
        alloc.return_container("never-requested").await;
        alloc.return_container("never-requested").await;
        assert!(alloc.request_container("never-requested").await.unwrap());
    }

    #[tokio::test]
    async fn quotas_are_independent_per_user() {
        let alloc = InProcessAllocator::new(Arc::new(FixedLimit(1)));
        assert!(alloc.request_container("alice").await.unwrap());
        assert!(alloc.request_container("bob").await.unwrap());
    }
}

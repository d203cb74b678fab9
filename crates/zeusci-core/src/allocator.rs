//! The `Allocator` trait: enforces each user's concurrent-container quota.
//!
//! A container handle's `start` acquires a slot before launching and its
//! `stop` releases it, regardless of which process actually tracks the
//! count (an in-process map, or an RPC call to the resource allocator
//! service on another host).

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{Error, Result};

/// Polling interval for [`Allocator::acquire`]'s blocking wait.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[async_trait]
pub trait Allocator: Send + Sync {
    /// Non-blocking request: if incrementing `username`'s in-use count would
    /// not exceed their `container_limit`, does so and returns `true`.
    /// Otherwise leaves the count untouched and returns `false`. Retained as
    /// the wire-level primitive for cross-process RPC ergonomics.
    async fn request_container(&self, username: &str) -> Result<bool>;

    /// Decrement `username`'s in-use count, clamped at zero. Safe to call
    /// after a failed or never-issued `request_container`.
    async fn return_container(&self, username: &str);

    /// Block, polling at a fixed interval, until a slot is granted or
    /// `timeout` elapses.
    async fn acquire(&self, username: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.request_container(username).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "no container slot for '{username}' within {timeout:?}"
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

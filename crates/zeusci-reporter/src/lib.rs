//! Commit status reporting for the Zeus CI pipeline engine.

pub mod github;

pub use github::{GithubReporter, GithubStatus};

use async_trait::async_trait;
use zeusci_core::{Build, Status};

#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("api error: {0}")]
    Api(String),
}

pub type ReporterResult<T> = std::result::Result<T, ReporterError>;

/// Reports a build's current [`Status`] to its originating SCM.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, build: &Build, status: Status) -> ReporterResult<()>;
}

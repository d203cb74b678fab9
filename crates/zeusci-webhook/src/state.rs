//! Shared application state for the webhook receiver.

use std::sync::Arc;

use zeusci_db::{BuildRepo, RepoRepo};

#[derive(Clone)]
pub struct AppState {
    pub repo_repo: Arc<dyn RepoRepo>,
    pub build_repo: Arc<dyn BuildRepo>,
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        repo_repo: Arc<dyn RepoRepo>,
        build_repo: Arc<dyn BuildRepo>,
        webhook_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            repo_repo,
            build_repo,
            webhook_secret: webhook_secret.into(),
        }
    }
}

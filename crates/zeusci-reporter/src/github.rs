//! Reports build outcomes back to GitHub as commit statuses.

use async_trait::async_trait;
use zeusci_core::{Build, Status};

use crate::{ReporterError, ReporterResult, StatusReporter};

/// The four states GitHub's commit status API accepts. Distinct from
/// [`Status`]: a build in `starting`/`running` is reported as `pending`,
/// and `skipped` is not reportable on its own (it only ever appears as one
/// input to a workflow's aggregate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GithubStatus {
    Error,
    Failure,
    Pending,
    Success,
}

impl GithubStatus {
    pub fn from_build_status(status: Status) -> Self {
        match status {
            Status::Created | Status::Starting | Status::Running => GithubStatus::Pending,
            Status::Passed => GithubStatus::Success,
            Status::Failed | Status::Skipped => GithubStatus::Failure,
            Status::Error => GithubStatus::Error,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            GithubStatus::Error => "error",
            GithubStatus::Failure => "failure",
            GithubStatus::Pending => "pending",
            GithubStatus::Success => "success",
        }
    }

    fn description(self) -> &'static str {
        match self {
            GithubStatus::Error => "Error encountered during build",
            GithubStatus::Failure => "Build failed",
            GithubStatus::Pending => "Build is currently running",
            GithubStatus::Success => "Build succeeded!",
        }
    }
}

/// Reports commit statuses via GitHub's REST API.
pub struct GithubReporter {
    client: reqwest::Client,
    token: String,
    target_url: String,
}

impl GithubReporter {
    pub fn new(token: String, target_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            target_url,
        }
    }
}

#[async_trait]
impl StatusReporter for GithubReporter {
    async fn report(&self, build: &Build, status: Status) -> ReporterResult<()> {
        let github_status = GithubStatus::from_build_status(status);
        let url = format!(
            "https://api.github.com/repos/{}/statuses/{}",
            build.repo_name, build.commit
        );

        let payload = serde_json::json!({
            "state": github_status.as_str(),
            "target_url": self.target_url,
            "description": github_status.description(),
            "context": build.repo_name,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "zeus-ci")
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReporterError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let code = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReporterError::Api(format!(
                "failed to set status on {} ({}): {}",
                build.repo_name, code, text
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_states_map_to_pending() {
        assert_eq!(
            GithubStatus::from_build_status(Status::Starting),
            GithubStatus::Pending
        );
        assert_eq!(
            GithubStatus::from_build_status(Status::Running),
            GithubStatus::Pending
        );
    }

    #[test]
    fn skipped_reports_as_failure_not_success() {
        assert_eq!(
            GithubStatus::from_build_status(Status::Skipped),
            GithubStatus::Failure
        );
    }

    #[test]
    fn error_is_distinct_from_failure() {
        assert_ne!(
            GithubStatus::from_build_status(Status::Error),
            GithubStatus::from_build_status(Status::Failed)
        );
    }
}

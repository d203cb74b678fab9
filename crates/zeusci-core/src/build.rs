//! The persisted data model: builds, repos, and users.

use crate::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Git hosting provider a [`Repo`] is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    Github,
    Gitlab,
    Bitbucket,
}

impl std::fmt::Display for ScmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScmKind::Github => write!(f, "github"),
            ScmKind::Gitlab => write!(f, "gitlab"),
            ScmKind::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

/// One invocation triggered by one push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub repo_name: String,
    pub r#ref: String,
    pub commit: String,
    pub payload: serde_json::Value,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl Build {
    /// `refs/tags/X` -> ref to check out is `tags/X`.
    /// `refs/heads/X` -> ref to check out is the head commit.
    /// Anything else cannot be resolved.
    pub fn resolve_checkout_ref(&self) -> Option<String> {
        if let Some(tag) = self.r#ref.strip_prefix("refs/tags/") {
            Some(format!("tags/{tag}"))
        } else if self.r#ref.strip_prefix("refs/heads/").is_some() {
            Some(self.commit.clone())
        } else {
            None
        }
    }

    /// `ZEUS_TAG`/`ZEUS_BRANCH` bindings derived from this build's ref and
    /// the `base_ref` of the originating push payload.
    pub fn env_bindings(&self) -> Vec<(String, String)> {
        if let Some(tag) = self.r#ref.strip_prefix("refs/tags/") {
            let branch = self
                .payload
                .get("base_ref")
                .and_then(|v| v.as_str())
                .and_then(|r| r.strip_prefix("refs/heads/"))
                .unwrap_or_default();
            vec![
                ("ZEUS_TAG".to_string(), tag.to_string()),
                ("ZEUS_BRANCH".to_string(), branch.to_string()),
            ]
        } else if let Some(branch) = self.r#ref.strip_prefix("refs/heads/") {
            vec![
                ("ZEUS_TAG".to_string(), String::new()),
                ("ZEUS_BRANCH".to_string(), branch.to_string()),
            ]
        } else {
            vec![]
        }
    }
}

/// A connected Git repository. `env_vars` preserves insertion order and may
/// contain duplicate keys; all bindings are passed through to the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub scm: ScmKind,
    pub username: String,
    pub env_vars: Vec<(String, String)>,
}

impl Repo {
    pub fn new(name: impl Into<String>, scm: ScmKind, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scm,
            username: username.into(),
            env_vars: Vec::new(),
        }
    }

    pub fn add_envvar(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.push((key.into(), value.into()));
    }

    /// Render as `KEY=VALUE` strings suitable for a container's env list.
    pub fn shell_ready_envvars(&self) -> Vec<String> {
        self.env_vars
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }
}

/// An authenticated operator of one or more repos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub token: String,
    pub container_limit: i32,
    pub share_env_with_forks: bool,
    pub share_env_with_branches: bool,
}

impl User {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            container_limit: 4,
            share_env_with_forks: false,
            share_env_with_branches: false,
        }
    }
}

/// Commit metadata from a push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommitInfo {
    fn from_github_commit(value: &serde_json::Value) -> Option<Self> {
        Some(CommitInfo {
            sha: value.get("id")?.as_str()?.to_string(),
            message: value.get("message")?.as_str()?.to_string(),
            author: value
                .get("author")
                .and_then(|a| a.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or("unknown")
                .to_string(),
            author_email: value
                .get("author")
                .and_then(|a| a.get("email"))
                .and_then(|e| e.as_str())
                .unwrap_or("")
                .to_string(),
            timestamp: value
                .get("timestamp")
                .and_then(|t| t.as_str())
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

/// A push event, as delivered by a webhook, before it becomes a [`Build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub r#ref: String,
    pub before: String,
    pub after: String,
    pub base_ref: Option<String>,
    pub repository_full_name: String,
    pub commits: Vec<CommitInfo>,
    pub head_commit: Option<CommitInfo>,
    pub pusher: String,
}

impl PushEvent {
    /// Parse a GitHub push webhook payload. Tag-creation/deletion events
    /// (which carry `ref_type`) are not push events and return `None`.
    pub fn from_github_payload(payload: &serde_json::Value) -> Option<Self> {
        if payload.get("ref_type").is_some() {
            return None;
        }

        let r#ref = payload.get("ref")?.as_str()?.to_string();
        let before = payload.get("before")?.as_str()?.to_string();
        let after = payload.get("after")?.as_str()?.to_string();
        let base_ref = payload
            .get("base_ref")
            .and_then(|v| v.as_str())
            .map(String::from);
        let repository_full_name = payload
            .get("repository")?
            .get("full_name")?
            .as_str()?
            .to_string();

        let commits = payload
            .get("commits")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(CommitInfo::from_github_commit)
                    .collect()
            })
            .unwrap_or_default();

        let head_commit = payload
            .get("head_commit")
            .and_then(CommitInfo::from_github_commit);

        let pusher = payload
            .get("sender")
            .and_then(|p| p.get("login"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown")
            .to_string();

        Some(PushEvent {
            r#ref,
            before,
            after,
            base_ref,
            repository_full_name,
            commits,
            head_commit,
            pusher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tag_ref() {
        let build = Build {
            id: 1,
            repo_name: "acme/widgets".into(),
            r#ref: "refs/tags/v1.2.3".into(),
            commit: "deadbeef".into(),
            payload: serde_json::json!({"base_ref": "refs/heads/main"}),
            status: Status::Created,
            created_at: Utc::now(),
        };
        assert_eq!(build.resolve_checkout_ref().as_deref(), Some("tags/v1.2.3"));
        assert_eq!(
            build.env_bindings(),
            vec![
                ("ZEUS_TAG".to_string(), "v1.2.3".to_string()),
                ("ZEUS_BRANCH".to_string(), "main".to_string()),
            ]
        );
    }

    #[test]
    fn resolves_branch_ref() {
        let build = Build {
            id: 2,
            repo_name: "acme/widgets".into(),
            r#ref: "refs/heads/feature-x".into(),
            commit: "cafef00d".into(),
            payload: serde_json::json!({}),
            status: Status::Created,
            created_at: Utc::now(),
        };
        assert_eq!(build.resolve_checkout_ref().as_deref(), Some("cafef00d"));
        assert_eq!(
            build.env_bindings(),
            vec![
                ("ZEUS_TAG".to_string(), String::new()),
                ("ZEUS_BRANCH".to_string(), "feature-x".to_string()),
            ]
        );
    }

    #[test]
    fn repo_envvars_preserve_duplicates_and_order() {
        let mut repo = Repo::new("acme/widgets", ScmKind::Github, "acme");
        repo.add_envvar("A", "1");
        repo.add_envvar("A", "2");
        assert_eq!(repo.shell_ready_envvars(), vec!["A=1", "A=2"]);
    }

    #[test]
    fn tag_creation_events_are_not_push_events() {
        let payload = serde_json::json!({"ref_type": "tag", "ref": "v1.0.0"});
        assert!(PushEvent::from_github_payload(&payload).is_none());
    }
}

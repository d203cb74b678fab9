//! Build repository: the queue the build coordinator polls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;
use zeusci_core::{Build, Status};

use crate::{DbError, DbResult};

#[async_trait]
pub trait BuildRepo: Send + Sync {
    /// Record a new build in `created` state.
    async fn create(
        &self,
        repo_name: &str,
        r#ref: &str,
        commit: &str,
        payload: serde_json::Value,
    ) -> DbResult<Build>;

    async fn get_by_id(&self, id: i64) -> DbResult<Build>;

    /// Atomically claim up to `limit` queued builds for this coordinator
    /// instance, transitioning them to `starting` so no other coordinator
    /// picks them up. Uses `FOR UPDATE SKIP LOCKED` so multiple coordinators
    /// can poll the same table without contending on the same rows.
    async fn claim_queued(&self, limit: i64) -> DbResult<Vec<Build>>;

    async fn update_status(&self, id: i64, status: Status) -> DbResult<()>;

    async fn list_recent(&self, repo_name: &str, limit: i64) -> DbResult<Vec<Build>>;
}

/// Column shape of the `builds` table. `Build` itself carries a typed
/// [`Status`], which sqlx can't derive `FromRow` for directly, so rows are
/// read into this shape and converted.
#[derive(sqlx::FromRow)]
struct BuildRow {
    id: i64,
    repo_name: String,
    git_ref: String,
    commit: String,
    payload: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BuildRow> for Build {
    type Error = DbError;

    fn try_from(row: BuildRow) -> DbResult<Self> {
        Ok(Build {
            id: row.id,
            repo_name: row.repo_name,
            r#ref: row.git_ref,
            commit: row.commit,
            payload: row.payload,
            status: Status::from_str(&row.status).map_err(DbError::Decode)?,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    r#"id, repo_name, "ref" AS git_ref, "commit", payload, status, created_at"#;

pub struct PgBuildRepo {
    pool: PgPool,
}

impl PgBuildRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildRepo for PgBuildRepo {
    async fn create(
        &self,
        repo_name: &str,
        r#ref: &str,
        commit: &str,
        payload: serde_json::Value,
    ) -> DbResult<Build> {
        let row = sqlx::query_as::<_, BuildRow>(&format!(
            r#"
            INSERT INTO builds (repo_name, "ref", "commit", payload, status, created_at)
            VALUES ($1, $2, $3, $4, 'created', NOW())
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(repo_name)
        .bind(r#ref)
        .bind(commit)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Build> {
        let row = sqlx::query_as::<_, BuildRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM builds WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("build {id}")))?;
        row.try_into()
    }

    async fn claim_queued(&self, limit: i64) -> DbResult<Vec<Build>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, BuildRow>(&format!(
            r#"
            UPDATE builds SET status = 'starting'
            WHERE id IN (
                SELECT id FROM builds
                WHERE status = 'created'
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(Build::try_from).collect()
    }

    async fn update_status(&self, id: i64, status: Status) -> DbResult<()> {
        sqlx::query("UPDATE builds SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_recent(&self, repo_name: &str, limit: i64) -> DbResult<Vec<Build>> {
        let rows = sqlx::query_as::<_, BuildRow>(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM builds WHERE repo_name = $1 ORDER BY created_at DESC LIMIT $2"#
        ))
        .bind(repo_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Build::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_build_with_parsed_status() {
        let row = BuildRow {
            id: 1,
            repo_name: "acme/widgets".to_string(),
            git_ref: "refs/heads/main".to_string(),
            commit: "deadbeef".to_string(),
            payload: serde_json::json!({}),
            status: "running".to_string(),
            created_at: Utc::now(),
        };
        let build: Build = row.try_into().unwrap();
        assert_eq!(build.status, Status::Running);
        assert_eq!(build.r#ref, "refs/heads/main");
    }

    #[test]
    fn unrecognized_status_is_a_decode_error() {
        let row = BuildRow {
            id: 1,
            repo_name: "acme/widgets".to_string(),
            git_ref: "refs/heads/main".to_string(),
            commit: "deadbeef".to_string(),
            payload: serde_json::json!({}),
            status: "bogus".to_string(),
            created_at: Utc::now(),
        };
        assert!(Build::try_from(row).is_err());
    }
}

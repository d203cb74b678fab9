//! Repo repository: the connected Git repositories a build may target.

use async_trait::async_trait;
use sqlx::PgPool;
use zeusci_core::{Repo, ScmKind};

use crate::{DbError, DbResult};

#[async_trait]
pub trait RepoRepo: Send + Sync {
    async fn get_by_name(&self, name: &str) -> DbResult<Repo>;
    async fn list_all(&self) -> DbResult<Vec<Repo>>;
    async fn upsert(&self, repo: &Repo) -> DbResult<()>;
    async fn delete(&self, name: &str) -> DbResult<()>;
}

#[derive(sqlx::FromRow)]
struct RepoRow {
    name: String,
    scm: String,
    username: String,
    env_vars: serde_json::Value,
}

impl TryFrom<RepoRow> for Repo {
    type Error = DbError;

    fn try_from(row: RepoRow) -> DbResult<Self> {
        let scm = match row.scm.as_str() {
            "github" => ScmKind::Github,
            "gitlab" => ScmKind::Gitlab,
            "bitbucket" => ScmKind::Bitbucket,
            other => return Err(DbError::Decode(format!("unrecognized scm '{other}'"))),
        };
        let env_vars: Vec<(String, String)> =
            serde_json::from_value(row.env_vars).map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Repo {
            name: row.name,
            scm,
            username: row.username,
            env_vars,
        })
    }
}

pub struct PgRepoRepo {
    pool: PgPool,
}

impl PgRepoRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepoRepo for PgRepoRepo {
    async fn get_by_name(&self, name: &str) -> DbResult<Repo> {
        let row = sqlx::query_as::<_, RepoRow>(
            "SELECT name, scm, username, env_vars FROM repos WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("repo {name}")))?;
        row.try_into()
    }

    async fn list_all(&self) -> DbResult<Vec<Repo>> {
        let rows = sqlx::query_as::<_, RepoRow>(
            "SELECT name, scm, username, env_vars FROM repos ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Repo::try_from).collect()
    }

    async fn upsert(&self, repo: &Repo) -> DbResult<()> {
        let env_vars = serde_json::to_value(&repo.env_vars).map_err(|e| DbError::Decode(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO repos (name, scm, username, env_vars)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
                SET scm = EXCLUDED.scm, username = EXCLUDED.username, env_vars = EXCLUDED.env_vars
            "#,
        )
        .bind(&repo.name)
        .bind(repo.scm.to_string())
        .bind(&repo.username)
        .bind(env_vars)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM repos WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

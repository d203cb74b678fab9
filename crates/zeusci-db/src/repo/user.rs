//! User repository: operator accounts and their container quotas.

use async_trait::async_trait;
use sqlx::PgPool;
use zeusci_allocator::UserLimitSource;
use zeusci_core::{Result as CoreResult, User};

use crate::{DbError, DbResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_username(&self, username: &str) -> DbResult<User>;
    async fn upsert(&self, user: &User) -> DbResult<()>;
    async fn delete(&self, username: &str) -> DbResult<()>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    token: String,
    container_limit: i32,
    share_env_with_forks: bool,
    share_env_with_branches: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            username: row.username,
            token: row.token,
            container_limit: row.container_limit,
            share_env_with_forks: row.share_env_with_forks,
            share_env_with_branches: row.share_env_with_branches,
        }
    }
}

pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn get_by_username(&self, username: &str) -> DbResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT username, token, container_limit, share_env_with_forks, share_env_with_branches
               FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("user {username}")))?;
        Ok(row.into())
    }

    async fn upsert(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, token, container_limit, share_env_with_forks, share_env_with_branches)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO UPDATE
                SET token = EXCLUDED.token,
                    container_limit = EXCLUDED.container_limit,
                    share_env_with_forks = EXCLUDED.share_env_with_forks,
                    share_env_with_branches = EXCLUDED.share_env_with_branches
            "#,
        )
        .bind(&user.username)
        .bind(&user.token)
        .bind(user.container_limit)
        .bind(user.share_env_with_forks)
        .bind(user.share_env_with_branches)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, username: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Lets the allocator resolve a user's quota without depending on the
/// database crate directly.
#[async_trait]
impl UserLimitSource for PgUserRepo {
    async fn container_limit(&self, username: &str) -> CoreResult<i32> {
        let limit: Option<(i32,)> =
            sqlx::query_as("SELECT container_limit FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| zeusci_core::Error::Internal(e.to_string()))?;
        Ok(limit.map(|(n,)| n).unwrap_or(0))
    }
}

//! Database layer for the Zeus CI pipeline engine.
//!
//! Provides repository traits and PostgreSQL implementations for builds,
//! repos, and users. Job scheduling polls the `builds` table with
//! `SELECT ... FOR UPDATE SKIP LOCKED` so more than one coordinator instance
//! can run against the same database without double-dispatching a build.

pub mod error;
pub mod repo;

pub use error::{DbError, DbResult};
pub use repo::*;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

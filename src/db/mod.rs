//! Database module for SQLite persistence.
//!
//! SQLite is the shared transactional store behind the content store and
//! the social graph.

mod content;
mod query;
mod social;

pub use content::*;
pub use social::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            joined_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(pool)
    .await?;

    // No ON DELETE CASCADE: dependents are removed by the explicit cascade
    // routines in the content store, inside the parent's transaction.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES users(username),
            group_id INTEGER REFERENCES groups(id),
            image TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            author_id TEXT NOT NULL REFERENCES users(username),
            text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS follows (
            user_id TEXT NOT NULL REFERENCES users(username),
            author_id TEXT NOT NULL REFERENCES users(username),
            created_at TEXT NOT NULL,
            UNIQUE (user_id, author_id),
            CHECK (user_id <> author_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for feed queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    /// Fresh database in a temp dir; keep the `TempDir` alive for the test.
    pub async fn temp_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = super::init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (pool, temp_dir)
    }
}

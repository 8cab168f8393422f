//! Social graph: directed follow edges between users.

use sqlx::{Executor, Row, Sqlite, SqlitePool};

use super::content::ensure_user;
use crate::errors::{AppError, FieldErrors};
use crate::models::{timestamp_now, Follow, FollowChange};

/// Owns the Follow relation.
#[derive(Clone)]
pub struct SocialGraph {
    pool: SqlitePool,
}

impl SocialGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Make `follower` follow `author`. Following twice is a no-op.
    pub async fn follow(&self, follower: &str, author: &str) -> Result<FollowChange, AppError> {
        if follower == author {
            return Err(AppError::Validation(FieldErrors::single(
                "author",
                "You cannot follow yourself.",
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before anything is read
        ensure_user(&mut *tx, follower).await?;
        require_user(&mut *tx, author).await?;

        // The UNIQUE constraint makes check-and-insert one statement
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (user_id, author_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower)
        .bind(author)
        .bind(timestamp_now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            Ok(FollowChange::Unchanged)
        } else {
            tracing::debug!("{} now follows {}", follower, author);
            Ok(FollowChange::Created)
        }
    }

    /// Remove the edge if present. Absent edges and self-unfollow are no-ops.
    pub async fn unfollow(&self, follower: &str, author: &str) -> Result<FollowChange, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(follower)
            .bind(author)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!("{} unfollowed {}", follower, author);
            return Ok(FollowChange::Removed);
        }

        require_user(&self.pool, author).await?;
        Ok(FollowChange::Unchanged)
    }

    pub async fn is_following(&self, follower: &str, author: &str) -> Result<bool, AppError> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?")
                .bind(follower)
                .bind(author)
                .fetch_optional(&self.pool)
                .await?;
        Ok(exists.is_some())
    }

    /// How many users follow `author`.
    pub async fn follower_count(&self, author: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE author_id = ?")
            .bind(author)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// How many authors `user` follows.
    pub async fn following_count(&self, user: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Edges going out of `user`, most recent first.
    pub async fn following(&self, user: &str) -> Result<Vec<Follow>, AppError> {
        let rows = sqlx::query(
            r#"SELECT user_id, author_id, created_at FROM follows
               WHERE user_id = ? ORDER BY created_at DESC, author_id"#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Follow {
                user: row.get("user_id"),
                author: row.get("author_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

async fn require_user<'e, E>(executor: E, username: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: Option<String> =
        sqlx::query_scalar("SELECT username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(executor)
            .await?;

    exists
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
}

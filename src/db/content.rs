//! Content store: users, groups, posts and comments.
//!
//! Every mutation validates before writing and is either a single statement
//! or one transaction, so a failure never leaves partial state behind.

use sqlx::{Executor, Row, Sqlite, SqlitePool};

use super::query::{post_from_row, PostFilter, PostQuery, POST_COLUMNS};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    is_valid_username, timestamp_now, Comment, CreateCommentRequest, CreateGroupRequest,
    CreatePostRequest, EditPostRequest, Group, Post, User,
};

/// Owns all Group, Post and Comment records.
#[derive(Clone)]
pub struct ContentStore {
    pool: SqlitePool,
}

impl ContentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Register an identity handed over by the auth collaborator. Idempotent.
    pub async fn register_user(&self, username: &str) -> Result<User, AppError> {
        ensure_user(&self.pool, username).await?;

        self.get_user(username)
            .await?
            .ok_or_else(|| AppError::Internal(format!("User {} vanished after insert", username)))
    }

    /// Get a user by username.
    pub async fn get_user(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT username, joined_at FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Delete a user together with their posts, the comments on those posts,
    /// their own comments and every follow edge touching them.
    pub async fn delete_user(&self, username: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"DELETE FROM comments
               WHERE author_id = ?
                  OR post_id IN (SELECT id FROM posts WHERE author_id = ?)"#,
        )
        .bind(username)
        .bind(username)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM follows WHERE user_id = ? OR author_id = ?")
            .bind(username)
            .bind(username)
            .execute(&mut *tx)
            .await?;

        let posts = sqlx::query("DELETE FROM posts WHERE author_id = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(AppError::NotFound(format!("User {} not found", username)));
        }

        tx.commit().await?;

        tracing::info!(
            "Deleted user {} and {} posts",
            username,
            posts.rows_affected()
        );
        Ok(())
    }

    // ==================== GROUP OPERATIONS ====================

    /// List all groups.
    pub async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY title")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    /// Get a group by slug.
    pub async fn get_group(&self, slug: &str) -> Result<Option<Group>, AppError> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    /// Create a new group. Duplicate slugs are a validation error.
    pub async fn create_group(&self, request: &CreateGroupRequest) -> Result<Group, AppError> {
        request.validate().into_result()?;

        let result = sqlx::query("INSERT INTO groups (title, slug, description) VALUES (?, ?, ?)")
            .bind(&request.title)
            .bind(&request.slug)
            .bind(&request.description)
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::Validation(FieldErrors::single(
                    "slug",
                    "Group with this slug already exists.",
                )));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Group {
            id: result.last_insert_rowid(),
            title: request.title.clone(),
            slug: request.slug.clone(),
            description: request.description.clone(),
        })
    }

    /// Delete a group together with its posts and their comments.
    pub async fn delete_group(&self, slug: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"DELETE FROM comments WHERE post_id IN (
                   SELECT p.id FROM posts p JOIN groups g ON g.id = p.group_id WHERE g.slug = ?
               )"#,
        )
        .bind(slug)
        .execute(&mut *tx)
        .await?;

        let posts = sqlx::query(
            "DELETE FROM posts WHERE group_id IN (SELECT id FROM groups WHERE slug = ?)",
        )
        .bind(slug)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM groups WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Group {} not found", slug)));
        }

        tx.commit().await?;

        tracing::info!(
            "Deleted group {} and {} posts",
            slug,
            posts.rows_affected()
        );
        Ok(())
    }

    // ==================== POST OPERATIONS ====================

    /// All posts, newest first.
    pub fn list_all_posts(&self) -> PostQuery {
        PostQuery::new(self.pool.clone(), PostFilter::All)
    }

    /// Posts in the group with this slug, newest first.
    pub async fn list_posts_by_group(&self, slug: &str) -> Result<PostQuery, AppError> {
        let group = self
            .get_group(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", slug)))?;

        Ok(PostQuery::new(
            self.pool.clone(),
            PostFilter::Group(group.id),
        ))
    }

    /// Posts by one author, newest first.
    pub fn list_posts_by_author(&self, author: &str) -> PostQuery {
        PostQuery::new(self.pool.clone(), PostFilter::Author(author.to_string()))
    }

    /// Posts by any of the given authors, newest first.
    pub fn list_posts_by_authors(&self, authors: Vec<String>) -> PostQuery {
        PostQuery::new(self.pool.clone(), PostFilter::Authors(authors))
    }

    /// Get a post by ID.
    pub async fn get_post(&self, post_id: i64) -> Result<Post, AppError> {
        let sql = format!("{} WHERE p.id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(post_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }

    /// Get a post addressed through its author; a wrong author is NotFound.
    pub async fn get_post_by_author(&self, author: &str, post_id: i64) -> Result<Post, AppError> {
        let post = self.get_post(post_id).await?;
        if post.author != author {
            return Err(AppError::NotFound(format!(
                "Post {} by {} not found",
                post_id, author
            )));
        }
        Ok(post)
    }

    /// Publish a new post.
    pub async fn create_post(
        &self,
        author: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, AppError> {
        request.validate().into_result()?;

        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before anything is read
        ensure_user(&mut *tx, author).await?;
        let group_id = resolve_group(&mut *tx, request.group.as_deref()).await?;
        let now = timestamp_now();

        let result = sqlx::query(
            "INSERT INTO posts (text, created_at, author_id, group_id, image) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.text)
        .bind(&now)
        .bind(author)
        .bind(group_id)
        .bind(&request.image)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let post = self.get_post(result.last_insert_rowid()).await?;
        tracing::debug!("Created post {} \"{}\" by {}", post.id, post, author);
        Ok(post)
    }

    /// Edit text, group and image of a post. Only its author may do so.
    pub async fn edit_post(
        &self,
        post_id: i64,
        editor: &str,
        request: &EditPostRequest,
    ) -> Result<Post, AppError> {
        let current = self.get_post(post_id).await?;
        if current.author != editor {
            return Err(AppError::Forbidden(format!(
                "Only {} may edit post {}",
                current.author, post_id
            )));
        }

        request.validate().into_result()?;

        let mut tx = self.pool.begin().await?;

        // Author is part of the predicate, so the check and the write are one
        // statement, and it takes the write lock before anything is read
        let result = sqlx::query("UPDATE posts SET text = ? WHERE id = ? AND author_id = ?")
            .bind(&request.text)
            .bind(post_id)
            .bind(editor)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let group_id = resolve_group(&mut *tx, request.group.as_deref()).await?;
        let current_image: Option<String> =
            sqlx::query_scalar("SELECT image FROM posts WHERE id = ?")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?;
        let image = request.resolve_image(current_image);

        sqlx::query("UPDATE posts SET group_id = ?, image = ? WHERE id = ?")
            .bind(group_id)
            .bind(&image)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_post(post_id).await
    }

    // ==================== COMMENT OPERATIONS ====================

    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, post_id, author_id, text, created_at
               FROM comments WHERE post_id = ?
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Add a comment to a post.
    pub async fn create_comment(
        &self,
        post_id: i64,
        author: &str,
        request: &CreateCommentRequest,
    ) -> Result<Comment, AppError> {
        request.validate().into_result()?;

        let mut tx = self.pool.begin().await?;

        ensure_user(&mut *tx, author).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let now = timestamp_now();

        let result = sqlx::query(
            "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author)
        .bind(&request.text)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            post_id,
            author: author.to_string(),
            text: request.text.clone(),
            created_at: now,
        })
    }
}

/// Insert the user row if it is missing.
pub(crate) async fn ensure_user<'e, E>(executor: E, username: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if !is_valid_username(username) {
        return Err(AppError::Validation(FieldErrors::single(
            "username",
            "Enter a valid username.",
        )));
    }

    sqlx::query("INSERT OR IGNORE INTO users (username, joined_at) VALUES (?, ?)")
        .bind(username)
        .bind(timestamp_now())
        .execute(executor)
        .await?;
    Ok(())
}

/// Map an optional slug to a group id; an unknown slug is NotFound.
async fn resolve_group<'e, E>(executor: E, slug: Option<&str>) -> Result<Option<i64>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let Some(slug) = slug.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE slug = ?")
        .bind(slug)
        .fetch_optional(executor)
        .await?;

    id.map(Some)
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", slug)))
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        username: row.get("username"),
        joined_at: row.get("joined_at"),
    }
}

fn group_from_row(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

fn comment_from_row(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: row.get("author_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;
    use crate::models::PageRequest;

    fn post(text: &str, group: Option<&str>) -> CreatePostRequest {
        CreatePostRequest {
            text: text.to_string(),
            group: group.map(str::to_string),
            image: None,
        }
    }

    fn group(slug: &str) -> CreateGroupRequest {
        CreateGroupRequest {
            title: format!("Group {}", slug),
            slug: slug.to_string(),
            description: "test_description".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_post() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("test-slug")).await.unwrap();

        let before = store.list_all_posts().count().await.unwrap();
        let created = store
            .create_post(
                "leo",
                &CreatePostRequest {
                    text: "test_post".to_string(),
                    group: Some("test-slug".to_string()),
                    image: Some("posts/small.gif".to_string()),
                },
            )
            .await
            .unwrap();

        let fetched = store.get_post(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.text, "test_post");
        assert_eq!(fetched.author, "leo");
        assert_eq!(fetched.group.unwrap().slug, "test-slug");
        assert_eq!(fetched.image.as_deref(), Some("posts/small.gif"));
        assert_eq!(store.list_all_posts().count().await.unwrap(), before + 1);
        assert!(store.get_user("leo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_post_rejects_blank_text_and_unknown_group() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);

        let err = store.create_post("leo", &post("  ", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .create_post("leo", &post("text", Some("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(store.list_all_posts().count().await.unwrap(), 0);
        // Nothing was written, not even the author row
        assert!(store.get_user("leo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edit_by_non_author_leaves_post_unchanged() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let original = store.create_post("leo", &post("original", None)).await.unwrap();

        let edit = EditPostRequest {
            text: "hijacked".to_string(),
            ..Default::default()
        };
        let err = store.edit_post(original.id, "mallory", &edit).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(store.get_post(original.id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_edit_keeps_author_and_timestamp() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("cats")).await.unwrap();
        let original = store
            .create_post(
                "leo",
                &CreatePostRequest {
                    text: "original".to_string(),
                    group: None,
                    image: Some("posts/a.png".to_string()),
                },
            )
            .await
            .unwrap();

        let edit = EditPostRequest {
            text: "edited".to_string(),
            group: Some("cats".to_string()),
            ..Default::default()
        };
        let edited = store.edit_post(original.id, "leo", &edit).await.unwrap();

        assert_eq!(edited.id, original.id);
        assert_eq!(edited.text, "edited");
        assert_eq!(edited.author, original.author);
        assert_eq!(edited.created_at, original.created_at);
        assert_eq!(edited.group.unwrap().slug, "cats");
        assert_eq!(edited.image, original.image);
    }

    #[tokio::test]
    async fn test_edit_with_deleted_group_leaves_post_unchanged() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("cats")).await.unwrap();
        store.create_group(&group("dogs")).await.unwrap();
        let original = store
            .create_post("leo", &post("original", Some("dogs")))
            .await
            .unwrap();
        store.delete_group("cats").await.unwrap();

        let edit = EditPostRequest {
            text: "edited".to_string(),
            group: Some("cats".to_string()),
            clear_image: true,
            ..Default::default()
        };
        let err = store.edit_post(original.id, "leo", &edit).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // The text update ran first and was rolled back with the rest
        let after = store.get_post(original.id).await.unwrap();
        assert_eq!(after, original);
        assert_eq!(after.text, "original");
    }

    #[tokio::test]
    async fn test_edit_unknown_post_is_not_found() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let edit = EditPostRequest {
            text: "x".to_string(),
            ..Default::default()
        };
        let err = store.edit_post(42, "leo", &edit).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_validation_error() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("dup")).await.unwrap();

        let err = store.create_group(&group("dup")).await.unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields.iter().next().unwrap().field, "slug");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.list_groups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ordering_newest_first_with_id_tiebreak() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool.clone());

        // Same timestamp for all three so only the id decides
        for text in ["first", "second", "third"] {
            sqlx::query("INSERT OR IGNORE INTO users (username, joined_at) VALUES ('leo', 'x')")
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO posts (text, created_at, author_id) VALUES (?, '2024-01-01T00:00:00.000000Z', 'leo')",
            )
            .bind(text)
            .execute(&pool)
            .await
            .unwrap();
        }
        store.create_post("leo", &post("newest", None)).await.unwrap();

        let texts: Vec<String> = store
            .list_all_posts()
            .fetch(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, vec!["newest", "third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_post_query_is_restartable() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let query = store.list_posts_by_author("leo");

        assert_eq!(query.count().await.unwrap(), 0);
        store.create_post("leo", &post("one", None)).await.unwrap();
        store.create_post("ann", &post("other", None)).await.unwrap();
        assert_eq!(query.count().await.unwrap(), 1);
        assert_eq!(query.fetch(10, 0).await.unwrap()[0].text, "one");
    }

    #[tokio::test]
    async fn test_group_listing() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("cats")).await.unwrap();
        store.create_post("leo", &post("cat post", Some("cats"))).await.unwrap();
        store.create_post("leo", &post("loose post", None)).await.unwrap();

        let page = store
            .list_posts_by_group("cats")
            .await
            .unwrap()
            .page(PageRequest::new(None, 10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "cat post");

        let err = store.list_posts_by_group("dogs").await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comments_ascending_and_validated() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let target = store.create_post("leo", &post("post", None)).await.unwrap();

        for text in ["first", "second"] {
            store
                .create_comment(
                    target.id,
                    "ann",
                    &CreateCommentRequest {
                        text: text.to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let texts: Vec<String> = store
            .list_comments(target.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);

        let blank = CreateCommentRequest {
            text: String::new(),
        };
        assert!(matches!(
            store.create_comment(target.id, "ann", &blank).await,
            Err(AppError::Validation(_))
        ));
        let missing = CreateCommentRequest {
            text: "hi".to_string(),
        };
        assert!(matches!(
            store.create_comment(999, "ann", &missing).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_group_cascades() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        store.create_group(&group("cats")).await.unwrap();
        let in_group = store.create_post("leo", &post("cat", Some("cats"))).await.unwrap();
        let outside = store.create_post("leo", &post("free", None)).await.unwrap();
        store
            .create_comment(in_group.id, "ann", &CreateCommentRequest { text: "c".into() })
            .await
            .unwrap();

        store.delete_group("cats").await.unwrap();

        assert!(store.get_group("cats").await.unwrap().is_none());
        assert!(matches!(
            store.get_post(in_group.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.list_comments(in_group.id).await.unwrap().is_empty());
        assert!(store.get_post(outside.id).await.is_ok());
        assert!(matches!(
            store.delete_group("cats").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let leo_post = store.create_post("leo", &post("by leo", None)).await.unwrap();
        let ann_post = store.create_post("ann", &post("by ann", None)).await.unwrap();
        store
            .create_comment(leo_post.id, "ann", &CreateCommentRequest { text: "a".into() })
            .await
            .unwrap();
        store
            .create_comment(ann_post.id, "leo", &CreateCommentRequest { text: "b".into() })
            .await
            .unwrap();

        store.delete_user("leo").await.unwrap();

        assert!(store.get_user("leo").await.unwrap().is_none());
        assert!(store.get_post(leo_post.id).await.is_err());
        assert!(store.list_comments(leo_post.id).await.unwrap().is_empty());
        // leo's comment on ann's post is gone, ann's post stays
        assert!(store.list_comments(ann_post.id).await.unwrap().is_empty());
        assert!(store.get_post(ann_post.id).await.is_ok());
        assert!(matches!(
            store.delete_user("leo").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_post_scoped_by_author() {
        let (pool, _dir) = temp_pool().await;
        let store = ContentStore::new(pool);
        let created = store.create_post("leo", &post("scoped", None)).await.unwrap();

        assert!(store.get_post_by_author("leo", created.id).await.is_ok());
        assert!(matches!(
            store.get_post_by_author("ann", created.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}

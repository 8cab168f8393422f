//! Lazy, restartable post listings.
//!
//! A `PostQuery` only describes which posts to list. Nothing is read until
//! `count`, `fetch` or `page` is awaited, and every call re-reads the store.

use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::models::{GroupRef, Page, PageRequest, Post};

pub(crate) const POST_COLUMNS: &str = r#"SELECT p.id, p.text, p.created_at, p.author_id, p.image,
                  g.slug AS group_slug, g.title AS group_title
           FROM posts p LEFT JOIN groups g ON g.id = p.group_id"#;

/// Newest first; id breaks timestamp ties.
const POST_ORDER: &str = " ORDER BY p.created_at DESC, p.id DESC";

/// Which posts a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(String),
    /// Posts by any of these authors
    Authors(Vec<String>),
}

impl PostFilter {
    /// True when the filter cannot match anything, so no query is needed.
    fn is_vacuous(&self) -> bool {
        matches!(self, PostFilter::Authors(authors) if authors.is_empty())
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" WHERE p.group_id = ");
                qb.push_bind(*group_id);
            }
            PostFilter::Author(author) => {
                qb.push(" WHERE p.author_id = ");
                qb.push_bind(author.clone());
            }
            PostFilter::Authors(authors) => {
                qb.push(" WHERE p.author_id IN (");
                let mut separated = qb.separated(", ");
                for author in authors {
                    separated.push_bind(author.clone());
                }
                separated.push_unseparated(")");
            }
        }
    }
}

/// A post listing in global order (`created_at` desc, `id` desc).
#[derive(Clone)]
pub struct PostQuery {
    pool: SqlitePool,
    filter: PostFilter,
}

impl PostQuery {
    pub(crate) fn new(pool: SqlitePool, filter: PostFilter) -> Self {
        Self { pool, filter }
    }

    /// Number of posts currently matching.
    pub async fn count(&self) -> Result<i64, AppError> {
        self.count_with(&self.pool).await
    }

    /// A window of posts in global order.
    pub async fn fetch(&self, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
        self.fetch_with(&self.pool, limit, offset).await
    }

    /// One page plus the total, read from a single snapshot.
    ///
    /// Pages past the end come back empty rather than failing.
    pub async fn page(&self, request: PageRequest) -> Result<Page<Post>, AppError> {
        if self.filter.is_vacuous() {
            return Ok(Page::empty(request));
        }

        let mut tx = self.pool.begin().await?;
        let total = self.count_with(&mut *tx).await?;
        let items = self
            .fetch_with(&mut *tx, request.limit(), request.offset())
            .await?;
        tx.commit().await?;

        Ok(Page::new(items, request, total))
    }

    async fn count_with<'e, E>(&self, executor: E) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if self.filter.is_vacuous() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
        self.filter.push_where(&mut qb);
        let count = qb.build_query_scalar::<i64>().fetch_one(executor).await?;
        Ok(count)
    }

    async fn fetch_with<'e, E>(
        &self,
        executor: E,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if self.filter.is_vacuous() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(POST_COLUMNS);
        self.filter.push_where(&mut qb);
        qb.push(POST_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(executor).await?;
        Ok(rows.iter().map(post_from_row).collect())
    }
}

pub(crate) fn post_from_row(row: &sqlx::sqlite::SqliteRow) -> Post {
    let group_slug: Option<String> = row.get("group_slug");
    let group_title: Option<String> = row.get("group_title");

    Post {
        id: row.get("id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        author: row.get("author_id"),
        group: group_slug
            .zip(group_title)
            .map(|(slug, title)| GroupRef { slug, title }),
        image: row.get("image"),
    }
}

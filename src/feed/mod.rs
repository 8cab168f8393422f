//! Feed composer: read-only projections over the content store and the
//! social graph. Holds no state of its own.

use serde::Serialize;

use crate::db::{ContentStore, SocialGraph};
use crate::errors::AppError;
use crate::models::{Comment, Group, Page, PageRequest, Post, User};

/// Aggregate counts shown next to an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub author: User,
    pub total_post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    /// False for anonymous viewers
    pub is_followed_by_viewer: bool,
}

/// An author's profile with one page of their posts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFeed {
    pub profile: AuthorProfile,
    pub posts: Page<Post>,
}

/// A group with one page of its posts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFeed {
    pub group: Group,
    pub posts: Page<Post>,
}

/// A single post with its thread and author aggregates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
    pub profile: AuthorProfile,
}

#[derive(Clone)]
pub struct FeedComposer {
    content: ContentStore,
    social: SocialGraph,
    page_size: u32,
}

impl FeedComposer {
    pub fn new(content: ContentStore, social: SocialGraph, page_size: u32) -> Self {
        Self {
            content,
            social,
            page_size,
        }
    }

    /// Normalize a raw page number against the configured page size.
    pub fn page_request(&self, page: Option<i64>) -> PageRequest {
        PageRequest::new(page, self.page_size)
    }

    /// All posts, newest first.
    pub async fn global_feed(&self, request: PageRequest) -> Result<Page<Post>, AppError> {
        self.content.list_all_posts().page(request).await
    }

    /// Posts of one group, newest first. Unknown slugs are NotFound.
    pub async fn group_feed(&self, slug: &str, request: PageRequest) -> Result<GroupFeed, AppError> {
        let group = self
            .content
            .get_group(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", slug)))?;

        let posts = self
            .content
            .list_posts_by_group(slug)
            .await?
            .page(request)
            .await?;

        Ok(GroupFeed { group, posts })
    }

    /// An author's posts plus profile aggregates as seen by `viewer`.
    pub async fn author_feed(
        &self,
        author: &str,
        viewer: Option<&str>,
        request: PageRequest,
    ) -> Result<AuthorFeed, AppError> {
        let profile = self.author_profile(author, viewer).await?;
        let posts = self
            .content
            .list_posts_by_author(author)
            .page(request)
            .await?;

        Ok(AuthorFeed { profile, posts })
    }

    /// Posts by everyone `viewer` follows, newest first.
    ///
    /// The follow set is fetched first and the post listing filtered by it,
    /// so following nobody yields an empty page without touching posts.
    pub async fn following_feed(
        &self,
        viewer: &str,
        request: PageRequest,
    ) -> Result<Page<Post>, AppError> {
        let authors: Vec<String> = self
            .social
            .following(viewer)
            .await?
            .into_iter()
            .map(|follow| follow.author)
            .collect();

        if authors.is_empty() {
            return Ok(Page::empty(request));
        }

        self.content
            .list_posts_by_authors(authors)
            .page(request)
            .await
    }

    /// A post addressed through its author, with comments oldest first.
    pub async fn post_detail(
        &self,
        author: &str,
        post_id: i64,
        viewer: Option<&str>,
    ) -> Result<PostDetail, AppError> {
        let post = self.content.get_post_by_author(author, post_id).await?;
        let comments = self.content.list_comments(post.id).await?;
        let profile = self.author_profile(author, viewer).await?;

        Ok(PostDetail {
            post,
            comments,
            profile,
        })
    }

    /// Counts for an author page. Unknown authors are NotFound.
    pub async fn author_profile(
        &self,
        author: &str,
        viewer: Option<&str>,
    ) -> Result<AuthorProfile, AppError> {
        let user = self
            .content
            .get_user(author)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", author)))?;

        let total_post_count = self.content.list_posts_by_author(author).count().await?;
        let follower_count = self.social.follower_count(author).await?;
        let following_count = self.social.following_count(author).await?;
        let is_followed_by_viewer = match viewer {
            Some(viewer) => self.social.is_following(viewer, author).await?,
            None => false,
        };

        Ok(AuthorProfile {
            author: user,
            total_post_count,
            follower_count,
            following_count,
            is_followed_by_viewer,
        })
    }
}

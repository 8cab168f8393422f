//! Post API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult, OutcomeResult, PageQuery};
use crate::cache::CacheStats;
use crate::feed::PostDetail;
use crate::models::{Comment, CreateCommentRequest, CreatePostRequest, EditPostRequest, Page, Post};
use crate::policy::{require_author, require_identity, Identity, Mutation, Outcome, Redirect};
use crate::AppState;

/// GET /api/posts - Global feed, served through the feed cache.
pub async fn global_feed(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Post>> {
    let request = state.feeds.page_request(query.number());
    let page = state
        .cache
        .get_or_load(request, || state.feeds.global_feed(request))
        .await?;
    success(page)
}

/// GET /api/posts/cache - Global feed cache counters.
pub async fn feed_cache_stats(State(state): State<AppState>) -> ApiResult<CacheStats> {
    success(state.cache.stats().await)
}

/// POST /api/posts - Publish a post as the requesting user.
pub async fn create_post(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreatePostRequest>,
) -> OutcomeResult<Mutation<Post>> {
    let author = match require_identity(&identity, Redirect::NewPost) {
        Ok(author) => author,
        Err(denial) => return Ok(denial.into()),
    };

    let result = state.content.create_post(author, &request).await;
    if result.is_ok() {
        state.cache.invalidate().await;
    }

    Outcome::from_core(
        result.map(|post| Mutation::new(post, Redirect::GlobalFeed)),
        Redirect::NewPost,
    )
}

/// GET /api/users/:username/posts/:id - A post with its comments.
pub async fn get_post(
    State(state): State<AppState>,
    identity: Identity,
    Path((username, post_id)): Path<(String, i64)>,
) -> ApiResult<PostDetail> {
    let detail = state
        .feeds
        .post_detail(&username, post_id, identity.username())
        .await?;
    success(detail)
}

/// PUT /api/users/:username/posts/:id - Edit a post. Non-authors are sent to the post.
pub async fn edit_post(
    State(state): State<AppState>,
    identity: Identity,
    Path((username, post_id)): Path<(String, i64)>,
    Json(request): Json<EditPostRequest>,
) -> OutcomeResult<Mutation<Post>> {
    let post = match state.content.get_post_by_author(&username, post_id).await {
        Ok(post) => post,
        Err(e) => return Outcome::from_core(Err(e), Redirect::post(&username, post_id)),
    };

    let editor = match require_author(&identity, &post.author, post.id) {
        Ok(editor) => editor,
        Err(denial) => return Ok(denial.into()),
    };

    let result = state.content.edit_post(post.id, editor, &request).await;
    if result.is_ok() {
        state.cache.invalidate().await;
    }

    let target = Redirect::post(&post.author, post.id);
    Outcome::from_core(
        result.map(|post| Mutation::new(post, target.clone())),
        target,
    )
}

/// POST /api/users/:username/posts/:id/comments - Comment on a post.
pub async fn add_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path((username, post_id)): Path<(String, i64)>,
    Json(request): Json<CreateCommentRequest>,
) -> OutcomeResult<Mutation<Comment>> {
    let attempted = Redirect::PostComment {
        username: username.clone(),
        post_id,
    };
    let author = match require_identity(&identity, attempted) {
        Ok(author) => author,
        Err(denial) => return Ok(denial.into()),
    };

    let target = Redirect::post(&username, post_id);
    let result = match state.content.get_post_by_author(&username, post_id).await {
        Ok(post) => state.content.create_comment(post.id, author, &request).await,
        Err(e) => Err(e),
    };

    Outcome::from_core(
        result.map(|comment| Mutation::new(comment, target.clone())),
        target,
    )
}

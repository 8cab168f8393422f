//! User, profile and follow API endpoints.

use axum::extract::{Path, Query, State};

use super::{success, ApiResult, OutcomeResult, PageQuery};
use crate::feed::AuthorFeed;
use crate::models::{FollowChange, Page, Post, User};
use crate::policy::{require_identity, Identity, Mutation, Outcome, Redirect};
use crate::AppState;

/// PUT /api/users/:username - Register an identity. Idempotent.
pub async fn register_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<User> {
    success(state.content.register_user(&username).await?)
}

/// DELETE /api/users/:username - Delete a user and everything they own.
pub async fn delete_user(State(state): State<AppState>, Path(username): Path<String>) -> ApiResult<()> {
    state.content.delete_user(&username).await?;
    state.cache.invalidate().await;
    tracing::info!("Deleted user {}", username);
    success(())
}

/// GET /api/users/:username - Profile aggregates and one page of posts.
pub async fn get_profile(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<AuthorFeed> {
    let request = state.feeds.page_request(query.number());
    let feed = state
        .feeds
        .author_feed(&username, identity.username(), request)
        .await?;
    success(feed)
}

/// GET /api/follow - Posts by the authors the requesting user follows.
pub async fn follow_feed(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<PageQuery>,
) -> OutcomeResult<Page<Post>> {
    let viewer = match require_identity(&identity, Redirect::FollowFeed) {
        Ok(viewer) => viewer,
        Err(denial) => return Ok(denial.into()),
    };

    let request = state.feeds.page_request(query.number());
    Outcome::from_core(
        state.feeds.following_feed(viewer, request).await,
        Redirect::FollowFeed,
    )
}

/// POST /api/users/:username/follow - Follow an author.
pub async fn follow_author(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
) -> OutcomeResult<Mutation<FollowChange>> {
    let attempted = Redirect::ProfileFollow {
        username: username.clone(),
    };
    let follower = match require_identity(&identity, attempted) {
        Ok(follower) => follower,
        Err(denial) => return Ok(denial.into()),
    };

    let target = Redirect::profile(&username);
    let result = state.social.follow(follower, &username).await;
    Outcome::from_core(
        result.map(|change| Mutation::new(change, target.clone())),
        target,
    )
}

/// POST /api/users/:username/unfollow - Stop following an author.
pub async fn unfollow_author(
    State(state): State<AppState>,
    identity: Identity,
    Path(username): Path<String>,
) -> OutcomeResult<Mutation<FollowChange>> {
    let attempted = Redirect::ProfileUnfollow {
        username: username.clone(),
    };
    let follower = match require_identity(&identity, attempted) {
        Ok(follower) => follower,
        Err(denial) => return Ok(denial.into()),
    };

    let target = Redirect::profile(&username);
    let result = state.social.unfollow(follower, &username).await;
    Outcome::from_core(
        result.map(|change| Mutation::new(change, target.clone())),
        target,
    )
}

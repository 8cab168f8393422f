//! Group API endpoints. Creating and deleting groups is administrative.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult, PageQuery};
use crate::feed::GroupFeed;
use crate::models::{CreateGroupRequest, Group};
use crate::AppState;

/// GET /api/groups - List all groups.
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Vec<Group>> {
    success(state.content.list_groups().await?)
}

/// POST /api/groups - Create a new group.
pub async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<CreateGroupRequest>,
) -> ApiResult<Group> {
    let group = state.content.create_group(&request).await?;
    tracing::info!("Created group {} ({})", group, group.slug);
    success(group)
}

/// GET /api/groups/:slug - A group and one page of its posts.
pub async fn group_feed(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<GroupFeed> {
    let request = state.feeds.page_request(query.number());
    success(state.feeds.group_feed(&slug, request).await?)
}

/// DELETE /api/groups/:slug - Delete a group with its posts and their comments.
pub async fn delete_group(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<()> {
    state.content.delete_group(&slug).await?;
    state.cache.invalidate().await;
    tracing::info!("Deleted group {}", slug);
    success(())
}

//! Follow edge model.

use serde::{Deserialize, Serialize};

/// `user` follows `author`. The pair is unique and never reflexive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub user: String,
    pub author: String,
    pub created_at: String,
}

/// What a follow/unfollow call did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FollowChange {
    Created,
    Removed,
    Unchanged,
}

//! Comment model.

use serde::{Deserialize, Serialize};

use crate::errors::FieldErrors;

/// A reply to a post. Comments are never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: String,
}

/// Request body for adding a comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required.");
        }
        errors
    }
}

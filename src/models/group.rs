//! Group model: a named topical category posts can belong to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::FieldErrors;

pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_DESCRIPTION_MAX_LEN: usize = 100;
pub const GROUP_SLUG_MAX_LEN: usize = 50;

/// A topical group identified by a unique slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// The part of a group embedded in each post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub slug: String,
    pub title: String,
}

/// Request body for creating a new group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl CreateGroupRequest {
    /// Field checks that do not need the store. Slug uniqueness is checked on insert.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.title.trim().is_empty() {
            errors.add("title", "Title is required.");
        } else if self.title.chars().count() > GROUP_TITLE_MAX_LEN {
            errors.add(
                "title",
                format!("Title must be at most {} characters.", GROUP_TITLE_MAX_LEN),
            );
        }

        if !is_valid_slug(&self.slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }

        if self.description.chars().count() > GROUP_DESCRIPTION_MAX_LEN {
            errors.add(
                "description",
                format!(
                    "Description must be at most {} characters.",
                    GROUP_DESCRIPTION_MAX_LEN
                ),
            );
        }

        errors
    }
}

/// Slugs are ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= GROUP_SLUG_MAX_LEN
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

//! User model. Credentials live with the external auth collaborator.

use serde::{Deserialize, Serialize};

/// A registered identity that can author posts and follow others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub joined_at: String,
}

/// Upper bound on usernames accepted from the auth collaborator.
pub const USERNAME_MAX_LEN: usize = 150;

/// Check a username coming from outside the core.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= USERNAME_MAX_LEN
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

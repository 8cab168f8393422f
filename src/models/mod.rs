//! Data models for the Yatube backend.
//!
//! Entities are serialized in camelCase for the presentation layer.

mod comment;
mod follow;
mod group;
mod page;
mod post;
mod user;

pub use comment::*;
pub use follow::*;
pub use group::*;
pub use page::*;
pub use post::*;
pub use user::*;

use chrono::{SecondsFormat, Utc};

/// Current time as a fixed-width RFC 3339 UTC string.
///
/// Fixed width keeps lexical and chronological order identical in SQL.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = timestamp_now();
        let b = timestamp_now();
        assert_eq!(a.len(), "2024-01-01T00:00:00.000000Z".len());
        assert_eq!(a.len(), b.len());
        assert!(a <= b);
        assert!(a.ends_with('Z'));
    }
}

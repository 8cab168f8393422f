//! Post model: the unit of content in every feed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GroupRef;
use crate::errors::FieldErrors;

/// Number of characters a post shows when displayed inline.
const DISPLAY_CHARS: usize = 15;

/// A published post. `author` and `created_at` never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupRef>,
    /// Reference to a stored image blob
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.text.chars().take(DISPLAY_CHARS).collect();
        f.write_str(&head)
    }
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub text: String,
    /// Group slug
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_text(&self.text, &mut errors);
        check_image(self.image.as_deref(), &mut errors);
        errors
    }
}

/// Request body for editing a post.
///
/// `group` replaces the stored group (absent clears it). An absent `image`
/// keeps the stored reference unless `clear_image` is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPostRequest {
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub clear_image: bool,
}

impl EditPostRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_text(&self.text, &mut errors);
        check_image(self.image.as_deref(), &mut errors);
        if self.clear_image && self.image.is_some() {
            errors.add("image", "Please either submit an image or clear it, not both.");
        }
        errors
    }

    /// The image reference the post should hold after this edit.
    pub fn resolve_image(&self, current: Option<String>) -> Option<String> {
        match (&self.image, self.clear_image) {
            (Some(image), _) => Some(image.clone()),
            (None, true) => None,
            (None, false) => current,
        }
    }
}

fn check_text(text: &str, errors: &mut FieldErrors) {
    if text.trim().is_empty() {
        errors.add("text", "This field is required.");
    }
}

fn check_image(image: Option<&str>, errors: &mut FieldErrors) {
    if let Some(image) = image {
        if image.trim().is_empty() {
            errors.add("image", "Image reference must not be empty.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_displays_first_fifteen_chars() {
        let post = Post {
            id: 1,
            text: "Тестовый текст поста длиннее пятнадцати".to_string(),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            author: "leo".to_string(),
            group: None,
            image: None,
        };
        assert_eq!(post.to_string(), "Тестовый текст ");
    }

    #[test]
    fn test_blank_text_rejected() {
        let request = CreatePostRequest {
            text: "   \n".to_string(),
            ..Default::default()
        };
        let errors = request.validate();
        assert_eq!(errors.iter().next().unwrap().field, "text");
    }

    #[test]
    fn test_edit_image_resolution() {
        let current = Some("posts/a.png".to_string());

        let keep = EditPostRequest {
            text: "t".into(),
            ..Default::default()
        };
        assert_eq!(keep.resolve_image(current.clone()), current);

        let clear = EditPostRequest {
            text: "t".into(),
            clear_image: true,
            ..Default::default()
        };
        assert_eq!(clear.resolve_image(current.clone()), None);

        let replace = EditPostRequest {
            text: "t".into(),
            image: Some("posts/b.png".into()),
            ..Default::default()
        };
        assert_eq!(
            replace.resolve_image(current),
            Some("posts/b.png".to_string())
        );
    }

    #[test]
    fn test_clear_and_replace_conflict() {
        let request = EditPostRequest {
            text: "t".into(),
            image: Some("posts/b.png".into()),
            clear_image: true,
            ..Default::default()
        };
        assert!(!request.validate().is_empty());
    }
}

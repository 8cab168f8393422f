//! Access policy in front of the mutating operations.
//!
//! Reads are open to everyone. Mutations need an identity, and editing a post
//! needs the identity of its author. Refusals are soft: they carry the place
//! the caller should be sent to instead of an error page.

use std::fmt;

use serde::{Serialize, Serializer};
use urlencoding::encode;

use crate::errors::{AppError, FieldErrors};

/// The requesting identity as supplied by the external auth collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(Option<String>);

impl Identity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self(Some(username.into()))
    }

    pub fn username(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Canonical locations the presentation layer redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    GlobalFeed,
    FollowFeed,
    NewPost,
    Group { slug: String },
    Profile { username: String },
    Post { username: String, post_id: i64 },
    PostEdit { username: String, post_id: i64 },
    PostComment { username: String, post_id: i64 },
    ProfileFollow { username: String },
    ProfileUnfollow { username: String },
    Login { next: Box<Redirect> },
}

impl Redirect {
    pub fn profile(username: &str) -> Self {
        Redirect::Profile {
            username: username.to_string(),
        }
    }

    pub fn post(username: &str, post_id: i64) -> Self {
        Redirect::Post {
            username: username.to_string(),
            post_id,
        }
    }

    /// The login entry point, coming back to `next` afterwards.
    pub fn login(next: Redirect) -> Self {
        Redirect::Login {
            next: Box::new(next),
        }
    }

    /// The location as a URL path. Usernames and slugs are percent-encoded,
    /// and so is the whole `next` value of the login location.
    pub fn path(&self) -> String {
        match self {
            Redirect::GlobalFeed => "/".to_string(),
            Redirect::FollowFeed => "/follow/".to_string(),
            Redirect::NewPost => "/new/".to_string(),
            Redirect::Group { slug } => format!("/group/{}/", encode(slug)),
            Redirect::Profile { username } => format!("/{}/", encode(username)),
            Redirect::Post { username, post_id } => {
                format!("/{}/{}/", encode(username), post_id)
            }
            Redirect::PostEdit { username, post_id } => {
                format!("/{}/{}/edit/", encode(username), post_id)
            }
            Redirect::PostComment { username, post_id } => {
                format!("/{}/{}/comment/", encode(username), post_id)
            }
            Redirect::ProfileFollow { username } => format!("/{}/follow/", encode(username)),
            Redirect::ProfileUnfollow { username } => {
                format!("/{}/unfollow/", encode(username))
            }
            Redirect::Login { next } => format!("/auth/login/?next={}", encode(&next.path())),
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl Serialize for Redirect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AuthenticationRequired,
    NotPermitted,
}

/// A soft deny: where to send the caller, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub redirect: Redirect,
    pub reason: DenyReason,
}

/// A successful mutation and where the caller should go next.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation<T: Serialize> {
    pub item: T,
    pub redirect_to: Redirect,
}

impl<T: Serialize> Mutation<T> {
    pub fn new(item: T, redirect_to: Redirect) -> Self {
        Self { item, redirect_to }
    }
}

/// Result of a guarded operation, branched on by the presentation layer.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Denied(Denial),
    NotFound(String),
    ValidationFailed(FieldErrors),
}

impl<T> Outcome<T> {
    /// Sort a core result into an outcome.
    ///
    /// `on_forbidden` is where an authenticated but unauthorized caller is sent.
    /// Infrastructure failures stay errors.
    pub fn from_core(result: Result<T, AppError>, on_forbidden: Redirect) -> Result<Self, AppError> {
        match result {
            Ok(value) => Ok(Outcome::Success(value)),
            Err(AppError::NotFound(message)) => Ok(Outcome::NotFound(message)),
            Err(AppError::Validation(fields)) => Ok(Outcome::ValidationFailed(fields)),
            Err(AppError::Forbidden(message)) => {
                tracing::debug!("Soft deny to {}: {}", on_forbidden, message);
                Ok(Outcome::Denied(Denial {
                    redirect: on_forbidden,
                    reason: DenyReason::NotPermitted,
                }))
            }
            Err(AppError::AuthenticationRequired) => Ok(Outcome::Denied(Denial {
                redirect: Redirect::login(on_forbidden),
                reason: DenyReason::AuthenticationRequired,
            })),
            Err(other) => Err(other),
        }
    }
}

impl<T> From<Denial> for Outcome<T> {
    fn from(denial: Denial) -> Self {
        Outcome::Denied(denial)
    }
}

/// Creating content and following need an identity.
///
/// `attempted` is the location the caller tried to reach; login sends them back there.
pub fn require_identity(identity: &Identity, attempted: Redirect) -> Result<&str, Denial> {
    identity.username().ok_or(Denial {
        redirect: Redirect::login(attempted),
        reason: DenyReason::AuthenticationRequired,
    })
}

/// Only the author may edit a post; anyone else is sent to the post itself.
pub fn require_author<'a>(
    identity: &'a Identity,
    author: &str,
    post_id: i64,
) -> Result<&'a str, Denial> {
    match identity.username() {
        Some(username) if username == author => Ok(username),
        Some(_) => Err(Denial {
            redirect: Redirect::post(author, post_id),
            reason: DenyReason::NotPermitted,
        }),
        None => Err(Denial {
            redirect: Redirect::login(Redirect::PostEdit {
                username: author.to_string(),
                post_id,
            }),
            reason: DenyReason::AuthenticationRequired,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_paths() {
        assert_eq!(Redirect::GlobalFeed.path(), "/");
        assert_eq!(Redirect::profile("leo").path(), "/leo/");
        assert_eq!(Redirect::post("leo", 7).path(), "/leo/7/");
        assert_eq!(
            Redirect::Group {
                slug: "cats".into()
            }
            .path(),
            "/group/cats/"
        );
        assert_eq!(
            Redirect::login(Redirect::PostEdit {
                username: "leo".into(),
                post_id: 7
            })
            .path(),
            "/auth/login/?next=%2Fleo%2F7%2Fedit%2F"
        );
    }

    #[test]
    fn test_require_identity() {
        assert_eq!(
            require_identity(&Identity::user("leo"), Redirect::NewPost),
            Ok("leo")
        );

        let denial = require_identity(&Identity::anonymous(), Redirect::NewPost).unwrap_err();
        assert_eq!(denial.reason, DenyReason::AuthenticationRequired);
        assert_eq!(denial.redirect.path(), "/auth/login/?next=%2Fnew%2F");
    }

    #[test]
    fn test_require_author_soft_denies() {
        let leo = Identity::user("leo");
        assert_eq!(require_author(&leo, "leo", 1), Ok("leo"));

        let denial = require_author(&Identity::user("ann"), "leo", 1).unwrap_err();
        assert_eq!(denial.reason, DenyReason::NotPermitted);
        assert_eq!(denial.redirect, Redirect::post("leo", 1));

        let denial = require_author(&Identity::anonymous(), "leo", 1).unwrap_err();
        assert_eq!(denial.redirect.path(), "/auth/login/?next=%2Fleo%2F1%2Fedit%2F");
    }

    #[test]
    fn test_outcome_from_core() {
        let forbidden: Result<(), AppError> = Err(AppError::Forbidden("no".into()));
        match Outcome::from_core(forbidden, Redirect::post("leo", 1)).unwrap() {
            Outcome::Denied(denial) => assert_eq!(denial.redirect, Redirect::post("leo", 1)),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let missing: Result<(), AppError> = Err(AppError::NotFound("gone".into()));
        assert!(matches!(
            Outcome::from_core(missing, Redirect::GlobalFeed).unwrap(),
            Outcome::NotFound(_)
        ));

        let broken: Result<(), AppError> = Err(AppError::Database("io".into()));
        assert!(Outcome::from_core(broken, Redirect::GlobalFeed).is_err());
    }

    #[test]
    fn test_redirect_serializes_as_path() {
        let mutation = Mutation::new(1, Redirect::profile("leo"));
        let json = serde_json::to_value(&mutation).unwrap();
        assert_eq!(json["redirectTo"], "/leo/");
        assert_eq!(json["item"], 1);
    }

    #[test]
    fn test_redirect_paths_are_encoded() {
        assert_eq!(Redirect::profile("a+b").path(), "/a%2Bb/");
        assert_eq!(
            Redirect::login(Redirect::profile("a+b")).path(),
            "/auth/login/?next=%2Fa%252Bb%2F"
        );
        assert_eq!(
            Redirect::post("лев", 2).path(),
            "/%D0%BB%D0%B5%D0%B2/2/"
        );

        let login = Redirect::login(Redirect::ProfileFollow {
            username: "лев".into(),
        })
        .path();
        assert!(login.is_ascii());
        assert_eq!(
            login,
            "/auth/login/?next=%2F%25D0%25BB%25D0%25B5%25D0%25B2%2Ffollow%2F"
        );
    }
}

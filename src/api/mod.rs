//! REST API module.
//!
//! Contains the routes the presentation layer calls. Reads answer with the
//! success envelope; mutations answer with an `Outcome` so soft denies become
//! redirects instead of error pages.

mod groups;
mod posts;
mod users;

pub use groups::*;
pub use posts::*;
pub use users::*;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{codes, AppError, ErrorDetails};
use crate::policy::{Denial, DenyReason, Outcome, Redirect};

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Body of a soft deny.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeniedResponse {
    success: bool,
    error: ErrorDetails,
    redirect_to: Redirect,
}

fn denied_response(denial: Denial) -> Response {
    let (code, message) = match denial.reason {
        DenyReason::AuthenticationRequired => {
            (codes::AUTHENTICATION_REQUIRED, "Authentication required")
        }
        DenyReason::NotPermitted => (codes::FORBIDDEN, "Not permitted"),
    };

    let location = denial.redirect.path();
    let body = DeniedResponse {
        success: false,
        error: ErrorDetails {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
        redirect_to: denial.redirect,
    };

    let mut response = (StatusCode::SEE_OTHER, Json(body)).into_response();
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => tracing::warn!("Redirect target {:?} is not a valid header", location),
    }
    response
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Outcome::Success(value) => ApiResponse::new(value).into_response(),
            Outcome::Denied(denial) => denied_response(denial),
            Outcome::NotFound(message) => AppError::NotFound(message).into_response(),
            Outcome::ValidationFailed(fields) => AppError::Validation(fields).into_response(),
        }
    }
}

/// Result of a guarded operation: infrastructure failures stay hard errors.
pub type OutcomeResult<T> = Result<Outcome<T>, AppError>;

/// `?page=` as sent by the caller. Anything that is not an integer means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> Option<i64> {
        self.page.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

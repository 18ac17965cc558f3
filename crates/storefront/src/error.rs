//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Failed backend calls are attached to the notice the user should see with
//! [`NoticeExt::or_notice`]; the underlying error is logged, never sent.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use boardquest_core::{DraftError, ImageError};

use crate::backend::BackendError;
use crate::db::RepositoryError;
use crate::models::Notice;
use crate::services::auth::AuthError;

/// The lower-level failure behind a [`AppError::Service`].
#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceFailure {
    fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e) | Self::Repository(RepositoryError::Backend(e)) => Some(e),
            Self::Repository(_) => None,
        }
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// An external call behind a user action failed.
    #[error("{notice}: {source}")]
    Service {
        notice: &'static str,
        #[source]
        source: ServiceFailure,
    },

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Form input failed validation; the message is shown as-is.
    #[error("{0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    notice: Notice,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service { source, .. } => match source {
                ServiceFailure::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
                ServiceFailure::Repository(RepositoryError::DataCorruption(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => match source.backend() {
                    Some(BackendError::Unauthorized(_)) => StatusCode::FORBIDDEN,
                    Some(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_GATEWAY,
                },
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::SessionExpired => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::InvalidEmail(_)
                | AuthError::WeakPassword(_)
                | AuthError::MissingUsername
                | AuthError::Rejected(_) => StatusCode::BAD_REQUEST,
                AuthError::Backend(_) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Service { notice, .. } => (*notice).to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Backend(_) => "Authentication service unavailable".to_string(),
                AuthError::Repository(_) | AuthError::Session(_) => {
                    "Authentication error".to_string()
                }
                AuthError::SessionExpired => "Session expired, please sign in again".to_string(),
                other => other.to_string(),
            },
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let body = ErrorBody {
            notice: Notice::error(self.public_message()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Attach a user-facing notice to a failed external call.
pub trait NoticeExt<T> {
    /// # Errors
    ///
    /// Wraps the error in `AppError::Service` with `notice`.
    fn or_notice(self, notice: &'static str) -> Result<T>;
}

impl<T, E: Into<ServiceFailure>> NoticeExt<T> for std::result::Result<T, E> {
    fn or_notice(self, notice: &'static str) -> Result<T> {
        self.map_err(|e| AppError::Service {
            notice,
            source: e.into(),
        })
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ImageError::TooLarge { size: 1 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_failures_map_to_gateway() {
        let err: Result<()> = Err(BackendError::Api {
            status: 503,
            message: "upstream down".to_string(),
        })
        .or_notice("Failed to load products");
        assert_eq!(get_status(err.unwrap_err()), StatusCode::BAD_GATEWAY);

        let missing: Result<()> =
            Err(RepositoryError::NotFound("product".to_string())).or_notice("Failed to save product");
        assert_eq!(get_status(missing.unwrap_err()), StatusCode::NOT_FOUND);

        let denied: Result<()> = Err(BackendError::Unauthorized("rls".to_string()))
            .or_notice("Failed to delete product");
        assert_eq!(get_status(denied.unwrap_err()), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_body_carries_notice_not_details() {
        let err: Result<()> = Err(BackendError::Api {
            status: 500,
            message: "relation \"products\" does not exist".to_string(),
        })
        .or_notice("Failed to load products");
        let response = err.unwrap_err().into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["notice"]["level"], "error");
        assert_eq!(body["notice"]["message"], "Failed to load products");
        assert!(!bytes.windows(8).any(|w| w == b"relation"));
    }
}

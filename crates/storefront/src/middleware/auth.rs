//! Authentication extractors.
//!
//! The signed-in identity is read from the session, where the auth service
//! stores it at each transition. Rejections are JSON notices.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::models::Notice;
use crate::models::session::{CurrentUser, keys};

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username.unwrap_or_default())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Why an authenticated extractor refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Nobody is signed in.
    Unauthorized(&'static str),
    /// Signed in, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Access denied. Admin privileges required."),
        };
        (status, Json(serde_json::json!({ "notice": Notice::error(message) }))).into_response()
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized("Please sign in to continue"))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized("Please sign in to continue"))?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use boardquest_core::UserId;
    use tower_sessions::MemoryStore;

    use super::*;

    async fn parts_with(user: Option<CurrentUser>) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        if let Some(user) = user {
            session.insert(keys::CURRENT_USER, &user).await.unwrap();
        }
        let (mut parts, ()) = Request::builder()
            .uri("/admin/products")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(session);
        parts
    }

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::random(),
            email: Some("ana@example.com".to_string()),
            username: Some("ana".to_string()),
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_admin_gate() {
        let mut anonymous = parts_with(None).await;
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut anonymous, &()).await,
            Err(AuthRejection::Unauthorized(_))
        ));

        let mut shopper = parts_with(Some(user(false))).await;
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut shopper, &()).await,
            Err(AuthRejection::Forbidden)
        ));

        let mut admin = parts_with(Some(user(true))).await;
        assert!(RequireAdmin::from_request_parts(&mut admin, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_optional_auth_never_rejects() {
        let mut anonymous = parts_with(None).await;
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut anonymous, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn test_rejection_statuses() {
        assert_eq!(
            AuthRejection::Unauthorized("x").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}

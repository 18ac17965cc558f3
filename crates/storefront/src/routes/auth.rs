//! Authentication route handlers.
//!
//! Handles sign-up, sign-in, sign-out and the session check against the
//! hosted identity provider. Tokens stay in the server-side session; the
//! client only ever sees the identity and the admin flag.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::models::{CurrentUser, WithNotice};
use crate::services::auth::SignUpResult;
use crate::state::AppState;

/// Sign-up request body.
#[derive(Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// Sign-in request body.
#[derive(Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

// Hand-written so passwords never reach the logs.
impl std::fmt::Debug for SignUpForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("username", &self.username)
            .finish()
    }
}

impl std::fmt::Debug for SignInForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Who the session belongs to.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: Option<CurrentUser>,
    pub is_admin: bool,
    pub cart_count: u32,
}

impl SessionView {
    const fn anonymous() -> Self {
        Self {
            user: None,
            is_admin: false,
            cart_count: 0,
        }
    }
}

async fn session_view(state: &AppState, session: &Session, user: CurrentUser) -> Result<SessionView> {
    let cart = state.cart(session, user.id).current().await?;
    Ok(SessionView {
        is_admin: user.is_admin,
        cart_count: cart.count(),
        user: Some(user),
    })
}

/// Create an account.
///
/// Signs the caller in when the provider returns a session right away;
/// otherwise the account waits for email confirmation.
#[instrument(skip(state, session))]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignUpForm>,
) -> Result<Json<WithNotice<SessionView>>> {
    let result = state
        .auth(&session)
        .sign_up(&form.email, &form.password, &form.username)
        .await?;

    let body = match result {
        SignUpResult::SignedIn(user) => {
            add_breadcrumb("auth", "Account created", None);
            WithNotice::success(
                "Account created successfully",
                session_view(&state, &session, user).await?,
            )
        }
        SignUpResult::ConfirmationRequired => WithNotice::success(
            "Check your email to confirm your account",
            SessionView::anonymous(),
        ),
    };
    Ok(Json(body))
}

/// Sign in with email and password.
#[instrument(skip(state, session))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInForm>,
) -> Result<Json<WithNotice<SessionView>>> {
    let user = state
        .auth(&session)
        .sign_in(&form.email, &form.password)
        .await?;
    add_breadcrumb("auth", "Signed in", None);

    Ok(Json(WithNotice::success(
        "Signed in successfully",
        session_view(&state, &session, user).await?,
    )))
}

/// Sign out and drop the session cart.
#[instrument(skip(state, session))]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<WithNotice<SessionView>>> {
    state.auth(&session).sign_out().await?;
    add_breadcrumb("auth", "Signed out", None);
    Ok(Json(WithNotice::success("Signed out", SessionView::anonymous())))
}

/// The current identity, its admin flag and the cart count.
///
/// Checking the session also refreshes expired tokens and re-evaluates
/// the admin gate.
#[instrument(skip(state, session))]
pub async fn current_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SessionView>> {
    let view = match state.auth(&session).current_user().await? {
        Some(user) => session_view(&state, &session, user).await?,
        None => SessionView::anonymous(),
    };
    Ok(Json(view))
}

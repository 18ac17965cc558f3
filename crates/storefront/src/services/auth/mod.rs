//! Authentication service.
//!
//! Credentials are checked by the hosted identity provider; this service
//! validates input, keeps the provider's tokens in the server-side session
//! and applies the side effects of every auth-state transition:
//!
//! - signed in: re-evaluate the admin gate, restore the stored cart copy,
//!   tag Sentry with the user
//! - refreshed: store the new tokens, re-evaluate the admin gate
//! - signed out: clear the session cart and the stored copy, forget the
//!   identity, untag Sentry

mod error;

pub use error::AuthError;

use chrono::Utc;
use secrecy::SecretString;
use tower_sessions::Session;

use boardquest_core::Email;

use crate::backend::{AuthSession, AuthUser, BackendError, Caller, IdentityProvider, TableStore};
use crate::db::AdminRepository;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::session::{CurrentUser, StoredTokens, keys};
use crate::services::cart::CartService;
use crate::services::cart_store::CartStore;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// A change in who the session belongs to.
#[derive(Debug)]
pub enum AuthTransition {
    SignedIn(AuthSession),
    Refreshed(AuthSession),
    SignedOut,
}

/// What a sign-up produced.
#[derive(Debug)]
pub enum SignUpResult {
    /// The account is usable and the session is signed in.
    SignedIn(CurrentUser),
    /// The provider sent a confirmation email; nobody is signed in yet.
    ConfirmationRequired,
}

/// Authentication service bound to one request's session.
pub struct AuthService<'a> {
    identity: &'a dyn IdentityProvider,
    tables: &'a dyn TableStore,
    carts: &'a dyn CartStore,
    session: &'a Session,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(
        identity: &'a dyn IdentityProvider,
        tables: &'a dyn TableStore,
        carts: &'a dyn CartStore,
        session: &'a Session,
    ) -> Self {
        Self {
            identity,
            tables,
            carts,
            session,
        }
    }

    /// Create an account and sign in if the provider allows it right away.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::MissingUsername` for bad input, `AuthError::Rejected` if
    /// the provider refuses the account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpResult, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingUsername);
        }

        let outcome = self
            .identity
            .sign_up(&email, &SecretString::from(password.to_string()), username)
            .await?;

        match outcome.session {
            Some(session) => {
                let user = self.apply(AuthTransition::SignedIn(session)).await?;
                user.map(SignUpResult::SignedIn)
                    .ok_or(AuthError::SessionExpired)
            }
            None => Ok(SignUpResult::ConfirmationRequired),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the provider rejects them.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let session = self
            .identity
            .sign_in_with_password(&email, &SecretString::from(password.to_string()))
            .await?;
        self.apply(AuthTransition::SignedIn(session))
            .await?
            .ok_or(AuthError::SessionExpired)
    }

    /// Sign out locally, then revoke the provider session.
    ///
    /// A failed revocation is logged; the local session is cleared anyway.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let tokens = self.session.get::<StoredTokens>(keys::TOKENS).await?;
        self.apply(AuthTransition::SignedOut).await?;
        if let Some(tokens) = tokens
            && let Err(e) = self.identity.sign_out(&tokens.access_token()).await
        {
            tracing::warn!(error = %e, "Error signing out");
        }
        Ok(())
    }

    /// The signed-in user, after checking the tokens are still good.
    ///
    /// Expired tokens are refreshed once; if that fails the session is
    /// signed out. Each check re-evaluates the admin gate.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the provider cannot be reached.
    pub async fn current_user(&self) -> Result<Option<CurrentUser>, AuthError> {
        let Some(tokens) = self.session.get::<StoredTokens>(keys::TOKENS).await? else {
            return Ok(None);
        };

        if !tokens.is_expired(Utc::now()) {
            match self.identity.get_user(&tokens.access_token()).await {
                Ok(user) => return self.confirm(&user, &tokens).await.map(Some),
                Err(BackendError::Unauthorized(_)) => {}
                Err(e) => return Err(AuthError::Backend(e)),
            }
        }

        match self.identity.refresh_session(&tokens.refresh_token()).await {
            Ok(session) => self.apply(AuthTransition::Refreshed(session)).await,
            Err(BackendError::Unauthorized(_)) => {
                tracing::info!("Stored session could not be refreshed, signing out");
                self.apply(AuthTransition::SignedOut).await?;
                Ok(None)
            }
            Err(e) => Err(AuthError::Backend(e)),
        }
    }

    /// The backend caller for this session, anonymous if nobody signed in.
    ///
    /// Tokens go through the same check as [`Self::current_user`], so an
    /// expired access token is refreshed before it is sent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the stored tokens can no
    /// longer be refreshed (the session is signed out), `AuthError::Backend`
    /// if the provider cannot be reached.
    pub async fn caller(&self) -> Result<Caller, AuthError> {
        if self.session.get::<StoredTokens>(keys::TOKENS).await?.is_none() {
            return Ok(Caller::Anonymous);
        }
        if self.current_user().await?.is_none() {
            return Err(AuthError::SessionExpired);
        }
        self.session
            .get::<StoredTokens>(keys::TOKENS)
            .await?
            .map(|tokens| Caller::user(tokens.access_token))
            .ok_or(AuthError::SessionExpired)
    }

    /// Apply an auth-state transition to the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails.
    pub async fn apply(&self, transition: AuthTransition) -> Result<Option<CurrentUser>, AuthError> {
        match transition {
            AuthTransition::SignedIn(auth) => {
                // New identity, new session id.
                self.session.cycle_id().await?;
                let user = self.store_identity(&auth).await?;
                CartService::new(self.session, self.carts, user.id)
                    .restore()
                    .await?;
                set_sentry_user(&user.id, user.email.as_deref());
                tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User signed in");
                Ok(Some(user))
            }
            AuthTransition::Refreshed(auth) => {
                let user = self.store_identity(&auth).await?;
                tracing::debug!(user_id = %user.id, "Session refreshed");
                Ok(Some(user))
            }
            AuthTransition::SignedOut => {
                if let Some(user) = self.session.get::<CurrentUser>(keys::CURRENT_USER).await? {
                    CartService::new(self.session, self.carts, user.id)
                        .discard()
                        .await?;
                    tracing::info!(user_id = %user.id, "User signed out");
                }
                self.session.remove_value(keys::CURRENT_USER).await?;
                self.session.remove_value(keys::TOKENS).await?;
                clear_sentry_user();
                Ok(None)
            }
        }
    }

    async fn store_identity(&self, auth: &AuthSession) -> Result<CurrentUser, AuthError> {
        let tokens = StoredTokens::from_session(auth);
        let is_admin = self.check_admin(&auth.user, &tokens).await;
        let user = CurrentUser::from_auth(&auth.user, is_admin);
        self.session.insert(keys::TOKENS, &tokens).await?;
        self.session.insert(keys::CURRENT_USER, &user).await?;
        Ok(user)
    }

    async fn confirm(&self, auth: &AuthUser, tokens: &StoredTokens) -> Result<CurrentUser, AuthError> {
        let user = CurrentUser::from_auth(auth, self.check_admin(auth, tokens).await);
        self.session.insert(keys::CURRENT_USER, &user).await?;
        Ok(user)
    }

    // A failed lookup denies admin rights rather than failing the request.
    async fn check_admin(&self, user: &AuthUser, tokens: &StoredTokens) -> bool {
        let caller = Caller::user(tokens.access_token.clone());
        match AdminRepository::new(self.tables).is_admin(&caller, user.id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Error checking admin status");
                false
            }
        }
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use tower_sessions::MemoryStore;

    use boardquest_core::{Cart, Price, Product, ProductId};

    use super::*;
    use crate::backend::tables::ADMIN_USERS;
    use crate::backend::{MemoryBackend, SignUpOutcome};
    use crate::services::cart_store::MemoryCartStore;

    struct Fixture {
        backend: MemoryBackend,
        carts: MemoryCartStore,
        session: Session,
    }

    impl Fixture {
        fn new(backend: MemoryBackend) -> Self {
            Self {
                backend,
                carts: MemoryCartStore::new(),
                session: Session::new(None, Arc::new(MemoryStore::default()), None),
            }
        }

        fn auth(&self) -> AuthService<'_> {
            AuthService::new(&self.backend, &self.backend, &self.carts, &self.session)
        }
    }

    /// Signs people up and in, then stops answering token checks.
    struct FlakyIdentity(MemoryBackend);

    #[async_trait]
    impl IdentityProvider for FlakyIdentity {
        async fn sign_up(
            &self,
            email: &Email,
            password: &SecretString,
            username: &str,
        ) -> Result<SignUpOutcome, BackendError> {
            self.0.sign_up(email, password, username).await
        }

        async fn sign_in_with_password(
            &self,
            email: &Email,
            password: &SecretString,
        ) -> Result<AuthSession, BackendError> {
            self.0.sign_in_with_password(email, password).await
        }

        async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
            self.0.sign_out(access_token).await
        }

        async fn get_user(&self, _access_token: &SecretString) -> Result<AuthUser, BackendError> {
            Err(BackendError::Api {
                status: 503,
                message: "upstream unavailable".to_string(),
            })
        }

        async fn refresh_session(
            &self,
            refresh_token: &SecretString,
        ) -> Result<AuthSession, BackendError> {
            self.0.refresh_session(refresh_token).await
        }
    }

    fn catan() -> Product {
        Product {
            id: ProductId::random(),
            name: "Catan".to_string(),
            price: Price::from_cents(1000).unwrap(),
            image_url: None,
            description: None,
            created_at: None,
        }
    }

    async fn signed_up(fx: &Fixture) -> CurrentUser {
        let SignUpResult::SignedIn(user) =
            fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap()
        else {
            panic!("expected a signed-in user");
        };
        user
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let fx = Fixture::new(MemoryBackend::new());
        assert!(matches!(
            fx.auth().sign_up("not-an-email", "secret1", "ana").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            fx.auth().sign_up("ana@example.com", "short", "ana").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            fx.auth().sign_up("ana@example.com", "secret1", "  ").await,
            Err(AuthError::MissingUsername)
        ));
    }

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let fx = Fixture::new(MemoryBackend::new());
        let result = fx.auth().sign_up("Ana@Example.com", "secret1", "ana").await.unwrap();
        let SignUpResult::SignedIn(user) = result else {
            panic!("expected a signed-in user");
        };
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        assert!(!user.is_admin);
        assert_eq!(fx.auth().current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation() {
        let fx = Fixture::new(MemoryBackend::new().require_email_confirmation());
        let result = fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap();
        assert!(matches!(result, SignUpResult::ConfirmationRequired));
        assert!(fx.auth().current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let fx = Fixture::new(MemoryBackend::new());
        fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap();
        let err = fx
            .auth()
            .sign_up("ana@example.com", "secret1", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let fx = Fixture::new(MemoryBackend::new());
        fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap();
        fx.auth().sign_out().await.unwrap();
        assert!(matches!(
            fx.auth().sign_in("ana@example.com", "wrong-one").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_admin_gate_evaluated_on_sign_in() {
        let fx = Fixture::new(MemoryBackend::new());
        let SignUpResult::SignedIn(user) =
            fx.auth().sign_up("boss@example.com", "secret1", "boss").await.unwrap()
        else {
            panic!("expected a signed-in user");
        };
        assert!(!user.is_admin);

        fx.backend
            .seed(ADMIN_USERS, vec![json!({ "id": user.id })])
            .unwrap();
        fx.auth().sign_out().await.unwrap();
        let user = fx.auth().sign_in("boss@example.com", "secret1").await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_sign_out_clears_cart_copies() {
        let fx = Fixture::new(MemoryBackend::new());
        let SignUpResult::SignedIn(user) =
            fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap()
        else {
            panic!("expected a signed-in user");
        };
        let product = Product {
            id: ProductId::random(),
            name: "Catan".to_string(),
            price: Price::from_cents(1000).unwrap(),
            image_url: None,
            description: None,
            created_at: None,
        };
        CartService::new(&fx.session, &fx.carts, user.id)
            .add(&product)
            .await
            .unwrap();
        assert!(fx.carts.load(user.id).await.unwrap().is_some());

        fx.auth().sign_out().await.unwrap();

        assert!(fx.carts.load(user.id).await.unwrap().is_none());
        assert!(fx.session.get::<Cart>(keys::CART).await.unwrap().is_none());
        assert!(fx.auth().current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_refreshes() {
        let fx = Fixture::new(MemoryBackend::new());
        fx.auth().sign_up("ana@example.com", "secret1", "ana").await.unwrap();
        let before: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        fx.backend.expire_access_token(&before.access_token).unwrap();

        let user = fx.auth().current_user().await.unwrap();
        assert!(user.is_some());
        let after: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        assert_ne!(after.access_token, before.access_token);
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out_and_clears_cart() {
        let fx = Fixture::new(MemoryBackend::new());
        let user = signed_up(&fx).await;
        CartService::new(&fx.session, &fx.carts, user.id)
            .add(&catan())
            .await
            .unwrap();
        assert!(fx.carts.load(user.id).await.unwrap().is_some());

        // Another client used the refresh token and the access token lapsed.
        let tokens: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        fx.backend
            .refresh_session(&tokens.refresh_token())
            .await
            .unwrap();
        fx.backend.expire_access_token(&tokens.access_token).unwrap();

        assert_eq!(fx.auth().current_user().await.unwrap(), None);
        assert!(fx.session.get::<Cart>(keys::CART).await.unwrap().is_none());
        assert!(fx.carts.load(user.id).await.unwrap().is_none());
        assert!(fx.session.get::<StoredTokens>(keys::TOKENS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_provider_keeps_session() {
        let identity = FlakyIdentity(MemoryBackend::new());
        let tables = MemoryBackend::new();
        let carts = MemoryCartStore::new();
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let auth = AuthService::new(&identity, &tables, &carts, &session);
        auth.sign_up("ana@example.com", "secret1", "ana").await.unwrap();

        assert!(matches!(auth.current_user().await, Err(AuthError::Backend(_))));
        assert!(session.get::<CurrentUser>(keys::CURRENT_USER).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_caller_refreshes_expired_token() {
        let fx = Fixture::new(MemoryBackend::new());
        assert!(matches!(fx.auth().caller().await.unwrap(), Caller::Anonymous));

        signed_up(&fx).await;
        let before: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        fx.backend.expire_access_token(&before.access_token).unwrap();

        let Caller::User(token) = fx.auth().caller().await.unwrap() else {
            panic!("expected a user caller");
        };
        assert_ne!(token.expose_secret(), before.access_token);
        let after: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), after.access_token);
    }

    #[tokio::test]
    async fn test_caller_without_refresh_is_session_expired() {
        let fx = Fixture::new(MemoryBackend::new());
        signed_up(&fx).await;
        let tokens: StoredTokens = fx.session.get(keys::TOKENS).await.unwrap().unwrap();
        fx.backend
            .refresh_session(&tokens.refresh_token())
            .await
            .unwrap();
        fx.backend.expire_access_token(&tokens.access_token).unwrap();

        assert!(matches!(fx.auth().caller().await, Err(AuthError::SessionExpired)));
    }
}

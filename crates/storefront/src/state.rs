//! Application state shared across handlers.

use std::sync::Arc;

use tower_sessions::Session;

use boardquest_core::UserId;

use crate::backend::supabase::realtime;
use crate::backend::tables::{MAIN_CONTENT, PRODUCTS};
use crate::backend::{
    Backend, BackendError, ChangeFeed, IdentityProvider, MemoryBackend, ObjectStore,
    SupabaseClient, TableStore,
};
use crate::catalog::LiveCatalog;
use crate::config::{BackendConfig, StorefrontConfig};
use crate::db::{MainContentRepository, ProductRepository};
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::cart_store::{CartStore, FileCartStore};
use crate::services::uploads::ImageUploader;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend ports, the cart copy store and the live catalog.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Backend,
    carts: Arc<dyn CartStore>,
    catalog: LiveCatalog,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(config: StorefrontConfig, backend: Backend, carts: Arc<dyn CartStore>) -> Self {
        let catalog = LiveCatalog::new(config.catalog_sync);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                carts,
                catalog,
            }),
        }
    }

    /// Connect the configured backend and build state.
    ///
    /// For Supabase with realtime enabled this also starts the websocket
    /// listener, so it must run inside the Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the HTTP client cannot be built.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = match &config.backend {
            BackendConfig::Supabase(supabase) => {
                let client = SupabaseClient::new(supabase, ChangeFeed::new())?;
                if supabase.realtime {
                    realtime::spawn_listener(&client, &[PRODUCTS, MAIN_CONTENT]);
                    tracing::info!("Realtime listener started");
                }
                Backend::from_client(client)
            }
            BackendConfig::Memory => {
                tracing::warn!("Using in-memory backend; data is lost on restart");
                Backend::from_client(MemoryBackend::new())
            }
        };
        let carts: Arc<dyn CartStore> = Arc::new(FileCartStore::new(config.cart_dir.clone()));
        Ok(Self::new(config, backend, carts))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.backend.identity.as_ref()
    }

    #[must_use]
    pub fn tables(&self) -> &dyn TableStore {
        self.inner.backend.tables.as_ref()
    }

    #[must_use]
    pub fn storage(&self) -> &dyn ObjectStore {
        self.inner.backend.storage.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartStore {
        self.inner.carts.as_ref()
    }

    /// Get a reference to the live catalog snapshot.
    #[must_use]
    pub fn catalog(&self) -> &LiveCatalog {
        &self.inner.catalog
    }

    /// Start following table changes in the background.
    pub fn start_catalog_sync(&self) {
        self.inner
            .catalog
            .spawn_sync(Arc::clone(&self.inner.backend.tables));
    }

    #[must_use]
    pub fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(self.tables())
    }

    #[must_use]
    pub fn main_content(&self) -> MainContentRepository<'_> {
        MainContentRepository::new(self.tables())
    }

    #[must_use]
    pub fn uploads(&self) -> ImageUploader<'_> {
        ImageUploader::new(self.storage())
    }

    /// Auth service bound to one request's session.
    #[must_use]
    pub fn auth<'a>(&'a self, session: &'a Session) -> AuthService<'a> {
        AuthService::new(self.identity(), self.tables(), self.carts(), session)
    }

    /// Cart service for a signed-in user.
    #[must_use]
    pub fn cart<'a>(&'a self, session: &'a Session, owner: UserId) -> CartService<'a> {
        CartService::new(session, self.carts(), owner)
    }
}

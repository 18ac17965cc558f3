//! Live in-process view of the catalog and home-page content.
//!
//! The snapshot is loaded once at startup and then kept current from the
//! change feed. Two policies are supported:
//!
//! - [`SyncPolicy::Refetch`] reloads the whole table on every change.
//! - [`SyncPolicy::Merge`] applies the change payload to the snapshot and
//!   falls back to a reload when the payload is unusable.
//!
//! A [`ChangeKind::Resync`] always reloads.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use boardquest_core::{MainContent, Product, ProductId};

use crate::backend::tables::{MAIN_CONTENT, PRODUCTS};
use crate::backend::{Caller, ChangeKind, TableChange, TableStore};
use crate::db::{MainContentRepository, ProductRepository, RepositoryError};

/// How the snapshot follows table changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    #[default]
    Refetch,
    Merge,
}

#[derive(Debug, Error)]
#[error("expected 'refetch' or 'merge', got '{0}'")]
pub struct ParseSyncPolicyError(String);

impl FromStr for SyncPolicy {
    type Err = ParseSyncPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refetch" => Ok(Self::Refetch),
            "merge" => Ok(Self::Merge),
            _ => Err(ParseSyncPolicyError(s.to_string())),
        }
    }
}

/// Result of applying a change payload in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    NeedsReload,
}

/// Apply a `products` change to a newest-first list.
///
/// Inserts go to the front, updates replace by id (or go to the front if
/// the row was unknown), deletes remove by the old record's id.
#[must_use]
pub fn merge_product_change(products: &mut Vec<Product>, change: &TableChange) -> MergeOutcome {
    match change.kind {
        ChangeKind::Insert => {
            let Some(product) = decode_record::<Product>(change.record.as_ref()) else {
                return MergeOutcome::NeedsReload;
            };
            products.retain(|p| p.id != product.id);
            products.insert(0, product);
        }
        ChangeKind::Update => {
            let Some(product) = decode_record::<Product>(change.record.as_ref()) else {
                return MergeOutcome::NeedsReload;
            };
            match products.iter_mut().find(|p| p.id == product.id) {
                Some(existing) => *existing = product,
                None => products.insert(0, product),
            }
        }
        ChangeKind::Delete => {
            let Some(id) = old_record_id(change) else {
                return MergeOutcome::NeedsReload;
            };
            products.retain(|p| p.id != id);
        }
        ChangeKind::Resync => return MergeOutcome::NeedsReload,
    }
    MergeOutcome::Applied
}

/// Apply a `main_content` change to the current hero row.
#[must_use]
pub fn merge_content_change(
    content: &mut Option<MainContent>,
    change: &TableChange,
) -> MergeOutcome {
    match change.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let Some(row) = decode_record::<MainContent>(change.record.as_ref()) else {
                return MergeOutcome::NeedsReload;
            };
            // Only the first row is shown; another row appearing needs a reload.
            match content {
                Some(current) if current.id != row.id => return MergeOutcome::NeedsReload,
                _ => *content = Some(row),
            }
        }
        ChangeKind::Delete => {
            let Some(id) = change
                .old_record
                .as_ref()
                .and_then(|r| r.get("id"))
                .and_then(|v| v.as_str())
            else {
                return MergeOutcome::NeedsReload;
            };
            if content.as_ref().is_some_and(|c| c.id.to_string() == id) {
                return MergeOutcome::NeedsReload;
            }
        }
        ChangeKind::Resync => return MergeOutcome::NeedsReload,
    }
    MergeOutcome::Applied
}

fn decode_record<T: serde::de::DeserializeOwned>(record: Option<&serde_json::Value>) -> Option<T> {
    serde_json::from_value(record?.clone()).ok()
}

fn old_record_id(change: &TableChange) -> Option<ProductId> {
    change
        .old_record
        .as_ref()?
        .get("id")?
        .as_str()?
        .parse()
        .ok()
}

/// Shared, continuously updated catalog snapshot.
#[derive(Clone)]
pub struct LiveCatalog {
    inner: Arc<LiveCatalogInner>,
}

struct LiveCatalogInner {
    policy: SyncPolicy,
    products: RwLock<Vec<Product>>,
    content: RwLock<Option<MainContent>>,
    ready: AtomicBool,
}

impl LiveCatalog {
    #[must_use]
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            inner: Arc::new(LiveCatalogInner {
                policy,
                products: RwLock::new(Vec::new()),
                content: RwLock::new(None),
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Whether the first full load has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Products, newest first.
    pub async fn products(&self) -> Vec<Product> {
        self.inner.products.read().await.clone()
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.inner
            .products
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn main_content(&self) -> Option<MainContent> {
        self.inner.content.read().await.clone()
    }

    /// Replace the product snapshot from the backend.
    ///
    /// # Errors
    ///
    /// Returns the repository error; the previous snapshot is kept.
    pub async fn reload_products(&self, tables: &dyn TableStore) -> Result<(), RepositoryError> {
        let products = ProductRepository::new(tables).list(&Caller::Anonymous).await?;
        tracing::debug!(count = products.len(), "Product snapshot reloaded");
        *self.inner.products.write().await = products;
        Ok(())
    }

    /// Replace the hero content snapshot from the backend.
    ///
    /// # Errors
    ///
    /// Returns the repository error; the previous snapshot is kept.
    pub async fn reload_main_content(&self, tables: &dyn TableStore) -> Result<(), RepositoryError> {
        let content = MainContentRepository::new(tables)
            .load(&Caller::Anonymous)
            .await?;
        *self.inner.content.write().await = content;
        Ok(())
    }

    /// Load both snapshots and mark the catalog ready.
    ///
    /// # Errors
    ///
    /// Returns the first repository error.
    pub async fn load(&self, tables: &dyn TableStore) -> Result<(), RepositoryError> {
        self.reload_products(tables).await?;
        self.reload_main_content(tables).await?;
        if !self.inner.ready.swap(true, Ordering::AcqRel) {
            tracing::info!("Catalog loaded");
        }
        Ok(())
    }

    /// React to one `products` change according to the policy.
    pub async fn on_product_change(&self, tables: &dyn TableStore, change: &TableChange) {
        if self.inner.policy == SyncPolicy::Merge {
            let outcome = merge_product_change(&mut *self.inner.products.write().await, change);
            if outcome == MergeOutcome::Applied {
                return;
            }
        }
        if let Err(e) = self.reload_products(tables).await {
            tracing::error!(error = %e, kind = ?change.kind, "Failed to reload products after change");
        }
    }

    /// React to one `main_content` change according to the policy.
    pub async fn on_content_change(&self, tables: &dyn TableStore, change: &TableChange) {
        if self.inner.policy == SyncPolicy::Merge {
            let outcome = merge_content_change(&mut *self.inner.content.write().await, change);
            if outcome == MergeOutcome::Applied {
                return;
            }
        }
        if let Err(e) = self.reload_main_content(tables).await {
            tracing::error!(error = %e, kind = ?change.kind, "Failed to reload main content after change");
        }
    }

    async fn load_after_failed_start(&self, tables: &dyn TableStore) {
        if let Err(e) = self.load(tables).await {
            tracing::error!(error = %e, "Catalog load after change failed");
        }
    }

    /// Start the background task that loads and then follows the tables.
    ///
    /// Subscriptions are taken before the first load so no change between
    /// the load and the first event is missed. The first load is attempted
    /// once; if it fails the catalog stays not ready and the next change on
    /// either table triggers a full load instead of the policy handler.
    pub fn spawn_sync(&self, tables: Arc<dyn TableStore>) -> JoinHandle<()> {
        let catalog = self.clone();
        let mut products = tables.subscribe(PRODUCTS);
        let mut content = tables.subscribe(MAIN_CONTENT);

        tokio::spawn(async move {
            if let Err(e) = catalog.load(tables.as_ref()).await {
                tracing::error!(error = %e, "Initial catalog load failed");
            }

            loop {
                tokio::select! {
                    change = products.next() => match change {
                        Some(_) if !catalog.is_ready() => catalog.load_after_failed_start(tables.as_ref()).await,
                        Some(change) => catalog.on_product_change(tables.as_ref(), &change).await,
                        None => break,
                    },
                    change = content.next() => match change {
                        Some(_) if !catalog.is_ready() => catalog.load_after_failed_start(tables.as_ref()).await,
                        Some(change) => catalog.on_content_change(tables.as_ref(), &change).await,
                        None => break,
                    },
                }
            }
            tracing::warn!("Change feed closed, catalog sync stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use boardquest_core::Price;
    use serde_json::{Value, json};

    use super::*;
    use crate::backend::{BackendError, MemoryBackend, Query, TableSubscription};

    /// Delegates to a memory backend; selects fail while `down` is set.
    struct Outage {
        backend: MemoryBackend,
        down: AtomicBool,
        selects: AtomicUsize,
    }

    #[async_trait]
    impl TableStore for Outage {
        async fn select(
            &self,
            caller: &Caller,
            table: &str,
            query: &Query,
        ) -> Result<Vec<Value>, BackendError> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(BackendError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.backend.select(caller, table, query).await
        }

        async fn insert(&self, caller: &Caller, table: &str, row: Value) -> Result<Value, BackendError> {
            self.backend.insert(caller, table, row).await
        }

        async fn update(
            &self,
            caller: &Caller,
            table: &str,
            query: &Query,
            patch: Value,
        ) -> Result<Vec<Value>, BackendError> {
            self.backend.update(caller, table, query, patch).await
        }

        async fn upsert(&self, caller: &Caller, table: &str, row: Value) -> Result<Value, BackendError> {
            self.backend.upsert(caller, table, row).await
        }

        async fn delete(&self, caller: &Caller, table: &str, query: &Query) -> Result<(), BackendError> {
            self.backend.delete(caller, table, query).await
        }

        fn subscribe(&self, table: &str) -> TableSubscription {
            self.backend.subscribe(table)
        }
    }

    fn product(name: &str) -> Product {
        Product {
            id: ProductId::random(),
            name: name.to_string(),
            price: Price::from_cents(1000).unwrap(),
            image_url: None,
            description: None,
            created_at: None,
        }
    }

    fn row(product: &Product) -> serde_json::Value {
        serde_json::to_value(product).unwrap()
    }

    #[test]
    fn test_sync_policy_parse() {
        assert_eq!("refetch".parse::<SyncPolicy>().unwrap(), SyncPolicy::Refetch);
        assert_eq!(" MERGE ".parse::<SyncPolicy>().unwrap(), SyncPolicy::Merge);
        assert!("poll".parse::<SyncPolicy>().is_err());
    }

    #[test]
    fn test_merge_insert_goes_first() {
        let existing = product("Old");
        let added = product("New");
        let mut products = vec![existing.clone()];

        let outcome =
            merge_product_change(&mut products, &TableChange::insert(PRODUCTS, row(&added)));

        assert_eq!(outcome, MergeOutcome::Applied);
        assert_eq!(products, vec![added, existing]);
    }

    #[test]
    fn test_merge_update_replaces_in_place() {
        let first = product("First");
        let second = product("Second");
        let mut products = vec![first.clone(), second.clone()];

        let mut renamed = second.clone();
        renamed.name = "Second Edition".to_string();
        let change = TableChange::update(PRODUCTS, row(&renamed), json!({ "id": second.id }));

        assert_eq!(merge_product_change(&mut products, &change), MergeOutcome::Applied);
        assert_eq!(products[1].name, "Second Edition");
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn test_merge_delete_by_old_id() {
        let keep = product("Keep");
        let gone = product("Gone");
        let mut products = vec![keep.clone(), gone.clone()];

        let change = TableChange::delete(PRODUCTS, json!({ "id": gone.id }));

        assert_eq!(merge_product_change(&mut products, &change), MergeOutcome::Applied);
        assert_eq!(products, vec![keep]);
    }

    #[test]
    fn test_merge_bad_payload_needs_reload() {
        let mut products = vec![product("A")];
        let change = TableChange::insert(PRODUCTS, json!({ "name": "no id" }));
        assert_eq!(merge_product_change(&mut products, &change), MergeOutcome::NeedsReload);
        assert_eq!(products.len(), 1);

        let resync = TableChange::resync(PRODUCTS);
        assert_eq!(merge_product_change(&mut products, &resync), MergeOutcome::NeedsReload);
    }

    #[tokio::test]
    async fn test_refetch_follows_backend() {
        let backend = MemoryBackend::new();
        let catalog = LiveCatalog::new(SyncPolicy::Refetch);
        catalog.load(&backend).await.unwrap();
        assert!(catalog.is_ready());
        assert!(catalog.products().await.is_empty());

        let inserted = backend
            .insert(
                &Caller::Anonymous,
                PRODUCTS,
                json!({ "name": "Catan", "price": "39.99" }),
            )
            .await
            .unwrap();
        let change = TableChange::insert(PRODUCTS, inserted);
        catalog.on_product_change(&backend, &change).await;

        let products = catalog.products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Catan");
    }

    #[tokio::test]
    async fn test_merge_resync_reloads() {
        let backend = MemoryBackend::new();
        let catalog = LiveCatalog::new(SyncPolicy::Merge);
        catalog.load(&backend).await.unwrap();

        // Written without an event, only a reload can see it.
        backend
            .seed(PRODUCTS, vec![row(&product("Hidden"))])
            .unwrap();
        catalog
            .on_product_change(&backend, &TableChange::resync(PRODUCTS))
            .await;

        assert_eq!(catalog.products().await[0].name, "Hidden");
    }

    #[tokio::test]
    async fn test_spawned_sync_sees_writes() {
        let backend: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let catalog = LiveCatalog::new(SyncPolicy::Merge);
        let handle = catalog.spawn_sync(backend.clone());

        backend
            .insert(
                &Caller::Anonymous,
                PRODUCTS,
                json!({ "name": "Azul", "price": "29.00" }),
            )
            .await
            .unwrap();

        let mut found = false;
        for _ in 0..50 {
            if catalog.products().await.iter().any(|p| p.name == "Azul") {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(found);
    }

    #[tokio::test]
    async fn test_failed_start_is_not_retried_until_a_change() {
        let outage = Arc::new(Outage {
            backend: MemoryBackend::new(),
            down: AtomicBool::new(true),
            selects: AtomicUsize::new(0),
        });
        let catalog = LiveCatalog::new(SyncPolicy::Refetch);
        let handle = catalog.spawn_sync(outage.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!catalog.is_ready());
        assert_eq!(outage.selects.load(Ordering::SeqCst), 1);

        outage.down.store(false, Ordering::SeqCst);
        outage
            .insert(
                &Caller::Anonymous,
                PRODUCTS,
                json!({ "name": "Azul", "price": "29.00" }),
            )
            .await
            .unwrap();

        let mut ready = false;
        for _ in 0..50 {
            if catalog.is_ready() {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(ready);
        assert_eq!(catalog.products().await[0].name, "Azul");
    }
}

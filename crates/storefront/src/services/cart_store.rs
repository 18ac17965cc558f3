//! Redundant per-user cart copies.
//!
//! The session holds the authoritative cart. A copy is written here after
//! every change, keyed `cart_{user_id}`, and read back on sign-in so the
//! cart survives the session. Writes are last-writer-wins.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use boardquest_core::{Cart, UserId};

/// Errors from the cart copy store.
#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("cart storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored cart is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage key for a user's cart copy.
#[must_use]
pub fn storage_key(owner: UserId) -> String {
    format!("cart_{owner}")
}

/// Where cart copies are kept.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The stored copy, if one exists.
    async fn load(&self, owner: UserId) -> Result<Option<Cart>, CartStoreError>;

    /// Overwrite the stored copy.
    async fn save(&self, owner: UserId, cart: &Cart) -> Result<(), CartStoreError>;

    /// Delete the stored copy. Deleting a missing copy succeeds.
    async fn clear(&self, owner: UserId) -> Result<(), CartStoreError>;
}

/// One JSON file per user under a directory.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    dir: PathBuf,
}

impl FileCartStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, owner: UserId) -> PathBuf {
        self.dir.join(format!("{}.json", storage_key(owner)))
    }
}

#[async_trait]
impl CartStore for FileCartStore {
    async fn load(&self, owner: UserId) -> Result<Option<Cart>, CartStoreError> {
        match tokio::fs::read(self.path(owner)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, owner: UserId, cart: &Cart) -> Result<(), CartStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(owner);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(cart)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, owner: UserId) -> Result<(), CartStoreError> {
        match tokio::fs::remove_file(self.path(owner)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local store for tests and the memory backend.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<UserId, Cart>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn load(&self, owner: UserId) -> Result<Option<Cart>, CartStoreError> {
        Ok(self.carts.lock().await.get(&owner).cloned())
    }

    async fn save(&self, owner: UserId, cart: &Cart) -> Result<(), CartStoreError> {
        self.carts.lock().await.insert(owner, cart.clone());
        Ok(())
    }

    async fn clear(&self, owner: UserId) -> Result<(), CartStoreError> {
        self.carts.lock().await.remove(&owner);
        Ok(())
    }
}

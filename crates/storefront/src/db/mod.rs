//! Typed access to the storefront's tables.
//!
//! # Tables
//!
//! - `products` - the catalog, newest first
//! - `main_content` - the single home-page hero row
//! - `admin_users` - ids of users allowed to manage content
//!
//! Rows are stored by the hosted backend; these repositories only decode
//! them into `boardquest-core` types and build the filters. Row-level
//! security is enforced by the backend using the caller's token.

pub mod admin_users;
pub mod main_content;
pub mod products;

pub use admin_users::AdminRepository;
pub use main_content::MainContentRepository;
pub use products::ProductRepository;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A stored row did not decode into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// No row matched.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Decode one row, naming the table on failure.
fn decode<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, RepositoryError> {
    serde_json::from_value(row)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {table} row: {e}")))
}

fn decode_all<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, RepositoryError> {
    rows.into_iter().map(|row| decode(table, row)).collect()
}

/// Serialize a draft into a row body.
fn encode<T: serde::Serialize>(table: &str, draft: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(draft)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode {table} row: {e}")))
}

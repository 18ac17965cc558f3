//! Product repository.

use boardquest_core::{Product, ProductDraft, ProductId};

use super::{RepositoryError, decode, decode_all, encode};
use crate::backend::{Caller, Query, TableStore, tables::PRODUCTS};

/// Repository for the `products` table.
pub struct ProductRepository<'a> {
    tables: &'a dyn TableStore,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(tables: &'a dyn TableStore) -> Self {
        Self { tables }
    }

    /// Every product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails and
    /// `RepositoryError::DataCorruption` if a row does not decode.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Product>, RepositoryError> {
        let query = Query::new().order_by("created_at", false);
        let rows = self.tables.select(caller, PRODUCTS, &query).await?;
        decode_all(PRODUCTS, rows)
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails.
    pub async fn get(
        &self,
        caller: &Caller,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let query = Query::new().eq("id", id).limit(1);
        let rows = self.tables.select(caller, PRODUCTS, &query).await?;
        rows.into_iter()
            .next()
            .map(|row| decode(PRODUCTS, row))
            .transpose()
    }

    /// Create a product from a validated draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the insert is rejected.
    pub async fn create(
        &self,
        caller: &Caller,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let row = self
            .tables
            .insert(caller, PRODUCTS, encode(PRODUCTS, draft)?)
            .await?;
        let product: Product = decode(PRODUCTS, row)?;
        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row has `id`.
    pub async fn update(
        &self,
        caller: &Caller,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let query = Query::new().eq("id", id);
        let rows = self
            .tables
            .update(caller, PRODUCTS, &query, encode(PRODUCTS, draft)?)
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        tracing::info!(product_id = %id, "Product updated");
        decode(PRODUCTS, row)
    }

    /// Delete a product row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the delete is rejected.
    pub async fn delete(&self, caller: &Caller, id: ProductId) -> Result<(), RepositoryError> {
        let query = Query::new().eq("id", id);
        self.tables.delete(caller, PRODUCTS, &query).await?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

//! Admin membership lookups.

use boardquest_core::UserId;

use super::RepositoryError;
use crate::backend::{Caller, TableStore, tables::ADMIN_USERS};

/// Repository for the `admin_users` table.
pub struct AdminRepository<'a> {
    tables: &'a dyn TableStore,
}

impl<'a> AdminRepository<'a> {
    #[must_use]
    pub const fn new(tables: &'a dyn TableStore) -> Self {
        Self { tables }
    }

    /// Whether `user_id` has a row in `admin_users`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the lookup fails. Callers treat
    /// that as "not an admin".
    pub async fn is_admin(&self, caller: &Caller, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .exists(caller, ADMIN_USERS, "id", &user_id.to_string())
            .await?)
    }
}

//! Admin allow-list rows.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A row of the `admin_users` table.
///
/// Presence of a row whose `id` matches an auth user is the whole
/// authorization model; there are no roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
}

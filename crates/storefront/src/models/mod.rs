//! Types the storefront keeps in sessions and sends to clients.

pub mod notice;
pub mod session;

pub use notice::{Notice, NoticeLevel, WithNotice};
pub use session::{CurrentUser, StoredTokens};

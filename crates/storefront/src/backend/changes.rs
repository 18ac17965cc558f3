//! In-process fan-out of table change notifications.
//!
//! Producers (the realtime listener, or the in-memory backend on every
//! write) publish [`TableChange`]s into a [`ChangeFeed`]. Consumers hold a
//! [`TableSubscription`] filtered to one table.
//!
//! A subscriber that falls behind the channel capacity, or a feed whose
//! upstream connection dropped, receives [`ChangeKind::Resync`]: the events
//! in between are lost and the consumer must reload.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// Channel capacity before slow subscribers start lagging.
const FEED_CAPACITY: usize = 256;

/// Table name that addresses every subscription at once.
pub const ALL_TABLES: &str = "*";

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events may have been missed; reload the table.
    Resync,
}

/// One change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct TableChange {
    pub table: String,
    pub kind: ChangeKind,
    /// New row contents (insert and update).
    pub record: Option<Value>,
    /// Previous row contents (update and delete; may only carry the key).
    pub old_record: Option<Value>,
}

impl TableChange {
    #[must_use]
    pub fn insert(table: &str, record: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Insert,
            record: Some(record),
            old_record: None,
        }
    }

    #[must_use]
    pub fn update(table: &str, record: Value, old_record: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Update,
            record: Some(record),
            old_record: Some(old_record),
        }
    }

    #[must_use]
    pub fn delete(table: &str, old_record: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Delete,
            record: None,
            old_record: Some(old_record),
        }
    }

    #[must_use]
    pub fn resync(table: &str) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Resync,
            record: None,
            old_record: None,
        }
    }
}

/// Broadcast hub for change notifications.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Deliver `change` to current subscribers. No subscribers is not an error.
    pub fn publish(&self, change: TableChange) {
        let _ = self.sender.send(change);
    }

    /// Tell every subscriber to reload.
    pub fn resync_all(&self) {
        self.publish(TableChange::resync(ALL_TABLES));
    }

    #[must_use]
    pub fn subscribe(&self, table: &str) -> TableSubscription {
        TableSubscription {
            table: table.to_string(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// A receiver restricted to one table.
#[derive(Debug)]
pub struct TableSubscription {
    table: String,
    receiver: broadcast::Receiver<TableChange>,
}

impl TableSubscription {
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next change to this table.
    ///
    /// Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<TableChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.table == self.table => return Some(change),
                Ok(change) if change.table == ALL_TABLES && change.kind == ChangeKind::Resync => {
                    return Some(TableChange::resync(&self.table));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(table = %self.table, skipped, "Change subscriber lagged");
                    return Some(TableChange::resync(&self.table));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

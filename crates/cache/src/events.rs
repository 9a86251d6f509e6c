//! Store change notifications.
//!
//! Every mutation of a [`CacheStore`](crate::CacheStore) is published on a
//! broadcast channel. Subscribers that fall behind lose the oldest events
//! (`RecvError::Lagged`) rather than blocking writers.

/// Buffered events per subscriber before lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Kind of change applied to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// An entry was inserted or replaced
    Written { key: String },
    /// An entry was removed by explicit invalidation
    Invalidated { key: String },
    /// An entry was dropped to stay within capacity
    Evicted { key: String },
    /// Expired entries were purged
    Purged { count: usize },
    /// All entries were removed
    Cleared { count: usize },
    /// The store was disposed and accepts no further writes
    Disposed,
}

impl CacheEvent {
    /// Key affected by the event, for single-entry changes
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Written { key }
            | CacheEvent::Invalidated { key }
            | CacheEvent::Evicted { key } => Some(key),
            CacheEvent::Purged { .. } | CacheEvent::Cleared { .. } | CacheEvent::Disposed => None,
        }
    }
}

pub mod events;
pub mod keys;
pub mod memory;


pub use events::CacheEvent;
pub use keys::{descriptor_key, generate_key};
pub use memory::{CacheEntry, CacheStore};

/// Counters describing how the store has been used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads that found an entry older than the requested TTL
    pub expired: u64,
    pub writes: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

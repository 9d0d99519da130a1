//! Hit/miss statistics shared by the memory store and the page cache

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters kept by a store or page cache instance
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from stored data
    pub hits: u64,

    /// Lookups that found nothing usable
    pub misses: u64,

    /// Number of keys currently held
    pub entries: usize,

    /// Number of entries dropped because their TTL elapsed
    pub evictions_ttl: u64,

    /// Number of origin fetches that failed
    pub fetch_failures: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, in `0.0..=1.0`; `None` before any lookup
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            n => Some(self.hits as f64 / n as f64),
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hits / {} misses", self.hits, self.misses)?;
        if let Some(ratio) = self.hit_ratio() {
            write!(f, " ({:.1}% hit)", ratio * 100.0)?;
        }
        write!(
            f,
            ", {} entries, {} expired, {} failed fetches",
            self.entries, self.evictions_ttl, self.fetch_failures
        )
    }
}

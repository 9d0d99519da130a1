//! Store entries with optional TTL

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The value held under a single key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    /// Plain byte string (SET / GET / INCR)
    String(Vec<u8>),

    /// Ordered list of byte strings (RPUSH / LRANGE)
    List(Vec<Vec<u8>>),
}

impl StoredValue {
    /// Name of the value type, used in wrong-type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            StoredValue::String(_) => "string",
            StoredValue::List(_) => "list",
        }
    }

    /// Approximate payload size in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            StoredValue::String(bytes) => bytes.len(),
            StoredValue::List(items) => items.iter().map(Vec::len).sum(),
        }
    }
}

/// A store entry with expiry and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    /// The stored value
    pub value: StoredValue,

    /// Entry metadata
    pub metadata: EntryMetadata,
}

impl StoreEntry {
    /// Create a new entry that never expires
    pub fn new(value: StoredValue) -> Self {
        let now = Utc::now();

        Self {
            value,
            metadata: EntryMetadata {
                created_at: now,
                updated_at: now,
                expires_at: None,
                version: 1,
            },
        }
    }

    /// Create a new entry that expires after `ttl`
    pub fn with_ttl(value: StoredValue, ttl: Duration) -> Self {
        let mut entry = Self::new(value);
        entry.set_ttl(ttl);
        entry
    }

    /// Whether the expiry instant has passed
    pub fn is_expired(&self) -> bool {
        match self.metadata.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Get time until expiration, `None` for persistent or already expired entries
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let expires_at = self.metadata.expires_at?;
        (expires_at - Utc::now()).to_std().ok()
    }

    /// Set the expiry to `ttl` from now
    ///
    /// A TTL too large to represent leaves the entry without expiry.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.metadata.expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    }

    /// Drop any expiry
    pub fn persist(&mut self) {
        self.metadata.expires_at = None;
    }

    /// Replace the value, keeping the expiry
    pub fn update_value(&mut self, value: StoredValue) {
        self.value = value;
        self.metadata.updated_at = Utc::now();
        self.metadata.version += 1;
    }

    /// Mark an in-place mutation of the value
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
        self.metadata.version += 1;
    }
}

/// Metadata associated with a store entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// First write time
    pub created_at: DateTime<Utc>,

    /// Last write time
    pub updated_at: DateTime<Utc>,

    /// When the entry expires, if ever
    pub expires_at: Option<DateTime<Utc>>,

    /// Version number (incremented on writes)
    pub version: u64,
}

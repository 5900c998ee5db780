//! Bounded replay cache.
//!
//! Fixed ring of the most recently accepted (timestamp, nonce) pairs.
//! Insertion order is the only eviction policy: once full, each new pair
//! overwrites the oldest. A pair evicted from the ring is forgotten, so this
//! is a bounded defense that relies on the timestamp window to cover the
//! rest. The ring lives in memory only and starts empty after a restart.

/// Number of remembered pairs.
pub const REPLAY_CACHE_SIZE: usize = 100;

/// One slot of the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayCacheEntry {
    /// Envelope timestamp (sender's monotonic ms)
    pub timestamp: u32,
    /// Envelope nonce
    pub nonce: u32,
    /// Slot holds a recorded pair
    pub used: bool,
}

/// Ring of the last [`REPLAY_CACHE_SIZE`] accepted pairs.
#[derive(Debug, Clone)]
pub struct ReplayCache {
    entries: [ReplayCacheEntry; REPLAY_CACHE_SIZE],
    /// Next slot to overwrite. Always `< REPLAY_CACHE_SIZE`.
    cursor: usize,
}

impl ReplayCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self { entries: [ReplayCacheEntry::default(); REPLAY_CACHE_SIZE], cursor: 0 }
    }

    /// Whether the exact pair is among the remembered entries.
    pub fn contains(&self, timestamp: u32, nonce: u32) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.used && entry.timestamp == timestamp && entry.nonce == nonce)
    }

    /// Record a pair in the next slot, overwriting the oldest entry.
    pub fn record(&mut self, timestamp: u32, nonce: u32) {
        debug_assert!(self.cursor < REPLAY_CACHE_SIZE);

        self.entries[self.cursor] = ReplayCacheEntry { timestamp, nonce, used: true };
        self.cursor = (self.cursor + 1) % REPLAY_CACHE_SIZE;
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.used).count()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every pair.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

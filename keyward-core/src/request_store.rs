//! In-memory store for ceremonies awaiting their `finish` call.
//!
//! Pending options are short-lived (5 minute default) and never need
//! persistence. `take_if_present` removes and returns an entry in one
//! step, so a request ID can be redeemed at most once.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KeywardError, Result};

/// Default lifetime of a pending ceremony (5 minutes).
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(300);

/// Longest lifetime a pending ceremony may be given.
pub const MAX_REQUEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Opaque identifier handed to the client at `start` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| KeywardError::NoSuchCeremony)
    }
}

struct PendingEntry<T> {
    value: T,
    expires_at: Instant,
}

/// Pending ceremonies keyed by [`RequestId`], with TTL expiry.
pub struct PendingRequestStore<T> {
    entries: DashMap<RequestId, PendingEntry<T>>,
    ttl: Duration,
}

impl<T> PendingRequestStore<T> {
    /// `ttl` is capped at [`MAX_REQUEST_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ttl.min(MAX_REQUEST_TTL),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a pending ceremony under an existing ID.
    pub fn put(&self, id: RequestId, value: T) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(self.ttl)
            .unwrap_or_else(|| now + DEFAULT_REQUEST_TTL);
        self.entries.insert(id, PendingEntry { value, expires_at });
    }

    /// Store a pending ceremony under a fresh ID.
    pub fn insert(&self, value: T) -> RequestId {
        let id = RequestId::new();
        self.put(id, value);
        id
    }

    /// Retrieve and invalidate in one step. Expired entries are dropped
    /// and reported as absent.
    pub fn take_if_present(&self, id: &RequestId) -> Option<T> {
        let (_, entry) = self.entries.remove(id)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value)
        } else {
            None // Expired
        }
    }

    /// Remove expired entries (called periodically). Returns how many
    /// were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for PendingRequestStore<T> {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TTL)
    }
}

impl<T> fmt::Debug for PendingRequestStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequestStore")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_take_is_single_use() {
        let store = PendingRequestStore::default();
        let id = store.insert("options");
        assert_eq!(store.take_if_present(&id), Some("options"));
        assert_eq!(store.take_if_present(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_takes_yield_one_winner() {
        for _ in 0..32 {
            let store = Arc::new(PendingRequestStore::default());
            let id = store.insert(42u32);
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        store.take_if_present(&id)
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .count();
            assert_eq!(winners, 1, "Exactly one take should observe the request");
        }
    }

    #[test]
    fn test_expired_entry_not_returned() {
        let store = PendingRequestStore::new(Duration::ZERO);
        let id = store.insert("stale");
        assert_eq!(store.take_if_present(&id), None);
    }

    #[test]
    fn test_cleanup_expired() {
        let expired = PendingRequestStore::new(Duration::ZERO);
        expired.insert(1);
        expired.insert(2);
        assert_eq!(expired.cleanup_expired(), 2);
        assert!(expired.is_empty());

        let live = PendingRequestStore::new(Duration::from_secs(60));
        live.insert(1);
        assert_eq!(live.cleanup_expired(), 0);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let store = PendingRequestStore::new(Duration::MAX);
        assert_eq!(store.ttl(), MAX_REQUEST_TTL);
        let id = store.insert("long-lived");
        assert_eq!(store.take_if_present(&id), Some("long-lived"));
    }

    #[test]
    fn test_request_id_parsing() {
        let id = RequestId::new();
        assert_eq!(id.to_string().parse::<RequestId>().unwrap(), id);
        assert_eq!(
            "not-a-uuid".parse::<RequestId>(),
            Err(KeywardError::NoSuchCeremony)
        );
    }
}

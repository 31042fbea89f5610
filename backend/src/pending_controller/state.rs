//! Holds operations that wait on the operator between HTTP requests.
//!
//! A bulk upload sits here from the moment the CSV is parsed until it is
//! committed or cancelled, and a merge request from proposal until it is
//! applied or rejected. Both are addressed by an opaque operation token.
//!
//! The main components are:
//! - `PendingMap`: a clonable, thread-safe token map whose entries expire after
//!   a period of inactivity.
//! - `PendingState`: the maps for uploads and merges, injected into the Actix
//!   application state in `main.rs`.
//! - `start_pending_sweeper`: a long-running task that purges expired entries.

use common::model::candidate::CandidateRecord;
use common::model::merge::MergeRequest;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Generates a fresh operation token.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

struct Entry<T> {
    value: T,
    touched: Instant,
}

impl<T> Entry<T> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

/// Token-keyed store of pending values with an idle expiry.
///
/// An entry that has not been read or written for longer than `ttl` behaves as
/// if it were absent, even before the sweeper removes it.
pub struct PendingMap<T> {
    entries: Arc<RwLock<HashMap<String, Entry<T>>>>,
    ttl: Duration,
}

impl<T> Clone for PendingMap<T> {
    fn clone(&self) -> Self {
        PendingMap {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
        }
    }
}

impl<T: Clone> PendingMap<T> {
    pub fn new(ttl: Duration) -> Self {
        PendingMap {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn insert(&self, token: String, value: T) {
        let entry = Entry {
            value,
            touched: Instant::now(),
        };
        self.entries.write().await.insert(token, entry);
    }

    /// Returns a copy of the live value for `token` and refreshes its expiry.
    pub async fn get(&self, token: &str) -> Option<T> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(token) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                entry.touched = Instant::now();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Replaces the value of a live entry. Returns `false` if it is gone.
    pub async fn replace(&self, token: &str, value: T) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(token) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                entry.value = value;
                entry.touched = Instant::now();
                true
            }
            Some(_) => {
                entries.remove(token);
                false
            }
            None => false,
        }
    }

    /// Runs `f` on the live value for `token` under the write lock, so no
    /// other request observes the entry between the read and the write.
    pub async fn update<F, R>(&self, token: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(token) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                entry.touched = Instant::now();
                Some(f(&mut entry.value))
            }
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, token: &str) -> Option<T> {
        let entry = self.entries.write().await.remove(token)?;
        if entry.is_expired(self.ttl) {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Finds a live entry matching `predicate`.
    pub async fn find<F>(&self, predicate: F) -> Option<(String, T)>
    where
        F: Fn(&T) -> bool,
    {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|(_, entry)| !entry.is_expired(self.ttl) && predicate(&entry.value))
            .map(|(token, entry)| (token.clone(), entry.value.clone()))
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl));
        before - entries.len()
    }
}

/// An uploaded batch waiting for confirmation.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    /// MD5 of the uploaded bytes, used to recognise a repeated upload.
    pub digest: String,
    pub records: Vec<CandidateRecord>,
    /// Bumped on every write, so a validation pass started from an older copy
    /// cannot overwrite newer records.
    pub revision: u64,
}

/// Shared state for every operation awaiting the operator.
#[derive(Clone)]
pub struct PendingState {
    pub uploads: PendingMap<PendingUpload>,
    pub merges: PendingMap<MergeRequest>,
}

impl PendingState {
    pub fn new(ttl: Duration) -> Self {
        PendingState {
            uploads: PendingMap::new(ttl),
            merges: PendingMap::new(ttl),
        }
    }
}

/// Periodically purges expired uploads and merge requests.
///
/// Spawned once from `main.rs`; runs for the lifetime of the server.
pub async fn start_pending_sweeper(state: PendingState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let uploads = state.uploads.purge_expired().await;
        let merges = state.merges.purge_expired().await;
        if uploads + merges > 0 {
            debug!(
                "Expired {} pending upload(s) and {} merge request(s)",
                uploads, merges
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn live_entries_round_trip() {
        let map = PendingMap::new(Duration::from_secs(60));
        map.insert("a".to_string(), 1).await;

        assert_eq!(map.get("a").await, Some(1));
        assert!(map.replace("a", 2).await);
        assert_eq!(map.remove("a").await, Some(2));
        assert_eq!(map.get("a").await, None);
        assert!(!map.replace("a", 3).await);
    }

    #[tokio::test]
    async fn update_changes_live_entries_only() {
        let map = PendingMap::new(Duration::from_secs(60));
        map.insert("a".to_string(), 1).await;

        assert_eq!(map.update("a", |v| { *v += 1; *v }).await, Some(2));
        assert_eq!(map.get("a").await, Some(2));
        assert_eq!(map.update("b", |v| *v).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purged() {
        let map = PendingMap::new(Duration::from_millis(10));
        map.insert("a".to_string(), 1).await;
        map.insert("b".to_string(), 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(map.find(|v| *v == 2).await, None);
        assert_eq!(map.get("a").await, None);
        assert_eq!(map.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn find_matches_on_value() {
        let map = PendingMap::new(Duration::from_secs(60));
        map.insert("a".to_string(), 1).await;
        map.insert("b".to_string(), 2).await;

        assert_eq!(map.find(|v| *v == 2).await, Some(("b".to_string(), 2)));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(new_token(), new_token());
    }
}

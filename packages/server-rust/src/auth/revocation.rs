//! Revoked session tokens with automatic expiry.
//!
//! Memory-resident only: a process restart forgets every revocation, so a
//! token logged out before the restart is accepted again until it expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::service::worker::BackgroundRunnable;

/// Set of revoked tokens, each kept until its own expiry instant.
#[derive(Debug, Default)]
pub struct RevocationStore {
    entries: Mutex<HashMap<String, SystemTime>>,
}

impl RevocationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes `token` until `expires_at`, replacing any earlier entry.
    pub fn add(&self, token: impl Into<String>, expires_at: SystemTime) {
        self.entries.lock().insert(token.into(), expires_at);
    }

    /// Returns `true` if `token` is revoked and its entry has not yet expired.
    ///
    /// An expired entry found by lookup is removed on the spot.
    #[must_use]
    pub fn is_revoked(&self, token: &str) -> bool {
        self.is_revoked_at(token, SystemTime::now())
    }

    #[must_use]
    pub fn is_revoked_at(&self, token: &str, now: SystemTime) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(token) {
            Some(expires_at) if *expires_at > now => true,
            Some(_) => {
                entries.remove(token);
                false
            }
            None => false,
        }
    }

    /// Removes every entry whose expiry has elapsed. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(SystemTime::now())
    }

    pub fn sweep_at(&self, now: SystemTime) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Background job that sweeps expired revocations on every tick.
pub struct RevocationSweep {
    store: Arc<RevocationStore>,
}

impl RevocationSweep {
    #[must_use]
    pub fn new(store: Arc<RevocationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BackgroundRunnable for RevocationSweep {
    fn name(&self) -> &'static str {
        "revocation-sweep"
    }

    async fn on_tick(&mut self) {
        let removed = self.store.sweep();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "expired revocations swept");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn added_token_is_revoked_until_expiry() {
        let store = RevocationStore::new();
        let now = SystemTime::now();
        store.add("tok1", now + Duration::from_secs(60));

        assert!(store.is_revoked_at("tok1", now));
        assert!(!store.is_revoked_at("tok2", now));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sweep_removes_only_elapsed_entries() {
        let store = RevocationStore::new();
        let now = SystemTime::now();
        store.add("short", now + Duration::from_secs(60));
        store.add("long", now + Duration::from_secs(600));

        assert_eq!(store.sweep_at(now + Duration::from_secs(61)), 1);
        assert!(!store.is_revoked_at("short", now));
        assert!(store.is_revoked_at("long", now));
    }

    #[test]
    fn lookup_drops_expired_entry() {
        let store = RevocationStore::new();
        let now = SystemTime::now();
        store.add("tok", now + Duration::from_secs(1));

        assert!(!store.is_revoked_at("tok", now + Duration::from_secs(2)));
        assert!(store.is_empty());
    }

    #[test]
    fn add_overwrites_expiry() {
        let store = RevocationStore::new();
        let now = SystemTime::now();
        store.add("tok", now + Duration::from_secs(1));
        store.add("tok", now + Duration::from_secs(100));

        assert_eq!(store.sweep_at(now + Duration::from_secs(50)), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_worker_clears_already_expired_tokens() {
        let store = Arc::new(RevocationStore::new());
        store.add("stale", SystemTime::now() - Duration::from_secs(1));
        store.add("fresh", SystemTime::now() + Duration::from_secs(3600));

        let mut worker = crate::service::worker::BackgroundWorker::start(
            RevocationSweep::new(store.clone()),
            Duration::from_secs(60),
        );
        tokio::time::sleep(Duration::from_secs(61)).await;
        worker.stop().await;

        assert_eq!(store.len(), 1);
    }
}

//! Proof watcher — Merlin's eyes on the pool.
//!
//! Polls the proofs directory and delivers documents it has not seen before.
//! The watcher never validates: "I have seen this identifier" and "this
//! document is acceptable" are separate concerns, so a transient fetch error
//! never blacklists a valid proof.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use merlin_core::constants::PROOFS_DIR;
use merlin_core::types::Timestamp;
use merlin_core::MerlinError;
use merlin_store::ObjectStore;

pub struct ProofWatcher<S: ObjectStore> {
    store: Arc<S>,
    /// Identifiers already delivered. An id is added only once its document
    /// has been fetched successfully, so failed fetches retry on the next poll.
    seen: HashSet<String>,
    /// Ids sealed into an epoch, queued (oldest first) for eventual removal
    /// from `seen` once the retention window has passed.
    retired: VecDeque<(Timestamp, String)>,
    retention_secs: i64,
    total_seen: u64,
}

impl<S: ObjectStore> ProofWatcher<S> {
    pub fn new(store: Arc<S>, retention_secs: i64) -> Self {
        Self {
            store,
            seen: HashSet::new(),
            retired: VecDeque::new(),
            retention_secs,
            total_seen: 0,
        }
    }

    /// Return every proof document not seen before, in listing order.
    pub async fn poll(&mut self, now: Timestamp) -> Result<Vec<Value>, MerlinError> {
        let ids = self.store.list_directory(PROOFS_DIR).await?;
        self.trim_retired(&ids, now);

        let mut fresh = Vec::new();
        for id in ids {
            if self.seen.contains(&id) {
                continue;
            }
            let path = format!("{PROOFS_DIR}/{id}.json");
            match self.store.fetch_file(&path).await {
                Ok(Some(doc)) => {
                    debug!(proof_id = %id, "new proof found");
                    self.seen.insert(id);
                    self.total_seen += 1;
                    fresh.push(doc);
                }
                Ok(None) => debug!(proof_id = %id, "proof not readable, will retry"),
                Err(e) => warn!(proof_id = %id, error = %e, "proof fetch failed, will retry"),
            }
        }

        if !fresh.is_empty() {
            info!(count = fresh.len(), "new proofs discovered");
        }
        Ok(fresh)
    }

    /// Record ids that were sealed into an epoch at `now`. They become
    /// eligible to be forgotten after the retention window.
    pub fn retire(&mut self, ids: &[String], now: Timestamp) {
        for id in ids {
            self.retired.push_back((now, id.clone()));
        }
    }

    /// Number of identifiers currently tracked.
    pub fn known(&self) -> usize {
        self.seen.len()
    }

    /// Total proofs delivered over the process lifetime.
    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    /// Forget retired ids past retention — but only once their file has left
    /// the directory. Forgetting a still-listed id would deliver it again on
    /// the very next poll, and a proof must never enter two epochs.
    fn trim_retired(&mut self, listed: &[String], now: Timestamp) {
        let due = self
            .retired
            .front()
            .is_some_and(|(ts, _)| now - *ts >= self.retention_secs);
        if !due {
            return;
        }

        let listed: HashSet<&str> = listed.iter().map(String::as_str).collect();
        let mut kept = VecDeque::with_capacity(self.retired.len());
        while let Some((ts, id)) = self.retired.pop_front() {
            if now - ts >= self.retention_secs && !listed.contains(id.as_str()) {
                debug!(proof_id = %id, "forgetting retired proof id");
                self.seen.remove(&id);
            } else {
                kept.push_back((ts, id));
            }
        }
        self.retired = kept;
    }
}

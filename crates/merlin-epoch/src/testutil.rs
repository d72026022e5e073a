//! In-memory object store for exercising the pipeline without a daemon.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use merlin_core::MerlinError;
use merlin_store::ObjectStore;

#[derive(Default)]
pub struct MockStore {
    /// Mutable path → document.
    files: Mutex<BTreeMap<String, Value>>,
    /// Content address → document.
    blobs: Mutex<BTreeMap<String, Value>>,
    /// Mutable path → CID of its current content.
    cids: Mutex<BTreeMap<String, String>>,
    /// Topic announcements in publish order.
    topics: Mutex<Vec<(String, Value)>>,
    /// Paths whose fetch fails with a transport error.
    failing: Mutex<HashSet<String>>,
    next_cid: AtomicU64,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, path: &str, doc: Value) {
        self.files.lock().unwrap().insert(path.to_string(), doc);
    }

    pub fn remove_file(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn put_blob(&self, cid: &str, doc: Value) {
        self.blobs.lock().unwrap().insert(cid.to_string(), doc);
    }

    pub fn fail_fetch(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn heal_fetches(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn file(&self, path: &str) -> Option<Value> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn blob(&self, cid: &str) -> Option<Value> {
        self.blobs.lock().unwrap().get(cid).cloned()
    }

    pub fn topic_messages(&self, topic: &str) -> Vec<Value> {
        self.topics
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn check_connection(&self) -> bool {
        true
    }

    async fn ensure_directories(&self) -> Result<(), MerlinError> {
        Ok(())
    }

    async fn publish_snapshot(
        &self,
        doc: &Value,
        directory: &str,
        id: &str,
    ) -> Result<String, MerlinError> {
        let n = self.next_cid.fetch_add(1, Ordering::SeqCst);
        let cid = format!("bafymock{n:08}");
        let path = format!("{directory}/{id}.json");
        self.files.lock().unwrap().insert(path.clone(), doc.clone());
        self.blobs.lock().unwrap().insert(cid.clone(), doc.clone());
        self.cids.lock().unwrap().insert(path, cid.clone());
        Ok(cid)
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, MerlinError> {
        let prefix = format!("{path}/");
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .filter_map(|rest| rest.strip_suffix(".json"))
            .map(str::to_string)
            .collect())
    }

    async fn fetch_file(&self, path: &str) -> Result<Option<Value>, MerlinError> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(MerlinError::Store(format!("simulated failure: {path}")));
        }
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn fetch_by_cid(&self, cid: &str) -> Result<Option<Value>, MerlinError> {
        Ok(self.blobs.lock().unwrap().get(cid).cloned())
    }

    async fn stat_cid(&self, path: &str) -> Result<Option<String>, MerlinError> {
        Ok(self.cids.lock().unwrap().get(path).cloned())
    }

    async fn publish(&self, topic: &str, doc: &Value) {
        self.topics
            .lock()
            .unwrap()
            .push((topic.to_string(), doc.clone()));
    }
}

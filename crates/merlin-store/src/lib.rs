//! Object-store access for Merlin.
//!
//! The store is an HTTP daemon exposing a content-addressed blob space, a
//! mutable-path filesystem, and a publish/subscribe bus. Merlin reads proofs
//! and jobs from it and writes signed snapshots back; it is the only network
//! surface the daemon touches.

use async_trait::async_trait;
use serde_json::Value;

use merlin_core::MerlinError;

mod client;

pub use client::StoreClient;

/// The narrow store interface the pipeline is written against.
///
/// Implemented by [`StoreClient`] for the real HTTP store and by in-memory
/// fakes in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single liveness probe. Logs the peer identity when reachable.
    async fn check_connection(&self) -> bool;

    /// Create the canonical directory layout, ignoring "already exists".
    async fn ensure_directories(&self) -> Result<(), MerlinError>;

    /// Canonical-encode `doc`, add it to the blob space (CID v1), replace
    /// `{directory}/{id}.json` with the new content address, and pin it.
    /// Returns the CID; after success the document is reachable both by
    /// mutable path and by content address.
    async fn publish_snapshot(
        &self,
        doc: &Value,
        directory: &str,
        id: &str,
    ) -> Result<String, MerlinError>;

    /// Base names (without `.json`) of the JSON entries under `path`.
    async fn list_directory(&self, path: &str) -> Result<Vec<String>, MerlinError>;

    /// Read a JSON document at a mutable path. `Ok(None)` when the path is
    /// absent or does not hold JSON; `Err` on transport failure.
    async fn fetch_file(&self, path: &str) -> Result<Option<Value>, MerlinError>;

    /// Read a JSON document by content address.
    async fn fetch_by_cid(&self, cid: &str) -> Result<Option<Value>, MerlinError>;

    /// CID currently pointed at by a mutable path.
    async fn stat_cid(&self, path: &str) -> Result<Option<String>, MerlinError>;

    /// Best-effort pubsub announcement. Failures are logged at debug level
    /// and never affect correctness.
    async fn publish(&self, topic: &str, doc: &Value);
}

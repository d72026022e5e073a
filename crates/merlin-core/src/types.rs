use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{epoch_id, epoch_name, DOC_VERSION};

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── EpochStatus ──────────────────────────────────────────────────────────────

/// Lifecycle state of an epoch. `Active` epochs may be rewritten at their
/// mutable path; `Sealed` epochs are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpochStatus {
    Active,
    Sealed,
}

impl fmt::Display for EpochStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpochStatus::Active => write!(f, "active"),
            EpochStatus::Sealed => write!(f, "sealed"),
        }
    }
}

// ── Settlements ──────────────────────────────────────────────────────────────

/// Reward distribution for one sealed epoch.
///
/// Amounts are binary floats — display-quality USDC, not on-chain precision.
/// `providers` maps provider name to its share of the pool; keys are kept
/// sorted so the serialized form is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlements {
    pub total_volume: f64,
    pub provider_pool: f64,
    pub network_ops: f64,
    pub providers: BTreeMap<String, f64>,
    pub provider_count: usize,
}

// ── Epoch ────────────────────────────────────────────────────────────────────

/// An epoch snapshot as persisted to the ledger.
///
/// While active, `ended_at`, `merkle_root`, and `settlements` serialize as
/// `null`. `sig` is omitted from serialization until attached, because the
/// signature is computed over the canonical form without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub version: String,
    pub epoch_id: String,
    pub epoch_number: u64,
    pub name: String,
    pub status: EpochStatus,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub jobs_count: u64,
    pub proofs_count: u64,
    pub total_volume_usdc: String,
    pub merkle_root: Option<String>,
    pub settlements: Option<Settlements>,
    pub proofs: Vec<String>,
    pub controller: String,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl Epoch {
    /// A freshly opened epoch: zeroed counters, no settlement data yet.
    pub fn open(epoch_number: u64, controller: &str, now: Timestamp) -> Self {
        Self {
            doc_type: "epoch".to_string(),
            version: DOC_VERSION.to_string(),
            epoch_id: epoch_id(epoch_number),
            epoch_number,
            name: epoch_name(epoch_number).to_string(),
            status: EpochStatus::Active,
            started_at: now,
            ended_at: None,
            jobs_count: 0,
            proofs_count: 0,
            total_volume_usdc: "0.00".to_string(),
            merkle_root: None,
            settlements: None,
            proofs: Vec::new(),
            controller: controller.to_string(),
            timestamp: now,
            sig: None,
        }
    }
}

// ── Proof ────────────────────────────────────────────────────────────────────

/// Metrics attached to a proof by the worker that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofMetrics {
    pub inference_seconds: f64,
    pub confidence: f64,
}

/// Typed view of a worker proof, obtained after schema validation.
///
/// Proofs travel as raw JSON (workers may attach fields Merlin does not
/// know about, and the signature covers all of them); this struct carries
/// the fields the pipeline actually reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub version: String,
    pub proof_id: String,
    pub job_cid: String,
    pub output_cid: String,
    pub metrics: ProofMetrics,
    pub provider: String,
    pub timestamp: Timestamp,
    pub proof_hash: String,
    pub sig: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_epoch_has_null_settlement_fields() {
        let epoch = Epoch::open(1, "merlin.swarmos.eth", 1_700_000_000);
        let value = serde_json::to_value(&epoch).unwrap();

        assert_eq!(value["type"], "epoch");
        assert_eq!(value["epoch_id"], "epoch-0001");
        assert_eq!(value["name"], "Bravo");
        assert_eq!(value["status"], "active");
        assert_eq!(value["total_volume_usdc"], "0.00");
        assert!(value["ended_at"].is_null());
        assert!(value["merkle_root"].is_null());
        assert!(value["settlements"].is_null());
        assert_eq!(value["proofs"], json!([]));
        // sig must be absent entirely, not null: it would otherwise be
        // covered by its own signature
        assert!(value.get("sig").is_none());
    }

    #[test]
    fn status_round_trips_lowercase() {
        assert_eq!(serde_json::to_value(EpochStatus::Sealed).unwrap(), json!("sealed"));
        let status: EpochStatus = serde_json::from_value(json!("active")).unwrap();
        assert_eq!(status, EpochStatus::Active);
    }

    #[test]
    fn proof_deserializes_from_worker_document() {
        let doc = json!({
            "type": "proof",
            "version": "1.0.0",
            "proof_id": "proof-abc",
            "job_cid": "bafyjobcid",
            "output_cid": "bafyoutcid",
            "metrics": {"inference_seconds": 2.5, "confidence": 0.97},
            "provider": "alice.eth",
            "timestamp": 1_700_000_123,
            "proof_hash": "0xabcd",
            "sig": "0x1234",
            "extra_worker_field": "ignored"
        });
        let proof: Proof = serde_json::from_value(doc).unwrap();
        assert_eq!(proof.provider, "alice.eth");
        assert_eq!(proof.metrics.confidence, 0.97);
    }
}

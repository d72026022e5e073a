//! Epoch lifecycle state machine.
//!
//! The manager owns the current epoch, the ordered accumulator of accepted
//! proofs, and the per-epoch processed-id set. States move `NoEpoch →
//! Active(E) → Sealing(E) → Active(E+1)`; on shutdown the final state is a
//! seal with no reopen. A sealed epoch is never rewritten — the mutable path
//! is only replaced while the epoch is active, and every earlier revision
//! stays pinned by content address.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use merlin_core::constants::{
    parse_epoch_id, topic_epochs_opened, topic_epochs_sealed, EPOCHS_DIR,
};
use merlin_core::schema::validate_proof;
use merlin_core::types::{Epoch, EpochStatus, Proof, Timestamp};
use merlin_core::MerlinError;
use merlin_crypto::{merkle_root, Signer};
use merlin_store::ObjectStore;

use crate::settlement::{compute_settlements, format_usdc, AcceptedProof};

// ── Settings ─────────────────────────────────────────────────────────────────

/// The slice of daemon configuration the epoch manager needs.
#[derive(Debug, Clone)]
pub struct EpochSettings {
    /// Controller identity written into every epoch (e.g. `merlin.swarmos.eth`).
    pub identity: String,
    /// Pool name used in announcement topics.
    pub pool: String,
    pub epoch_duration_secs: i64,
    pub provider_share: f64,
    pub network_ops_share: f64,
}

/// What a successful seal produced.
#[derive(Debug, Clone)]
pub struct SealOutcome {
    pub epoch_id: String,
    pub cid: String,
    /// Proof ids included in the seal, in acceptance order.
    pub proof_ids: Vec<String>,
}

// ── EpochManager ─────────────────────────────────────────────────────────────

pub struct EpochManager<S: ObjectStore> {
    store: Arc<S>,
    signer: Signer,
    settings: EpochSettings,
    current: Option<Epoch>,
    accumulator: Vec<AcceptedProof>,
    processed: HashSet<String>,
    epoch_number: u64,
}

impl<S: ObjectStore> EpochManager<S> {
    pub fn new(store: Arc<S>, signer: Signer, settings: EpochSettings) -> Self {
        Self {
            store,
            signer,
            settings,
            current: None,
            accumulator: Vec::new(),
            processed: HashSet::new(),
            epoch_number: 0,
        }
    }

    pub fn current(&self) -> Option<&Epoch> {
        self.current.as_ref()
    }

    pub fn current_epoch_id(&self) -> Option<&str> {
        self.current.as_ref().map(|e| e.epoch_id.as_str())
    }

    /// Proofs accepted into the current epoch so far.
    pub fn pending_proofs(&self) -> usize {
        self.accumulator.len()
    }

    pub fn controller_address(&self) -> &str {
        self.signer.address()
    }

    // ── Numbering ────────────────────────────────────────────────────────────

    /// Resume the epoch counter from the ledger so numbering stays strictly
    /// increasing across restarts of the same controller.
    pub async fn recover_epoch_number(&mut self) -> Result<(), MerlinError> {
        let ids = self.store.list_directory(EPOCHS_DIR).await?;
        if let Some(max) = ids.iter().filter_map(|id| parse_epoch_id(id)).max() {
            self.epoch_number = max;
            info!(last_epoch = max, "resuming epoch numbering from ledger");
        }
        Ok(())
    }

    // ── Opening ──────────────────────────────────────────────────────────────

    /// Open an epoch if none is active.
    pub async fn ensure_active_epoch(&mut self, now: Timestamp) -> Result<(), MerlinError> {
        if self.current.is_none() {
            self.open_epoch(now).await?;
        }
        Ok(())
    }

    /// Open the next epoch: sign the fresh document, publish it, announce it,
    /// and reset the accumulator.
    pub async fn open_epoch(&mut self, now: Timestamp) -> Result<(), MerlinError> {
        self.epoch_number += 1;
        let mut epoch = Epoch::open(self.epoch_number, &self.settings.identity, now);

        let mut doc = serde_json::to_value(&epoch)?;
        self.signer.sign_and_attach(&mut doc)?;
        let cid = self
            .store
            .publish_snapshot(&doc, EPOCHS_DIR, &epoch.epoch_id)
            .await?;

        self.store
            .publish(
                &topic_epochs_opened(&self.settings.pool),
                &json!({
                    "epoch_id": epoch.epoch_id,
                    "name": epoch.name,
                    "started_at": epoch.started_at,
                    "cid": cid,
                }),
            )
            .await;

        info!(epoch_id = %epoch.epoch_id, name = %epoch.name, cid = %cid, "epoch opened");

        epoch.sig = doc.get("sig").and_then(Value::as_str).map(str::to_string);
        self.current = Some(epoch);
        self.accumulator.clear();
        self.processed.clear();
        Ok(())
    }

    // ── Accumulating ─────────────────────────────────────────────────────────

    /// Whether the active epoch has reached its seal deadline.
    pub fn should_seal(&self, now: Timestamp) -> bool {
        match &self.current {
            Some(epoch) => now - epoch.started_at >= self.settings.epoch_duration_secs,
            None => false,
        }
    }

    /// Validate one newly observed proof and, if acceptable, add it to the
    /// current epoch. Returns whether the proof was accepted.
    pub async fn process_proof(&mut self, doc: Value, now: Timestamp) -> bool {
        if self.current.is_none() {
            warn!("proof observed with no active epoch, dropping");
            return false;
        }

        let proof_id = doc
            .get("proof_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        if self.processed.contains(&proof_id) {
            debug!(proof_id = %proof_id, "proof already processed this epoch");
            return false;
        }

        if let Err(reasons) = validate_proof(&doc) {
            warn!(proof_id = %proof_id, ?reasons, "proof failed schema validation");
            return false;
        }

        // The schema guarantees a 0x-prefixed signature is present. Recovery
        // against the provider's address needs off-band name resolution and
        // is left to audit.
        let proof: Proof = match serde_json::from_value(doc) {
            Ok(proof) => proof,
            Err(e) => {
                warn!(proof_id = %proof_id, error = %e, "proof does not match the data model");
                return false;
            }
        };

        // Fetch the referenced job for its reward. Best-effort: a missing or
        // unreadable job settles at the default reward.
        let job = match self.store.fetch_by_cid(&proof.job_cid).await {
            Ok(job) => job,
            Err(e) => {
                debug!(job_cid = %proof.job_cid, error = %e, "job fetch failed");
                None
            }
        };

        self.accumulator.push(AcceptedProof {
            proof,
            job,
            processed_at: now,
        });
        self.processed.insert(proof_id.clone());
        debug!(proof_id = %proof_id, "proof accepted into epoch");
        true
    }

    // ── Sealing ──────────────────────────────────────────────────────────────

    /// Seal the current epoch: settle, commit, sign, publish, announce.
    ///
    /// Nothing is mutated until the publish succeeds, so a failed seal leaves
    /// the epoch active and the next tick retries. Returns `None` when there
    /// is no epoch to seal.
    pub async fn seal_epoch(&mut self, now: Timestamp) -> Result<Option<SealOutcome>, MerlinError> {
        let Some(active) = self.current.as_ref() else {
            return Ok(None);
        };

        // Settlement first, then the commitment: the signature covers both,
        // and future revisions may fold settlement fields under the Merkle
        // root as well.
        let settlements = compute_settlements(
            &self.accumulator,
            self.settings.provider_share,
            self.settings.network_ops_share,
        );

        let proof_ids: Vec<String> = self
            .accumulator
            .iter()
            .map(|item| item.proof.proof_id.clone())
            .collect();
        let root = merkle_root(&proof_ids)?;

        let mut sealed = active.clone();
        sealed.status = EpochStatus::Sealed;
        sealed.ended_at = Some(now);
        sealed.jobs_count = self.accumulator.len() as u64;
        sealed.proofs_count = self.accumulator.len() as u64;
        sealed.total_volume_usdc = format_usdc(settlements.total_volume);
        sealed.merkle_root = Some(root.clone());
        sealed.settlements = Some(settlements.clone());
        sealed.proofs = proof_ids.clone();
        sealed.timestamp = now;
        // the open-time signature must not leak into the sealed form
        sealed.sig = None;

        let mut doc = serde_json::to_value(&sealed)?;
        self.signer.sign_and_attach(&mut doc)?;
        let cid = self
            .store
            .publish_snapshot(&doc, EPOCHS_DIR, &sealed.epoch_id)
            .await?;

        self.store
            .publish(
                &topic_epochs_sealed(&self.settings.pool),
                &json!({
                    "epoch_id": sealed.epoch_id,
                    "jobs_count": sealed.jobs_count,
                    "total_volume": settlements.total_volume,
                    "merkle_root": root,
                    "cid": cid,
                }),
            )
            .await;

        info!(
            epoch_id = %sealed.epoch_id,
            jobs = sealed.jobs_count,
            volume = %sealed.total_volume_usdc,
            merkle = %&root[..18.min(root.len())],
            cid = %cid,
            "epoch sealed"
        );
        let mut payouts: Vec<(&String, &f64)> = settlements.providers.iter().collect();
        payouts.sort_by(|a, b| b.1.total_cmp(a.1));
        for (provider, amount) in payouts.iter().take(5) {
            info!(provider = %provider, amount = format!("{amount:.4}"), "provider payout");
        }

        let outcome = SealOutcome {
            epoch_id: sealed.epoch_id.clone(),
            cid,
            proof_ids,
        };
        self.current = None;
        self.accumulator.clear();
        self.processed.clear();
        Ok(Some(outcome))
    }
}

//! The supervisor loop.
//!
//! One cooperative task drives everything: poll the watcher, feed the epoch
//! manager, check the seal deadline, heartbeat, sleep. The single-task model
//! makes the epoch boundary race-free — nothing else can touch the current
//! epoch between the deadline check and the seal publish.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::json;
use tracing::{debug, error, info, warn};

use merlin_core::constants::{topic_heartbeats, ERROR_BACKOFF_SECS, HEARTBEAT_INTERVAL_SECS};
use merlin_core::types::Timestamp;
use merlin_core::MerlinError;
use merlin_crypto::Signer;
use merlin_epoch::{EpochManager, EpochSettings, ProofWatcher};
use merlin_store::{ObjectStore, StoreClient};

use crate::config::MerlinConfig;

pub struct Daemon {
    config: MerlinConfig,
    store: Arc<StoreClient>,
    manager: EpochManager<StoreClient>,
    watcher: ProofWatcher<StoreClient>,
    started_at: Timestamp,
    last_heartbeat: Timestamp,
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

impl Daemon {
    /// Connect to the store, recover ledger state, and open the first epoch.
    pub async fn bootstrap(config: MerlinConfig) -> anyhow::Result<Self> {
        let signer = Signer::from_hex_key(&config.private_key)?;
        info!(identity = %config.identity, address = %signer.address(), "merlin initialised");

        let store = Arc::new(StoreClient::new(&config.ipfs_api)?);
        if !store.check_connection().await {
            bail!("object store unreachable at {}", config.ipfs_api);
        }
        store
            .ensure_directories()
            .await
            .context("initialising store directories")?;

        let settings = EpochSettings {
            identity: config.identity.clone(),
            pool: config.pool.clone(),
            epoch_duration_secs: config.epoch_duration_secs,
            provider_share: config.provider_share,
            network_ops_share: config.network_ops_share,
        };
        let mut manager = EpochManager::new(Arc::clone(&store), signer, settings);
        manager
            .recover_epoch_number()
            .await
            .context("recovering epoch numbering from ledger")?;

        let started_at = now();
        manager.ensure_active_epoch(started_at).await?;

        let watcher = ProofWatcher::new(Arc::clone(&store), config.seen_retention_secs);

        Ok(Self {
            config,
            store,
            manager,
            watcher,
            started_at,
            last_heartbeat: 0,
        })
    }

    /// Run until a shutdown signal arrives, then seal and stop.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            pool = %self.config.pool,
            epoch_duration_secs = self.config.epoch_duration_secs,
            poll_interval_secs = self.config.poll_interval_secs,
            "entering main loop"
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.tick().await {
                error!(error = %e, "tick failed, backing off");
                tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)).await;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }

        // Final seal: work already accepted must not be lost to a restart.
        if self.manager.pending_proofs() > 0 {
            info!(
                pending = self.manager.pending_proofs(),
                "sealing current epoch before shutdown"
            );
            if let Err(e) = self.manager.seal_epoch(now()).await {
                warn!(error = %e, "final seal failed; epoch remains active in the ledger");
            }
        }

        info!("merlin stopped");
        Ok(())
    }

    /// One supervisor iteration: ingest, maybe seal, heartbeat.
    async fn tick(&mut self) -> Result<(), MerlinError> {
        let tick_now = now();
        self.manager.ensure_active_epoch(tick_now).await?;

        let fresh = self.watcher.poll(tick_now).await?;
        for proof in fresh {
            let proof_id = proof
                .get("proof_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            if self.manager.process_proof(proof, tick_now).await {
                info!(proof_id = %proof_id, "valid proof accepted");
            } else {
                warn!(proof_id = %proof_id, "proof rejected");
            }
        }

        if self.manager.should_seal(tick_now) {
            if let Some(outcome) = self.manager.seal_epoch(tick_now).await? {
                self.watcher.retire(&outcome.proof_ids, tick_now);
            }
            self.manager.open_epoch(tick_now).await?;
        }

        self.maybe_publish_heartbeat(tick_now).await;
        debug!(known_proofs = self.watcher.known(), "tick complete");
        Ok(())
    }

    /// Publish a heartbeat, rate-limited to one per interval.
    async fn maybe_publish_heartbeat(&mut self, tick_now: Timestamp) {
        if tick_now - self.last_heartbeat < HEARTBEAT_INTERVAL_SECS {
            return;
        }
        self.last_heartbeat = tick_now;

        let heartbeat = json!({
            "type": "heartbeat",
            "controller": self.config.identity,
            "current_epoch": self.manager.current_epoch_id(),
            "epoch_proofs": self.manager.pending_proofs(),
            "uptime_seconds": tick_now - self.started_at,
            "timestamp": tick_now,
        });
        self.store
            .publish(&topic_heartbeats(&self.config.pool), &heartbeat)
            .await;
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

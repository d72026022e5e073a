//! merlin — the SwarmOS controller daemon.
//!
//! Merlin does not compute and does not assign jobs. It watches the pool's
//! proofs directory, validates what workers publish, and seals time-bounded
//! epochs into signed settlement records on the ledger. Data flows one way:
//! worker → store → watcher → epoch manager → signed snapshot → store.
//!
//! Usage:
//!   merlin run                     Start the daemon
//!   merlin status [--json]         Show resolved config and store liveness
//!   merlin epochs [--limit N]      List recent epochs
//!   merlin epochs --id epoch-NNNN  Show one epoch in full
//!   merlin seal <epoch_id>         Reserved; not supported

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use merlin_core::constants::EPOCHS_DIR;
use merlin_crypto::Signer;
use merlin_store::{ObjectStore, StoreClient};

mod config;
mod daemon;

use config::{load_config, MerlinConfig};
use daemon::Daemon;

#[derive(Parser, Debug)]
#[command(
    name = "merlin",
    version,
    about = "Merlin — SwarmOS controller: epoch clock, settlement pen, truth sealer"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the controller daemon.
    Run,

    /// Show resolved configuration and store liveness.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List sealed and active epochs from the ledger.
    Epochs {
        /// Number of epochs to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Show a single epoch in full.
        #[arg(long)]
        id: Option<String>,
    },

    /// Manually seal an epoch (reserved).
    Seal {
        /// Epoch to seal, e.g. epoch-0042.
        epoch_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().expect("static filter")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run => {
            let config = load_config()?;
            Daemon::bootstrap(config).await?.run().await
        }
        Command::Status { json } => {
            let config = load_config()?;
            show_status(&config, json).await
        }
        Command::Epochs { limit, id } => {
            let config = load_config()?;
            list_epochs(&config, limit, id.as_deref()).await
        }
        Command::Seal { epoch_id } => {
            bail!(
                "manual seal of {epoch_id} is not supported; \
                 run `merlin run` and let the daemon seal on schedule"
            );
        }
    }
}

async fn show_status(config: &MerlinConfig, json_output: bool) -> anyhow::Result<()> {
    let signer = Signer::from_hex_key(&config.private_key)?;
    let store = StoreClient::new(&config.ipfs_api)?;
    let connected = store.check_connection().await;

    if json_output {
        let status = json!({
            "controller": config.identity,
            "address": signer.address(),
            "pool": config.pool,
            "ipfs_api": config.ipfs_api,
            "store_connected": connected,
            "epoch_duration_seconds": config.epoch_duration_secs,
            "provider_share": config.provider_share,
            "network_ops_share": config.network_ops_share,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Merlin status");
        println!("─────────────────────────────────────────");
        println!("  controller:     {}", config.identity);
        println!("  address:        {}", signer.address());
        println!("  pool:           {}", config.pool);
        println!(
            "  store:          {} ({})",
            if connected { "connected" } else { "unreachable" },
            config.ipfs_api
        );
        println!("  epoch duration: {}s", config.epoch_duration_secs);
        println!("  provider share: {}%", config.provider_share * 100.0);
        println!("  network ops:    {}%", config.network_ops_share * 100.0);
    }
    Ok(())
}

async fn list_epochs(config: &MerlinConfig, limit: usize, id: Option<&str>) -> anyhow::Result<()> {
    let store = StoreClient::new(&config.ipfs_api)?;
    if !store.check_connection().await {
        bail!("object store unreachable at {}", config.ipfs_api);
    }

    if let Some(id) = id {
        let path = format!("{EPOCHS_DIR}/{id}.json");
        let epoch = store
            .fetch_file(&path)
            .await
            .context("fetching epoch")?
            .with_context(|| format!("epoch not found: {id}"))?;
        println!("{}", serde_json::to_string_pretty(&epoch)?);
        return Ok(());
    }

    let mut ids = store.list_directory(EPOCHS_DIR).await?;
    if ids.is_empty() {
        println!("no epochs found");
        return Ok(());
    }
    ids.sort();
    ids.reverse();

    println!("{:<16} {:<12} {:<8} {:>6} {:>14}", "ID", "NAME", "STATUS", "JOBS", "VOLUME");
    println!("{}", "─".repeat(60));
    for id in ids.iter().take(limit) {
        let path = format!("{EPOCHS_DIR}/{id}.json");
        let Some(epoch) = store.fetch_file(&path).await? else {
            continue;
        };
        let field = |key: &str| {
            epoch
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string()
        };
        let jobs = epoch.get("jobs_count").and_then(Value::as_u64).unwrap_or(0);
        println!(
            "{:<16} {:<12} {:<8} {:>6} {:>14}",
            id,
            field("name"),
            field("status"),
            jobs,
            format!("${}", field("total_volume_usdc")),
        );
    }
    Ok(())
}

//! ─── Merlin Protocol Constants ──────────────────────────────────────────────
//!
//! Merlin is the calm control plane of a SwarmOS pool: it opens epochs,
//! collects worker proofs, and seals settlement snapshots. It never computes
//! and never assigns jobs.
//!
//! Everything here is part of the wire protocol — paths, topics, and naming
//! must match what workers and subscribers expect.

// ── Document versions ────────────────────────────────────────────────────────

/// Version stamped into every snapshot Merlin authors.
pub const DOC_VERSION: &str = "1.0.0";

// ── Epoch naming ─────────────────────────────────────────────────────────────

/// NATO phonetic alphabet. Epoch `n` is named `NATO_ALPHABET[n % 26]`.
pub const NATO_ALPHABET: [&str; 26] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel",
    "India", "Juliet", "Kilo", "Lima", "Mike", "November", "Oscar", "Papa",
    "Quebec", "Romeo", "Sierra", "Tango", "Uniform", "Victor", "Whiskey",
    "X-ray", "Yankee", "Zulu",
];

/// Human-readable name for an epoch number.
pub fn epoch_name(epoch_number: u64) -> &'static str {
    NATO_ALPHABET[(epoch_number % NATO_ALPHABET.len() as u64) as usize]
}

/// Canonical epoch identifier: `epoch-NNNN`, four digits, zero-padded.
pub fn epoch_id(epoch_number: u64) -> String {
    format!("epoch-{epoch_number:04}")
}

/// Parse an `epoch-NNNN` identifier back into its number.
pub fn parse_epoch_id(id: &str) -> Option<u64> {
    id.strip_prefix("epoch-")?.parse().ok()
}

// ── Canonical store paths (mutable filesystem) ───────────────────────────────

/// Pool root: jobs, claims, and proofs are published here by other actors.
pub const SWARMPOOL_ROOT: &str = "/swarmpool";
pub const JOBS_DIR: &str = "/swarmpool/jobs";
pub const CLAIMS_DIR: &str = "/swarmpool/claims";
pub const PROOFS_DIR: &str = "/swarmpool/proofs";
pub const GENESIS_DIR: &str = "/swarmpool/genesis";

/// Ledger root: Merlin is the sole writer below this path.
pub const SWARMLEDGER_ROOT: &str = "/swarmledger";
pub const EPOCHS_DIR: &str = "/swarmledger/epochs";
pub const SETTLEMENTS_DIR: &str = "/swarmledger/settlements";

/// Directories created (idempotently) at startup.
pub const CANONICAL_DIRS: [&str; 8] = [
    SWARMPOOL_ROOT,
    JOBS_DIR,
    CLAIMS_DIR,
    PROOFS_DIR,
    GENESIS_DIR,
    SWARMLEDGER_ROOT,
    EPOCHS_DIR,
    SETTLEMENTS_DIR,
];

// ── Pubsub topics ────────────────────────────────────────────────────────────

pub fn topic_epochs_opened(pool: &str) -> String {
    format!("/{pool}/epochs/opened")
}

pub fn topic_epochs_sealed(pool: &str) -> String {
    format!("/{pool}/epochs/sealed")
}

pub fn topic_heartbeats(pool: &str) -> String {
    format!("/{pool}/heartbeats")
}

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_IDENTITY: &str = "merlin.swarmos.eth";
pub const DEFAULT_POOL: &str = "swarmpool.eth";
pub const DEFAULT_IPFS_API: &str = "http://localhost:5001";

/// One hour per epoch unless configured otherwise.
pub const DEFAULT_EPOCH_DURATION_SECS: i64 = 3_600;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Settlement split: providers get 75%, network operations 25%.
pub const DEFAULT_PROVIDER_SHARE: f64 = 0.75;
pub const DEFAULT_NETWORK_OPS_SHARE: f64 = 0.25;

/// Reward assumed for a proof whose job cannot be fetched or parsed (USDC).
pub const DEFAULT_REWARD_USDC: f64 = 0.10;

/// Watcher seen-set retention for ids already sealed into an epoch (seconds).
pub const DEFAULT_SEEN_RETENTION_SECS: i64 = 86_400;

// ── Supervisor timings ───────────────────────────────────────────────────────

/// Heartbeats are published at most this often.
pub const HEARTBEAT_INTERVAL_SECS: i64 = 30;

/// Sleep after an unexpected tick error before resuming the loop.
pub const ERROR_BACKOFF_SECS: u64 = 5;

/// Per-request timeout against the object store.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

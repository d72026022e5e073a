pub mod manager;
pub mod settlement;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testutil;

pub use manager::{EpochManager, EpochSettings, SealOutcome};
pub use settlement::{compute_settlements, format_usdc, AcceptedProof};
pub use watcher::ProofWatcher;

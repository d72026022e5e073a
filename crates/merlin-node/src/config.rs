//! Environment-based configuration.
//!
//! All secrets come from the environment; the private key is required and
//! its absence is fatal at startup.

use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use merlin_core::constants::{
    DEFAULT_EPOCH_DURATION_SECS, DEFAULT_IDENTITY, DEFAULT_IPFS_API,
    DEFAULT_NETWORK_OPS_SHARE, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POOL,
    DEFAULT_PROVIDER_SHARE, DEFAULT_SEEN_RETENTION_SECS,
};
use merlin_core::MerlinError;

#[derive(Clone)]
pub struct MerlinConfig {
    /// Controller identity written into every snapshot.
    pub identity: String,
    /// Hex secp256k1 private key, with or without `0x` prefix.
    pub private_key: String,
    pub pool: String,
    pub ipfs_api: String,
    pub epoch_duration_secs: i64,
    pub poll_interval_secs: u64,
    pub provider_share: f64,
    pub network_ops_share: f64,
    pub seen_retention_secs: i64,
}

impl fmt::Debug for MerlinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerlinConfig")
            .field("identity", &self.identity)
            .field("private_key", &"<redacted>")
            .field("pool", &self.pool)
            .field("ipfs_api", &self.ipfs_api)
            .field("epoch_duration_secs", &self.epoch_duration_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("provider_share", &self.provider_share)
            .field("network_ops_share", &self.network_ops_share)
            .field("seen_retention_secs", &self.seen_retention_secs)
            .finish()
    }
}

/// Load configuration from the environment.
pub fn load_config() -> Result<MerlinConfig, MerlinError> {
    let private_key = env::var("MERLIN_PRIVATE_KEY").unwrap_or_default();
    if private_key.is_empty() {
        return Err(MerlinError::Config(
            "MERLIN_PRIVATE_KEY environment variable is required".to_string(),
        ));
    }

    let config = MerlinConfig {
        identity: env_or("MERLIN_IDENTITY", DEFAULT_IDENTITY),
        private_key,
        pool: env_or("SWARM_POOL", DEFAULT_POOL),
        ipfs_api: env_or("IPFS_API", DEFAULT_IPFS_API),
        epoch_duration_secs: env_parse("EPOCH_DURATION_SECONDS", DEFAULT_EPOCH_DURATION_SECS)?,
        poll_interval_secs: env_parse("POLL_INTERVAL_SECONDS", DEFAULT_POLL_INTERVAL_SECS)?,
        provider_share: env_parse("PROVIDER_SHARE", DEFAULT_PROVIDER_SHARE)?,
        network_ops_share: env_parse("NETWORK_OPS_SHARE", DEFAULT_NETWORK_OPS_SHARE)?,
        seen_retention_secs: env_parse("SEEN_RETENTION_SECS", DEFAULT_SEEN_RETENTION_SECS)?,
    };

    info!(
        identity = %config.identity,
        pool = %config.pool,
        ipfs_api = %config.ipfs_api,
        epoch_duration_secs = config.epoch_duration_secs,
        provider_share = config.provider_share,
        "configuration loaded"
    );
    Ok(config)
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, MerlinError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| MerlinError::Config(format!("{key}: {e}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // each test uses its own variable name: the process environment is
    // shared across threads

    #[test]
    fn env_parse_uses_default_when_unset() {
        let value: i64 = env_parse("MERLIN_TEST_UNSET_VAR", 3600).unwrap();
        assert_eq!(value, 3600);
    }

    #[test]
    fn env_parse_reads_valid_values() {
        env::set_var("MERLIN_TEST_DURATION", "120");
        let value: i64 = env_parse("MERLIN_TEST_DURATION", 3600).unwrap();
        assert_eq!(value, 120);
        env::remove_var("MERLIN_TEST_DURATION");
    }

    #[test]
    fn env_parse_rejects_garbage() {
        env::set_var("MERLIN_TEST_GARBAGE", "not-a-number");
        let result: Result<i64, _> = env_parse("MERLIN_TEST_GARBAGE", 0);
        assert!(result.is_err());
        env::remove_var("MERLIN_TEST_GARBAGE");
    }

    #[test]
    fn env_or_falls_back_on_empty() {
        env::set_var("MERLIN_TEST_EMPTY", "");
        assert_eq!(env_or("MERLIN_TEST_EMPTY", "fallback"), "fallback");
        env::remove_var("MERLIN_TEST_EMPTY");
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = MerlinConfig {
            identity: "merlin.swarmos.eth".to_string(),
            private_key: "0xsupersecret".to_string(),
            pool: "swarmpool.eth".to_string(),
            ipfs_api: "http://localhost:5001".to_string(),
            epoch_duration_secs: 3600,
            poll_interval_secs: 10,
            provider_share: 0.75,
            network_ops_share: 0.25,
            seen_retention_secs: 86_400,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("<redacted>"));
    }
}

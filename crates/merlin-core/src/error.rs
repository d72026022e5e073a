use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerlinError {
    // ── Startup ──────────────────────────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid private key: {0}")]
    Key(String),

    // ── Crypto ───────────────────────────────────────────────────────────────
    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("invalid hex: {0}")]
    Hex(String),

    // ── Documents ────────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("document is not a JSON object")]
    NotAnObject,

    // ── Object store ─────────────────────────────────────────────────────────
    #[error("store error: {0}")]
    Store(String),

    // ── Epoch lifecycle ──────────────────────────────────────────────────────
    #[error("no active epoch")]
    NoActiveEpoch,
}

impl From<serde_json::Error> for MerlinError {
    fn from(e: serde_json::Error) -> Self {
        MerlinError::Serialization(e.to_string())
    }
}

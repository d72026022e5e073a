pub mod canonical;
pub mod hash;
pub mod merkle;
pub mod signer;

pub use canonical::canonical_json;
pub use hash::{keccak256, keccak256_hex};
pub use merkle::{merkle_root, EMPTY_ROOT};
pub use signer::{checksum_address, recover_address, verify_value, Signer};

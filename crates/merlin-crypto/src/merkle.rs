//! Merkle commitment over proof identifiers.
//!
//! The root depends only on the *set* of identifiers: the input is sorted
//! before hashing, so observation order never changes the commitment.

use merlin_core::MerlinError;

use crate::hash::keccak256;

/// Root of an empty commitment. A convention, not the keccak of anything.
pub const EMPTY_ROOT: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the Merkle root over a list of identifiers.
///
/// Leaves: a `0x`-prefixed item contributes its raw hex bytes; anything else
/// contributes the keccak-256 of its UTF-8 bytes. Levels of odd length are
/// extended by duplicating the last digest — including a single-leaf level,
/// so the root of `[x]` is `keccak(leaf ‖ leaf)`.
pub fn merkle_root(items: &[String]) -> Result<String, MerlinError> {
    if items.is_empty() {
        return Ok(EMPTY_ROOT.to_string());
    }

    let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut level: Vec<Vec<u8>> = Vec::with_capacity(sorted.len());
    for item in sorted {
        level.push(leaf_bytes(item)?);
    }

    loop {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks_exact(2) {
            let mut buf = Vec::with_capacity(pair[0].len() + pair[1].len());
            buf.extend_from_slice(&pair[0]);
            buf.extend_from_slice(&pair[1]);
            next.push(keccak256(&buf).to_vec());
        }
        level = next;
        if level.len() == 1 {
            break;
        }
    }

    Ok(format!("0x{}", hex::encode(&level[0])))
}

fn leaf_bytes(item: &str) -> Result<Vec<u8>, MerlinError> {
    match item.strip_prefix("0x") {
        Some(stripped) => hex::decode(stripped)
            .map_err(|_| MerlinError::Hex(format!("merkle leaf {item:?}"))),
        None => Ok(keccak256(item.as_bytes()).to_vec()),
    }
}

//! EIP-191 personal-sign over canonical JSON documents.
//!
//! Signing pipeline: strip `sig` → canonical JSON → keccak-256 → prefix with
//! `"\x19Ethereum Signed Message:\n32"` → keccak-256 → secp256k1 recoverable
//! signature, serialized as 65 bytes `r ‖ s ‖ v` in 0x-prefixed hex.
//!
//! The private key lives in process memory only.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde_json::Value;
use tracing::warn;
use zeroize::Zeroizing;

use merlin_core::MerlinError;

use crate::canonical::canonical_json;
use crate::hash::keccak256;

const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// The digest actually signed for a document: EIP-191 over the keccak of its
/// canonical form, `sig` excluded.
pub fn signing_digest(doc: &Value) -> [u8; 32] {
    let mut clean = doc.clone();
    if let Some(obj) = clean.as_object_mut() {
        obj.remove("sig");
    }
    let message_hash = keccak256(canonical_json(&clean).as_bytes());
    let mut prefixed = Vec::with_capacity(EIP191_PREFIX.len() + message_hash.len());
    prefixed.extend_from_slice(EIP191_PREFIX);
    prefixed.extend_from_slice(&message_hash);
    keccak256(&prefixed)
}

// ── Signer ───────────────────────────────────────────────────────────────────

/// Holds the controller's secp256k1 key and signs snapshots with it.
pub struct Signer {
    key: SigningKey,
    address: String,
}

impl Signer {
    /// Build a signer from a hex-encoded private key, with or without the
    /// `0x` prefix. The intermediate byte buffer is wiped on drop.
    pub fn from_hex_key(private_key: &str) -> Result<Self, MerlinError> {
        let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = Zeroizing::new(
            hex::decode(stripped).map_err(|e| MerlinError::Key(e.to_string()))?,
        );
        let key =
            SigningKey::from_slice(&bytes).map_err(|e| MerlinError::Key(e.to_string()))?;
        let address = derive_address(key.verifying_key());
        Ok(Self { key, address })
    }

    /// The controller's EIP-55 checksummed address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a document, returning the 0x-prefixed 65-byte signature.
    pub fn sign_value(&self, doc: &Value) -> Result<String, MerlinError> {
        let digest = signing_digest(doc);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| MerlinError::Signature(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(format!("0x{}", hex::encode(out)))
    }

    /// Sign a document and attach the signature as its `sig` field.
    pub fn sign_and_attach(&self, doc: &mut Value) -> Result<(), MerlinError> {
        let sig = self.sign_value(doc)?;
        match doc.as_object_mut() {
            Some(obj) => {
                obj.insert("sig".to_string(), Value::String(sig));
                Ok(())
            }
            None => Err(MerlinError::NotAnObject),
        }
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signer {{ address: {} }}", self.address)
    }
}

// ── Verification ─────────────────────────────────────────────────────────────

/// Recover the signer address of a document signature.
pub fn recover_address(doc: &Value, signature: &str) -> Result<String, MerlinError> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(stripped).map_err(|e| MerlinError::Signature(e.to_string()))?;
    if bytes.len() != 65 {
        return Err(MerlinError::Signature(format!(
            "expected 65 signature bytes, got {}",
            bytes.len()
        )));
    }
    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| MerlinError::Signature(e.to_string()))?;
    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| MerlinError::Signature(format!("invalid recovery id {v}")))?;

    let digest = signing_digest(doc);
    let recovered = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| MerlinError::Signature(e.to_string()))?;
    Ok(derive_address(&recovered))
}

/// Check that a document's signature was produced by `expected_address`.
/// Addresses are compared case-insensitively.
pub fn verify_value(doc: &Value, signature: &str, expected_address: &str) -> bool {
    match recover_address(doc, signature) {
        Ok(address) => address.eq_ignore_ascii_case(expected_address),
        Err(e) => {
            warn!(error = %e, "signature verification failed");
            false
        }
    }
}

// ── Addresses ────────────────────────────────────────────────────────────────

/// Ethereum address of a public key: last 20 bytes of the keccak of the
/// uncompressed point, EIP-55 checksummed.
pub fn derive_address(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    checksum_address(&digest[12..])
}

/// EIP-55 mixed-case checksum encoding of a 20-byte address.
pub fn checksum_address(bytes: &[u8]) -> String {
    let lower = hex::encode(bytes);
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // private key 0x…01 — the canonical "key of one" test account
    const TEST_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const TEST_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    fn test_signer() -> Signer {
        Signer::from_hex_key(TEST_KEY).unwrap()
    }

    fn sample_doc() -> Value {
        json!({
            "type": "epoch",
            "epoch_id": "epoch-0001",
            "status": "active",
            "started_at": 1_700_000_000,
            "controller": "merlin.swarmos.eth"
        })
    }

    #[test]
    fn key_of_one_derives_known_address() {
        assert_eq!(test_signer().address(), TEST_ADDRESS);
    }

    #[test]
    fn key_prefix_is_optional() {
        let with = Signer::from_hex_key(TEST_KEY).unwrap();
        let without = Signer::from_hex_key(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(with.address(), without.address());
    }

    #[test]
    fn garbage_key_is_rejected() {
        assert!(Signer::from_hex_key("0xnothex").is_err());
        assert!(Signer::from_hex_key("0x00").is_err());
    }

    #[test]
    fn signature_round_trips() {
        let signer = test_signer();
        let doc = sample_doc();
        let sig = signer.sign_value(&doc).unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 130);
        assert!(verify_value(&doc, &sig, signer.address()));
    }

    #[test]
    fn verification_ignores_address_case() {
        let signer = test_signer();
        let doc = sample_doc();
        let sig = signer.sign_value(&doc).unwrap();
        assert!(verify_value(&doc, &sig, &signer.address().to_lowercase()));
        assert!(verify_value(&doc, &sig, &signer.address().to_uppercase().replace("0X", "0x")));
    }

    #[test]
    fn mutated_document_fails_verification() {
        let signer = test_signer();
        let mut doc = sample_doc();
        let sig = signer.sign_value(&doc).unwrap();
        doc["started_at"] = json!(1_700_000_001);
        assert!(!verify_value(&doc, &sig, signer.address()));
    }

    #[test]
    fn mutated_signature_fails_verification() {
        let signer = test_signer();
        let doc = sample_doc();
        let sig = signer.sign_value(&doc).unwrap();
        // flip one nibble of r
        let mut chars: Vec<char> = sig.chars().collect();
        chars[10] = if chars[10] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(!verify_value(&doc, &tampered, signer.address()));
    }

    #[test]
    fn wrong_address_fails_verification() {
        let signer = test_signer();
        let doc = sample_doc();
        let sig = signer.sign_value(&doc).unwrap();
        assert!(!verify_value(&doc, &sig, "0x0000000000000000000000000000000000000001"));
    }

    #[test]
    fn truncated_signature_fails_verification() {
        let doc = sample_doc();
        assert!(!verify_value(&doc, "0xdeadbeef", TEST_ADDRESS));
    }

    #[test]
    fn signing_excludes_existing_sig_field() {
        let signer = test_signer();
        let doc = sample_doc();
        let mut with_sig = doc.clone();
        signer.sign_and_attach(&mut with_sig).unwrap();

        // signing again over the already-signed document must yield the same
        // signature: the sig field is stripped before hashing
        let resigned = signer.sign_value(&with_sig).unwrap();
        assert_eq!(resigned, with_sig["sig"].as_str().unwrap());
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = test_signer();
        let doc = sample_doc();
        assert_eq!(signer.sign_value(&doc).unwrap(), signer.sign_value(&doc).unwrap());
    }

    #[test]
    fn checksum_matches_eip55_vectors() {
        let cases = [
            "0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];
        for expected in cases {
            let bytes = hex::decode(&expected[2..].to_lowercase()).unwrap();
            assert_eq!(checksum_address(&bytes), expected);
        }
    }

    #[test]
    fn non_object_documents_cannot_carry_a_signature() {
        let signer = test_signer();
        let mut doc = json!([1, 2, 3]);
        assert!(signer.sign_and_attach(&mut doc).is_err());
    }
}

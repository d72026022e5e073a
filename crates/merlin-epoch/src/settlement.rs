//! Settlement arithmetic.
//!
//! Pure functions over the epoch accumulator. Amounts are binary floats:
//! good enough for display-quality USDC totals, deliberately not on-chain
//! precision.

use std::collections::BTreeMap;

use serde_json::Value;

use merlin_core::constants::DEFAULT_REWARD_USDC;
use merlin_core::types::{Proof, Settlements, Timestamp};

/// One accepted proof with its (best-effort) job document.
///
/// The proof is fully typed by this point; the job stays raw JSON because
/// its fields beyond `payment.amount` are opaque to the pipeline.
#[derive(Debug, Clone)]
pub struct AcceptedProof {
    pub proof: Proof,
    pub job: Option<Value>,
    pub processed_at: Timestamp,
}

/// Compute the distribution for an epoch's accumulated proofs.
///
/// Each proof earns its job's `payment.amount`; proofs whose job is missing
/// or unparseable earn the default reward. Providers split `provider_share`
/// of the volume pro rata, the rest funds network operations.
pub fn compute_settlements(
    accumulator: &[AcceptedProof],
    provider_share: f64,
    network_ops_share: f64,
) -> Settlements {
    let mut total_volume = 0.0;
    let mut providers: BTreeMap<String, f64> = BTreeMap::new();

    for item in accumulator {
        let reward = item
            .job
            .as_ref()
            .and_then(job_reward)
            .unwrap_or(DEFAULT_REWARD_USDC);
        total_volume += reward;
        *providers.entry(item.proof.provider.clone()).or_insert(0.0) +=
            reward * provider_share;
    }

    Settlements {
        total_volume,
        provider_pool: total_volume * provider_share,
        network_ops: total_volume * network_ops_share,
        provider_count: providers.len(),
        providers,
    }
}

/// Reward carried by a job document, if it parses.
fn job_reward(job: &Value) -> Option<f64> {
    match job.get("payment")?.get("amount")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Format a volume for the `total_volume_usdc` field.
pub fn format_usdc(amount: f64) -> String {
    format!("{amount:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use merlin_core::types::ProofMetrics;
    use serde_json::json;

    fn accepted(provider: &str, amount: Option<&str>) -> AcceptedProof {
        AcceptedProof {
            proof: Proof {
                doc_type: "proof".to_string(),
                version: "1.0.0".to_string(),
                proof_id: format!("proof-{provider}"),
                job_cid: "bafyjob".to_string(),
                output_cid: "bafyoutput".to_string(),
                metrics: ProofMetrics {
                    inference_seconds: 1.0,
                    confidence: 0.9,
                },
                provider: provider.to_string(),
                timestamp: 1_700_000_000,
                proof_hash: "0xabc".to_string(),
                sig: "0xsig".to_string(),
            },
            job: amount.map(|a| json!({"type": "job", "payment": {"amount": a}})),
            processed_at: 1_700_000_000,
        }
    }

    #[test]
    fn empty_accumulator_settles_to_zero() {
        let s = compute_settlements(&[], 0.75, 0.25);
        assert_eq!(s.total_volume, 0.0);
        assert_eq!(s.provider_pool, 0.0);
        assert_eq!(s.network_ops, 0.0);
        assert_eq!(s.provider_count, 0);
        assert!(s.providers.is_empty());
    }

    #[test]
    fn single_proof_splits_75_25() {
        let s = compute_settlements(&[accepted("alice.eth", Some("1.00"))], 0.75, 0.25);
        assert_eq!(s.total_volume, 1.00);
        assert_eq!(s.provider_pool, 0.75);
        assert_eq!(s.network_ops, 0.25);
        assert_eq!(s.providers["alice.eth"], 0.75);
        assert_eq!(s.provider_count, 1);
    }

    #[test]
    fn same_provider_accumulates_across_proofs() {
        let items = vec![
            accepted("bob.eth", Some("0.40")),
            accepted("bob.eth", Some("0.60")),
        ];
        let s = compute_settlements(&items, 0.75, 0.25);
        assert!((s.total_volume - 1.00).abs() < 1e-9);
        assert!((s.providers["bob.eth"] - 0.75).abs() < 1e-9);
        assert_eq!(s.provider_count, 1);
    }

    #[test]
    fn missing_job_falls_back_to_default_reward() {
        let s = compute_settlements(&[accepted("carol.eth", None)], 0.75, 0.25);
        assert!((s.total_volume - DEFAULT_REWARD_USDC).abs() < 1e-9);
    }

    #[test]
    fn unparseable_amount_falls_back_to_default_reward() {
        let mut item = accepted("carol.eth", Some("not-a-number"));
        let s = compute_settlements(std::slice::from_ref(&item), 0.75, 0.25);
        assert!((s.total_volume - DEFAULT_REWARD_USDC).abs() < 1e-9);

        item.job = Some(json!({"payment": {}}));
        let s = compute_settlements(&[item], 0.75, 0.25);
        assert!((s.total_volume - DEFAULT_REWARD_USDC).abs() < 1e-9);
    }

    #[test]
    fn numeric_amounts_are_accepted_too() {
        let mut item = accepted("dave.eth", None);
        item.job = Some(json!({"payment": {"amount": 2.5}}));
        let s = compute_settlements(&[item], 0.75, 0.25);
        assert!((s.total_volume - 2.5).abs() < 1e-9);
    }

    #[test]
    fn provider_pool_is_conserved() {
        let items = vec![
            accepted("a.eth", Some("0.13")),
            accepted("b.eth", Some("1.07")),
            accepted("c.eth", Some("0.55")),
            accepted("a.eth", None),
            accepted("b.eth", Some("2.31")),
        ];
        let s = compute_settlements(&items, 0.75, 0.25);

        let paid: f64 = s.providers.values().sum();
        assert!((paid - s.provider_pool).abs() < 1e-9);
        assert!((s.provider_pool + s.network_ops - s.total_volume).abs() < 1e-9);
    }

    #[test]
    fn custom_shares_are_respected() {
        let s = compute_settlements(&[accepted("alice.eth", Some("2.00"))], 0.9, 0.1);
        assert!((s.provider_pool - 1.8).abs() < 1e-9);
        assert!((s.network_ops - 0.2).abs() < 1e-9);
    }

    #[test]
    fn usdc_formatting_keeps_two_decimals() {
        assert_eq!(format_usdc(0.0), "0.00");
        assert_eq!(format_usdc(1.0), "1.00");
        assert_eq!(format_usdc(0.1 + 0.2), "0.30");
        assert_eq!(format_usdc(10.1), "10.10");
    }
}

//! Schema validation for pool documents.
//!
//! Schema is law: a document that fails validation is dropped, never
//! partially accepted. Validators collect every violation so the log line
//! tells the whole story at once; callers branch only on the outcome.

use serde_json::Value;

/// Accept, or reject with human-readable reasons.
pub type SchemaResult = Result<(), Vec<String>>;

fn finish(errors: Vec<String>) -> SchemaResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Non-empty string field accessor.
fn string_field<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// A content identifier starts with `bafy` (v1) or `Qm` (v0) followed by at
/// least one alphanumeric character.
fn looks_like_cid(value: &str) -> bool {
    let rest = value
        .strip_prefix("bafy")
        .or_else(|| value.strip_prefix("Qm"));
    match rest {
        Some(rest) => rest.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

// ── Proof ────────────────────────────────────────────────────────────────────

/// Validate a worker proof document.
pub fn validate_proof(proof: &Value) -> SchemaResult {
    let mut errors = Vec::new();

    let doc_type = proof.get("type").and_then(Value::as_str);
    if doc_type != Some("proof") {
        errors.push(format!("type must be 'proof', got {doc_type:?}"));
    }

    for field in ["proof_id", "job_cid", "output_cid", "provider", "proof_hash", "sig"] {
        if string_field(proof, field).is_none() {
            errors.push(format!("missing required string field: {field}"));
        }
    }

    if !proof.get("timestamp").is_some_and(Value::is_number) {
        errors.push("timestamp must be a number".to_string());
    }

    match proof.get("metrics") {
        Some(Value::Object(metrics)) => {
            if !metrics.get("inference_seconds").is_some_and(Value::is_number) {
                errors.push("metrics.inference_seconds must be a number".to_string());
            }
            match metrics.get("confidence").and_then(Value::as_f64) {
                Some(confidence) if (0.0..=1.0).contains(&confidence) => {}
                Some(_) => errors.push("metrics.confidence must be between 0 and 1".to_string()),
                None => errors.push("metrics.confidence must be a number".to_string()),
            }
        }
        _ => errors.push("metrics must be an object".to_string()),
    }

    for field in ["job_cid", "output_cid"] {
        if let Some(value) = string_field(proof, field) {
            if !looks_like_cid(value) {
                errors.push(format!("{field} does not look like a valid CID"));
            }
        }
    }

    if let Some(hash) = string_field(proof, "proof_hash") {
        if !hash.starts_with("0x") {
            errors.push("proof_hash must be 0x-prefixed".to_string());
        }
    }

    if let Some(sig) = string_field(proof, "sig") {
        if !sig.starts_with("0x") {
            errors.push("sig must be 0x-prefixed".to_string());
        }
    }

    if let Some(provider) = string_field(proof, "provider") {
        if !provider.ends_with(".eth") {
            errors.push("provider must be an ENS name (ending in .eth)".to_string());
        }
    }

    finish(errors)
}

// ── Job ──────────────────────────────────────────────────────────────────────

/// Validate a client job document.
pub fn validate_job(job: &Value) -> SchemaResult {
    let mut errors = Vec::new();

    if job.get("type").and_then(Value::as_str) != Some("job") {
        errors.push("type must be 'job'".to_string());
    }

    for field in ["job_id", "model", "input_cid", "client", "timestamp", "sig"] {
        if job.get(field).map_or(true, Value::is_null) {
            errors.push(format!("missing required field: {field}"));
        }
    }

    let amount = job.get("payment").and_then(|p| p.get("amount"));
    if amount.map_or(true, Value::is_null) {
        errors.push("payment.amount is required".to_string());
    }

    finish(errors)
}

// ── Epoch ────────────────────────────────────────────────────────────────────

/// Validate an epoch snapshot. Sealed epochs require the settlement fields.
pub fn validate_epoch(epoch: &Value) -> SchemaResult {
    let mut errors = Vec::new();

    if epoch.get("type").and_then(Value::as_str) != Some("epoch") {
        errors.push("type must be 'epoch'".to_string());
    }

    let status = epoch.get("status").and_then(Value::as_str);
    if !matches!(status, Some("active") | Some("sealed")) {
        errors.push("status must be 'active' or 'sealed'".to_string());
    }

    for field in ["epoch_id", "name", "started_at", "controller", "timestamp", "sig"] {
        if epoch.get(field).map_or(true, Value::is_null) {
            errors.push(format!("missing required field: {field}"));
        }
    }

    if status == Some("sealed") {
        for field in ["ended_at", "merkle_root", "settlements"] {
            if epoch.get(field).map_or(true, Value::is_null) {
                errors.push(format!("sealed epoch missing: {field}"));
            }
        }
    }

    finish(errors)
}

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, info, warn};

use merlin_core::constants::{CANONICAL_DIRS, REQUEST_TIMEOUT_SECS};
use merlin_core::MerlinError;
use merlin_crypto::canonical_json;

use crate::ObjectStore;

/// HTTP client for the store's `/api/v0` surface. POST throughout.
///
/// Uses raw reqwest calls rather than a store SDK to keep the dependency
/// footprint small; every endpoint Merlin needs is a one-liner.
pub struct StoreClient {
    api_base: String,
    client: reqwest::Client,
}

impl StoreClient {
    pub fn new(api_url: &str) -> Result<Self, MerlinError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MerlinError::Store(format!("building HTTP client: {e}")))?;
        Ok(Self {
            api_base: format!("{}/api/v0", api_url.trim_end_matches('/')),
            client,
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, MerlinError> {
        self.client
            .post(format!("{}/{endpoint}", self.api_base))
            .query(params)
            .send()
            .await
            .map_err(|e| MerlinError::Store(format!("{endpoint}: {e}")))
    }

    /// POST and decode a JSON body, treating non-2xx as `Ok(None)`.
    async fn post_json(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, MerlinError> {
        let resp = self.post(endpoint, params).await?;
        if !resp.status().is_success() {
            debug!(endpoint, status = %resp.status(), "store request not successful");
            return Ok(None);
        }
        match resp.json().await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(endpoint, error = %e, "store response is not JSON");
                Ok(None)
            }
        }
    }

    /// Read a JSON document from an endpoint that streams file bytes.
    async fn read_document(
        &self,
        endpoint: &str,
        arg: &str,
    ) -> Result<Option<Value>, MerlinError> {
        let resp = self.post(endpoint, &[("arg", arg)]).await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| MerlinError::Store(format!("{endpoint}: reading body: {e}")))?;
        match serde_json::from_str(&body) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                debug!(endpoint, arg, error = %e, "stored document is not valid JSON");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ObjectStore for StoreClient {
    async fn check_connection(&self) -> bool {
        match self.post_json("id", &[]).await {
            Ok(Some(body)) => {
                let peer = body.get("ID").and_then(Value::as_str).unwrap_or("unknown");
                info!(peer = %peer, "object store connected");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "object store connection failed");
                false
            }
        }
    }

    async fn ensure_directories(&self) -> Result<(), MerlinError> {
        for dir in CANONICAL_DIRS {
            let resp = self
                .post("files/mkdir", &[("arg", dir), ("parents", "true")])
                .await?;
            if !resp.status().is_success() {
                let body = resp.text().await.unwrap_or_default();
                if !body.contains("already exist") {
                    return Err(MerlinError::Store(format!("mkdir {dir}: {body}")));
                }
            }
        }
        debug!("canonical directories ready");
        Ok(())
    }

    async fn publish_snapshot(
        &self,
        doc: &Value,
        directory: &str,
        id: &str,
    ) -> Result<String, MerlinError> {
        // 1. Add the canonical bytes to the blob space.
        let payload = canonical_json(doc);
        let part = reqwest::multipart::Part::bytes(payload.into_bytes())
            .file_name(format!("{id}.json"))
            .mime_str("application/json")
            .map_err(|e| MerlinError::Store(format!("add: building form: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/add", self.api_base))
            .query(&[("cid-version", "1")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| MerlinError::Store(format!("add: {e}")))?;
        if !resp.status().is_success() {
            return Err(MerlinError::Store(format!("add failed: {}", resp.status())));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| MerlinError::Store(format!("add: decoding response: {e}")))?;
        let cid = body
            .get("Hash")
            .and_then(Value::as_str)
            .ok_or_else(|| MerlinError::Store("add response missing Hash".to_string()))?
            .to_string();

        // 2. Replace the mutable path. The filesystem refuses to overwrite,
        //    so remove any prior occupant first (absence is fine).
        let path = format!("{directory}/{id}.json");
        let _ = self
            .post("files/rm", &[("arg", path.as_str()), ("force", "true")])
            .await;

        let from = format!("/ipfs/{cid}");
        let resp = self
            .post("files/cp", &[("arg", from.as_str()), ("arg", path.as_str())])
            .await?;
        if !resp.status().is_success() {
            return Err(MerlinError::Store(format!(
                "cp {cid} -> {path}: {}",
                resp.status()
            )));
        }

        // 3. Pin so the blob survives garbage collection.
        let resp = self.post("pin/add", &[("arg", cid.as_str())]).await?;
        if !resp.status().is_success() {
            return Err(MerlinError::Store(format!("pin {cid}: {}", resp.status())));
        }

        debug!(cid = %cid, path = %path, "snapshot published");
        Ok(cid)
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, MerlinError> {
        let body = self
            .post_json("files/ls", &[("arg", path), ("long", "true")])
            .await?;
        let Some(body) = body else {
            return Ok(Vec::new());
        };
        Ok(parse_listing(&body))
    }

    async fn fetch_file(&self, path: &str) -> Result<Option<Value>, MerlinError> {
        self.read_document("files/read", path).await
    }

    async fn fetch_by_cid(&self, cid: &str) -> Result<Option<Value>, MerlinError> {
        self.read_document("cat", cid).await
    }

    async fn stat_cid(&self, path: &str) -> Result<Option<String>, MerlinError> {
        let body = self.post_json("files/stat", &[("arg", path)]).await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("Hash"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn publish(&self, topic: &str, doc: &Value) {
        let encoded = match serde_json::to_string(doc) {
            Ok(json) => BASE64.encode(json),
            Err(e) => {
                debug!(topic, error = %e, "pubsub payload not serializable");
                return;
            }
        };
        let result = self
            .client
            .post(format!("{}/pubsub/pub", self.api_base))
            .query(&[("arg", topic)])
            .body(encoded)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(topic, "pubsub published");
            }
            Ok(resp) => debug!(topic, status = %resp.status(), "pubsub publish refused"),
            Err(e) => debug!(topic, error = %e, "pubsub publish failed"),
        }
    }
}

/// Pull the `.json` base names out of a `files/ls` response.
fn parse_listing(body: &Value) -> Vec<String> {
    body.get("Entries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("Name").and_then(Value::as_str))
                .filter_map(|name| name.strip_suffix(".json"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_base_normalizes_trailing_slash() {
        let client = StoreClient::new("http://localhost:5001/").unwrap();
        assert_eq!(client.api_base, "http://localhost:5001/api/v0");
    }

    #[test]
    fn listing_keeps_only_json_entries() {
        let body = json!({
            "Entries": [
                {"Name": "proof-001.json", "Size": 412},
                {"Name": "README.md", "Size": 10},
                {"Name": "proof-002.json", "Size": 377},
                {"Name": "subdir", "Size": 0}
            ]
        });
        assert_eq!(parse_listing(&body), vec!["proof-001", "proof-002"]);
    }

    #[test]
    fn null_or_missing_entries_listing_is_empty() {
        assert!(parse_listing(&json!({"Entries": null})).is_empty());
        assert!(parse_listing(&json!({})).is_empty());
    }
}

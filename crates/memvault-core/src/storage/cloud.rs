//! CloudStore (C4)
//!
//! Backs the same logical schema on a remote service over HTTP. No
//! teacher module does cloud sync directly — this is built from the
//! pack's own `reqwest` + `json` conventions, with every call wrapped in
//! a timeout per the concurrency model's cancellation policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::memory::{Memory, MAX_CONTENT_CHARS};
use crate::storage::codec::{MetadataCodec, CLOUD_METADATA_SOFT_LIMIT_BYTES};
use crate::memory::MetadataMap;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Hard cloud-side content limit (§4.3); the codec's soft limit on
/// encoded metadata leaves headroom below the API's actual 10 KB cap.
const CLOUD_METADATA_HARD_LIMIT_BYTES: usize = 10 * 1024;

/// CloudStore failure modes.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum CloudError {
    #[error("transient cloud error: {0}")]
    Transient(String),
    #[error("cloud rejected the request: {0}")]
    Rejected(String),
    #[error("record exceeds cloud size limits: {0}")]
    TooLarge(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("authentication failed")]
    Unauthorized,
}

/// Outcome of a batch write. The remote may report success/failure
/// per-item or only for the batch as a whole; the Sync Engine adapts to
/// either (§9 Open Question — resolved in DESIGN.md).
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    AllOrNothing(Result<(), CloudError>),
    PerItem(Vec<(String, Result<(), CloudError>)>),
}

/// Wire representation of a memory record, metadata already encoded by
/// `MetadataCodec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudRecord {
    pub content_hash: String,
    pub content: String,
    pub memory_type: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// Base64-encoded `MetadataCodec::encode` output.
    pub metadata_b64: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub request_timeout: Duration,
}

impl CloudConfig {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A page of hash + `updated_at` pairs for drift scans (§4.3 "Listing").
#[derive(Debug, Clone, Deserialize)]
pub struct ListingPage {
    pub entries: Vec<(String, i64)>,
    pub next_cursor: Option<String>,
}

/// A remote metadata digest, timestamped so the drift scanner can tell
/// which side (local vs. cloud) is newer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DigestInfo {
    pub digest: String,
    pub updated_at: i64,
}

pub struct CloudStore {
    client: reqwest::Client,
    config: CloudConfig,
}

impl CloudStore {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reject records whose content or encoded metadata would exceed the
    /// cloud's limits before a network call is attempted (§4.3).
    pub fn validate_size(&self, memory: &Memory) -> Result<(), CloudError> {
        if memory.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(CloudError::TooLarge(format!(
                "content exceeds {MAX_CONTENT_CHARS} chars"
            )));
        }
        let encoded = MetadataCodec::encode(&memory.metadata)
            .map_err(|e| CloudError::Rejected(e.to_string()))?;
        if encoded.len() >= CLOUD_METADATA_SOFT_LIMIT_BYTES {
            return Err(CloudError::TooLarge(format!(
                "encoded metadata is {} bytes, soft limit is {}",
                encoded.len(),
                CLOUD_METADATA_SOFT_LIMIT_BYTES
            )));
        }
        if encoded.len() >= CLOUD_METADATA_HARD_LIMIT_BYTES {
            return Err(CloudError::TooLarge("encoded metadata exceeds hard limit".into()));
        }
        Ok(())
    }

    fn to_record(&self, memory: &Memory) -> Result<CloudRecord, CloudError> {
        self.validate_size(memory)?;
        let encoded = MetadataCodec::encode(&memory.metadata)
            .map_err(|e| CloudError::Rejected(e.to_string()))?;
        Ok(CloudRecord {
            content_hash: memory.content_hash.clone(),
            content: memory.content.clone(),
            memory_type: memory.memory_type.clone(),
            created_at: memory.created_at,
            updated_at: memory.updated_at,
            metadata_b64: base64_encode(&encoded),
            embedding: memory.embedding.clone(),
        })
    }

    pub async fn upsert_batch(&self, memories: &[Memory]) -> Result<BatchOutcome, CloudError> {
        let mut records = Vec::with_capacity(memories.len());
        for memory in memories {
            records.push(self.to_record(memory)?);
        }

        let url = format!("{}/v1/memories:batchUpsert", self.config.base_url);
        let response = self.send(self.client.post(&url).json(&records)).await?;

        if response.status().is_success() {
            let body: BatchUpsertResponse = response
                .json()
                .await
                .map_err(|e| CloudError::Transient(e.to_string()))?;
            match body.per_item {
                Some(statuses) => Ok(BatchOutcome::PerItem(
                    statuses
                        .into_iter()
                        .map(|s| (s.content_hash, status_to_result(s.ok, s.error)))
                        .collect(),
                )),
                None => Ok(BatchOutcome::AllOrNothing(Ok(()))),
            }
        } else {
            Err(status_to_cloud_error(response.status()))
        }
    }

    pub async fn delete_batch(&self, hashes: &[String]) -> Result<BatchOutcome, CloudError> {
        let url = format!("{}/v1/memories:batchDelete", self.config.base_url);
        let response = self
            .send(self.client.post(&url).json(&serde_json::json!({ "hashes": hashes })))
            .await?;

        if response.status().is_success() {
            Ok(BatchOutcome::AllOrNothing(Ok(())))
        } else {
            Err(status_to_cloud_error(response.status()))
        }
    }

    /// Single-item direct write, used by the Sync Engine's enqueue-on-full
    /// fallback and by `HybridStore::delete_synced`.
    pub async fn upsert_one(&self, memory: &Memory) -> Result<(), CloudError> {
        match self.upsert_batch(std::slice::from_ref(memory)).await? {
            BatchOutcome::AllOrNothing(r) => r,
            BatchOutcome::PerItem(mut statuses) => statuses
                .pop()
                .map(|(_, r)| r)
                .unwrap_or_else(|| Err(CloudError::Transient("empty response".into()))),
        }
    }

    pub async fn delete_one(&self, content_hash: &str) -> Result<(), CloudError> {
        match self.delete_batch(std::slice::from_ref(&content_hash.to_string())).await? {
            BatchOutcome::AllOrNothing(r) => r,
            BatchOutcome::PerItem(mut statuses) => statuses
                .pop()
                .map(|(_, r)| r)
                .unwrap_or_else(|| Err(CloudError::Transient("empty response".into()))),
        }
    }

    /// Page through hash + `updated_at` pairs for startup sync and the
    /// drift scanner (§4.3 "Listing").
    pub async fn list_since(
        &self,
        since_updated_at: i64,
        cursor: Option<&str>,
    ) -> Result<ListingPage, CloudError> {
        let url = format!("{}/v1/memories:list", self.config.base_url);
        let mut request = self.client.get(&url).query(&[("since", since_updated_at)]);
        if let Some(c) = cursor {
            request = request.query(&[("cursor", c)]);
        }
        let response = self.send(request).await?;
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| CloudError::Transient(e.to_string()))
        } else {
            Err(status_to_cloud_error(response.status()))
        }
    }

    /// Metadata digest plus the `updated_at` it was computed from, so the
    /// drift scanner can tell which side is newer (§4.6 "Drift scanner").
    pub async fn get_metadata_digest(&self, content_hash: &str) -> Result<Option<DigestInfo>, CloudError> {
        let url = format!("{}/v1/memories/{content_hash}/metadata-digest", self.config.base_url);
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            let info: DigestInfo = response
                .json()
                .await
                .map_err(|e| CloudError::Transient(e.to_string()))?;
            Ok(Some(info))
        } else {
            Err(status_to_cloud_error(response.status()))
        }
    }

    /// Full record fetch, used when the drift scanner finds the cloud
    /// side newer and needs the actual metadata to apply locally.
    pub async fn get_record(&self, content_hash: &str) -> Result<Option<CloudRecord>, CloudError> {
        let url = format!("{}/v1/memories/{content_hash}", self.config.base_url);
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            let record: CloudRecord = response
                .json()
                .await
                .map_err(|e| CloudError::Transient(e.to_string()))?;
            Ok(Some(record))
        } else {
            Err(status_to_cloud_error(response.status()))
        }
    }

    /// Inverse of `to_record`'s encode step, for applying a cloud-fetched
    /// record's metadata locally.
    pub fn decode_metadata(record: &CloudRecord) -> Result<MetadataMap, CloudError> {
        let bytes = base64_decode(&record.metadata_b64)
            .map_err(|e| CloudError::Rejected(format!("invalid metadata encoding: {e}")))?;
        MetadataCodec::decode(&bytes).map_err(|e| CloudError::Rejected(e.to_string()))
    }

    /// Attach the bearer token, never logged, and enforce the request
    /// timeout (§5 "Cancellation & timeouts").
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CloudError> {
        let request = builder.bearer_auth(&self.config.bearer_token);
        match tokio::time::timeout(self.config.request_timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(CloudError::Transient(e.to_string())),
            Err(_) => Err(CloudError::Timeout(self.config.request_timeout)),
        }
    }

    pub fn update_metadata(
        &self,
        _content_hash: &str,
        _patch: &MetadataMap,
    ) -> Result<(), CloudError> {
        // Metadata patches go through `upsert_batch` with the merged
        // record; HybridStore is responsible for constructing it.
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BatchUpsertResponse {
    per_item: Option<Vec<ItemStatus>>,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    content_hash: String,
    ok: bool,
    error: Option<String>,
}

fn status_to_result(ok: bool, error: Option<String>) -> Result<(), CloudError> {
    if ok {
        Ok(())
    } else {
        Err(CloudError::Rejected(error.unwrap_or_else(|| "unknown error".into())))
    }
}

fn status_to_cloud_error(status: reqwest::StatusCode) -> CloudError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        CloudError::Unauthorized
    } else if status.is_client_error() {
        CloudError::Rejected(format!("client error: {status}"))
    } else {
        CloudError::Transient(format!("server error: {status}"))
    }
}

fn base64_decode(s: &str) -> Result<Vec<u8>, String> {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut reverse = [255u8; 256];
    for (i, &b) in TABLE.iter().enumerate() {
        reverse[b as usize] = i as u8;
    }

    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Ok(vec![]);
    }
    if bytes.len() % 4 != 0 {
        return Err("base64 input length must be a multiple of 4".into());
    }

    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for chunk in bytes.chunks(4) {
        let pad = chunk.iter().filter(|&&b| b == b'=').count();
        let mut vals = [0u8; 4];
        for (i, &b) in chunk.iter().enumerate() {
            if b == b'=' {
                continue;
            }
            let v = reverse[b as usize];
            if v == 255 {
                return Err(format!("invalid base64 character: {}", b as char));
            }
            vals[i] = v;
        }
        out.push((vals[0] << 2) | (vals[1] >> 4));
        if pad < 2 {
            out.push((vals[1] << 4) | (vals[2] >> 2));
        }
        if pad < 1 {
            out.push((vals[2] << 6) | vals[3]);
        }
    }
    Ok(out)
}

fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            TABLE[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

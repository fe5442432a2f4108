//! MetadataCodec (C5)
//!
//! Two pure functions, `encode`/`decode`, that compress metadata enough
//! to fit inside the cloud's per-record limit. Shaped after the
//! teacher's `NodeType::as_str`/`parse_name` round-trip pair: a small
//! static lookup table for the values worth shortening, everything else
//! passed through untouched.

use crate::memory::{keys, MetadataMap, Value};

/// Pre-sync soft limit (§4.4): encoded size at or above this is rejected
/// before the write is enqueued, leaving headroom under the cloud's
/// 10 KB hard limit for the rest of the record.
pub const CLOUD_METADATA_SOFT_LIMIT_BYTES: usize = 9_728; // 9.5 KiB

/// Debug-only keys stripped before encoding. Not part of the
/// `decode(encode(m)) == m` invariant, which only covers keys that
/// participate in correctness.
const STRIPPED_KEYS: &[&str] = &["quality_components", "debug_trace"];

/// `(long provider identifier, short token)`. Reversible: `shorten` and
/// `expand` are inverses over this table.
const PROVIDER_CODES: &[(&str, &str)] = &[
    ("anthropic-claude", "ac"),
    ("openai-gpt", "og"),
    ("local-heuristic", "lh"),
    ("deterministic-test", "dt"),
];

#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("failed to serialize metadata: {0}")]
    Encode(String),
    #[error("failed to deserialize metadata: {0}")]
    Decode(String),
}

pub struct MetadataCodec;

impl MetadataCodec {
    /// Encode `metadata` to bytes, stripping debug-only keys and
    /// shortening provider codes. Deterministic: same input always
    /// produces the same bytes (§4.4), which the drift scanner relies on
    /// for change detection.
    pub fn encode(metadata: &MetadataMap) -> Result<Vec<u8>, CodecError> {
        let mut trimmed = metadata.clone();
        for key in STRIPPED_KEYS {
            trimmed.remove(key);
        }
        if let Some(Value::Str(provider)) = trimmed.get(keys::QUALITY_PROVIDER).cloned() {
            trimmed.insert(keys::QUALITY_PROVIDER, shorten_provider(&provider));
        }

        serde_json::to_vec(&trimmed.0).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode bytes produced by `encode` back into a `MetadataMap`,
    /// expanding provider codes. Stripped keys are absent, as they were
    /// never encoded.
    pub fn decode(bytes: &[u8]) -> Result<MetadataMap, CodecError> {
        let map: std::collections::BTreeMap<String, Value> =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        let mut metadata = MetadataMap(map);

        if let Some(Value::Str(code)) = metadata.get(keys::QUALITY_PROVIDER).cloned() {
            metadata.insert(keys::QUALITY_PROVIDER, expand_provider(&code));
        }

        Ok(metadata)
    }
}

fn shorten_provider(provider: &str) -> String {
    PROVIDER_CODES
        .iter()
        .find(|(long, _)| *long == provider)
        .map(|(_, short)| short.to_string())
        .unwrap_or_else(|| provider.to_string())
}

fn expand_provider(code: &str) -> String {
    PROVIDER_CODES
        .iter()
        .find(|(_, short)| *short == code)
        .map(|(long, _)| long.to_string())
        .unwrap_or_else(|| code.to_string())
}

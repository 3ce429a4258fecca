//! Raw trajectory snapshot sources.
//!
//! The live source pulls the decoder's accumulated records over HTTP; the
//! replay source serves a recorded snapshot for offline analysis.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use turb_core::models::{DecoderRecord, Snapshot};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("snapshot pull timed out after {0:?}")]
    Timeout(Duration),
    #[error("decoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decoder answered HTTP {0}")]
    Status(u16),
    #[error("malformed snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cannot read snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the latest full trajectory snapshot on demand.
#[async_trait]
pub trait RawSampleSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Body of the decoder's `/traffic` endpoint. A missing or null list means
/// the decoder has nothing yet.
#[derive(Debug, Deserialize)]
struct TrafficResponse {
    #[serde(default)]
    traffic: Option<Vec<DecoderRecord>>,
}

/// Snapshot documents are either `{"traffic": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Wrapped(TrafficResponse),
    Records(Vec<DecoderRecord>),
}

impl SnapshotDocument {
    fn into_records(self) -> Vec<DecoderRecord> {
        match self {
            Self::Wrapped(resp) => resp.traffic.unwrap_or_default(),
            Self::Records(records) => records,
        }
    }
}

/// Parse a snapshot document into per-aircraft tracks.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Snapshot, SourceError> {
    let document: SnapshotDocument = serde_json::from_slice(bytes)?;
    Ok(Snapshot::from_records(document.into_records()))
}

/// HTTP client for a decoder process.
pub struct DecoderClient {
    client: Client,
    base_url: String,
}

impl DecoderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RawSampleSource for DecoderClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        let url = format!("{}/traffic", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let snapshot = parse_snapshot(&body)?;
        if snapshot.rejected_records > 0 {
            tracing::debug!(
                "Decoder snapshot had {} unusable record(s)",
                snapshot.rejected_records
            );
        }
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("decoder at {}", self.base_url)
    }
}

/// A recorded snapshot, served unchanged on every pull.
pub struct ReplaySource {
    label: String,
    snapshot: Snapshot,
}

impl ReplaySource {
    pub fn new(label: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            label: label.into(),
            snapshot,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let bytes = std::fs::read(path)?;
        let snapshot = parse_snapshot(&bytes)?;
        tracing::info!(
            "Loaded replay snapshot {} ({} tracks, {} rejected records)",
            path.display(),
            snapshot.len(),
            snapshot.rejected_records
        );
        Ok(Self::new(path.display().to_string(), snapshot))
    }
}

#[async_trait]
impl RawSampleSource for ReplaySource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(self.snapshot.clone())
    }

    fn describe(&self) -> String {
        format!("replay of {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_and_bare_documents() {
        let wrapped = br#"{"traffic": [{"timestamp": 1700000000000, "icao24": "abc123", "altitude": 35000}]}"#;
        let bare = br#"[{"timestamp": 1700000000000, "icao24": "abc123"}, {"timestamp": 1700000001000, "icao24": "def456"}]"#;

        assert_eq!(parse_snapshot(wrapped).unwrap().len(), 1);
        assert_eq!(parse_snapshot(bare).unwrap().len(), 2);
    }

    #[test]
    fn empty_decoder_answer_is_empty_snapshot() {
        assert!(parse_snapshot(br#"{"traffic": null}"#).unwrap().is_empty());
        assert!(parse_snapshot(br#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_snapshot(b"<html>"),
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_decoder_is_an_error() {
        let client = DecoderClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.fetch_snapshot().await.is_err());
    }
}

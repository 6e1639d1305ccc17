//! OSM replication feed client
//!
//! Discovers which change file to apply next. A replication directory serves
//! a rolling `state.txt` plus, per sequence number, a state file and a
//! gzipped change file under a zero-padded `AAA/BBB/CCC` path.

use crate::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// One row of the replication feed: a sequence number and the upstream
/// timestamp its diff ends at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationState {
    pub sequence_number: u64,
    pub timestamp: String,
}

/// Client for one replication directory.
pub struct ReplicationClient {
    http: reqwest::Client,
    base: Url,
}

impl ReplicationClient {
    pub fn new(base_uri: &str) -> EngineResult<Self> {
        let mut base_uri = base_uri.to_string();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }
        let base = Url::parse(&base_uri)
            .map_err(|e| EngineError::Config(format!("replication uri '{base_uri}': {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    /// The newest state the server knows about.
    pub async fn latest_state(&self) -> EngineResult<ReplicationState> {
        let text = self.get_text("state.txt").await?;
        parse_state_file(&text)
    }

    /// The state for one specific sequence number.
    pub async fn state_for(&self, sequence_number: u64) -> EngineResult<ReplicationState> {
        let path = format!("{}.state.txt", sequence_path(sequence_number));
        let text = self.get_text(&path).await?;
        parse_state_file(&text)
    }

    /// Walk back from the latest state to the first one at or before
    /// `timestamp` (ISO 8601 with `Z`). This is where a sync starting from
    /// the endpoint's newest node timestamp picks up.
    pub async fn state_for_timestamp(&self, timestamp: &str) -> EngineResult<ReplicationState> {
        let mut state = self.latest_state().await?;
        while state.timestamp.as_str() > timestamp && state.sequence_number > 0 {
            state = self.state_for(state.sequence_number - 1).await?;
        }
        info!(
            sequence = state.sequence_number,
            timestamp = %state.timestamp,
            "replication start state"
        );
        Ok(state)
    }

    /// Download the gzipped change file for `sequence_number` into
    /// `dest_dir` and return its path.
    pub async fn fetch_change_file(
        &self,
        sequence_number: u64,
        dest_dir: &Path,
    ) -> EngineResult<PathBuf> {
        let remote = format!("{}.osc.gz", sequence_path(sequence_number));
        debug!(sequence = sequence_number, "fetching change file");
        let url = self.join(&remote)?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let dest = dest_dir.join(format!("{sequence_number}.osc.gz"));
        std::fs::write(&dest, &bytes)?;
        Ok(dest)
    }

    async fn get_text(&self, path: &str) -> EngineResult<String> {
        let url = self.join(path)?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn join(&self, path: &str) -> EngineResult<Url> {
        self.base
            .join(path)
            .map_err(|e| EngineError::Config(format!("replication path '{path}': {e}")))
    }
}

/// Zero-pad a sequence number to nine digits and split it into the feed's
/// three-digit path triplets (`6123456` → `006/123/456`). The leading group
/// grows should a feed ever pass nine digits.
pub fn sequence_path(sequence_number: u64) -> String {
    let padded = format!("{sequence_number:09}");
    let split = padded.len() - 6;
    format!(
        "{}/{}/{}",
        &padded[..split],
        &padded[split..split + 3],
        &padded[split + 3..]
    )
}

/// Parse a replication state file: `sequenceNumber=` and `timestamp=` lines,
/// with escaped colons in the timestamp.
pub fn parse_state_file(text: &str) -> EngineResult<ReplicationState> {
    let mut sequence_number = None;
    let mut timestamp = None;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "sequenceNumber" => {
                sequence_number = Some(value.parse::<u64>().map_err(|_| {
                    EngineError::MalformedResponse(format!(
                        "state file with non-numeric sequenceNumber '{value}'"
                    ))
                })?);
            }
            "timestamp" => timestamp = Some(value.replace("\\:", ":")),
            _ => {}
        }
    }

    match (sequence_number, timestamp) {
        (Some(sequence_number), Some(timestamp)) => Ok(ReplicationState {
            sequence_number,
            timestamp,
        }),
        _ => Err(EngineError::MalformedResponse(
            "state file without sequenceNumber or timestamp".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE_FILE: &str = "#Sat Jun 01 12:00:02 UTC 2024\n\
        sequenceNumber=6123456\n\
        timestamp=2024-06-01T12\\:00\\:00Z\n";

    #[test]
    fn test_parse_state_file() {
        let state = parse_state_file(STATE_FILE).unwrap();
        assert_eq!(state.sequence_number, 6123456);
        assert_eq!(state.timestamp, "2024-06-01T12:00:00Z");
    }

    #[test]
    fn test_parse_state_file_missing_fields() {
        assert!(matches!(
            parse_state_file("#only a comment\n"),
            Err(EngineError::MalformedResponse(_))
        ));
        assert!(parse_state_file("sequenceNumber=12\n").is_err());
    }

    #[test]
    fn test_parse_state_file_bad_sequence() {
        assert!(parse_state_file("sequenceNumber=twelve\ntimestamp=2024-06-01T12\\:00\\:00Z\n").is_err());
    }

    #[test]
    fn test_sequence_path_padding() {
        assert_eq!(sequence_path(6123456), "006/123/456");
        assert_eq!(sequence_path(42), "000/000/042");
        assert_eq!(sequence_path(999999999), "999/999/999");
    }
}

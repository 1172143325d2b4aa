//! Durable crawl progress: the last seen archive height per stream and chain,
//! carried between runs in the Singer `STATE` shape
//! `{"bookmarks": {"<stream>": {"<chain>": <height>}}}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::chain::Chain;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<Chain, u64>>,
}

impl CheckpointState {
    /// Reads a state file. No path means a fresh state.
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read state file '{}': {}", path.display(), e))?;
        let state: CheckpointState = serde_json::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse state file '{}': {}", path.display(), e))?;
        Ok(state)
    }

    pub fn last_seen_height(&self, stream: &str, chain: Chain) -> u64 {
        self.bookmarks
            .get(stream)
            .and_then(|chains| chains.get(&chain))
            .copied()
            .unwrap_or(0)
    }

    /// Moves the bookmark forward, never backwards. Returns whether it moved.
    pub fn advance(&mut self, stream: &str, chain: Chain, height: u64) -> bool {
        let current = self
            .bookmarks
            .entry(stream.to_string())
            .or_default()
            .entry(chain)
            .or_insert(0);
        if height > *current {
            *current = height;
            true
        } else {
            false
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "bookmarks": self.bookmarks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "squid_event_stream";

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = CheckpointState::default();
        assert_eq!(state.last_seen_height(STREAM, Chain::Bsc), 0);
        assert!(state.advance(STREAM, Chain::Bsc, 500));
        assert!(!state.advance(STREAM, Chain::Bsc, 400));
        assert!(!state.advance(STREAM, Chain::Bsc, 500));
        assert_eq!(state.last_seen_height(STREAM, Chain::Bsc), 500);
        assert_eq!(state.last_seen_height(STREAM, Chain::Base), 0);
    }

    #[test]
    fn test_singer_state_shape() {
        let raw = r#"{"bookmarks": {"squid_event_stream": {"bsc": 1403882, "zksync": 9}}}"#;
        let state: CheckpointState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.last_seen_height(STREAM, Chain::Bsc), 1403882);
        assert_eq!(
            state.to_value(),
            serde_json::json!({"bookmarks": {"squid_event_stream": {"bsc": 1403882, "zksync": 9}}})
        );
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(CheckpointState::load(None).unwrap(), CheckpointState::default());
        assert!(CheckpointState::load(Some(Path::new("/nonexistent/state.json"))).is_err());
    }
}

//! JSON text frames exchanged over the sync socket.
//!
//! Every frame is an object discriminated by `type`:
//!
//! ```text
//! {"type":"slideChange","index":3}
//! {"type":"playState","isPlaying":true}
//! {"type":"reload"}
//! ```
//!
//! There are no sequence numbers or acknowledgements. Frames are applied in
//! arrival order and the last one wins.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncMessage {
    /// The master moved to this logical slide index
    SlideChange { index: usize },

    /// The master started or stopped playback
    #[serde(rename_all = "camelCase")]
    PlayState { is_playing: bool },

    /// The media manifest changed on the server; pages should reload
    Reload,
}

impl SyncMessage {
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(format!("{} in frame {:?}", e, text)))
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether a client may originate this message
    pub fn is_client_message(&self) -> bool {
        !matches!(self, SyncMessage::Reload)
    }
}

/// Last known session state, as seen by a relay.
///
/// New connections get this replayed so they join mid-session already in step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub slide_index: Option<usize>,
    pub is_playing: Option<bool>,
}

impl SyncSnapshot {
    /// Fold a message into the snapshot; returns true if anything changed
    pub fn apply(&mut self, message: &SyncMessage) -> bool {
        match *message {
            SyncMessage::SlideChange { index } => {
                let changed = self.slide_index != Some(index);
                self.slide_index = Some(index);
                changed
            }
            SyncMessage::PlayState { is_playing } => {
                let changed = self.is_playing != Some(is_playing);
                self.is_playing = Some(is_playing);
                changed
            }
            SyncMessage::Reload => false,
        }
    }

    /// Messages that bring a fresh page up to this snapshot, slide first
    pub fn replay(&self) -> Vec<SyncMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(index) = self.slide_index {
            messages.push(SyncMessage::SlideChange { index });
        }
        if let Some(is_playing) = self.is_playing {
            messages.push(SyncMessage::PlayState { is_playing });
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            SyncMessage::SlideChange { index: 3 }.encode().unwrap(),
            r#"{"type":"slideChange","index":3}"#
        );
        assert_eq!(
            SyncMessage::PlayState { is_playing: true }.encode().unwrap(),
            r#"{"type":"playState","isPlaying":true}"#
        );
        assert_eq!(SyncMessage::Reload.encode().unwrap(), r#"{"type":"reload"}"#);
    }

    #[test]
    fn test_decode_valid_frames() {
        assert_eq!(
            SyncMessage::decode(r#"{"type":"slideChange","index":4}"#).unwrap(),
            SyncMessage::SlideChange { index: 4 }
        );
        assert_eq!(
            SyncMessage::decode(r#"{"isPlaying":false,"type":"playState"}"#).unwrap(),
            SyncMessage::PlayState { is_playing: false }
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(SyncMessage::decode("not json").is_err());
        assert!(SyncMessage::decode(r#"{"type":"seek","to":10}"#).is_err());
        assert!(SyncMessage::decode(r#"{"type":"slideChange"}"#).is_err());
        assert!(SyncMessage::decode(r#"{"type":"slideChange","index":-1}"#).is_err());
        assert!(SyncMessage::decode(r#"{"type":"playState","isPlaying":"yes"}"#).is_err());

        let err = SyncMessage::decode("{}").unwrap_err();
        assert!(err.to_string().contains("Sync protocol error"));
    }

    #[test]
    fn test_reload_is_server_only() {
        assert!(!SyncMessage::Reload.is_client_message());
        assert!(SyncMessage::SlideChange { index: 0 }.is_client_message());
    }

    #[test]
    fn test_snapshot_last_write_wins() {
        let mut snapshot = SyncSnapshot::default();
        assert!(snapshot.replay().is_empty());

        assert!(snapshot.apply(&SyncMessage::SlideChange { index: 1 }));
        assert!(snapshot.apply(&SyncMessage::SlideChange { index: 3 }));
        assert!(!snapshot.apply(&SyncMessage::SlideChange { index: 3 }));
        assert!(snapshot.apply(&SyncMessage::PlayState { is_playing: true }));
        assert!(!snapshot.apply(&SyncMessage::Reload));

        assert_eq!(
            snapshot.replay(),
            vec![
                SyncMessage::SlideChange { index: 3 },
                SyncMessage::PlayState { is_playing: true },
            ]
        );
    }
}

// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The data model: `VoiceSession`, `VoiceStream`, `VoicePacket`,
//! `RecognitionSession`, `TranscriptSegment`, `TranscriptWord`,
//! `WordAlternative`, and the transient `Notification` kinds.
//!
//! Ids are newtyped strings rather than bare `String` so that a stream id
//! can never be passed where a segment id is expected.

use crate::clock::NanosSinceEpoch;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

id_newtype!(SessionId);
id_newtype!(StreamId);
id_newtype!(PacketId);
id_newtype!(RecognitionSessionId);
id_newtype!(SegmentId);
id_newtype!(WordId);
id_newtype!(WordAlternativeId);

/// One visit of the ingestor to one voice channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSession {
    pub id: SessionId,
    pub guild_id: String,
    pub channel_id: String,
    pub started_at: NanosSinceEpoch,
    pub ended_at: Option<NanosSinceEpoch>,
}

/// One contiguous utterance sequence from one speaker in one session,
/// identified by the wire-level SSRC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStream {
    pub id: StreamId,
    pub session_id: SessionId,
    pub ssrc: u32,
    pub speaker_external_id: String,
    pub packet_seq_offset: u16,
    pub sample_idx_offset: u32,
    pub created_at: NanosSinceEpoch,
}

/// One received Opus frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicePacket {
    pub id: PacketId,
    pub stream_id: StreamId,
    pub sequence: u16,
    pub sample_idx: u32,
    #[serde(with = "serde_bytes_as_base64")]
    pub payload: Vec<u8>,
    pub received_at: NanosSinceEpoch,
}

/// States of the ASR Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

/// One open connection to the ASR service for one `VoiceStream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSession {
    pub id: RecognitionSessionId,
    pub stream_id: StreamId,
    pub language: String,
    pub first_sample_idx: u32,
    pub state: RecognitionState,
}

/// A contiguous block of words the ASR groups together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: SegmentId,
    pub recognition_session_id: RecognitionSessionId,
    pub is_final: bool,
    pub version: u32,
    pub created_at: NanosSinceEpoch,
}

/// Whether a word binds left to its predecessor with no space (typical for
/// punctuation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachesTo {
    None,
    Previous,
}

/// One token within a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub id: WordId,
    pub segment_id: SegmentId,
    pub start_time: f64,
    pub duration: f64,
    pub is_end_of_sentence: bool,
    pub attaches_to: AttachesTo,
    pub version: u32,
}

/// One candidate surface form for a word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAlternative {
    pub id: WordAlternativeId,
    pub word_id: WordId,
    pub content: String,
    pub confidence: f32,
}

/// Transient in-memory change event published by the Store, the sole
/// publisher of both variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification {
    NewPacket { stream_id: StreamId, sample_idx: u32 },
    TranscriptChanged { segment_id: SegmentId, session_id: RecognitionSessionId, is_final: bool, version: u32 },
}

mod serde_bytes_as_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_newtypes_round_trip_through_display() {
        let id = StreamId::new("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn chosen_alternative_is_max_confidence_first_inserted_tiebreak() {
        let word_id = WordId::new("w1");
        let alts = vec![
            WordAlternative { id: WordAlternativeId::new("a1"), word_id: word_id.clone(), content: "hello".into(), confidence: 0.9 },
            WordAlternative { id: WordAlternativeId::new("a2"), word_id: word_id.clone(), content: "hallo".into(), confidence: 0.9 },
            WordAlternative { id: WordAlternativeId::new("a3"), word_id, content: "hullo".into(), confidence: 0.5 },
        ];
        let chosen = alts
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(_, a)| a)
            .expect("non-empty");
        assert_eq!(chosen.content, "hello");
    }
}

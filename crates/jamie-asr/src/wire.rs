// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! JSON wire shapes for the ASR vendor protocol: the two outgoing
//! control frames and the two incoming hypothesis frames, exchanged over the
//! WebSocket transport `session` drives.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "message")]
pub enum OutgoingFrame {
    StartRecognition {
        audio_format: AudioFormat,
        transcription_config: TranscriptionConfig,
    },
    EndOfStream {
        last_seq_no: u64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub encoding: &'static str,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self { kind: "raw", encoding: "opus", sample_rate: 48_000 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionConfig {
    pub language: String,
    pub enable_partials: bool,
    pub max_delay: f64,
    pub punctuation_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "message")]
pub enum IncomingFrame {
    AddPartialTranscript { results: Vec<WireResult> },
    AddTranscript { results: Vec<WireResult> },
}

impl IncomingFrame {
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::AddTranscript { .. })
    }

    #[must_use]
    pub fn results(&self) -> &[WireResult] {
        match self {
            Self::AddPartialTranscript { results } | Self::AddTranscript { results } => results,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireResult {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_eos: bool,
    pub attaches_to: String,
    pub alternatives: Vec<WireAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAlternative {
    pub content: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_recognition_serializes_with_message_tag() {
        let frame = OutgoingFrame::StartRecognition {
            audio_format: AudioFormat::default(),
            transcription_config: TranscriptionConfig {
                language: "en".into(),
                enable_partials: true,
                max_delay: 0.8,
                punctuation_enabled: true,
            },
        };
        let json = serde_json::to_string(&frame).expect("serialize");
        assert!(json.contains("\"message\":\"StartRecognition\""));
        assert!(json.contains("\"encoding\":\"opus\""));
    }

    #[test]
    fn add_transcript_frame_deserializes_and_reports_final() {
        let raw = r#"{
            "message": "AddTranscript",
            "results": [
                {
                    "start_time": 0.0,
                    "end_time": 0.4,
                    "type": "word",
                    "is_eos": false,
                    "attaches_to": "none",
                    "alternatives": [{"content": "hello", "confidence": 0.9}]
                }
            ]
        }"#;
        let frame: IncomingFrame = serde_json::from_str(raw).expect("deserialize");
        assert!(frame.is_final());
        assert_eq!(frame.results().len(), 1);
        assert_eq!(frame.results()[0].alternatives[0].content, "hello");
    }

    #[test]
    fn add_partial_transcript_frame_reports_not_final() {
        let raw = r#"{"message": "AddPartialTranscript", "results": []}"#;
        let frame: IncomingFrame = serde_json::from_str(raw).expect("deserialize");
        assert!(!frame.is_final());
    }
}

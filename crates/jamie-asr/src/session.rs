// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C6 ASR Session: one bidirectional recognition channel for one
//! `VoiceStream`, driving the vendor's WebSocket protocol through the
//! `idle → connecting → open → closing → closed`/`failed` state machine.

use crate::wire::{self, AudioFormat, IncomingFrame, OutgoingFrame, TranscriptionConfig};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use jamie_core::model::AttachesTo;
pub use jamie_core::model::RecognitionState;
use jamie_core::{JamieError, Result};
use opentelemetry::{global, KeyValue};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Depth of the internal audio buffer between `sendAudio` callers and the
/// transport writer.
const AUDIO_BUFFER_CAPACITY: usize = 100;
/// Deadline for the ASR WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Interval between keep-alive pings once the session is open.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Deadline for a pong reply before the session is considered failed.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// Depth of the consumer-facing hypothesis channel.
const HYPOTHESIS_CHANNEL_CAPACITY: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Vendor endpoint and per-stream recognition parameters sent in `StartRecognition`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub language: String,
    pub max_delay: f64,
    pub punctuation_enabled: bool,
}

/// One candidate surface form for a hypothesis result, mirroring the wire
/// shape rather than `jamie_store`'s storage shape.
#[derive(Debug, Clone)]
pub struct HypothesisAlternative {
    pub content: String,
    pub confidence: f32,
}

/// One word or punctuation token of a hypothesis.
#[derive(Debug, Clone)]
pub struct HypothesisResult {
    pub start_time: f64,
    pub end_time: f64,
    pub is_end_of_sentence: bool,
    pub attaches_to: AttachesTo,
    pub alternatives: Vec<HypothesisAlternative>,
}

/// A parsed `AddPartialTranscript`/`AddTranscript` frame, emitted to the
/// session's consumer channel in the order received from the vendor.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub is_final: bool,
    pub results: Vec<HypothesisResult>,
}

/// A live handle to a spawned ASR Session: callers push audio and observe
/// state through it without touching the underlying task.
pub struct AsrSessionHandle {
    audio_tx: mpsc::Sender<Vec<u8>>,
    close_tx: mpsc::Sender<()>,
    state_rx: watch::Receiver<RecognitionState>,
}

impl AsrSessionHandle {
    /// Enqueues one Opus frame for the transport writer.
    ///
    /// # Errors
    /// Returns `BufferFull` if the internal buffer is saturated, or
    /// `Cancelled` if the session has already torn down.
    pub fn send_audio(&self, payload: Vec<u8>) -> Result<()> {
        self.audio_tx.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => JamieError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => JamieError::Cancelled,
        })
    }

    #[must_use]
    pub fn state(&self) -> RecognitionState {
        *self.state_rx.borrow()
    }

    /// Requests `closing`/`closed`; idempotent if the session already
    /// unwound on its own (e.g. transport failure).
    pub async fn close(&self) {
        let _ = self.close_tx.send(()).await;
    }
}

/// Spawns the session's driving task and returns a handle plus the
/// hypothesis consumer channel.
#[must_use]
pub fn spawn(config: SessionConfig, cancellation: CancellationToken) -> (AsrSessionHandle, mpsc::Receiver<Hypothesis>) {
    let (audio_tx, audio_rx) = mpsc::channel(AUDIO_BUFFER_CAPACITY);
    let (close_tx, close_rx) = mpsc::channel(1);
    let (hyp_tx, hyp_rx) = mpsc::channel(HYPOTHESIS_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(RecognitionState::Idle);

    tokio::spawn(run(config, audio_rx, close_rx, hyp_tx, state_tx, cancellation));

    (AsrSessionHandle { audio_tx, close_tx, state_rx }, hyp_rx)
}

fn state_name(state: RecognitionState) -> &'static str {
    match state {
        RecognitionState::Idle => "idle",
        RecognitionState::Connecting => "connecting",
        RecognitionState::Open => "open",
        RecognitionState::Closing => "closing",
        RecognitionState::Closed => "closed",
        RecognitionState::Failed => "failed",
    }
}

async fn run(
    config: SessionConfig,
    mut audio_rx: mpsc::Receiver<Vec<u8>>,
    mut close_rx: mpsc::Receiver<()>,
    hyp_tx: mpsc::Sender<Hypothesis>,
    state_tx: watch::Sender<RecognitionState>,
    cancellation: CancellationToken,
) {
    let meter = global::meter("jamie_asr");
    let state_transitions = meter.u64_counter("asr_state_transitions").build();
    let set_state = |state: RecognitionState| {
        let _ = state_tx.send(state);
        state_transitions.add(1, &[KeyValue::new("state", state_name(state))]);
    };

    set_state(RecognitionState::Connecting);

    let (mut write, mut read) = match connect(&config).await {
        Ok(streams) => streams,
        Err(error) => {
            tracing::warn!(%error, "asr session failed to connect");
            set_state(RecognitionState::Failed);
            return;
        },
    };

    let start_frame = OutgoingFrame::StartRecognition {
        audio_format: AudioFormat::default(),
        transcription_config: TranscriptionConfig {
            language: config.language.clone(),
            enable_partials: true,
            max_delay: config.max_delay,
            punctuation_enabled: config.punctuation_enabled,
        },
    };
    if let Err(error) = send_frame(&mut write, &start_frame).await {
        tracing::warn!(%error, "asr session failed to send StartRecognition");
        set_state(RecognitionState::Failed);
        return;
    }

    set_state(RecognitionState::Open);
    tracing::info!("asr session open");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // first tick fires immediately
    let mut last_pong = Instant::now();
    let mut last_seq_no: u64 = 0;
    let mut failed = false;

    loop {
        tokio::select! {
            () = cancellation.cancelled() => break,
            Some(()) = close_rx.recv() => break,
            maybe_audio = audio_rx.recv() => {
                let Some(payload) = maybe_audio else { break };
                last_seq_no += 1;
                if let Err(error) = write.send(Message::Binary(payload.into())).await {
                    tracing::warn!(%error, "asr session audio write failed");
                    failed = true;
                    break;
                }
            },
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::warn!("asr session missed pong for {PONG_TIMEOUT:?}");
                    failed = true;
                    break;
                }
                if let Err(error) = write.send(Message::Ping(Vec::new().into())).await {
                    tracing::warn!(%error, "asr session ping failed");
                    failed = true;
                    break;
                }
            },
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(error) = handle_incoming(text.as_str(), &hyp_tx).await {
                            tracing::warn!(%error, "malformed asr hypothesis frame");
                        }
                    },
                    Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {},
                    Some(Err(error)) => {
                        tracing::warn!(%error, "asr transport error");
                        failed = true;
                        break;
                    },
                }
            },
        }
    }

    if failed {
        set_state(RecognitionState::Failed);
        return;
    }

    set_state(RecognitionState::Closing);
    let end_frame = OutgoingFrame::EndOfStream { last_seq_no };
    let _ = send_frame(&mut write, &end_frame).await;
    let _ = write.close().await;
    set_state(RecognitionState::Closed);
}

async fn connect(config: &SessionConfig) -> Result<(WsWrite, WsRead)> {
    let (stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(config.endpoint.as_str()))
        .await
        .map_err(|_| JamieError::Timeout(CONNECT_TIMEOUT))??;
    let (write, read) = stream.split();
    Ok((write, read))
}

async fn send_frame(write: &mut WsWrite, frame: &OutgoingFrame) -> Result<()> {
    let text = serde_json::to_string(frame).map_err(|e| JamieError::Protocol(format!("encode frame: {e}")))?;
    write.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn handle_incoming(text: &str, hyp_tx: &mpsc::Sender<Hypothesis>) -> Result<()> {
    let frame: IncomingFrame =
        serde_json::from_str(text).map_err(|e| JamieError::Protocol(format!("invalid hypothesis frame: {e}")))?;
    let hypothesis = Hypothesis { is_final: frame.is_final(), results: frame.results().iter().map(to_result).collect() };
    // A dropped consumer is not this session's failure; it unwinds on its
    // own supervision path.
    let _ = hyp_tx.send(hypothesis).await;
    Ok(())
}

fn to_result(result: &wire::WireResult) -> HypothesisResult {
    HypothesisResult {
        start_time: result.start_time,
        end_time: result.end_time,
        is_end_of_sentence: result.is_eos,
        attaches_to: if result.attaches_to == "previous" { AttachesTo::Previous } else { AttachesTo::None },
        alternatives: result
            .alternatives
            .iter()
            .map(|a| HypothesisAlternative { content: a.content.clone(), confidence: a.confidence })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_name_covers_every_variant() {
        for state in [
            RecognitionState::Idle,
            RecognitionState::Connecting,
            RecognitionState::Open,
            RecognitionState::Closing,
            RecognitionState::Closed,
            RecognitionState::Failed,
        ] {
            assert!(!state_name(state).is_empty());
        }
    }

    #[test]
    fn punctuation_attaches_to_previous_word() {
        let wire_result = wire::WireResult {
            start_time: 0.4,
            end_time: 0.41,
            kind: "punctuation".into(),
            is_eos: true,
            attaches_to: "previous".into(),
            alternatives: vec![wire::WireAlternative { content: ".".into(), confidence: 0.99 }],
        };
        let result = to_result(&wire_result);
        assert_eq!(result.attaches_to, AttachesTo::Previous);
        assert!(result.is_end_of_sentence);
    }
}

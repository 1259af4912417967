// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C10 Pipeline Supervisor: owns each `VoiceSession`'s lifecycle, spawns one
//! worker task per `VoiceStream` that drives the Ogg Assembler, the ASR
//! Session, and the Transcript Reducer together, and reconnects a failed
//! ASR Session with exponential backoff.
//!
//! The per-stream worker loop and its `CancellationToken`-scoped teardown
//! follow the actor-task idiom used elsewhere in the workspace for
//! long-lived, independently-failing units of work; the backoff schedule
//! is this workspace's own, since nothing in the corpus models a
//! production reconnect loop rather than a fixed-delay load generator.

use jamie_asr::{spawn as spawn_asr, AsrSessionHandle, Hypothesis, RecognitionState, SessionConfig};
use jamie_audio::OggAssembler;
use jamie_core::clock::{Clock, SystemClock};
use jamie_core::model::{RecognitionSessionId, SessionId, StreamId, VoiceStream};
use jamie_core::{JamieError, Result};
use jamie_store::Store;
use opentelemetry::{global, KeyValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::ingest::{relative_sequence, PacketIngestor, PACKET_CHANNEL_CAPACITY};
use crate::registry::{StreamRegistry, VoiceStreamState};
use crate::types::RawPacket;

/// Initial delay before the first ASR reconnect attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling the reconnect delay is capped at.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

struct SessionHandle {
    cancellation: CancellationToken,
}

/// The Pipeline Supervisor (C10): the top-level object a host process
/// constructs once, feeding it raw packets and speaking updates as they
/// arrive from the platform gateway.
pub struct PipelineSupervisor {
    store: Arc<Store>,
    registry: Arc<StreamRegistry>,
    ingestor: PacketIngestor,
    asr_endpoint: String,
    language: String,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl PipelineSupervisor {
    #[must_use]
    pub fn new(store: Arc<Store>, asr_endpoint: String, language: String) -> Self {
        let registry = Arc::new(StreamRegistry::new());
        let ingestor = PacketIngestor::new(registry.clone());
        Self { store, registry, ingestor, asr_endpoint, language, sessions: RwLock::new(HashMap::new()) }
    }

    /// Opens a new `VoiceSession` and returns its id.
    ///
    /// # Errors
    /// Propagates any `Storage`/`Timeout` failure from the Store.
    pub async fn start_session(&self, guild_id: &str, channel_id: &str) -> Result<SessionId> {
        let session_id = self.store.create_voice_session(guild_id, channel_id).await?;
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), SessionHandle { cancellation: CancellationToken::new() });
        Ok(session_id)
    }

    /// Records the platform's speaker id for `ssrc`, consulted the first
    /// time that SSRC's stream is created.
    pub async fn note_speaker(&self, session_id: &SessionId, ssrc: u32, external_user_id: String) {
        self.registry.record_speaker(session_id, ssrc, external_user_id).await;
    }

    /// Routes one raw packet to its stream, creating the stream (and its
    /// worker, ASR Session, and Ogg Assembler) on first sight of its SSRC.
    ///
    /// # Errors
    /// Returns `NotFound` if `session_id` has no active session, otherwise
    /// propagates the Stream Registry's factory or channel-closed errors.
    pub async fn ingest_packet(&self, session_id: &SessionId, packet: RawPacket) -> Result<()> {
        let cancellation = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .map(|handle| handle.cancellation.clone())
                .ok_or_else(|| JamieError::NotFound(format!("voice session {session_id}")))?
        };

        let store = self.store.clone();
        let asr_endpoint = self.asr_endpoint.clone();
        let language = self.language.clone();
        let registry = self.registry.clone();
        let session_id = session_id.clone();
        let first_packet = packet.clone();

        self.ingestor
            .ingest(&session_id, packet, move || async move {
                spawn_stream(store, registry, session_id, first_packet, asr_endpoint, language, cancellation).await
            })
            .await
    }

    /// Ends `session_id`: cancels every per-stream worker it owns, evicts
    /// them from the registry, and marks the session ended in storage.
    ///
    /// # Errors
    /// Propagates any `Storage`/`Timeout` failure from the Store.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<()> {
        if let Some(handle) = self.sessions.write().await.remove(session_id) {
            handle.cancellation.cancel();
        }
        self.registry.evict_session(session_id).await;
        self.store.end_voice_session(session_id).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn spawn_stream(
    store: Arc<Store>,
    registry: Arc<StreamRegistry>,
    session_id: SessionId,
    first_packet: RawPacket,
    asr_endpoint: String,
    language: String,
    cancellation: CancellationToken,
) -> Result<VoiceStreamState> {
    let stream = match store.find_voice_stream_by_ssrc(&session_id, first_packet.ssrc).await? {
        Some(stream) => stream,
        None => {
            let stream_id = StreamId::new(uuid::Uuid::now_v7().to_string());
            let speaker = registry.speaker_for(&session_id, first_packet.ssrc).await.unwrap_or_default();
            store
                .create_voice_stream(
                    &stream_id,
                    &session_id,
                    first_packet.ssrc,
                    &speaker,
                    first_packet.sequence,
                    first_packet.sample_idx,
                )
                .await?
        },
    };

    let (packet_tx, packet_rx) = mpsc::channel(PACKET_CHANNEL_CAPACITY);
    tokio::spawn(run_stream(store, stream.clone(), packet_rx, asr_endpoint, language, cancellation));

    Ok(VoiceStreamState { stream, packet_tx })
}

fn open_asr_session(
    endpoint: &str,
    language: &str,
    cancellation: &CancellationToken,
) -> (AsrSessionHandle, mpsc::Receiver<Hypothesis>) {
    let config = SessionConfig {
        endpoint: endpoint.to_owned(),
        language: language.to_owned(),
        max_delay: 0.8,
        punctuation_enabled: true,
    };
    spawn_asr(config, cancellation.child_token())
}

async fn run_stream(
    store: Arc<Store>,
    stream: VoiceStream,
    mut packet_rx: mpsc::Receiver<RawPacket>,
    asr_endpoint: String,
    language: String,
    cancellation: CancellationToken,
) {
    let meter = global::meter("jamie_pipeline");
    let reconnects = meter.u64_counter("asr_reconnects").build();

    let mut recognition_session_id =
        match store.create_recognition_session(&stream.id, &language, stream.sample_idx_offset).await {
            Ok(id) => id,
            Err(error) => {
                tracing::error!(%error, ssrc = stream.ssrc, "failed to open recognition session");
                return;
            },
        };

    let mut assembler = OggAssembler::new(stream.ssrc, SystemClock.now_ns());
    let (mut asr_handle, mut hyp_rx) = open_asr_session(&asr_endpoint, &language, &cancellation);
    let mut backoff = INITIAL_BACKOFF;

    loop {
        tokio::select! {
            () = cancellation.cancelled() => break,
            maybe_packet = packet_rx.recv() => {
                let Some(packet) = maybe_packet else { break };
                handle_packet(&store, &stream, &mut assembler, &asr_handle, packet).await;
            },
            maybe_hypothesis = hyp_rx.recv() => {
                if let Some(hypothesis) = maybe_hypothesis {
                    apply_hypothesis(&store, &recognition_session_id, &hypothesis).await;
                }
            },
        }

        if asr_handle.state() == RecognitionState::Failed {
            tracing::warn!(ssrc = stream.ssrc, backoff = ?backoff, "asr session failed; reconnecting");
            tokio::select! {
                () = cancellation.cancelled() => break,
                () = tokio::time::sleep(backoff) => {},
            }

            reconnects.add(1, &[KeyValue::new("ssrc", i64::from(stream.ssrc))]);
            let (handle, rx) = open_asr_session(&asr_endpoint, &language, &cancellation);
            asr_handle = handle;
            hyp_rx = rx;
            backoff = match store.create_recognition_session(&stream.id, &language, stream.sample_idx_offset).await {
                Ok(id) => {
                    recognition_session_id = id;
                    INITIAL_BACKOFF
                },
                Err(error) => {
                    tracing::error!(%error, ssrc = stream.ssrc, "failed to open recognition session on reconnect");
                    (backoff * 2).min(MAX_BACKOFF)
                },
            };
        }
    }

    while let Ok(hypothesis) = hyp_rx.try_recv() {
        apply_hypothesis(&store, &recognition_session_id, &hypothesis).await;
    }
    asr_handle.close().await;
    if let Err(error) = store.set_recognition_session_state(&recognition_session_id, RecognitionState::Closed).await {
        tracing::error!(%error, ssrc = stream.ssrc, "failed to record closed recognition session");
    }

    match assembler.close() {
        Ok((_bytes, report)) => {
            tracing::info!(
                ssrc = stream.ssrc,
                total_packets = report.total_packets,
                gap_count = report.gap_count,
                "stream closed"
            );
        },
        Err(error) => tracing::error!(%error, ssrc = stream.ssrc, "failed to close ogg assembler"),
    }
}

async fn handle_packet(
    store: &Store,
    stream: &VoiceStream,
    assembler: &mut OggAssembler,
    asr_handle: &AsrSessionHandle,
    packet: RawPacket,
) {
    let sequence = relative_sequence(packet.sequence, stream.packet_seq_offset);
    if let Err(error) = store.insert_voice_packet(stream, sequence, packet.sample_idx, packet.payload.clone()).await {
        tracing::error!(%error, ssrc = stream.ssrc, "failed to persist voice packet");
    }

    // The Assembler's live Ogg output has no subscriber yet in this
    // workspace (the Slice Builder reconstructs from storage on demand
    // instead); it still runs so its close-time report stays accurate.
    if let Err(error) = assembler.push(packet.sample_idx, &packet.payload, SystemClock.now_ns()) {
        tracing::error!(%error, ssrc = stream.ssrc, "ogg assembler push failed");
    }

    if let Err(JamieError::BufferFull) = asr_handle.send_audio(packet.payload) {
        tracing::debug!(ssrc = stream.ssrc, "asr audio buffer full; dropping frame");
    }
}

async fn apply_hypothesis(store: &Store, recognition_session_id: &RecognitionSessionId, hypothesis: &Hypothesis) {
    if let Err(error) = jamie_transcript::apply_hypothesis(store, recognition_session_id, hypothesis).await {
        tracing::error!(%error, %recognition_session_id, "failed to apply asr hypothesis");
    }
}

// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C4 Packet Ingestor: hands each raw packet off to its stream's bounded
//! channel, computing the stream-relative sequence number and recording a
//! dropped-packet metric when that channel is saturated, grounded on the
//! Opus codec node's blocking-handoff pattern.

use jamie_core::model::SessionId;
use jamie_core::{JamieError, Result};
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use std::future::Future;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::{StreamRegistry, VoiceStreamState};
use crate::types::RawPacket;

/// Depth of each stream's packet channel: roughly 3 seconds at 50
/// packets/second, enough to absorb a brief stall in its worker without
/// unbounded memory growth.
pub const PACKET_CHANNEL_CAPACITY: usize = 150;

/// `packet.sequence - stream.packetSeqOffset`, wrapping at `u16`'s range
/// the way the wire sequence counter itself wraps.
#[must_use]
pub fn relative_sequence(sequence: u16, offset: u16) -> u16 {
    sequence.wrapping_sub(offset)
}

/// The Packet Ingestor (C4): resolves a packet's stream via the registry
/// and forwards it onto that stream's channel, dropping on backpressure
/// rather than blocking the gateway reader.
pub struct PacketIngestor {
    registry: std::sync::Arc<StreamRegistry>,
    dropped_packet: Counter<u64>,
}

impl PacketIngestor {
    #[must_use]
    pub fn new(registry: std::sync::Arc<StreamRegistry>) -> Self {
        let meter = global::meter("jamie_pipeline");
        let dropped_packet = meter.u64_counter("dropped_packet").build();
        Self { registry, dropped_packet }
    }

    /// Resolves `packet`'s stream (creating it via `factory` on first
    /// sight) and enqueues the packet for that stream's worker.
    ///
    /// # Errors
    /// Propagates `factory`'s error, or `Cancelled` if the stream's worker
    /// has already torn down.
    pub async fn ingest<F, Fut>(&self, session_id: &SessionId, packet: RawPacket, factory: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VoiceStreamState>>,
    {
        let state = self.registry.resolve_or_create(session_id, packet.ssrc, factory).await?;
        let ssrc = packet.ssrc;
        match state.packet_tx.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_packet.add(1, &[KeyValue::new("ssrc", i64::from(ssrc))]);
                tracing::debug!(ssrc, "dropped packet: ingest channel full");
                Ok(())
            },
            Err(TrySendError::Closed(_)) => Err(JamieError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sequence_wraps_like_the_wire_counter() {
        assert_eq!(relative_sequence(10, 5), 5);
        assert_eq!(relative_sequence(2, u16::MAX), 3);
        assert_eq!(relative_sequence(100, 100), 0);
    }

    #[tokio::test]
    async fn ingest_drops_silently_once_the_stream_channel_is_full() {
        use crate::registry::VoiceStreamState;
        use jamie_core::model::{SessionId, StreamId, VoiceStream};

        let registry = std::sync::Arc::new(StreamRegistry::new());
        let ingestor = PacketIngestor::new(registry.clone());
        let session_id = SessionId::new("s1");

        let (packet_tx, mut packet_rx) = tokio::sync::mpsc::channel(1);
        let stream = VoiceStream {
            id: StreamId::new("stream-1"),
            session_id: session_id.clone(),
            ssrc: 7,
            speaker_external_id: String::new(),
            packet_seq_offset: 0,
            sample_idx_offset: 0,
            created_at: 0,
        };

        let make_packet = |sample_idx: u32| RawPacket { ssrc: 7, sequence: 0, sample_idx, payload: vec![] };

        ingestor
            .ingest(&session_id, make_packet(0), || async { Ok(VoiceStreamState { stream, packet_tx }) })
            .await
            .expect("first packet creates the stream and is queued");

        // Channel capacity is 1 and nothing has drained it yet.
        ingestor
            .ingest(&session_id, make_packet(1), || async { unreachable!("stream already cached") })
            .await
            .expect("dropped, not an error");

        assert_eq!(packet_rx.recv().await.expect("one packet queued").sample_idx, 0);
        assert!(packet_rx.try_recv().is_err());
    }
}

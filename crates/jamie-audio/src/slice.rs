// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C8 Slice Builder: on demand, rebuilds a gap-aware Ogg Opus blob for a
//! `(stream, [startSample, endSample])` range from persisted packets.

use crate::oggwriter::{OggOpusWriter, SAMPLES_PER_FRAME};
use jamie_core::model::StreamId;
use jamie_core::{JamieError, Result};
use jamie_store::Store;
use tokio::time::{timeout, Duration};

/// Deadline for rebuilding a single slice.
const SLICE_BUILD_TIMEOUT: Duration = Duration::from_secs(60);

/// Rebuilds a bit-exact Ogg Opus blob covering `[start_sample, end_sample)`
/// of `stream_id`, splicing in silent frames for any gap wider than one
/// frame.
///
/// # Errors
/// Returns `Storage`/`Timeout` if the packet fetch fails or exceeds the
/// slice build timeout, or a transport-independent error if Ogg framing
/// fails.
pub async fn build_slice(
    store: &Store,
    stream_id: &StreamId,
    start_sample: u32,
    end_sample: u32,
) -> Result<Vec<u8>> {
    timeout(SLICE_BUILD_TIMEOUT, build_slice_inner(store, stream_id, start_sample, end_sample))
        .await
        .map_err(|_| JamieError::Timeout(SLICE_BUILD_TIMEOUT))?
}

async fn build_slice_inner(
    store: &Store,
    stream_id: &StreamId,
    start_sample: u32,
    end_sample: u32,
) -> Result<Vec<u8>> {
    let packets = store.get_packets_in_range(stream_id, start_sample, end_sample).await?;

    // Serial is arbitrary for a standalone file; 1 matches the Assembler's
    // convention for a single logical stream per Ogg blob.
    let mut writer = OggOpusWriter::new(1);
    let mut last_sample_idx: Option<u32> = None;

    for packet in &packets {
        if let Some(last) = last_sample_idx {
            let delta = u64::from(packet.sample_idx.wrapping_sub(last));
            if delta > SAMPLES_PER_FRAME {
                let silent_frames = delta / SAMPLES_PER_FRAME - 1;
                writer
                    .write_silence(silent_frames)
                    .map_err(|e| JamieError::Protocol(format!("ogg framing failed: {e}")))?;
            }
        }
        writer
            .write_frame(&packet.payload)
            .map_err(|e| JamieError::Protocol(format!("ogg framing failed: {e}")))?;
        last_sample_idx = Some(packet.sample_idx);
    }

    writer.finish().map_err(|e| JamieError::Protocol(format!("ogg framing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamie_core::clock::SteppedClock;
    use jamie_core::model::VoiceStream;
    use std::sync::Arc;

    async fn store_with_stream() -> (Store, VoiceStream) {
        let store = Store::connect_with_clock("sqlite::memory:", Arc::new(SteppedClock::new(0)))
            .await
            .expect("connect");
        let session_id = store.create_voice_session("guild", "channel").await.expect("session");
        let stream_id = StreamId::new("stream-1");
        let stream = store
            .create_voice_stream(&stream_id, &session_id, 42, "speaker", 0, 0)
            .await
            .expect("stream");
        (store, stream)
    }

    #[tokio::test]
    async fn empty_range_yields_a_minimal_valid_ogg_stream() {
        let (store, stream) = store_with_stream().await;
        let bytes = build_slice(&store, &stream.id, 0, 1).await.expect("slice");
        assert!(bytes.starts_with(b"OggS"));
    }

    #[tokio::test]
    async fn contiguous_packets_need_no_gap_filling() {
        let (store, stream) = store_with_stream().await;
        for idx in [0u32, 960, 1920] {
            store
                .insert_voice_packet(&stream, idx as u16, idx, vec![1, 2, 3])
                .await
                .expect("insert");
        }
        let bytes = build_slice(&store, &stream.id, 0, 2880 + 960).await.expect("slice");
        assert!(bytes.starts_with(b"OggS"));
    }

    #[tokio::test]
    async fn gap_between_two_packets_is_bridged_with_silence() {
        let (store, stream) = store_with_stream().await;
        store.insert_voice_packet(&stream, 0, 0, vec![1]).await.expect("insert first");
        store.insert_voice_packet(&stream, 1, 96_000, vec![2]).await.expect("insert second");

        let bytes = build_slice(&store, &stream.id, 0, 96_960).await.expect("slice");
        assert!(bytes.starts_with(b"OggS"));

        // Delta is 96_000 samples; exactly floor(96_000 / 960) - 1 = 99
        // silent frames must bridge the gap, matching the Assembler's own
        // gap-filling arithmetic.
        let (silent_frames, real_frames) = count_audio_packets(&bytes);
        assert_eq!(silent_frames, 99);
        assert_eq!(real_frames, 2);
    }

    /// Counts non-header Ogg Opus packets, splitting them into silent-frame
    /// and real-frame counts.
    fn count_audio_packets(bytes: &[u8]) -> (usize, usize) {
        let mut reader = ogg::PacketReader::new(std::io::Cursor::new(bytes));
        let mut silent_frames = 0;
        let mut real_frames = 0;
        loop {
            match reader.read_packet().expect("read packet") {
                Some(packet) => {
                    let is_header = packet.data.len() >= 8
                        && (&packet.data[0..8] == b"OpusHead" || &packet.data[0..8] == b"OpusTags");
                    if is_header || packet.data.is_empty() {
                        continue;
                    }
                    if packet.data == crate::oggwriter::SILENT_FRAME {
                        silent_frames += 1;
                    } else {
                        real_frames += 1;
                    }
                },
                None => break,
            }
        }
        (silent_frames, real_frames)
    }
}

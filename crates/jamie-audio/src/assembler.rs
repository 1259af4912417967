// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C5 Ogg Assembler: per-stream conversion of arriving Opus packets into an
//! Ogg Opus page stream, with initial-silence padding and gap detection.

use crate::oggwriter::{OggOpusWriter, SAMPLES_PER_FRAME};
use jamie_core::clock::NanosSinceEpoch;

/// A half-open `[first_sample_idx, last_sample_idx]` range covered by an
/// assembled stream, plus the packet/gap accounting reported on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerReport {
    pub total_packets: u64,
    pub first_sample_idx: Option<u32>,
    pub last_sample_idx: Option<u32>,
    pub gap_count: u64,
}

/// Per-stream stateful object that reframes incoming Opus packets into an
/// Ogg Opus stream.
///
/// The Ogg timestamp (granule position) advances purely by frame count, not
/// by the wire `sampleIdx`; `sampleIdx` is only consulted to detect gaps and
/// compute how many silent frames to splice in.
pub struct OggAssembler {
    writer: OggOpusWriter,
    last_sample_idx: Option<u32>,
    first_sample_idx: Option<u32>,
    total_packets: u64,
    gap_count: u64,
    nominal_start_ns: NanosSinceEpoch,
    wrote_initial_silence: bool,
}

impl OggAssembler {
    /// Creates an assembler for a fresh stream, given the session's nominal
    /// start time (used only to size the initial-silence padding before the
    /// first packet arrives).
    #[must_use]
    pub fn new(serial: u32, nominal_start_ns: NanosSinceEpoch) -> Self {
        Self {
            writer: OggOpusWriter::new(serial),
            last_sample_idx: None,
            first_sample_idx: None,
            total_packets: 0,
            gap_count: 0,
            nominal_start_ns,
            wrote_initial_silence: false,
        }
    }

    /// Feeds one incoming Opus packet, returning any Ogg bytes produced.
    ///
    /// `arrived_at_ns` is the wall-clock arrival time of this packet, used
    /// only for the initial-silence calculation on the very first packet.
    ///
    /// # Errors
    /// Returns an error if the underlying Ogg writer fails.
    pub fn push(
        &mut self,
        sample_idx: u32,
        payload: &[u8],
        arrived_at_ns: NanosSinceEpoch,
    ) -> std::io::Result<Vec<u8>> {
        if !self.wrote_initial_silence {
            self.wrote_initial_silence = true;
            let gap_ms = (arrived_at_ns - self.nominal_start_ns).max(0) / 1_000_000;
            let silent_frames = gap_ms / 20;
            if silent_frames > 0 {
                self.writer.write_silence(u64::try_from(silent_frames).unwrap_or(0))?;
            }
        }

        if let Some(last) = self.last_sample_idx {
            let delta = u64::from(sample_idx.wrapping_sub(last));
            if delta > SAMPLES_PER_FRAME {
                let silent_frames = delta / SAMPLES_PER_FRAME - 1;
                if silent_frames > 0 {
                    self.gap_count += 1;
                    self.writer.write_silence(silent_frames)?;
                }
            }
        }

        self.writer.write_frame(payload)?;
        self.total_packets += 1;
        self.first_sample_idx.get_or_insert(sample_idx);
        self.last_sample_idx = Some(sample_idx);

        Ok(self.writer.take_bytes())
    }

    /// Closes the assembler, emitting the end-of-stream page and reporting
    /// the summary packet/gap statistics.
    ///
    /// # Errors
    /// Returns an error if the underlying Ogg writer fails.
    pub fn close(self) -> std::io::Result<(Vec<u8>, AssemblerReport)> {
        let report = AssemblerReport {
            total_packets: self.total_packets,
            first_sample_idx: self.first_sample_idx,
            last_sample_idx: self.last_sample_idx,
            gap_count: self.gap_count,
        };
        let bytes = self.writer.finish()?;
        Ok((bytes, report))
    }
}

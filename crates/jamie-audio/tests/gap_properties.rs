// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Property tests for the Ogg Assembler's gap-filling arithmetic, the way
//! `sdrtrunk-transcriber`'s test suite checks its frame-timing math against
//! randomized inputs rather than a fixed example grid.

use jamie_audio::OggAssembler;
use proptest::prelude::*;

const SAMPLES_PER_FRAME: u32 = 960;

proptest! {
    /// Any run of packets with strictly increasing `sample_idx` produces a
    /// `gap_count` equal to the number of consecutive pairs that need at
    /// least one silent frame spliced in (`delta / 960 - 1 > 0`, i.e.
    /// `delta >= 2 * 960`), regardless of how many packets or how large the
    /// deltas are.
    #[test]
    fn gap_count_matches_the_number_of_oversized_deltas(
        deltas in prop::collection::vec(1u32..20_000, 1..30),
    ) {
        let mut assembler = OggAssembler::new(1, 0);
        let mut sample_idx = 0u32;
        let mut expected_gaps = 0u64;
        let mut first = true;

        for delta in &deltas {
            if !first && *delta >= 2 * SAMPLES_PER_FRAME {
                expected_gaps += 1;
            }
            first = false;
            sample_idx = sample_idx.wrapping_add(*delta);
            assembler.push(sample_idx, &[0xF8, 0xFF, 0xFE], 0).expect("push");
        }

        let (_, report) = assembler.close().expect("close");
        prop_assert_eq!(report.gap_count, expected_gaps);
        prop_assert_eq!(report.total_packets, deltas.len() as u64);
    }

    /// The assembler always reports the first and last `sample_idx` it saw,
    /// no matter the spacing between packets.
    #[test]
    fn first_and_last_sample_idx_track_the_pushed_sequence(
        deltas in prop::collection::vec(1u32..20_000, 1..30),
    ) {
        let mut assembler = OggAssembler::new(1, 0);
        let mut sample_idx = 0u32;
        let first_idx = sample_idx;

        for delta in &deltas {
            sample_idx = sample_idx.wrapping_add(*delta);
            assembler.push(sample_idx, &[1], 0).expect("push");
        }

        let (_, report) = assembler.close().expect("close");
        prop_assert_eq!(report.first_sample_idx, Some(first_idx));
        prop_assert_eq!(report.last_sample_idx, Some(sample_idx));
    }
}

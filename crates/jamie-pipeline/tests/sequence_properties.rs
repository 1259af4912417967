// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Property tests for the wire sequence number's wrap-around arithmetic.

use jamie_pipeline::relative_sequence;
use proptest::prelude::*;

proptest! {
    /// `relative_sequence` agrees with wrapping `u16` subtraction for every
    /// pair of sequence/offset values, including the wrap boundary around
    /// `u16::MAX`.
    #[test]
    fn matches_wrapping_subtraction_for_any_pair(sequence: u16, offset: u16) {
        prop_assert_eq!(relative_sequence(sequence, offset), sequence.wrapping_sub(offset));
    }

    /// Relative to its own offset, any sequence number is zero.
    #[test]
    fn a_sequence_is_zero_relative_to_itself(sequence: u16) {
        prop_assert_eq!(relative_sequence(sequence, sequence), 0);
    }

    /// Advancing both the sequence and the offset by the same amount (with
    /// wrapping) leaves the relative sequence unchanged.
    #[test]
    fn is_invariant_under_shifting_both_sides_by_the_same_amount(
        sequence: u16, offset: u16, shift: u16,
    ) {
        let shifted = relative_sequence(sequence.wrapping_add(shift), offset.wrapping_add(shift));
        prop_assert_eq!(shifted, relative_sequence(sequence, offset));
    }
}

// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C2 Store: append-oriented persistence for voice packets and the
//! versioned transcript model, backed by `sqlx` over SQLite.

mod store;

pub use store::{HypothesisAlternative, HypothesisWord, SegmentWithWords, Store, WordWithAlternatives};

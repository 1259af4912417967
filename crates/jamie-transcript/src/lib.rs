// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C7 Transcript Reducer: upserts ASR hypotheses into the versioned
//! transcript model, plus the confidence-floor rendering helper applied at
//! read time.

mod reducer;
mod render;

pub use reducer::apply_hypothesis;
pub use render::{render_segment, RenderedSegment, RenderedWord, DEFAULT_CONFIDENCE_FLOOR};

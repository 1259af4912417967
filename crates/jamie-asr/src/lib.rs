// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C6 ASR Session: the vendor WebSocket protocol and the
//! `idle/connecting/open/closing/closed/failed` state machine.

mod session;
pub mod wire;

pub use session::{
    spawn, AsrSessionHandle, Hypothesis, HypothesisAlternative, HypothesisResult, RecognitionState, SessionConfig,
};

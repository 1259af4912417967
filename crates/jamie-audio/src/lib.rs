// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Ogg/Opus framing: the per-stream Ogg Assembler (C5) and the on-demand
//! Slice Builder (C8), sharing a common Ogg Opus byte-layout helper.

pub mod assembler;
pub mod oggwriter;
pub mod slice;

pub use assembler::{AssemblerReport, OggAssembler};
pub use slice::build_slice;

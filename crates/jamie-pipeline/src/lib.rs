// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C3/C4/C10: the Stream Registry, Packet Ingestor, and Pipeline
//! Supervisor that together turn raw voice-gateway packets into persisted
//! streams, running ASR Sessions, and a closeable Ogg Assembler per
//! stream.

mod ingest;
mod registry;
mod supervisor;
mod types;

pub use ingest::{relative_sequence, PacketIngestor, PACKET_CHANNEL_CAPACITY};
pub use registry::{StreamRegistry, VoiceStreamState};
pub use supervisor::PipelineSupervisor;
pub use types::{RawPacket, SpeakingUpdate};

// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wire-adjacent shapes the Packet Ingestor consumes, distinct from
//! `jamie_core::model`'s storage shapes since a raw packet has no identity
//! until it is persisted.

/// One inbound Opus frame as delivered by the Discord voice gateway.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub ssrc: u32,
    pub sequence: u16,
    pub sample_idx: u32,
    pub payload: Vec<u8>,
}

/// A speaking-state update correlating an SSRC with the platform's external
/// user id, used to populate `VoiceStream.speaker_external_id` the first
/// time a given SSRC is seen.
#[derive(Debug, Clone)]
pub struct SpeakingUpdate {
    pub ssrc: u32,
    pub external_user_id: String,
}

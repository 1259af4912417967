// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared Ogg Opus byte-layout helpers used by both the Ogg Assembler and
//! the Slice Builder, so the two components write identical pages instead
//! of each growing its own copy of the RFC 7845 framing logic.

use ogg::{PacketWriteEndInfo, PacketWriter};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Samples per 20 ms Opus frame at 48 kHz.
pub const SAMPLES_PER_FRAME: u64 = 960;
/// Sample rate all streams are framed at.
pub const SAMPLE_RATE: u32 = 48_000;
/// Channel count all streams are framed at.
pub const CHANNELS: u8 = 2;
/// The canonical silent Opus frame payload used to pad gaps.
pub const SILENT_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

#[derive(Clone)]
struct SharedPacketBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedPacketBuffer {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn take(&self) -> Vec<u8> {
        #[allow(clippy::unwrap_used)]
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Write for SharedPacketBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        #[allow(clippy::unwrap_used)]
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        #[allow(clippy::unwrap_used)]
        self.0.lock().unwrap().flush()
    }
}

/// A single logical Ogg Opus stream being written frame by frame.
///
/// Callers drive the writer by feeding frame payloads (real or silent) in
/// order and reading back accumulated bytes after each write; `finish`
/// closes the logical stream and returns any trailing bytes. A fresh
/// `PacketWriter` is constructed around the shared buffer for each call
/// (cheap: it holds no state of its own beyond the `&mut W` it borrows),
/// which sidesteps storing a self-referential writer/buffer pair.
pub struct OggOpusWriter {
    serial: u32,
    buffer: SharedPacketBuffer,
    granule_pos: u64,
    wrote_headers: bool,
}

impl OggOpusWriter {
    /// Creates a writer for a fresh logical stream identified by `serial`.
    #[must_use]
    pub fn new(serial: u32) -> Self {
        Self { serial, buffer: SharedPacketBuffer::new(), granule_pos: 0, wrote_headers: false }
    }

    /// Writes the `OpusHead`/`OpusTags` header packets, once, lazily.
    fn ensure_headers(&mut self) -> std::io::Result<()> {
        if self.wrote_headers {
            return Ok(());
        }
        self.wrote_headers = true;

        let mut buf = self.buffer.clone();
        let mut writer = PacketWriter::new(&mut buf);

        // Opus Identification Header, RFC 7845 §5.1.
        let opus_head = vec![
            b'O', b'p', b'u', b's', b'H', b'e', b'a', b'd',
            1,        // version
            CHANNELS, // channel count
            0, 0,     // pre-skip (LE)
            0x80, 0xBB, 0, 0, // 48000 Hz sample rate (LE)
            0, 0, // output gain (LE)
            0, // channel mapping family
        ];
        writer
            .write_packet(opus_head, self.serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(std::io::Error::other)?;

        let vendor_string = "jamie";
        let mut opus_tags = Vec::new();
        opus_tags.extend_from_slice(b"OpusTags");
        #[allow(clippy::unwrap_used)]
        let vendor_len = u32::try_from(vendor_string.len()).unwrap();
        opus_tags.extend_from_slice(&vendor_len.to_le_bytes());
        opus_tags.extend_from_slice(vendor_string.as_bytes());
        opus_tags.extend_from_slice(&0_u32.to_le_bytes()); // 0 comments

        writer
            .write_packet(opus_tags, self.serial, PacketWriteEndInfo::NormalPacket, 0)
            .map_err(std::io::Error::other)
    }

    /// Writes `count` silent 20 ms frames using the `F8 FF FE` payload.
    pub fn write_silence(&mut self, count: u64) -> std::io::Result<()> {
        self.ensure_headers()?;
        let mut buf = self.buffer.clone();
        let mut writer = PacketWriter::new(&mut buf);
        for _ in 0..count {
            self.granule_pos += SAMPLES_PER_FRAME;
            writer
                .write_packet(SILENT_FRAME.to_vec(), self.serial, PacketWriteEndInfo::EndPage, self.granule_pos)
                .map_err(std::io::Error::other)?;
        }
        Ok(())
    }

    /// Writes one real Opus frame payload, advancing the granule position by
    /// one frame (20 ms at 48 kHz).
    pub fn write_frame(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.ensure_headers()?;
        self.granule_pos += SAMPLES_PER_FRAME;
        let mut buf = self.buffer.clone();
        let mut writer = PacketWriter::new(&mut buf);
        writer
            .write_packet(payload.to_vec(), self.serial, PacketWriteEndInfo::EndPage, self.granule_pos)
            .map_err(std::io::Error::other)
    }

    /// Drains bytes accumulated since the last call (for incremental
    /// streaming consumers such as the Assembler).
    #[must_use]
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.buffer.take()
    }

    /// Closes the logical Ogg stream and returns the final bytes, including
    /// anything not yet drained by `take_bytes`.
    ///
    /// # Errors
    /// Returns an error if the underlying page writer fails.
    pub fn finish(mut self) -> std::io::Result<Vec<u8>> {
        self.ensure_headers()?;
        let mut buf = self.buffer.clone();
        let mut writer = PacketWriter::new(&mut buf);
        writer
            .write_packet(Vec::new(), self.serial, PacketWriteEndInfo::EndStream, self.granule_pos)
            .map_err(std::io::Error::other)?;
        Ok(self.buffer.take())
    }

    #[must_use]
    pub const fn granule_pos(&self) -> u64 {
        self.granule_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_well_formed_ogg_opus_stream() {
        let mut writer = OggOpusWriter::new(1);
        writer.write_frame(&[1, 2, 3]).expect("write frame");
        writer.write_silence(2).expect("write silence");
        let bytes = writer.finish().expect("finish");
        assert!(bytes.starts_with(b"OggS"));
        // OpusHead magic must appear somewhere in the first page.
        assert!(bytes.windows(8).any(|w| w == b"OpusHead"));
    }

    #[test]
    fn granule_position_advances_one_frame_at_a_time() {
        let mut writer = OggOpusWriter::new(1);
        writer.write_frame(&[1]).expect("write frame");
        assert_eq!(writer.granule_pos(), SAMPLES_PER_FRAME);
        writer.write_silence(3).expect("write silence");
        assert_eq!(writer.granule_pos(), SAMPLES_PER_FRAME * 4);
    }
}

// src/scheme/wave.rs

//! Canonical sample format checks
//!
//! The canonical per-event format is a plain RIFF/WAVE PCM file. Sources
//! already in that shape are copied byte-for-byte; everything else goes
//! through the host transcoder (when one exists).

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Duration ceiling for event sounds.
pub const MAX_SOUND_DURATION: Duration = Duration::from_secs(30);

const FORMAT_PCM: u16 = 1;

/// A zero-length silent WAVE file, written into the shell module resource
/// when the startup event has no replacement (mutes rather than reverts).
pub const SILENT_WAVE: [u8; 70] = [
    0x52, 0x49, 0x46, 0x46, 0x3e, 0x00, 0x00, 0x00, 0x57, 0x41, 0x56, 0x45, 0x66, 0x6d, 0x74,
    0x20, 0x12, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x44, 0xac, 0x00, 0x00, 0x10, 0xb1,
    0x02, 0x00, 0x04, 0x00, 0x10, 0x00, 0x00, 0x00, 0x66, 0x61, 0x63, 0x74, 0x04, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x64, 0x61, 0x74, 0x61, 0x00, 0x00, 0x00, 0x00, 0x4c, 0x49,
    0x53, 0x54, 0x04, 0x00, 0x00, 0x00, 0x49, 0x4e, 0x46, 0x4f,
];

/// Parsed header facts about a WAVE file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveInfo {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WaveInfo {
    /// Playback duration derived from the data chunk length.
    pub fn duration(&self) -> Duration {
        if self.byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(f64::from(self.data_len) / f64::from(self.byte_rate))
    }

    /// Whether this is the canonical sample format the host plays natively.
    pub fn is_canonical(&self) -> bool {
        self.format_tag == FORMAT_PCM
    }
}

fn u16_le(data: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(off..off + 2)?.try_into().ok()?))
}

fn u32_le(data: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(off..off + 4)?.try_into().ok()?))
}

/// Parse a RIFF/WAVE header. `None` means "not a WAVE file" (callers fall
/// through to the transcode path), not an error.
pub fn parse(data: &[u8]) -> Option<WaveInfo> {
    if data.get(0..4)? != b"RIFF" || data.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut fmt: Option<(u16, u16, u32, u32, u16)> = None;
    let mut data_len: Option<u32> = None;
    let mut off = 12usize;
    while off + 8 <= data.len() {
        let chunk_id = data.get(off..off + 4)?;
        let chunk_len = u32_le(data, off + 4)? as usize;
        let body = off + 8;
        match chunk_id {
            b"fmt " => {
                if chunk_len < 16 {
                    return None;
                }
                fmt = Some((
                    u16_le(data, body)?,
                    u16_le(data, body + 2)?,
                    u32_le(data, body + 4)?,
                    u32_le(data, body + 8)?,
                    u16_le(data, body + 14)?,
                ));
            }
            b"data" => {
                data_len = Some(chunk_len as u32);
            }
            _ => {}
        }
        // Chunks are word-aligned.
        off = body + chunk_len + (chunk_len & 1);
    }

    let (format_tag, channels, sample_rate, byte_rate, bits_per_sample) = fmt?;
    Some(WaveInfo {
        format_tag,
        channels,
        sample_rate,
        byte_rate,
        bits_per_sample,
        data_len: data_len?,
    })
}

/// Probe a file on disk: `Ok(Some(_))` for a parseable WAVE, `Ok(None)` for
/// anything else.
pub fn probe(path: &Path) -> Result<Option<WaveInfo>> {
    let data = fs::read(path)?;
    Ok(parse(&data))
}

/// A minimal PCM file: `seconds` of silence at 8 kHz mono 8-bit. Test fixture.
#[cfg(test)]
pub(crate) fn pcm_fixture(seconds: u32) -> Vec<u8> {
    let data_len = 8_000 * seconds;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&8_000u32.to_le_bytes());
    out.extend_from_slice(&8_000u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

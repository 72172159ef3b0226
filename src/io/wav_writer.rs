//! In-memory 16-bit PCM WAV encoding
//!
//! Layout is the canonical 44-byte header followed by interleaved
//! little-endian samples:
//!
//! | offset | field                                   |
//! |--------|-----------------------------------------|
//! | 0      | "RIFF", u32 36 + data size, "WAVE"      |
//! | 12     | "fmt ", u32 16, u16 1 (PCM), u16 ch     |
//! | 24     | u32 rate, u32 byte rate, u16 block align|
//! | 34     | u16 16 (bits per sample)                |
//! | 36     | "data", u32 data size                   |
//! | 44     | samples                                 |

pub const HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u16 = 2;

/// Convert one float sample to 16-bit PCM
///
/// The sample is clamped to [-1, 1]; negative values scale by 32768,
/// non-negative by 32767, and the result truncates toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Write the WAV header for `frames` frames
pub fn write_wav_header(out: &mut Vec<u8>, sample_rate: u32, channels: u16, frames: usize) {
    let data_size = (frames * channels as usize * BYTES_PER_SAMPLE as usize) as u32;

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());

    let byte_rate = sample_rate * channels as u32 * BYTES_PER_SAMPLE as u32;
    out.extend_from_slice(&byte_rate.to_le_bytes());

    let block_align = channels * BYTES_PER_SAMPLE;
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes()); // bits per sample

    // data chunk header
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
}

/// Encode interleaved float samples as a complete WAV file
pub fn encode_wav(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<u8> {
    let channels = channels.max(1);
    let frames = samples.len() / channels as usize;
    let mut out = Vec::with_capacity(HEADER_LEN + frames * channels as usize * BYTES_PER_SAMPLE as usize);

    write_wav_header(&mut out, sample_rate, channels, frames);
    for &sample in &samples[..frames * channels as usize] {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    out
}

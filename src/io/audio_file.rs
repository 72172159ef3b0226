use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Encoded audio decoded to interleaved f32 at its native rate and layout
pub struct AudioFile {
    pub data: Vec<f32>,
    pub channels: u32,
    pub sample_rate: u32,
    pub frames: u64,
}

impl AudioFile {
    /// Decode an in-memory encoded stream (WAV, MP3, FLAC, OGG, ...)
    ///
    /// `extension` is only a probe hint; the container is sniffed either way.
    pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Probe(e.to_string()))?;

        let mut format = probed.format;

        // Find the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let channels = codec_params
            .channels
            .ok_or(DecodeError::MissingParameter("channel count"))?
            .count() as u32;
        let sample_rate = codec_params
            .sample_rate
            .ok_or(DecodeError::MissingParameter("sample rate"))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Decoder(e.to_string()))?;

        let mut audio_data = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(Error::ResetRequired) => {
                    return Err(DecodeError::Decoder("decoder reset required".to_string()));
                }
                Err(e) => return Err(DecodeError::Decoder(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    // Packets can grow (e.g. VBR), so reallocate when needed
                    let needs_alloc = sample_buf
                        .as_ref()
                        .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels as usize);
                    if needs_alloc {
                        sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec()));
                    }

                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        audio_data.extend_from_slice(buf.samples());
                    }
                }
                Err(Error::DecodeError(e)) => {
                    log::warn!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(DecodeError::Decoder(e.to_string())),
            }
        }

        let frames = (audio_data.len() / channels.max(1) as usize) as u64;

        Ok(AudioFile {
            data: audio_data,
            channels,
            sample_rate,
            frames,
        })
    }

    /// Calculate the duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Convert to a stereo buffer at `sample_rate`
    ///
    /// Mono is duplicated to both channels, more than two channels keep the
    /// first two. Rate conversion uses cubic Hermite interpolation.
    pub fn to_stereo_buffer(&self, sample_rate: u32) -> AudioBuffer {
        let src_channels = self.channels.max(1) as usize;
        let src_frames = self.frames as usize;
        let sample = |frame: usize, ch: usize| -> f32 {
            let frame = frame.min(src_frames.saturating_sub(1));
            self.data[frame * src_channels + ch.min(src_channels - 1)]
        };

        if src_frames == 0 {
            return AudioBuffer::new(Vec::new(), sample_rate);
        }

        let rate_ratio = self.sample_rate as f64 / sample_rate as f64;
        let out_frames = if self.sample_rate == sample_rate {
            src_frames
        } else {
            (src_frames as f64 / rate_ratio).floor() as usize
        };

        let mut data = Vec::with_capacity(out_frames * 2);
        for frame_idx in 0..out_frames {
            let src_pos = frame_idx as f64 * rate_ratio;
            let p1 = src_pos as usize;
            let frac = (src_pos - p1 as f64) as f32;

            for ch in 0..2 {
                let value = if frac > 0.0 {
                    let p0 = sample(p1.saturating_sub(1), ch);
                    hermite_interpolate(p0, sample(p1, ch), sample(p1 + 1, ch), sample(p1 + 2, ch), frac)
                } else {
                    sample(p1, ch)
                };
                data.push(value);
            }
        }

        AudioBuffer::new(data, sample_rate)
    }
}

/// Cubic Hermite interpolation between p1 and p2
#[inline]
fn hermite_interpolate(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let c0 = p1;
    let c1 = 0.5 * (p2 - p0);
    let c2 = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c3 = 0.5 * (p3 - p0) + 1.5 * (p1 - p2);
    ((c3 * t + c2) * t + c1) * t + c0
}

/// Decoded stereo PCM at the rate of the context that plays it
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved L/R samples
    data: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.data.len() / 2
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Copy frames starting at `start` into `output` (interleaved stereo).
    /// Returns the number of frames copied; the rest of `output` is untouched.
    pub fn read_frames(&self, start: usize, output: &mut [f32]) -> usize {
        let available = self.frames().saturating_sub(start);
        let count = available.min(output.len() / 2);
        output[..count * 2].copy_from_slice(&self.data[start * 2..(start + count) * 2]);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::wav_writer::encode_wav;

    #[test]
    fn decodes_wav_bytes() {
        let samples: Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 0.5 } else { -0.25 }).collect();
        let bytes = encode_wav(&samples, 2, 8000);

        let file = AudioFile::decode(bytes, Some("wav")).unwrap();
        assert_eq!(file.channels, 2);
        assert_eq!(file.sample_rate, 8000);
        assert_eq!(file.frames, 100);
        assert!((file.data[0] - 0.5).abs() < 1e-3);
        assert!((file.data[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn garbage_fails_to_probe() {
        let result = AudioFile::decode(vec![1, 2, 3, 4, 5, 6, 7, 8], None);
        assert!(matches!(result, Err(DecodeError::Probe(_))));
    }

    #[test]
    fn mono_is_duplicated_and_resampled() {
        let file = AudioFile {
            data: vec![0.0, 0.25, 0.5, 0.75],
            channels: 1,
            sample_rate: 4000,
            frames: 4,
        };
        let same = file.to_stereo_buffer(4000);
        assert_eq!(same.data(), &[0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75]);

        let doubled = file.to_stereo_buffer(8000);
        assert_eq!(doubled.frames(), 8);
        assert_eq!(doubled.data()[2], doubled.data()[3]);
        assert!((doubled.data()[2] - 0.125).abs() < 0.03);
    }

    #[test]
    fn read_frames_stops_at_end() {
        let buffer = AudioBuffer::new(vec![1.0, 2.0, 3.0, 4.0], 8000);
        let mut out = vec![0.0; 6];
        assert_eq!(buffer.read_frames(1, &mut out), 1);
        assert_eq!(out, vec![3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(buffer.read_frames(5, &mut out), 0);
    }
}

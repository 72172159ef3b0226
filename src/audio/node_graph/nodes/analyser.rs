use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::audio::node_graph::{AudioNode, Parameter};
use crate::config::AnalyserConfig;

/// Pass-through node that keeps the most recent `fft_size` samples (mono
/// downmix) for level metering.
pub struct AnalyserNode {
    name: String,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,

    /// Ring buffer of mono samples
    history: Vec<f32>,
    write_position: usize,

    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    time_scratch: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,

    parameters: Vec<Parameter>,
}

impl AnalyserNode {
    pub fn new(name: impl Into<String>, config: &AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(32).next_power_of_two();
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);

        // Blackman window
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * std::f32::consts::PI * x).cos() + 0.08 * (4.0 * std::f32::consts::PI * x).cos()
            })
            .collect();

        Self {
            name: name.into(),
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: vec![0.0; fft_size],
            write_position: 0,
            spectrum: fft.make_output_vec(),
            fft,
            window,
            time_scratch: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            parameters: vec![],
        }
    }

    /// Number of frequency bins
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Smoothed magnitude spectrum mapped onto 0..=255 between the min and
    /// max decibel bounds. Each call advances the smoothing.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let n = self.fft_size;
        for i in 0..n {
            let sample = self.history[(self.write_position + i) % n];
            self.time_scratch[i] = sample * self.window[i];
        }

        if self.fft.process(&mut self.time_scratch, &mut self.spectrum).is_err() {
            return vec![0; n / 2];
        }

        let range = self.max_decibels - self.min_decibels;
        let tau = self.smoothing;
        self.smoothed
            .iter_mut()
            .zip(&self.spectrum)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / n as f32;
                let mut value = tau * *smoothed + (1.0 - tau) * magnitude;
                if !value.is_finite() {
                    value = 0.0;
                }
                *smoothed = value;

                let db = if value > 0.0 { 20.0 * value.log10() } else { f32::NEG_INFINITY };
                let scaled = (255.0 / range) * (db - self.min_decibels);
                scaled.floor().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Meter level 0..100: mean of the byte spectrum over 255
    pub fn level(&mut self) -> f32 {
        let data = self.byte_frequency_data();
        if data.is_empty() {
            return 0.0;
        }
        let sum: u32 = data.iter().map(|b| *b as u32).sum();
        (sum as f32 / data.len() as f32) / 255.0 * 100.0
    }
}

impl AudioNode for AnalyserNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, _id: u32, _value: f32) {}

    fn get_parameter(&self, _id: u32) -> f32 {
        0.0
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        output.copy_from_slice(&input[..output.len()]);

        for frame in input.chunks_exact(2) {
            self.history[self.write_position] = (frame[0] + frame[1]) * 0.5;
            self.write_position = (self.write_position + 1) % self.fft_size;
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_position = 0;
    }

    fn node_type(&self) -> &str {
        "Analyser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

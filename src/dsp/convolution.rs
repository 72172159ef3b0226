//! Partitioned FFT convolution
//!
//! Two uniformly partitioned overlap-save stages:
//! - head: 128-sample blocks covering the first 2048 taps, so output is
//!   produced every render quantum without added latency
//! - tail: 2048-sample blocks covering the remaining taps, computed once per
//!   2048 input samples and played back over the following 2048
//!
//! The filter spectra live in a [`ConvolutionKernel`] that can be shared by
//! any number of [`PartitionedConvolver`]s; each convolver only owns its input
//! history.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Block size of the head stage (one render quantum)
pub const HEAD_BLOCK: usize = 128;

/// Block size of the tail stage, also the number of taps the head covers
pub const TAIL_BLOCK: usize = 2048;

/// Frequency-domain partitions of one IR segment at one block size
struct StageKernel {
    block: usize,
    partitions: Vec<Vec<Complex<f32>>>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl StageKernel {
    fn new(taps: &[f32], block: usize, planner: &mut RealFftPlanner<f32>) -> Self {
        let fft_size = block * 2;
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let partitions = taps
            .chunks(block)
            .map(|segment| {
                let mut padded = vec![0.0; fft_size];
                padded[..segment.len()].copy_from_slice(segment);
                let mut spectrum = forward.make_output_vec();
                forward.process(&mut padded, &mut spectrum).ok();
                spectrum
            })
            .collect();

        Self {
            block,
            partitions,
            forward,
            inverse,
        }
    }
}

/// Precomputed filter spectra for one channel of an impulse response
pub struct ConvolutionKernel {
    head: StageKernel,
    tail: Option<StageKernel>,
    len: usize,
}

impl ConvolutionKernel {
    pub fn new(ir: &[f32]) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let split = ir.len().min(TAIL_BLOCK);
        let head = StageKernel::new(&ir[..split], HEAD_BLOCK, &mut planner);
        let tail = (ir.len() > TAIL_BLOCK).then(|| StageKernel::new(&ir[TAIL_BLOCK..], TAIL_BLOCK, &mut planner));

        Self {
            head,
            tail,
            len: ir.len(),
        }
    }

    /// Number of taps in the impulse response
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Running state of one overlap-save stage
struct StageState {
    /// Last two blocks of input, oldest first
    window: Vec<f32>,
    /// Frequency delay line, newest spectrum at `fdl_pos`
    fdl: Vec<Vec<Complex<f32>>>,
    fdl_pos: usize,
    time_scratch: Vec<f32>,
    accum: Vec<Complex<f32>>,
}

impl StageState {
    fn new(kernel: &StageKernel) -> Self {
        let bins = kernel.block + 1;
        Self {
            window: vec![0.0; kernel.block * 2],
            fdl: vec![vec![Complex::new(0.0, 0.0); bins]; kernel.partitions.len().max(1)],
            fdl_pos: 0,
            time_scratch: vec![0.0; kernel.block * 2],
            accum: vec![Complex::new(0.0, 0.0); bins],
        }
    }

    /// Feed one block of input, write one block of output
    fn process_block(&mut self, kernel: &StageKernel, input: &[f32], output: &mut [f32]) {
        let block = kernel.block;
        let count = kernel.partitions.len();
        if count == 0 {
            output[..block].fill(0.0);
            return;
        }

        self.window.copy_within(block.., 0);
        self.window[block..].copy_from_slice(&input[..block]);

        self.fdl_pos = (self.fdl_pos + count - 1) % count;
        self.time_scratch.copy_from_slice(&self.window);
        if kernel
            .forward
            .process(&mut self.time_scratch, &mut self.fdl[self.fdl_pos])
            .is_err()
        {
            output[..block].fill(0.0);
            return;
        }

        // Partition k pairs with the input spectrum from k blocks ago
        self.accum.fill(Complex::new(0.0, 0.0));
        for (k, partition) in kernel.partitions.iter().enumerate() {
            let spectrum = &self.fdl[(self.fdl_pos + k) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(spectrum).zip(partition) {
                *acc += x * h;
            }
        }

        // DC and Nyquist bins of a real signal carry no imaginary part
        self.accum[0].im = 0.0;
        self.accum[block].im = 0.0;

        if kernel.inverse.process(&mut self.accum, &mut self.time_scratch).is_err() {
            output[..block].fill(0.0);
            return;
        }

        // Only the second half is free of circular wrap-around
        let scale = 1.0 / (block * 2) as f32;
        for (out, sample) in output[..block].iter_mut().zip(&self.time_scratch[block..]) {
            *out = sample * scale;
        }
    }

    fn reset(&mut self) {
        self.window.fill(0.0);
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.fdl_pos = 0;
    }
}

/// Streaming mono convolver, processes exactly [`HEAD_BLOCK`] samples per call
pub struct PartitionedConvolver {
    kernel: Arc<ConvolutionKernel>,
    head: StageState,
    tail: Option<StageState>,
    tail_input: Vec<f32>,
    tail_output: Vec<f32>,
    tail_pos: usize,
}

impl PartitionedConvolver {
    pub fn new(kernel: Arc<ConvolutionKernel>) -> Self {
        let head = StageState::new(&kernel.head);
        let tail = kernel.tail.as_ref().map(StageState::new);

        Self {
            kernel,
            head,
            tail,
            tail_input: vec![0.0; TAIL_BLOCK],
            tail_output: vec![0.0; TAIL_BLOCK],
            tail_pos: 0,
        }
    }

    /// Convolve one block of `HEAD_BLOCK` samples
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert!(input.len() >= HEAD_BLOCK && output.len() >= HEAD_BLOCK);

        self.head.process_block(&self.kernel.head, input, output);

        if let (Some(state), Some(kernel)) = (self.tail.as_mut(), self.kernel.tail.as_ref()) {
            let range = self.tail_pos..self.tail_pos + HEAD_BLOCK;
            for (out, late) in output[..HEAD_BLOCK].iter_mut().zip(&self.tail_output[range.clone()]) {
                *out += late;
            }
            self.tail_input[range].copy_from_slice(&input[..HEAD_BLOCK]);
            self.tail_pos += HEAD_BLOCK;

            if self.tail_pos == TAIL_BLOCK {
                // Result covers the next TAIL_BLOCK samples, i.e. taps [TAIL_BLOCK, 2*TAIL_BLOCK) later
                state.process_block(kernel, &self.tail_input, &mut self.tail_output);
                self.tail_pos = 0;
            }
        }
    }

    /// Clear input history
    pub fn reset(&mut self) {
        self.head.reset();
        if let Some(tail) = self.tail.as_mut() {
            tail.reset();
        }
        self.tail_input.fill(0.0);
        self.tail_output.fill(0.0);
        self.tail_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn direct(input: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; input.len()];
        for (n, y) in out.iter_mut().enumerate() {
            let mut acc = 0.0f64;
            for (k, h) in ir.iter().enumerate().take(n + 1) {
                acc += *h as f64 * input[n - k] as f64;
            }
            *y = acc as f32;
        }
        out
    }

    fn run(convolver: &mut PartitionedConvolver, input: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; input.len()];
        for (inp, o) in input.chunks(HEAD_BLOCK).zip(out.chunks_mut(HEAD_BLOCK)) {
            convolver.process(inp, o);
        }
        out
    }

    #[test]
    fn impulse_reproduces_ir_across_both_stages() {
        let ir: Vec<f32> = (0..3000).map(|i| ((i % 17) as f32 - 8.0) / 8.0).collect();
        let mut convolver = PartitionedConvolver::new(Arc::new(ConvolutionKernel::new(&ir)));

        let mut input = vec![0.0; 4096];
        input[0] = 1.0;
        let out = run(&mut convolver, &input);

        for (i, h) in ir.iter().enumerate() {
            assert_relative_eq!(out[i], *h, epsilon = 1e-4);
        }
        assert!(out[3000..].iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn matches_direct_convolution() {
        let mut rng = StdRng::seed_from_u64(42);
        let ir: Vec<f32> = (0..5000).map(|i| rng.gen_range(-1.0..1.0) * (1.0 - i as f32 / 5000.0) * 0.05).collect();
        let input: Vec<f32> = (0..8192).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut convolver = PartitionedConvolver::new(Arc::new(ConvolutionKernel::new(&ir)));
        let out = run(&mut convolver, &input);
        let expected = direct(&input, &ir);

        for (a, b) in out.iter().zip(&expected) {
            assert_relative_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn short_ir_has_no_tail_stage() {
        let kernel = ConvolutionKernel::new(&[0.5, 0.25]);
        assert!(kernel.tail.is_none());
        assert_eq!(kernel.len(), 2);

        let mut convolver = PartitionedConvolver::new(Arc::new(kernel));
        let mut input = vec![0.0; HEAD_BLOCK * 2];
        input[HEAD_BLOCK - 1] = 1.0;
        let out = run(&mut convolver, &input);
        assert_relative_eq!(out[HEAD_BLOCK - 1], 0.5, epsilon = 1e-5);
        assert_relative_eq!(out[HEAD_BLOCK], 0.25, epsilon = 1e-5);
    }

    #[test]
    fn reset_clears_history() {
        let ir = vec![1.0; 2500];
        let mut convolver = PartitionedConvolver::new(Arc::new(ConvolutionKernel::new(&ir)));
        run(&mut convolver, &vec![1.0; 4096]);
        convolver.reset();
        let out = run(&mut convolver, &vec![0.0; 4096]);
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }
}

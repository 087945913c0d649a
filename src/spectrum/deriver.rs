// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use tracing::warn;

use crate::audio::AudioProvider;
use crate::block_cache::BlockFactory;

/// Largest supported derivation size. 2^14 bins per block already resolves
/// about 1.3 Hz at 44.1 kHz.
pub const MAX_DERIVATION_SIZE: u32 = 14;

/// Computes one spectrum block: the log power of the FFT over
/// `2 * 2^size` samples starting at `index * 2^dist`.
pub struct SpectrumDeriver {
    provider: Arc<dyn AudioProvider>,
    size: u32,
    dist: u32,
    planner: RealFftPlanner<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    samples: Vec<i16>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumDeriver {
    pub fn new(provider: Arc<dyn AudioProvider>, size: u32, dist: u32) -> SpectrumDeriver {
        let size = size.min(MAX_DERIVATION_SIZE);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(2 << size);
        SpectrumDeriver {
            provider,
            size,
            dist: dist.min(size),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            input: fft.make_input_vec(),
            samples: vec![0; 2 << size],
            planner,
            fft,
        }
    }

    /// Binary log of the number of frequency bins per block.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Binary log of the sample distance between block starts.
    pub fn dist(&self) -> u32 {
        self.dist
    }

    /// Frequency bins per block.
    pub fn bins(&self) -> usize {
        1 << self.size
    }

    pub fn provider(&self) -> &Arc<dyn AudioProvider> {
        &self.provider
    }

    pub fn set_provider(&mut self, provider: Arc<dyn AudioProvider>) {
        self.provider = provider;
    }

    /// Replans the transform and reallocates the scratch buffers.
    pub fn set_size(&mut self, size: u32) {
        let size = size.min(MAX_DERIVATION_SIZE);
        if size != self.size || self.input.len() != 2 << size {
            self.fft = self.planner.plan_fft_forward(2 << size);
            self.input = self.fft.make_input_vec();
            self.spectrum = self.fft.make_output_vec();
            self.scratch = self.fft.make_scratch_vec();
            self.samples = vec![0; 2 << size];
        }
        self.size = size;
        self.dist = self.dist.min(size);
    }

    pub fn set_dist(&mut self, dist: u32) {
        self.dist = dist.min(self.size);
    }
}

impl BlockFactory for SpectrumDeriver {
    type Block = Box<[f32]>;

    fn block_size_bytes(&self) -> usize {
        self.bins() * std::mem::size_of::<f32>()
    }

    fn produce_block(&mut self, index: usize) -> Box<[f32]> {
        let length = 2usize << self.size;
        let start = (index as u64) << self.dist;
        self.provider
            .get_audio_with_volume(&mut self.samples, start, length, 1.0);
        for (value, sample) in self.input.iter_mut().zip(&self.samples) {
            *value = *sample as f32 / 32768.0;
        }

        if let Err(e) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            warn!(err = ?e, block = index, "FFT failed, leaving block empty.");
            return vec![0.0; self.bins()].into_boxed_slice();
        }

        // Unitary scaling by 1/sqrt(N) folded into the 9/sqrt(2) factor.
        let scale = 9.0 / (2.0 * length as f32).sqrt();
        self.spectrum[..self.bins()]
            .iter()
            .map(|c| (c.norm() * scale + 1.0).log10())
            .collect()
    }
}

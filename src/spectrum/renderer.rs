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

use image::RgbImage;
use tracing::debug;

use super::color_map::ColorMap;
use super::deriver::SpectrumDeriver;
use crate::audio::{AudioProvider, SampleRange};
use crate::block_cache::{BlockCache, BlockCacheError};
use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("{0} cannot seek reliably, open it with a cache tier to render it")]
    UnreliableSeek(String),

    #[error(transparent)]
    Block(#[from] BlockCacheError),
}

/// Draws spectrogram columns from a cache of derived blocks.
pub struct SpectrumRenderer {
    cache: BlockCache<SpectrumDeriver>,
    normal: ColorMap,
    selected: ColorMap,
    memory_max: usize,
    column: Vec<f32>,
}

impl SpectrumRenderer {
    /// Fails when the provider cannot seek reliably, since the cache reads
    /// blocks out of order.
    pub fn new(
        provider: Arc<dyn AudioProvider>,
        config: &config::Spectrum,
    ) -> Result<SpectrumRenderer, SpectrumError> {
        check_seekable(provider.as_ref())?;
        let deriver = SpectrumDeriver::new(
            provider,
            config.derivation_size(),
            config.derivation_dist(),
        );
        let num_blocks = block_count(&deriver);
        Ok(SpectrumRenderer {
            cache: BlockCache::new(deriver, num_blocks),
            normal: ColorMap::new(config.color_scheme(), false),
            selected: ColorMap::new(config.color_scheme(), true),
            memory_max: config.memory_max(),
            column: Vec::new(),
        })
    }

    /// Swaps the source and rebuilds the cache for its length. A provider
    /// that cannot seek reliably is rejected and the current one is kept.
    pub fn set_provider(&mut self, provider: Arc<dyn AudioProvider>) -> Result<(), SpectrumError> {
        check_seekable(provider.as_ref())?;
        self.cache.factory_mut().set_provider(provider);
        self.rebuild();
        Ok(())
    }

    /// Changes the bins per block. Every block changes size, so the cache is
    /// rebuilt.
    pub fn set_derivation_size(&mut self, size: u32) {
        self.cache.factory_mut().set_size(size);
        self.rebuild();
    }

    /// Changes the block spacing. Existing block indices no longer mean the
    /// same samples, so everything is aged out first.
    pub fn set_derivation_dist(&mut self, dist: u32) {
        self.cache.age(0);
        self.cache.factory_mut().set_dist(dist);
        self.rebuild();
    }

    pub fn derivation_size(&self) -> u32 {
        self.cache.factory().size()
    }

    pub fn derivation_dist(&self) -> u32 {
        self.cache.factory().dist()
    }

    pub fn num_blocks(&self) -> usize {
        self.cache.num_blocks()
    }

    pub fn resident_bytes(&self) -> usize {
        self.cache.resident_bytes()
    }

    /// Evicts blocks down to the configured memory budget.
    pub fn age_cache(&mut self) {
        self.cache.age(self.memory_max);
    }

    /// Renders `image.width()` columns starting at `start_column`. Each column
    /// covers `samples_per_column` samples; columns whose first sample lies in
    /// `selection` use the selection palette.
    pub fn render(
        &mut self,
        image: &mut RgbImage,
        start_column: u64,
        samples_per_column: u64,
        selection: Option<SampleRange>,
    ) -> Result<(), SpectrumError> {
        let height = image.height();
        let dist = self.cache.factory().dist();
        let num_blocks = self.cache.num_blocks() as u64;

        for x in 0..image.width() {
            let sample = (start_column + x as u64).saturating_mul(samples_per_column);
            let map = if selection.is_some_and(|s| s.contains(sample)) {
                &self.selected
            } else {
                &self.normal
            };

            let block = sample >> dist;
            if block >= num_blocks {
                let rgb = map.map(0.0);
                for y in 0..height {
                    image.put_pixel(x, y, rgb);
                }
                continue;
            }

            let power = self.cache.get(block as usize)?;
            resample_column(power, height as usize, &mut self.column);
            // Row 0 of the column is the lowest frequency, drawn at the bottom.
            for (row, value) in self.column.iter().enumerate() {
                image.put_pixel(x, height - 1 - row as u32, map.map(*value));
            }
        }
        Ok(())
    }

    fn rebuild(&mut self) {
        let num_blocks = block_count(self.cache.factory());
        debug!(
            num_blocks,
            size = self.cache.factory().size(),
            dist = self.cache.factory().dist(),
            "Rebuilding spectrum cache."
        );
        self.cache.resize(num_blocks);
    }
}

fn check_seekable(provider: &dyn AudioProvider) -> Result<(), SpectrumError> {
    if provider.reliable_seek() {
        Ok(())
    } else {
        Err(SpectrumError::UnreliableSeek(provider.source_name().to_string()))
    }
}

fn block_count(deriver: &SpectrumDeriver) -> usize {
    deriver
        .provider()
        .num_samples()
        .div_ceil(1 << deriver.dist()) as usize
}

/// Fits `bins` to `height` rows: max-pooling when shrinking so peaks survive,
/// linear interpolation when stretching.
fn resample_column(bins: &[f32], height: usize, out: &mut Vec<f32>) {
    out.clear();
    if bins.is_empty() || height == 0 {
        return;
    }

    if height < bins.len() {
        for row in 0..height {
            let lo = row * bins.len() / height;
            let hi = ((row + 1) * bins.len() / height).max(lo + 1);
            out.push(bins[lo..hi].iter().copied().fold(f32::MIN, f32::max));
        }
        return;
    }

    let last = bins.len() - 1;
    for row in 0..height {
        let position = if height == 1 {
            0.0
        } else {
            row as f32 * last as f32 / (height - 1) as f32
        };
        let index = (position.floor() as usize).min(last);
        let frac = position - index as f32;
        let next = bins[(index + 1).min(last)];
        out.push(bins[index] + (next - bins[index]) * frac);
    }
}

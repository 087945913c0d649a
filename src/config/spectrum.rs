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
use serde::Deserialize;

use crate::spectrum::ColorScheme;

const DEFAULT_DERIVATION_SIZE: u32 = 8;
const DEFAULT_DERIVATION_DIST: u32 = 8;
const DEFAULT_MEMORY_MAX: usize = 128 * 1024 * 1024;

/// A YAML representation of the spectrogram configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Spectrum {
    /// Binary log of the frequency bins per block (default: 8).
    derivation_size: Option<u32>,

    /// Binary log of the samples between block starts (default: 8).
    derivation_dist: Option<u32>,

    /// Byte budget for derived blocks (default: 128 MiB).
    memory_max: Option<usize>,

    /// Palette (default: spectrum).
    color_scheme: Option<ColorScheme>,
}

impl Spectrum {
    pub fn with_derivation(mut self, size: u32, dist: u32) -> Spectrum {
        self.derivation_size = Some(size);
        self.derivation_dist = Some(dist);
        self
    }

    pub fn with_color_scheme(mut self, color_scheme: ColorScheme) -> Spectrum {
        self.color_scheme = Some(color_scheme);
        self
    }

    pub fn with_memory_max(mut self, memory_max: usize) -> Spectrum {
        self.memory_max = Some(memory_max);
        self
    }

    pub fn derivation_size(&self) -> u32 {
        self.derivation_size.unwrap_or(DEFAULT_DERIVATION_SIZE)
    }

    pub fn derivation_dist(&self) -> u32 {
        self.derivation_dist.unwrap_or(DEFAULT_DERIVATION_DIST)
    }

    pub fn memory_max(&self) -> usize {
        self.memory_max.unwrap_or(DEFAULT_MEMORY_MAX)
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.color_scheme.unwrap_or_default()
    }
}

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
//! Spectrogram rendering: FFT power blocks memoized in a [BlockCache] and
//! drawn through a color map.
//!
//! [BlockCache]: crate::block_cache::BlockCache

pub mod color_map;
pub mod deriver;
pub mod renderer;

pub use color_map::{ColorMap, ColorScheme};
pub use deriver::SpectrumDeriver;
pub use renderer::{SpectrumError, SpectrumRenderer};

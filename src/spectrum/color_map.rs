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
use std::{fmt, str::FromStr};

use image::Rgb;
use serde::Deserialize;

/// Number of quantized levels in a palette.
pub const COLOR_MAP_LEVELS: usize = 4096;

/// Palette families for the spectrogram.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum ColorScheme {
    /// Hue sweep from dark blue through green to bright red.
    #[default]
    Spectrum,
    /// Black through blue to white.
    Icy,
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spectrum" => Ok(ColorScheme::Spectrum),
            "icy" => Ok(ColorScheme::Icy),
            _ => Err(format!("unknown color scheme {}", s)),
        }
    }
}

impl TryFrom<String> for ColorScheme {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScheme::Spectrum => write!(f, "spectrum"),
            ColorScheme::Icy => write!(f, "icy"),
        }
    }
}

/// A palette of [COLOR_MAP_LEVELS] RGB colors indexed by a value in [0, 1].
pub struct ColorMap {
    palette: Vec<Rgb<u8>>,
}

impl ColorMap {
    /// Builds the palette. The selected variant is a brightened version used
    /// for columns inside the selection.
    pub fn new(scheme: ColorScheme, selected: bool) -> ColorMap {
        let palette = (0..COLOR_MAP_LEVELS)
            .map(|level| {
                let t = level as f32 / (COLOR_MAP_LEVELS - 1) as f32;
                match scheme {
                    ColorScheme::Spectrum => {
                        let hue = (1.0 - t) * 2.0 / 3.0;
                        let lightness = if selected { 0.2 + t * 0.6 } else { t * 0.5 };
                        Rgb(hsl_to_rgb(hue, 1.0, lightness))
                    }
                    ColorScheme::Icy => {
                        let saturation = 1.0 - t * 0.7;
                        let lightness = if selected { 0.2 + t * 0.8 } else { t * 0.9 };
                        Rgb(hsl_to_rgb(0.6, saturation, lightness))
                    }
                }
            })
            .collect();
        ColorMap { palette }
    }

    /// Color for `value`, clamped to [0, 1]. NaN maps to the lowest level.
    pub fn map(&self, value: f32) -> Rgb<u8> {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        let index = (value * (COLOR_MAP_LEVELS - 1) as f32).round() as usize;
        self.palette[index]
    }
}

/// Converts hue, saturation and lightness (all in [0, 1]) to RGB.
fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue * 6.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(r), channel(g), channel(b)]
}

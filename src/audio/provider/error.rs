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
use std::{fmt, path::PathBuf};

/// Error types for reading samples from a provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),

    #[error("Sample conversion failed for {0}")]
    SampleConversionFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Buffer too small: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Unable to allocate {0} bytes for the sample cache")]
    CacheAllocation(usize),

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("WAV error: {0}")]
    WavError(#[from] hound::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single decoder's reason for rejecting a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderAttempt {
    pub decoder: String,
    pub message: String,
}

impl fmt::Display for DecoderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.decoder, self.message)
    }
}

/// Errors that prevent a source from being opened at all.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid audio source {name}: {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("No video is open to take audio from")]
    NoVideo,

    #[error("No decoder could open {name}: {}", format_attempts(.attempts))]
    NoDecoder {
        name: String,
        attempts: Vec<DecoderAttempt>,
    },

    #[error("Unable to build cache: {0}")]
    Cache(ProviderError),

    #[error("Unable to convert audio: {0}")]
    Conversion(ProviderError),
}

fn format_attempts(attempts: &[DecoderAttempt]) -> String {
    if attempts.is_empty() {
        return "no decoders configured".to_string();
    }
    attempts
        .iter()
        .map(|attempt| attempt.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

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
pub mod convert;
pub mod disk;
pub mod dummy;
pub mod error;
pub mod factory;
pub mod file;
pub mod pcm;
pub mod ram;
pub mod traits;
pub mod video;

#[cfg(test)]
mod tests;

// Re-exports for use by other modules
pub use convert::convert_to_canonical;
pub use disk::DiskCache;
pub use dummy::{DummyProvider, DummySignal};
pub use error::{DecoderAttempt, OpenError, ProviderError};
pub use factory::open_provider;
pub use file::FileProvider;
pub use pcm::PcmProvider;
pub use ram::RamCache;
pub use traits::{describe_chain, silenced_read_count, AudioProvider};
pub use video::{VideoAudioMode, VideoAudioProvider};

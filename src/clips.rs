// Copyright (C) 2026 Talkless Contributors
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

//! Decoded clips and the store that owns them.
//!
//! Clips are decoded into the engine's stream format once, at import time,
//! and are immutable from then on. The mixer only ever sees them through a
//! shared `Arc<Clip>`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod decode;
mod error;
mod resample;
mod store;

pub use decode::{decode_file, is_supported, DecodedAudio, SUPPORTED_EXTENSIONS};
pub use error::DecodeError;
pub use store::{normalize_trigger, ClipStore};

/// Identifier for a clip in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(u64);

impl ClipId {
    pub fn new(id: u64) -> ClipId {
        ClipId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, decoded clip. Samples are interleaved at the engine's
/// sample rate and channel count.
pub struct Clip {
    id: ClipId,
    name: String,
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl Clip {
    /// Creates a clip from decoded audio.
    pub fn new(id: ClipId, name: &str, audio: DecodedAudio) -> Clip {
        Clip {
            id,
            name: name.to_string(),
            samples: audio.samples.into(),
            channels: audio.channels,
            sample_rate: audio.sample_rate,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The interleaved sample buffer.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Total number of samples across all channels.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length of the clip.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("samples", &self.samples.len())
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// A point-in-time snapshot of a clip's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub id: ClipId,
    pub name: String,
    pub volume: f32,
    pub triggers: Vec<String>,
    pub duration: Duration,
}

impl fmt::Display for ClipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({:.2}s, volume {:.2})",
            self.id,
            self.name,
            self.duration.as_secs_f64(),
            self.volume
        )?;
        if !self.triggers.is_empty() {
            write!(f, " triggers: {}", self.triggers.join(", "))?;
        }
        Ok(())
    }
}

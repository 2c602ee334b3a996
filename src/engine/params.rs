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

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{validate_volume, EngineError};

/// A consistent copy of the mix levels, taken once per cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixLevels {
    pub master: f32,
    pub mic: f32,
    pub clip: f32,
}

impl Default for MixLevels {
    fn default() -> Self {
        MixLevels {
            master: 1.0,
            mic: 1.0,
            clip: 1.0,
        }
    }
}

/// Process-wide mix parameters. Written by the control side through
/// validated setters, read by the engine thread without locking.
#[derive(Debug)]
pub struct MixParams {
    master: AtomicU32,
    mic: AtomicU32,
    clip: AtomicU32,
}

impl MixParams {
    /// Creates mix parameters from validated initial levels.
    pub fn new(levels: MixLevels) -> Result<MixParams, EngineError> {
        Ok(MixParams {
            master: AtomicU32::new(validate_volume("master", levels.master)?.to_bits()),
            mic: AtomicU32::new(validate_volume("mic", levels.mic)?.to_bits()),
            clip: AtomicU32::new(validate_volume("clip", levels.clip)?.to_bits()),
        })
    }

    pub fn set_master(&self, volume: f32) -> Result<(), EngineError> {
        Self::store(&self.master, validate_volume("master", volume)?);
        Ok(())
    }

    pub fn set_mic(&self, volume: f32) -> Result<(), EngineError> {
        Self::store(&self.mic, validate_volume("mic", volume)?);
        Ok(())
    }

    pub fn set_clip(&self, volume: f32) -> Result<(), EngineError> {
        Self::store(&self.clip, validate_volume("clip", volume)?);
        Ok(())
    }

    pub fn snapshot(&self) -> MixLevels {
        MixLevels {
            master: Self::load(&self.master),
            mic: Self::load(&self.mic),
            clip: Self::load(&self.clip),
        }
    }

    #[inline]
    fn store(slot: &AtomicU32, value: f32) {
        slot.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn load(slot: &AtomicU32) -> f32 {
        f32::from_bits(slot.load(Ordering::Relaxed))
    }
}

impl Default for MixParams {
    fn default() -> Self {
        let levels = MixLevels::default();
        MixParams {
            master: AtomicU32::new(levels.master.to_bits()),
            mic: AtomicU32::new(levels.mic.to_bits()),
            clip: AtomicU32::new(levels.clip.to_bits()),
        }
    }
}

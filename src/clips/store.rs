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

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Clip, ClipId, ClipInfo, DecodedAudio};
use crate::audio::StreamFormat;
use crate::error::{validate_volume, EngineError};

/// A stored clip together with its mutable metadata.
struct ClipEntry {
    clip: Arc<Clip>,
    volume: f32,
    triggers: Vec<String>,
}

/// Owns every decoded clip. Lives on the control side only; the audio
/// thread receives clips through commands.
pub struct ClipStore {
    /// The format every clip is converted to.
    format: StreamFormat,
    /// Clips by ID. Ordered so listings are stable.
    entries: BTreeMap<ClipId, ClipEntry>,
    /// The next ID to hand out.
    next_id: u64,
    /// Optional upper bound on the number of clips.
    max_clips: Option<usize>,
}

impl ClipStore {
    /// Creates an empty store for the given format.
    pub fn new(format: StreamFormat) -> ClipStore {
        ClipStore {
            format,
            entries: BTreeMap::new(),
            next_id: 1,
            max_clips: None,
        }
    }

    /// Limits the number of clips the store will accept.
    pub fn with_max_clips(mut self, max_clips: Option<usize>) -> ClipStore {
        self.max_clips = max_clips;
        self
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    /// Adds already decoded audio to the store under a fresh ID.
    pub fn insert(&mut self, name: &str, audio: DecodedAudio) -> Result<ClipId, EngineError> {
        let id = ClipId::new(self.next_id);
        self.restore(id, name, audio, 1.0, Vec::new())?;
        Ok(id)
    }

    /// Adds decoded audio under a known ID, as when reloading a library.
    pub fn restore(
        &mut self,
        id: ClipId,
        name: &str,
        audio: DecodedAudio,
        volume: f32,
        triggers: Vec<String>,
    ) -> Result<(), EngineError> {
        self.check_capacity()?;
        let volume = validate_volume("clip", volume)?;
        if self.entries.contains_key(&id) {
            return Err(EngineError::InvalidArgument(format!(
                "clip {} already exists",
                id
            )));
        }
        if audio.channels != self.format.channels || audio.sample_rate != self.format.sample_rate
        {
            return Err(EngineError::InvalidArgument(format!(
                "clip {} is {}ch/{}Hz, engine is {}ch/{}Hz",
                name,
                audio.channels,
                audio.sample_rate,
                self.format.channels,
                self.format.sample_rate
            )));
        }

        let mut normalized = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            let trigger = normalize_trigger(&trigger)?;
            if let Ok(owner) = self.clip_for_trigger(&trigger) {
                return Err(EngineError::InvalidArgument(format!(
                    "trigger '{}' is already bound to clip {}",
                    trigger, owner
                )));
            }
            normalized.push(trigger);
        }

        let clip = Arc::new(Clip::new(id, name, audio));
        info!(
            clip = %id,
            name,
            duration_ms = clip.duration().as_millis(),
            memory_kb = clip.memory_size() / 1024,
            "Clip stored"
        );

        self.entries.insert(
            id,
            ClipEntry {
                clip,
                volume,
                triggers: normalized,
            },
        );
        self.next_id = self.next_id.max(id.value() + 1);
        Ok(())
    }

    /// Makes sure IDs up to and including `id` are never handed out again.
    pub fn reserve(&mut self, id: ClipId) {
        self.next_id = self.next_id.max(id.value() + 1);
    }

    /// Fails if the store is already at its configured limit.
    pub fn check_capacity(&self) -> Result<(), EngineError> {
        match self.max_clips {
            Some(max) if self.entries.len() >= max => Err(EngineError::InvalidArgument(format!(
                "maximum number of clips ({}) reached",
                max
            ))),
            _ => Ok(()),
        }
    }

    /// Removes a clip and returns it.
    pub fn delete(&mut self, id: ClipId) -> Result<Arc<Clip>, EngineError> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(EngineError::ClipNotFound(id))?;
        debug!(clip = %id, "Clip deleted");
        Ok(entry.clip)
    }

    /// Sets the per-clip volume. The prior value is kept on error.
    pub fn set_volume(&mut self, id: ClipId, volume: f32) -> Result<(), EngineError> {
        let volume = validate_volume("clip", volume)?;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::ClipNotFound(id))?;
        entry.volume = volume;
        Ok(())
    }

    /// Returns the clip and its current volume.
    pub fn get(&self, id: ClipId) -> Result<(Arc<Clip>, f32), EngineError> {
        self.entries
            .get(&id)
            .map(|entry| (entry.clip.clone(), entry.volume))
            .ok_or(EngineError::ClipNotFound(id))
    }

    /// Returns a snapshot of a single clip's metadata.
    pub fn info(&self, id: ClipId) -> Result<ClipInfo, EngineError> {
        self.entries
            .get(&id)
            .map(Self::to_info)
            .ok_or(EngineError::ClipNotFound(id))
    }

    /// Returns a snapshot of every clip's metadata, ordered by ID.
    pub fn list(&self) -> Vec<ClipInfo> {
        self.entries.values().map(Self::to_info).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds a trigger to a clip. Triggers are unique across clips.
    /// Returns the normalized trigger.
    pub fn assign_trigger(&mut self, id: ClipId, trigger: &str) -> Result<String, EngineError> {
        let trigger = normalize_trigger(trigger)?;
        if let Ok(owner) = self.clip_for_trigger(&trigger) {
            if owner != id {
                return Err(EngineError::InvalidArgument(format!(
                    "trigger '{}' is already bound to clip {}",
                    trigger, owner
                )));
            }
            return Ok(trigger);
        }

        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::ClipNotFound(id))?;
        entry.triggers.push(trigger.clone());
        Ok(trigger)
    }

    /// Removes a trigger binding from a clip.
    pub fn unassign_trigger(&mut self, id: ClipId, trigger: &str) -> Result<(), EngineError> {
        let trigger = normalize_trigger(trigger)?;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::ClipNotFound(id))?;
        let before = entry.triggers.len();
        entry.triggers.retain(|t| *t != trigger);
        if entry.triggers.len() == before {
            return Err(EngineError::TriggerNotFound(trigger));
        }
        Ok(())
    }

    /// Finds the clip bound to a trigger.
    pub fn clip_for_trigger(&self, trigger: &str) -> Result<ClipId, EngineError> {
        let trigger = normalize_trigger(trigger)?;
        self.entries
            .iter()
            .find(|(_, entry)| entry.triggers.contains(&trigger))
            .map(|(id, _)| *id)
            .ok_or(EngineError::TriggerNotFound(trigger))
    }

    fn to_info(entry: &ClipEntry) -> ClipInfo {
        ClipInfo {
            id: entry.clip.id(),
            name: entry.clip.name().to_string(),
            volume: entry.volume,
            triggers: entry.triggers.clone(),
            duration: entry.clip.duration(),
        }
    }
}

impl std::fmt::Debug for ClipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipStore")
            .field("clips", &self.entries.len())
            .field("format", &self.format)
            .field("max_clips", &self.max_clips)
            .finish()
    }
}

/// Normalizes a trigger binding: trimmed and lower-cased. Empty bindings are rejected.
pub fn normalize_trigger(trigger: &str) -> Result<String, EngineError> {
    let trigger = trigger.trim().to_lowercase();
    if trigger.is_empty() {
        return Err(EngineError::InvalidArgument(
            "trigger cannot be empty".to_string(),
        ));
    }
    Ok(trigger)
}

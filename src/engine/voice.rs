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

//! Voice management for polyphonic clip playback.
//!
//! Every trigger creates an independent voice with its own cursor, so the
//! same clip may play several times at once.

use std::fmt;
use std::sync::Arc;

use crate::clips::{Clip, ClipId};

/// Identifies one playing instance of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn new(id: u64) -> VoiceId {
        VoiceId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Active,
    Finished,
}

/// A clip being played.
pub struct Voice {
    id: VoiceId,
    clip: Arc<Clip>,
    /// Next sample to read.
    cursor: usize,
    /// Effective volume of this instance.
    volume: f32,
    state: VoiceState,
}

impl Voice {
    fn new(id: VoiceId, clip: Arc<Clip>, volume: f32) -> Voice {
        Voice {
            id,
            clip,
            cursor: 0,
            volume,
            state: VoiceState::Active,
        }
    }

    /// Copies the next block into `out`, scaled by this voice's volume and
    /// `gain`, and zero-padded past the end of the clip. The voice finishes
    /// once its cursor reaches the end.
    fn render(&mut self, out: &mut [f32], gain: f32) {
        let samples = self.clip.samples();
        let start = self.cursor.min(samples.len());
        let end = (self.cursor + out.len()).min(samples.len());
        let copied = end - start;

        let scale = self.volume * gain;
        for (dst, src) in out[..copied].iter_mut().zip(&samples[start..end]) {
            *dst = src * scale;
        }
        out[copied..].fill(0.0);

        self.cursor += out.len();
        if self.cursor >= samples.len() {
            self.state = VoiceState::Finished;
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn clip_id(&self) -> ClipId {
        self.clip.id()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }
}

/// Owns every live voice. Only the engine thread touches it.
pub struct VoicePool {
    voices: Vec<Voice>,
}

impl VoicePool {
    /// Creates a pool with room for `capacity` voices before it allocates.
    pub fn new(capacity: usize) -> VoicePool {
        VoicePool {
            voices: Vec::with_capacity(capacity),
        }
    }

    /// Adds a new active voice at offset 0.
    pub fn add(&mut self, id: VoiceId, clip: Arc<Clip>, volume: f32) {
        self.voices.push(Voice::new(id, clip, volume));
    }

    /// Marks a voice finished. Returns false if it isn't live.
    pub fn stop(&mut self, id: VoiceId) -> bool {
        match self
            .voices
            .iter_mut()
            .find(|voice| voice.id == id && voice.state == VoiceState::Active)
        {
            Some(voice) => {
                voice.state = VoiceState::Finished;
                true
            }
            None => false,
        }
    }

    /// Marks every voice finished. Returns how many were active.
    pub fn stop_all(&mut self) -> usize {
        self.finish_where(|_| true)
    }

    /// Marks every voice of the clip finished.
    pub fn stop_clip(&mut self, clip: ClipId) -> usize {
        self.finish_where(|voice| voice.clip_id() == clip)
    }

    /// Updates the volume of every live voice of the clip.
    pub fn set_clip_volume(&mut self, clip: ClipId, volume: f32) {
        for voice in self.voices.iter_mut().filter(|v| v.clip_id() == clip) {
            voice.volume = volume;
        }
    }

    /// Drops every voice, finished or not.
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    /// Runs one cycle: discards finished voices, then renders each active
    /// voice into `block` and hands it to `sink`.
    pub fn render<F>(&mut self, gain: f32, block: &mut [f32], mut sink: F)
    where
        F: FnMut(&[f32]),
    {
        self.voices
            .retain(|voice| voice.state == VoiceState::Active);
        for voice in self.voices.iter_mut() {
            voice.render(block, gain);
            sink(block);
        }
    }

    /// Number of voices still active.
    pub fn active_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|voice| voice.state == VoiceState::Active)
            .count()
    }

    /// Looks up a voice that hasn't been discarded yet.
    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|voice| voice.id == id)
    }

    /// Number of voices held, including finished ones awaiting discard.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    fn finish_where(&mut self, matches: impl Fn(&Voice) -> bool) -> usize {
        let mut stopped = 0;
        for voice in self.voices.iter_mut() {
            if voice.state == VoiceState::Active && matches(voice) {
                voice.state = VoiceState::Finished;
                stopped += 1;
            }
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clips::DecodedAudio;

    fn clip(id: u64, samples: Vec<f32>) -> Arc<Clip> {
        Arc::new(Clip::new(
            ClipId::new(id),
            "test",
            DecodedAudio {
                samples,
                channels: 1,
                sample_rate: 44100,
            },
        ))
    }

    fn render_blocks(pool: &mut VoicePool, block_len: usize) -> Vec<Vec<f32>> {
        let mut block = vec![0.0; block_len];
        let mut rendered = Vec::new();
        pool.render(1.0, &mut block, |b| rendered.push(b.to_vec()));
        rendered
    }

    #[test]
    fn test_voice_zero_pads_and_finishes() {
        let mut pool = VoicePool::new(4);
        pool.add(VoiceId::new(1), clip(1, vec![0.5; 6]), 1.0);

        let first = render_blocks(&mut pool, 4);
        assert_eq!(first, vec![vec![0.5; 4]]);
        assert_eq!(pool.get(VoiceId::new(1)).unwrap().state(), VoiceState::Active);
        assert_eq!(pool.get(VoiceId::new(1)).unwrap().cursor(), 4);

        let second = render_blocks(&mut pool, 4);
        assert_eq!(second, vec![vec![0.5, 0.5, 0.0, 0.0]]);
        assert_eq!(
            pool.get(VoiceId::new(1)).unwrap().state(),
            VoiceState::Finished
        );
        assert_eq!(pool.active_count(), 0);

        // Finished voices are discarded and never rendered again.
        assert!(render_blocks(&mut pool, 4).is_empty());
        assert!(pool.get(VoiceId::new(1)).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_exact_length_finishes_on_last_block() {
        let mut pool = VoicePool::new(4);
        pool.add(VoiceId::new(1), clip(1, vec![0.5; 8]), 1.0);
        render_blocks(&mut pool, 4);
        assert_eq!(pool.active_count(), 1);
        render_blocks(&mut pool, 4);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_same_clip_plays_independently() {
        let shared = clip(1, (0..12).map(|i| i as f32 / 100.0).collect());
        let mut pool = VoicePool::new(4);
        pool.add(VoiceId::new(1), shared.clone(), 1.0);
        render_blocks(&mut pool, 4);
        pool.add(VoiceId::new(2), shared, 1.0);

        let rendered = render_blocks(&mut pool, 4);
        assert_eq!(rendered[0], vec![0.04, 0.05, 0.06, 0.07]);
        assert_eq!(rendered[1], vec![0.0, 0.01, 0.02, 0.03]);

        assert!(pool.stop(VoiceId::new(1)));
        assert_eq!(
            pool.get(VoiceId::new(2)).unwrap().state(),
            VoiceState::Active
        );
        assert_eq!(pool.active_count(), 1);
        assert!(!pool.stop(VoiceId::new(1)));
    }

    #[test]
    fn test_volume_and_gain() {
        let mut pool = VoicePool::new(4);
        pool.add(VoiceId::new(1), clip(1, vec![1.0; 8]), 0.5);
        let mut block = vec![0.0; 4];
        let mut rendered = Vec::new();
        pool.render(0.5, &mut block, |b| rendered.push(b.to_vec()));
        assert_eq!(rendered[0], vec![0.25; 4]);

        pool.set_clip_volume(ClipId::new(1), 1.0);
        rendered.clear();
        pool.render(1.0, &mut block, |b| rendered.push(b.to_vec()));
        assert_eq!(rendered[0], vec![1.0; 4]);
    }

    #[test]
    fn test_stop_all_and_stop_clip() {
        let mut pool = VoicePool::new(4);
        pool.add(VoiceId::new(1), clip(1, vec![0.5; 100]), 1.0);
        pool.add(VoiceId::new(2), clip(2, vec![0.5; 100]), 1.0);
        pool.add(VoiceId::new(3), clip(2, vec![0.5; 100]), 1.0);

        assert_eq!(pool.stop_clip(ClipId::new(2)), 2);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.stop_all(), 1);
        assert_eq!(pool.active_count(), 0);
        assert!(render_blocks(&mut pool, 4).is_empty());
    }
}

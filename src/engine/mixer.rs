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

//! Block mixing: sums capture and voice blocks, applies master volume and
//! keeps the result within [-1.0, 1.0] by per-block peak normalization.
//!
//! Normalization is computed per block with no smoothing between blocks, so a
//! loud transient ducks only the ~11ms block it lands in. The gain can pump
//! between adjacent blocks when the mix hovers around full scale.

/// Accumulates one cycle's mix.
pub struct MixBus {
    buffer: Vec<f32>,
    /// Normalization scale applied by the last `finish`.
    scale: f32,
}

impl MixBus {
    pub fn new(block_len: usize) -> MixBus {
        MixBus {
            buffer: vec![0.0; block_len],
            scale: 1.0,
        }
    }

    /// Starts a new mix from the capture block.
    pub fn begin(&mut self, capture: &[f32]) {
        let len = self.buffer.len().min(capture.len());
        self.buffer[..len].copy_from_slice(&capture[..len]);
        self.buffer[len..].fill(0.0);
    }

    /// Adds a voice block to the mix.
    pub fn add(&mut self, block: &[f32]) {
        accumulate(&mut self.buffer, block);
    }

    /// Applies master volume and normalization, returning the finished block.
    pub fn finish(&mut self, master: f32) -> &[f32] {
        apply_gain(&mut self.buffer, master);
        self.scale = normalize(&mut self.buffer);
        &self.buffer
    }

    /// The block as it stands.
    pub fn block(&self) -> &[f32] {
        &self.buffer
    }

    /// Whether the last finished block had to be scaled down.
    pub fn was_normalized(&self) -> bool {
        self.scale < 1.0
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Adds `block` into `mix` element-wise.
#[inline]
pub fn accumulate(mix: &mut [f32], block: &[f32]) {
    for (dst, src) in mix.iter_mut().zip(block) {
        *dst += src;
    }
}

#[inline]
pub fn apply_gain(block: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in block.iter_mut() {
        *sample *= gain;
    }
}

/// Largest absolute sample value. Non-finite samples are zeroed on the way.
pub fn peak(block: &mut [f32]) -> f32 {
    let mut peak = 0.0f32;
    for sample in block.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
        }
        peak = peak.max(sample.abs());
    }
    peak
}

/// Scales the block so its peak is at most 1.0. Returns the scale applied.
pub fn normalize(block: &mut [f32]) -> f32 {
    let peak = peak(block);
    if peak <= 1.0 {
        return 1.0;
    }
    // x / peak is exactly 1.0 at the peak and never rounds above it.
    for sample in block.iter_mut() {
        *sample /= peak;
    }
    1.0 / peak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix(capture: &[f32], voices: &[&[f32]], master: f32) -> Vec<f32> {
        let mut bus = MixBus::new(capture.len());
        bus.begin(capture);
        for voice in voices {
            bus.add(voice);
        }
        bus.finish(master).to_vec()
    }

    #[test]
    fn test_silence_stays_silent() {
        let silence = vec![0.0; 64];
        for master in [0.0, 0.5, 1.0] {
            let out = mix(&silence, &[&silence, &silence], master);
            assert!(out.iter().all(|s| *s == 0.0));
        }
    }

    #[test]
    fn test_unclipped_mix_is_scaled_by_master_only() {
        let capture = vec![0.2; 8];
        let voice = vec![-0.3; 8];
        let out = mix(&capture, &[&voice], 0.5);
        for sample in out {
            assert!((sample - (-0.05)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_two_clips_normalize_to_full_scale() {
        let silence = vec![0.0; 512];
        let a = vec![0.5; 512];
        let b = vec![0.8; 512];
        let mut bus = MixBus::new(512);
        bus.begin(&silence);
        bus.add(&a);
        bus.add(&b);
        let out = bus.finish(1.0).to_vec();
        assert!(bus.was_normalized());
        for sample in out {
            assert!((sample - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_peak_never_exceeds_one() {
        let capture: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.37).sin() * 0.9).collect();
        let a: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.11).cos()).collect();
        let b: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.05).sin() * 0.7).collect();
        let out = mix(&capture, &[&a, &b, &a], 1.0);
        assert!(out.iter().all(|s| s.abs() <= 1.0));
        assert!(out.iter().any(|s| s.abs() == 1.0));
    }

    #[test]
    fn test_normalize_preserves_shape() {
        let mut block = vec![2.0, -1.0, 0.5, 0.0];
        let scale = normalize(&mut block);
        assert_eq!(scale, 0.5);
        assert_eq!(block, vec![1.0, -0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_non_finite_samples_are_zeroed() {
        let mut block = vec![f32::NAN, 0.5, f32::INFINITY];
        assert_eq!(peak(&mut block), 0.5);
        assert_eq!(block, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_short_capture_is_zero_padded() {
        let mut bus = MixBus::new(4);
        bus.begin(&[0.5, 0.5]);
        assert_eq!(bus.finish(1.0), &[0.5, 0.5, 0.0, 0.0]);
    }
}

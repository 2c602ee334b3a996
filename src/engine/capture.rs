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

use std::sync::Arc;

use tracing::debug;

use crate::audio::CircularBuffer;

/// Pulls one block of microphone input per cycle. Without a device, or when
/// the device falls behind, the missing samples are silence.
pub struct CapturePath {
    ring: Option<Arc<CircularBuffer>>,
    block: Vec<f32>,
    /// Input older than this many samples is discarded to bound latency.
    max_backlog: usize,
    /// Whether the previous cycle came up short.
    starved: bool,
}

impl CapturePath {
    /// Creates a capture path that always yields silence.
    pub fn silent(block_len: usize) -> CapturePath {
        CapturePath {
            ring: None,
            block: vec![0.0; block_len],
            max_backlog: block_len * 2,
            starved: false,
        }
    }

    /// Creates a capture path reading from the given ring.
    pub fn from_ring(ring: Arc<CircularBuffer>, block_len: usize) -> CapturePath {
        CapturePath {
            ring: Some(ring),
            ..CapturePath::silent(block_len)
        }
    }

    pub fn is_live(&self) -> bool {
        self.ring.is_some()
    }

    /// Returns this cycle's capture block, scaled by `gain`.
    pub fn next_block(&mut self, gain: f32) -> &[f32] {
        let Some(ring) = &self.ring else {
            self.block.fill(0.0);
            return &self.block;
        };

        let backlog = ring.available();
        if backlog > self.max_backlog {
            ring.skip(backlog - self.block.len());
        }

        let read = ring.read(&mut self.block);
        self.block[read..].fill(0.0);

        let starved = read < self.block.len();
        if starved != self.starved {
            if starved {
                debug!(read, "Capture underrun, substituting silence");
            } else {
                debug!("Capture recovered");
            }
            self.starved = starved;
        }

        if gain != 1.0 {
            for sample in self.block.iter_mut() {
                *sample *= gain;
            }
        }
        &self.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_capture() {
        let mut capture = CapturePath::silent(4);
        assert!(!capture.is_live());
        assert_eq!(capture.next_block(1.0), &[0.0; 4]);
    }

    #[test]
    fn test_reads_and_scales() {
        let ring = Arc::new(CircularBuffer::new(16));
        let mut capture = CapturePath::from_ring(ring.clone(), 4);
        ring.write(&[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(capture.next_block(0.5), &[0.25; 4]);
    }

    #[test]
    fn test_shortfall_is_zero_filled() {
        let ring = Arc::new(CircularBuffer::new(16));
        let mut capture = CapturePath::from_ring(ring.clone(), 4);
        ring.write(&[0.5, 0.5]);
        assert_eq!(capture.next_block(1.0), &[0.5, 0.5, 0.0, 0.0]);
        assert_eq!(capture.next_block(1.0), &[0.0; 4]);
    }

    #[test]
    fn test_stale_backlog_is_skipped() {
        let ring = Arc::new(CircularBuffer::new(32));
        let mut capture = CapturePath::from_ring(ring.clone(), 4);
        ring.write(&[0.1; 8]);
        ring.write(&[0.2; 4]);
        ring.write(&[0.3; 4]);
        assert_eq!(capture.next_block(1.0), &[0.3; 4]);
        assert_eq!(ring.available(), 0);
    }
}

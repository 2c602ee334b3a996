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

use std::{sync::Arc, time::Duration};

use crossbeam_channel::Receiver;

use crate::audio::CircularBuffer;

/// Hands mixed blocks to the output device. The ring holds the block being
/// played plus one queued block, so the engine waits at most one cycle for
/// room.
pub struct OutputPath {
    ring: Arc<CircularBuffer>,
    ready: Receiver<()>,
    block_len: usize,
}

impl OutputPath {
    /// Number of blocks the output ring holds.
    pub const BUFFERED_BLOCKS: usize = 2;

    pub fn new(ring: Arc<CircularBuffer>, ready: Receiver<()>, block_len: usize) -> OutputPath {
        OutputPath {
            ring,
            ready,
            block_len,
        }
    }

    /// Whether a full block can be written right now.
    pub fn has_space(&self) -> bool {
        self.ring.space() >= self.block_len
    }

    /// Waits until the device signals it consumed samples, or the timeout
    /// passes. Returns whether a full block now fits.
    pub fn wait_for_space(&self, timeout: Duration) -> bool {
        if self.has_space() {
            return true;
        }
        let _ = self.ready.recv_timeout(timeout);
        self.has_space()
    }

    /// Writes a block. Only call after `has_space` reported room; returns
    /// whether the whole block was written.
    pub fn deliver(&self, block: &[f32]) -> bool {
        self.ring.write(block) == block.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_until_full() {
        let ring = Arc::new(CircularBuffer::new(8));
        let (_ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let output = OutputPath::new(ring.clone(), ready_rx, 4);

        assert!(output.has_space());
        assert!(output.deliver(&[0.1; 4]));
        assert!(output.deliver(&[0.2; 4]));
        assert!(!output.has_space());
        assert!(!output.wait_for_space(Duration::from_millis(5)));

        let mut consumed = [0.0; 4];
        ring.read(&mut consumed);
        assert_eq!(consumed, [0.1; 4]);
        assert!(output.wait_for_space(Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_wakes_on_ready() {
        let ring = Arc::new(CircularBuffer::new(4));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let output = OutputPath::new(ring.clone(), ready_rx, 4);
        output.deliver(&[0.5; 4]);

        let consumer = std::thread::spawn(move || {
            let mut block = [0.0; 4];
            ring.read(&mut block);
            ready_tx.send(()).unwrap();
        });
        assert!(output.wait_for_space(Duration::from_secs(5)));
        consumer.join().unwrap();
    }
}

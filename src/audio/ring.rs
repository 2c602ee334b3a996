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

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Lock-free single-producer, single-consumer ring of f32 samples.
///
/// One thread writes and one thread reads. Neither side ever blocks: writes
/// that don't fit are truncated and reads return however many samples are
/// available. Samples are stored as their bit patterns in atomic slots so the
/// buffer can be shared without any unsafe code.
pub struct CircularBuffer {
    /// Backing slots, holding `f32::to_bits` values.
    slots: Box<[AtomicU32]>,
    /// Total samples consumed (consumer).
    read_pos: AtomicUsize,
    /// Total samples produced (producer).
    write_pos: AtomicUsize,
}

impl CircularBuffer {
    /// Creates a ring that holds exactly `capacity` samples.
    pub fn new(capacity: usize) -> CircularBuffer {
        let capacity = capacity.max(1);
        CircularBuffer {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of samples available to read.
    #[inline]
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Number of samples that can be written without truncation.
    #[inline]
    pub fn space(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Writes as many samples as fit. Returns the number written.
    pub fn write(&self, samples: &[f32]) -> usize {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        let space = self.capacity() - write.wrapping_sub(read);
        let to_write = space.min(samples.len());

        for (offset, sample) in samples[..to_write].iter().enumerate() {
            self.slot(write.wrapping_add(offset))
                .store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write_pos
            .store(write.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Reads up to `out.len()` samples. Returns the number read; the rest of
    /// `out` is left untouched.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);
        let to_read = write.wrapping_sub(read).min(out.len());

        for (offset, sample) in out[..to_read].iter_mut().enumerate() {
            *sample = f32::from_bits(self.slot(read.wrapping_add(offset)).load(Ordering::Relaxed));
        }

        self.read_pos
            .store(read.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discards up to `count` samples from the read side. Only the consumer
    /// may call this.
    pub fn skip(&self, count: usize) -> usize {
        let read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);
        let to_skip = write.wrapping_sub(read).min(count);
        self.read_pos
            .store(read.wrapping_add(to_skip), Ordering::Release);
        to_skip
    }

    #[inline]
    fn slot(&self, position: usize) -> &AtomicU32 {
        &self.slots[position % self.slots.len()]
    }
}

impl std::fmt::Debug for CircularBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

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

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{CircularBuffer, StreamFormat, StreamHandle};
use crate::error::EngineError;

/// How many samples of output a mock device remembers.
const MAX_RECORDED_SAMPLES: usize = 44100 * 30;

/// A mock device. Output streams consume the ring in real time and record
/// what they played; input streams produce a constant level.
///
/// Names of the form `mock-input-<level>` produce `<level>` on capture. Names
/// containing "unavailable" fail to open.
#[derive(Clone)]
pub struct Device {
    name: String,
    input_level: f32,
    unavailable: bool,
    is_playing: Arc<AtomicBool>,
    blocks_played: Arc<AtomicU64>,
    underruns: Arc<AtomicU64>,
    played: Arc<Mutex<Vec<f32>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        let input_level = name
            .rsplit('-')
            .next()
            .and_then(|level| level.parse::<f32>().ok())
            .filter(|level| level.is_finite())
            .unwrap_or(0.0);
        Device {
            name: name.to_string(),
            input_level,
            unavailable: name.contains("unavailable"),
            is_playing: Arc::new(AtomicBool::new(false)),
            blocks_played: Arc::new(AtomicU64::new(0)),
            underruns: Arc::new(AtomicU64::new(0)),
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns true while an output stream is open.
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// The level produced by input streams.
    pub fn input_level(&self) -> f32 {
        self.input_level
    }

    /// Number of blocks an output stream has consumed.
    pub fn blocks_played(&self) -> u64 {
        self.blocks_played.load(Ordering::Relaxed)
    }

    /// Number of blocks that were short of samples and got zero-filled.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// The most recent output, oldest first.
    pub fn played(&self) -> Vec<f32> {
        self.played.lock().clone()
    }

    /// Forgets everything recorded so far.
    pub fn clear_played(&self) {
        self.played.lock().clear();
    }

    fn check_available(&self) -> Result<(), EngineError> {
        if self.unavailable {
            return Err(EngineError::DeviceUnavailable(format!(
                "mock device {} is unavailable",
                self.name
            )));
        }
        Ok(())
    }
}

impl super::Device for Device {
    fn open_output(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
        ready: Sender<()>,
    ) -> Result<StreamHandle, EngineError> {
        self.check_available()?;

        let device = self.clone();
        let format = *format;
        StreamHandle::spawn(format!("output {}", self.name), move |stop, started| {
            let span = span!(Level::INFO, "output stream (mock)", device = device.name);
            let _enter = span.enter();

            let interval = format.cycle_duration();
            let mut block = vec![0.0; format.block_len()];
            device.is_playing.store(true, Ordering::Relaxed);
            info!(format = %format, "Output stream playing");
            let _ = started.send(Ok(()));
            let _ = ready.try_send(());

            loop {
                match stop.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    _ => break,
                }
                spin_sleep::sleep(interval);

                let read = ring.read(&mut block);
                if read < block.len() {
                    block[read..].fill(0.0);
                    device.underruns.fetch_add(1, Ordering::Relaxed);
                }
                {
                    let mut played = device.played.lock();
                    played.extend_from_slice(&block);
                    if played.len() > MAX_RECORDED_SAMPLES {
                        let excess = played.len() - MAX_RECORDED_SAMPLES;
                        played.drain(..excess);
                    }
                }
                device.blocks_played.fetch_add(1, Ordering::Relaxed);
                let _ = ready.try_send(());
            }

            device.is_playing.store(false, Ordering::Relaxed);
        })
    }

    fn open_input(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
    ) -> Result<StreamHandle, EngineError> {
        self.check_available()?;

        let name = self.name.clone();
        let level = self.input_level;
        let format = *format;
        StreamHandle::spawn(format!("input {}", self.name), move |stop, started| {
            let span = span!(Level::INFO, "input stream (mock)", device = name);
            let _enter = span.enter();

            let interval = format.cycle_duration();
            let block = vec![level; format.block_len()];
            info!(format = %format, level, "Input stream capturing");
            let _ = started.send(Ok(()));

            loop {
                match stop.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    _ => break,
                }
                ring.write(&block);
                spin_sleep::sleep(interval);
            }
        })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{audio::Device as _, testutil::eventually};

    #[test]
    fn test_input_level_from_name() {
        assert_eq!(Device::get("mock-input-0.5").input_level(), 0.5);
        assert_eq!(Device::get("mock-input").input_level(), 0.0);
        assert_eq!(Device::get("mock").input_level(), 0.0);
    }

    #[test]
    fn test_unavailable_device_fails_to_open() {
        let device = Device::get("mock-unavailable");
        let format = StreamFormat::default();
        let ring = Arc::new(CircularBuffer::new(format.block_len()));
        let (ready_tx, _ready_rx) = crossbeam_channel::bounded(1);
        assert!(matches!(
            device.open_output(&format, ring.clone(), ready_tx),
            Err(EngineError::DeviceUnavailable(_))
        ));
        assert!(matches!(
            device.open_input(&format, ring),
            Err(EngineError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_output_consumes_ring() {
        let device = Device::get("mock-output");
        let format = StreamFormat::new(44100, 1, 64).unwrap();
        let ring = Arc::new(CircularBuffer::new(format.block_len() * 4));
        ring.write(&[0.5; 64]);

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let handle = device.open_output(&format, ring.clone(), ready_tx).unwrap();
        assert!(device.is_playing());
        assert!(ready_rx.recv_timeout(Duration::from_secs(1)).is_ok());

        eventually(|| device.blocks_played() >= 2, "Output never consumed blocks");
        drop(handle);
        assert!(!device.is_playing());

        let played = device.played();
        assert_eq!(&played[..64], &[0.5; 64]);
        assert!(played[64..].iter().all(|s| *s == 0.0));
        assert!(device.underruns() >= 1);
    }

    #[test]
    fn test_input_produces_level() {
        let device = Device::get("mock-input-0.25");
        let format = StreamFormat::new(44100, 1, 64).unwrap();
        let ring = Arc::new(CircularBuffer::new(format.block_len() * 4));

        let handle = device.open_input(&format, ring.clone()).unwrap();
        eventually(|| ring.available() >= 64, "Input never produced samples");
        drop(handle);

        let mut block = [0.0; 64];
        assert_eq!(ring.read(&mut block), 64);
        assert!(block.iter().all(|s| *s == 0.25));
    }
}

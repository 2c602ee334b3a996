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

use std::{any::Any, fmt, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::EngineError;

pub mod cpal;
pub mod format;
pub mod mock;
pub mod ring;
pub mod select;
pub mod thread_priority;

pub use format::StreamFormat;
pub use ring::CircularBuffer;

/// An audio device the engine can open capture and playback streams on.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// Opens a playback stream that plays whatever is written into `ring`.
    /// `ready` is signalled every time the device has consumed samples and
    /// can accept more.
    fn open_output(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
        ready: Sender<()>,
    ) -> Result<StreamHandle, EngineError>;

    /// Opens a capture stream that writes incoming samples into `ring`.
    fn open_input(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
    ) -> Result<StreamHandle, EngineError>;
}

/// Lists the available audio devices.
pub fn list_devices() -> Result<Vec<cpal::Device>, EngineError> {
    cpal::Device::list()
}

/// Builds the routing report for the devices on this machine.
pub fn diagnose() -> Result<select::Report, EngineError> {
    let devices = cpal::Device::list()?;
    let (default_input, default_output) = cpal::Device::default_names();
    Ok(select::Report::new(&devices, default_input, default_output))
}

/// Gets the output device with the given name. Names starting with "mock"
/// select the mock backend, and "auto" selects the virtual cable.
pub fn get_output_device(name: &str) -> Result<Arc<dyn Device>, EngineError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }
    if name == select::AUTO {
        let device = select::find_cable(cpal::Device::list()?).ok_or_else(|| {
            EngineError::DeviceUnavailable("no virtual cable output found".to_string())
        })?;
        info!(device = %device, "Selected virtual cable output");
        return Ok(Arc::new(device));
    }
    Ok(Arc::new(cpal::Device::get_output(name)?))
}

/// Gets the input device with the given name. An input device that cannot
/// be found is not fatal: the engine runs with silent capture instead.
/// "auto" picks the first device named like a microphone, or the default
/// input if there is none.
pub fn get_input_device(name: Option<&str>) -> Option<Arc<dyn Device>> {
    let mut name = name?;
    if name.starts_with("mock") {
        return Some(Arc::new(mock::Device::get(name)));
    }
    if name == select::AUTO {
        match cpal::Device::list().map(select::find_microphone) {
            Ok(Some(device)) => {
                info!(device = %device, "Selected microphone");
                return Some(Arc::new(device));
            }
            Ok(None) => info!("No device named like a microphone, using the default input"),
            Err(e) => warn!(err = %e, "Unable to list input devices, using the default input"),
        }
        name = "default";
    }
    match cpal::Device::get_input(name) {
        Ok(device) => Some(Arc::new(device)),
        Err(e) => {
            warn!(device = name, err = %e, "Input device not found, microphone disabled");
            None
        }
    }
}

/// A running device stream. The stream lives on its own thread, since
/// backend streams are not guaranteed to be `Send`; dropping the handle
/// stops the stream and releases the device.
pub struct StreamHandle {
    name: String,
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl StreamHandle {
    /// Spawns a stream thread. `run` receives a stop receiver, which it should
    /// park on once the stream is playing, and a sender it must use exactly
    /// once to report whether the stream started.
    pub fn spawn<F>(name: String, run: F) -> Result<StreamHandle, EngineError>
    where
        F: FnOnce(Receiver<()>, Sender<Result<(), EngineError>>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(stop_rx, started_tx))?;

        match started_rx.recv() {
            Ok(Ok(())) => {
                debug!(stream = name, "Stream started");
                Ok(StreamHandle {
                    name,
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(EngineError::DeviceUnavailable(format!(
                    "{} exited before starting",
                    name
                )))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(stream = self.name, "Stream thread panicked");
            }
        }
        debug!(stream = self.name, "Stream closed");
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_handle_start_failure() {
        let result = StreamHandle::spawn("failing".to_string(), |_stop, started| {
            let _ = started.send(Err(EngineError::DeviceUnavailable("nope".to_string())));
        });
        assert!(matches!(result, Err(EngineError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_stream_handle_stops_on_drop() {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let handle = StreamHandle::spawn("parked".to_string(), move |stop, started| {
            let _ = started.send(Ok(()));
            let _ = stop.recv();
            let _ = done_tx.send(());
        })
        .unwrap();
        assert_eq!(handle.name(), "parked");

        drop(handle);
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn test_get_mock_devices() {
        let output = get_output_device("mock-output").unwrap();
        assert_eq!(output.to_string(), "mock-output (Mock)");
        assert!(get_input_device(None).is_none());
        assert!(get_input_device(Some("mock-input")).is_some());
    }
}

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

use std::{fmt, sync::Arc};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Sample,
};
use crossbeam_channel::Sender;
use tracing::{error, info, span, warn, Level};

use super::{select::DeviceInfo, CircularBuffer, StreamFormat, StreamHandle};
use crate::error::EngineError;

/// A small wrapper around a cpal::Device carrying the channel counts we
/// found while enumerating it.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of input channels the device supports.
    max_input_channels: u16,
    /// The maximum number of output channels the device supports.
    max_output_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (In={}, Out={}) ({})",
            self.name,
            self.max_input_channels,
            self.max_output_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists all cpal devices across every available host.
    pub fn list() -> Result<Vec<Device>, EngineError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Unable to open host");
                    continue;
                }
            };
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let max_input_channels = device
                    .supported_input_configs()
                    .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                    .unwrap_or(0);
                let max_output_channels = device
                    .supported_output_configs()
                    .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                    .unwrap_or(0);
                if max_input_channels == 0 && max_output_channels == 0 {
                    continue;
                }

                let name = match device.name() {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(err = %e, "Unable to read device name");
                        continue;
                    }
                };
                devices.push(Device {
                    name,
                    max_input_channels,
                    max_output_channels,
                    host_id,
                    device,
                });
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the output device with the given name. "default" selects the
    /// default output device of the default host.
    pub fn get_output(name: &str) -> Result<Device, EngineError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or_else(|| {
                EngineError::DeviceUnavailable("no default output device".to_string())
            })?;
            return Device::wrap(host.id(), device);
        }
        Device::find(name, |device| device.max_output_channels > 0)
    }

    /// Gets the input device with the given name. "default" selects the
    /// default input device of the default host.
    pub fn get_input(name: &str) -> Result<Device, EngineError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host.default_input_device().ok_or_else(|| {
                EngineError::DeviceUnavailable("no default input device".to_string())
            })?;
            return Device::wrap(host.id(), device);
        }
        Device::find(name, |device| device.max_input_channels > 0)
    }

    fn find(name: &str, usable: impl Fn(&Device) -> bool) -> Result<Device, EngineError> {
        Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name && usable(device))
            .ok_or_else(|| {
                EngineError::DeviceUnavailable(format!("no device found with name {}", name))
            })
    }

    fn wrap(host_id: cpal::HostId, device: cpal::Device) -> Result<Device, EngineError> {
        let name = device
            .name()
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        let max_input_channels = device
            .default_input_config()
            .map(|c| c.channels())
            .unwrap_or(0);
        let max_output_channels = device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(0);
        Ok(Device {
            name,
            max_input_channels,
            max_output_channels,
            host_id,
            device,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the default host's default input and output devices.
    pub fn default_names() -> (Option<String>, Option<String>) {
        let host = cpal::default_host();
        (
            host.default_input_device()
                .and_then(|device| device.name().ok()),
            host.default_output_device()
                .and_then(|device| device.name().ok()),
        )
    }

    fn stream_config(format: &StreamFormat, fixed: bool) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: format.channels,
            sample_rate: format.sample_rate,
            buffer_size: if fixed {
                cpal::BufferSize::Fixed(u32::try_from(format.block_frames).unwrap_or(u32::MAX))
            } else {
                cpal::BufferSize::Default
            },
        }
    }
}

impl DeviceInfo for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_input_channels(&self) -> u16 {
        self.max_input_channels
    }

    fn max_output_channels(&self) -> u16 {
        self.max_output_channels
    }
}

impl super::Device for Device {
    fn open_output(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
        ready: Sender<()>,
    ) -> Result<StreamHandle, EngineError> {
        if self.max_output_channels < format.channels {
            return Err(EngineError::DeviceUnavailable(format!(
                "{} channels requested, output device {} only has {}",
                format.channels, self.name, self.max_output_channels
            )));
        }

        let device = self.device.clone();
        let name = self.name.clone();
        let format = *format;
        let sample_format = self
            .device
            .default_output_config()
            .map(|c| c.sample_format())
            .unwrap_or(cpal::SampleFormat::F32);

        StreamHandle::spawn(format!("output {}", self.name), move |stop, started| {
            let span = span!(Level::INFO, "output stream (cpal)", device = name);
            let _enter = span.enter();

            // Prefer one device buffer per engine block; fall back to whatever
            // the host picks if it refuses a fixed size.
            let stream = build_output(&device, &format, true, sample_format, &ring, &ready)
                .or_else(|e| {
                    warn!(err = %e, "Fixed buffer size rejected, using host default");
                    build_output(&device, &format, false, sample_format, &ring, &ready)
                })
                .and_then(|stream| {
                    stream
                        .play()
                        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
                    Ok(stream)
                });

            match stream {
                Ok(stream) => {
                    info!(format = %format, sample_format = %sample_format, "Output stream playing");
                    let _ = started.send(Ok(()));
                    let _ = stop.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = started.send(Err(e));
                }
            }
        })
    }

    fn open_input(
        &self,
        format: &StreamFormat,
        ring: Arc<CircularBuffer>,
    ) -> Result<StreamHandle, EngineError> {
        if self.max_input_channels < format.channels {
            return Err(EngineError::DeviceUnavailable(format!(
                "{} channels requested, input device {} only has {}",
                format.channels, self.name, self.max_input_channels
            )));
        }

        let device = self.device.clone();
        let name = self.name.clone();
        let format = *format;
        let sample_format = self
            .device
            .default_input_config()
            .map(|c| c.sample_format())
            .unwrap_or(cpal::SampleFormat::F32);

        StreamHandle::spawn(format!("input {}", self.name), move |stop, started| {
            let span = span!(Level::INFO, "input stream (cpal)", device = name);
            let _enter = span.enter();

            let stream = build_input(&device, &format, true, sample_format, &ring)
                .or_else(|e| {
                    warn!(err = %e, "Fixed buffer size rejected, using host default");
                    build_input(&device, &format, false, sample_format, &ring)
                })
                .and_then(|stream| {
                    stream
                        .play()
                        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
                    Ok(stream)
                });

            match stream {
                Ok(stream) => {
                    info!(format = %format, sample_format = %sample_format, "Input stream capturing");
                    let _ = started.send(Ok(()));
                    let _ = stop.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = started.send(Err(e));
                }
            }
        })
    }
}

fn build_output(
    device: &cpal::Device,
    format: &StreamFormat,
    fixed: bool,
    sample_format: cpal::SampleFormat,
    ring: &Arc<CircularBuffer>,
    ready: &Sender<()>,
) -> Result<cpal::Stream, EngineError> {
    let config = Device::stream_config(format, fixed);
    let ring = ring.clone();
    let ready = ready.clone();
    match sample_format {
        cpal::SampleFormat::I16 => build_output_stream::<i16>(device, &config, ring, ready),
        cpal::SampleFormat::I32 => build_output_stream::<i32>(device, &config, ring, ready),
        cpal::SampleFormat::U16 => build_output_stream::<u16>(device, &config, ring, ready),
        _ => build_output_stream::<f32>(device, &config, ring, ready),
    }
}

/// Builds an output stream that drains the ring, zero-filling any shortfall,
/// and signals `ready` after every callback.
fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: Arc<CircularBuffer>,
    ready: Sender<()>,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let scratch = &mut scratch[..data.len()];
                let read = ring.read(scratch);
                // Zero-fill any shortfall
                scratch[read..].fill(0.0);

                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src);
                }
                let _ = ready.try_send(());
            },
            |err| error!(err = %err, "Output stream error"),
            None,
        )
        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))
}

fn build_input(
    device: &cpal::Device,
    format: &StreamFormat,
    fixed: bool,
    sample_format: cpal::SampleFormat,
    ring: &Arc<CircularBuffer>,
) -> Result<cpal::Stream, EngineError> {
    let config = Device::stream_config(format, fixed);
    let ring = ring.clone();
    match sample_format {
        cpal::SampleFormat::I16 => build_input_stream::<i16>(device, &config, ring),
        cpal::SampleFormat::I32 => build_input_stream::<i32>(device, &config, ring),
        cpal::SampleFormat::U16 => build_input_stream::<u16>(device, &config, ring),
        _ => build_input_stream::<f32>(device, &config, ring),
    }
}

/// Builds an input stream that pushes converted samples into the ring.
/// Samples that don't fit are dropped, so a full ring keeps its older
/// audio until the engine catches up.
fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: Arc<CircularBuffer>,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
                ring.write(&scratch);
            },
            |err| error!(err = %err, "Input stream error"),
            None,
        )
        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))
}

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

use serde::Deserialize;

use crate::{audio::StreamFormat, engine::DEFAULT_COMMAND_QUEUE_SIZE, error::EngineError};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_BLOCK_SIZE: usize = 512;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The device the mix is played through, usually a virtual cable.
    /// "auto" selects the first virtual cable found.
    output_device: String,

    /// The microphone. When unset, the microphone is silent. "auto" selects
    /// the first device named like a microphone, or the default input.
    input_device: Option<String>,

    /// Engine sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Engine channel count (default: 1)
    channels: Option<u16>,

    /// Frames processed per cycle (default: 512)
    block_size: Option<usize>,

    /// Capacity of the queue between control and engine threads (default: 256)
    command_queue_size: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(output_device: &str, input_device: Option<&str>) -> Audio {
        Audio {
            output_device: output_device.to_string(),
            input_device: input_device.map(str::to_string),
            sample_rate: None,
            channels: None,
            block_size: None,
            command_queue_size: None,
        }
    }

    /// Returns the output device from the configuration.
    pub fn output_device(&self) -> &str {
        self.output_device.trim()
    }

    /// Returns the input device, if one is configured.
    pub fn input_device(&self) -> Option<&str> {
        self.input_device
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Returns the sample rate, defaulting to 44100.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the channel count, defaulting to 1.
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the block size in frames, defaulting to 512.
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the command queue capacity, defaulting to 256.
    pub fn command_queue_size(&self) -> usize {
        self.command_queue_size
            .unwrap_or(DEFAULT_COMMAND_QUEUE_SIZE)
    }

    /// Returns the stream format the engine runs in.
    pub fn format(&self) -> Result<StreamFormat, EngineError> {
        StreamFormat::new(self.sample_rate(), self.channels(), self.block_size())
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let audio = Audio::new("CABLE Input", None);
        assert_eq!(audio.output_device(), "CABLE Input");
        assert_eq!(audio.input_device(), None);
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.block_size(), 512);
        assert_eq!(audio.command_queue_size(), 256);
        assert_eq!(audio.format().unwrap(), StreamFormat::default());
    }

    #[test]
    fn test_deserialize() {
        let audio: Audio = Config::builder()
            .add_source(File::from_str(
                r#"
                output_device: mock-output
                input_device: "  "
                sample_rate: 48000
                channels: 2
                block_size: 256
                "#,
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(audio.output_device(), "mock-output");
        assert_eq!(audio.input_device(), None);
        assert_eq!(
            audio.format().unwrap(),
            StreamFormat::new(48000, 2, 256).unwrap()
        );
    }

    #[test]
    fn test_invalid_format() {
        let mut audio = Audio::new("mock-output", None);
        audio.block_size = Some(0);
        assert!(audio.format().is_err());
    }
}

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

use std::{fmt, time::Duration};

use crate::error::EngineError;

/// The fixed format the engine runs in: sample rate, channel count and the
/// number of frames processed per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Frames per processing cycle.
    pub block_frames: usize,
}

impl StreamFormat {
    /// Creates a new stream format.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        block_frames: usize,
    ) -> Result<StreamFormat, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidArgument(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(EngineError::InvalidArgument(
                "channel count must be greater than 0".to_string(),
            ));
        }
        if block_frames == 0 {
            return Err(EngineError::InvalidArgument(
                "block size must be greater than 0".to_string(),
            ));
        }

        Ok(StreamFormat {
            sample_rate,
            channels,
            block_frames,
        })
    }

    /// The number of interleaved samples in one block.
    pub fn block_len(&self) -> usize {
        self.block_frames * usize::from(self.channels)
    }

    /// The wall-clock length of one block at this sample rate.
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / f64::from(self.sample_rate))
    }
}

impl Default for StreamFormat {
    /// 44.1kHz mono in blocks of 512 frames.
    fn default() -> Self {
        StreamFormat {
            sample_rate: 44100,
            channels: 1,
            block_frames: 512,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} channel(s), {} frames/block",
            self.sample_rate, self.channels, self.block_frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_format_new() {
        let format = StreamFormat::new(48000, 2, 256).unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.channels, 2);
        assert_eq!(format.block_frames, 256);
        assert_eq!(format.block_len(), 512);
    }

    #[test]
    fn test_stream_format_new_invalid() {
        assert!(StreamFormat::new(0, 1, 512).is_err());
        assert!(StreamFormat::new(44100, 0, 512).is_err());
        assert!(StreamFormat::new(44100, 1, 0).is_err());
    }

    #[test]
    fn test_stream_format_default() {
        let format = StreamFormat::default();
        assert_eq!(format, StreamFormat::new(44100, 1, 512).unwrap());
        assert_eq!(format.block_len(), 512);
    }

    #[test]
    fn test_cycle_duration() {
        let format = StreamFormat::new(44100, 1, 441).unwrap();
        assert_eq!(format.cycle_duration(), Duration::from_millis(10));
    }
}

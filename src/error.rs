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

use std::io;

use crate::clips::{ClipId, DecodeError};
use crate::engine::VoiceId;

/// Errors surfaced through the engine's command surface.
///
/// Conditions that occur inside a processing cycle (missing input, a late
/// output device) are never reported here; the audio path absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The clip file could not be decoded. The clip was not added.
    #[error("unable to decode clip: {0}")]
    Decode(#[from] DecodeError),

    #[error("clip {0} not found")]
    ClipNotFound(ClipId),

    #[error("voice {0} not found")]
    VoiceNotFound(VoiceId),

    #[error("no clip is bound to trigger '{0}'")]
    TriggerNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The output device (or an explicitly requested input device) could not be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The command queue between control and audio threads is saturated.
    #[error("command queue is full")]
    QueueFull,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("clip library error: {0}")]
    Library(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Returns true for any of the not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::ClipNotFound(_)
                | EngineError::VoiceNotFound(_)
                | EngineError::TriggerNotFound(_)
        )
    }
}

/// Validates a volume level, which must lie within [0.0, 1.0].
pub fn validate_volume(what: &str, volume: f32) -> Result<f32, EngineError> {
    if volume.is_nan() || !(0.0..=1.0).contains(&volume) {
        return Err(EngineError::InvalidArgument(format!(
            "{} volume must be within [0.0, 1.0], got {}",
            what, volume
        )));
    }
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_volume() {
        assert_eq!(validate_volume("master", 0.0).unwrap(), 0.0);
        assert_eq!(validate_volume("master", 1.0).unwrap(), 1.0);
        assert_eq!(validate_volume("master", 0.25).unwrap(), 0.25);

        assert!(matches!(
            validate_volume("master", 1.01),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_volume("mic", -0.1),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_volume("clip", f32::NAN),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_not_found() {
        assert!(EngineError::ClipNotFound(ClipId::new(3)).is_not_found());
        assert!(EngineError::VoiceNotFound(VoiceId::new(3)).is_not_found());
        assert!(!EngineError::QueueFull.is_not_found());
    }
}

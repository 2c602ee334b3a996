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
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;
use tracing::info;

use crate::{
    controller::{keyboard, Controller},
    engine::{Engine, EngineSettings, MixLevels},
    library::Library,
};

pub mod audio;
mod error;

pub use self::audio::Audio;
pub use self::error::ConfigError;

const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_millis(500);

/// A YAML representation of the soundboard configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Talkless {
    /// The audio configuration.
    audio: Audio,

    /// The clip library directory. Relative paths are resolved against the
    /// directory holding the configuration file. When unset, clips are kept
    /// in memory only.
    library: Option<String>,

    /// Initial master volume (default: 1.0)
    master_volume: Option<f32>,

    /// Initial microphone volume (default: 1.0)
    mic_volume: Option<f32>,

    /// Initial global clip volume (default: 1.0)
    clip_volume: Option<f32>,

    /// Maximum number of clips. Unlimited when unset.
    max_clips: Option<usize>,

    /// How often the status line is logged (default: 500ms)
    status_interval: Option<String>,
}

impl Talkless {
    /// Creates a new configuration.
    pub fn new(audio: Audio, library: Option<&str>) -> Talkless {
        Talkless {
            audio,
            library: library.map(str::to_string),
            master_volume: None,
            mic_volume: None,
            clip_volume: None,
            max_clips: None,
            status_interval: None,
        }
    }

    /// Deserializes a file from the path into a configuration struct.
    pub fn deserialize(path: &Path) -> Result<Talkless, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Talkless>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the library directory, resolved against `base`.
    pub fn library(&self, base: &Path) -> Option<PathBuf> {
        let library = self.library.as_deref()?.trim();
        if library.is_empty() {
            return None;
        }
        Some(base.join(library))
    }

    /// Returns the initial mix levels.
    pub fn levels(&self) -> MixLevels {
        let defaults = MixLevels::default();
        MixLevels {
            master: self.master_volume.unwrap_or(defaults.master),
            mic: self.mic_volume.unwrap_or(defaults.mic),
            clip: self.clip_volume.unwrap_or(defaults.clip),
        }
    }

    pub fn max_clips(&self) -> Option<usize> {
        self.max_clips
    }

    /// Returns the status logging interval, defaulting to 500ms. The
    /// interval must be non-zero.
    pub fn status_interval(&self) -> Result<Duration, ConfigError> {
        let Some(interval) = &self.status_interval else {
            return Ok(DEFAULT_STATUS_INTERVAL);
        };
        let duration: Duration = DurationString::from_string(interval.clone())
            .map_err(|e| ConfigError::Duration(interval.clone(), e.to_string()))?
            .into();
        if duration.is_zero() {
            return Err(ConfigError::Duration(
                interval.clone(),
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(duration)
    }

    /// Returns the settings used to construct the engine.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            format: self.audio.format()?,
            command_queue_size: self.audio.command_queue_size(),
            levels: self.levels(),
            max_clips: self.max_clips,
        })
    }
}

/// Builds an engine from the configuration: resolves the devices, and loads
/// the clip library if one is configured.
pub fn init_engine(config: &Talkless, base: &Path) -> Result<Engine, ConfigError> {
    let output = crate::audio::get_output_device(config.audio().output_device())?;
    let input = crate::audio::get_input_device(config.audio().input_device());
    let engine = Engine::new(config.engine_settings()?, output, input)?;

    Ok(match config.library(base) {
        Some(root) => engine.with_library(Library::open(&root)?),
        None => {
            info!("No library configured, clips are kept in memory only");
            engine
        }
    })
}

/// Loads the configuration at the given path, starts the engine and wires the
/// keyboard controller up to it.
pub fn init_engine_and_controller(config_path: &Path) -> Result<Controller, Box<dyn Error>> {
    let config = Talkless::deserialize(config_path)?;
    let base = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let status_interval = config.status_interval()?;

    let engine = Arc::new(init_engine(&config, &base)?);
    engine.start()?;

    Ok(Controller::new(
        engine,
        Arc::new(keyboard::Driver::new()),
        status_interval,
    ))
}

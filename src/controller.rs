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

use std::{io, path::PathBuf, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, Sender},
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{error, info, span, Instrument, Level};

use crate::{
    clips::ClipId,
    engine::{Engine, VoiceId},
    error::EngineError,
};

pub mod keyboard;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Plays a clip.
    Trigger(ClipId),

    /// Plays the clip bound to a trigger string.
    TriggerBinding(String),

    /// Stops a single voice.
    StopVoice(VoiceId),

    /// Stops every voice.
    StopAll,

    MasterVolume(f32),

    MicVolume(f32),

    /// Sets the multiplier applied to every clip.
    GlobalClipVolume(f32),

    /// Sets the volume of one clip.
    ClipVolume(ClipId, f32),

    /// Imports a file as a new clip.
    Import { path: PathBuf, name: String },

    Delete(ClipId),

    Bind(ClipId, String),

    Unbind(ClipId, String),

    /// Prints the clips.
    List,

    /// Prints the engine status.
    Status,

    /// Stops the engine and the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives an engine from a driver's events and logs its status periodically.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(engine: Arc<Engine>, driver: Arc<dyn Driver>, status_interval: Duration) -> Controller {
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(engine, driver, status_interval)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine behavior by watching the driver and getting events from it.
    async fn trigger_events(engine: Arc<Engine>, driver: Arc<dyn Driver>, status_interval: Duration) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        let mut status = tokio::time::interval(status_interval);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_status = String::new();

        info!(clips = engine.status().clips_loaded, "Controller started.");

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if event == Event::Quit {
                        break;
                    }
                    info!(event = format!("{:?}", event), "Received event.");
                    if let Err(e) = Controller::handle_event(&engine, event).await {
                        error!("Error talking to engine: {}", e);
                    }
                }
                _ = status.tick() => {
                    let current = engine.status().to_string();
                    if current != last_status {
                        info!(status = current, "Engine status");
                        last_status = current;
                    }
                }
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        if engine.is_running() {
            if let Err(e) = engine.stop() {
                error!("Error stopping engine: {}", e);
            }
        }
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
    }

    async fn handle_event(engine: &Arc<Engine>, event: Event) -> Result<(), EngineError> {
        match event {
            Event::Trigger(clip) => {
                let voice = engine.trigger_clip(clip)?;
                println!("Playing clip {} as voice {}", clip, voice);
            }
            Event::TriggerBinding(binding) => {
                let voice = engine.trigger_binding(&binding)?;
                println!("Playing '{}' as voice {}", binding, voice);
            }
            Event::StopVoice(voice) => engine.stop_voice(voice)?,
            Event::StopAll => engine.stop_all_voices()?,
            Event::MasterVolume(volume) => engine.set_master_volume(volume)?,
            Event::MicVolume(volume) => engine.set_mic_volume(volume)?,
            Event::GlobalClipVolume(volume) => engine.set_global_clip_volume(volume)?,
            Event::ClipVolume(clip, volume) => engine.set_clip_volume(clip, volume)?,
            Event::Import { path, name } => {
                // Decoding can take a while; keep it off the async workers.
                let importer = engine.clone();
                let clip = tokio::task::spawn_blocking(move || importer.import_clip(&path, &name))
                    .await
                    .map_err(|e| EngineError::Library(format!("import task failed: {}", e)))??;
                println!("Imported {}", engine.clip_info(clip)?);
            }
            Event::Delete(clip) => engine.delete_clip(clip)?,
            Event::Bind(clip, binding) => {
                let binding = engine.assign_trigger(clip, &binding)?;
                println!("Bound '{}' to clip {}", binding, clip);
            }
            Event::Unbind(clip, binding) => engine.unassign_trigger(clip, &binding)?,
            Event::List => {
                let clips = engine.list_clips();
                if clips.is_empty() {
                    println!("No clips.");
                }
                for clip in clips {
                    println!("- {}", clip);
                }
            }
            Event::Status => println!("{}", engine.status()),
            Event::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Mutex};

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use super::{Controller, Driver, Event};
    use crate::{
        audio::mock,
        clips::ClipId,
        engine::{Engine, EngineSettings},
        testutil::write_wav,
    };

    /// A driver that replays a fixed list of events.
    struct TestDriver {
        events: Mutex<Vec<Event>>,
    }

    impl TestDriver {
        fn new(events: Vec<Event>) -> TestDriver {
            TestDriver {
                events: Mutex::new(events),
            }
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events: Vec<Event> = self
                .events
                .lock()
                .expect("failed to get lock")
                .drain(..)
                .collect();
            tokio::task::spawn_blocking(move || {
                for event in events {
                    if events_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("horn.wav");
        write_wav(source.clone(), &[0.5; 4410], 1, 44100)?;

        let output = mock::Device::get("mock-output");
        let engine = std::sync::Arc::new(Engine::new(
            EngineSettings::default(),
            std::sync::Arc::new(output.clone()),
            None,
        )?);
        engine.start()?;

        let driver = std::sync::Arc::new(TestDriver::new(vec![
            Event::Import {
                path: source,
                name: "Horn".to_string(),
            },
            Event::ClipVolume(ClipId::new(1), 0.5),
            Event::Bind(ClipId::new(1), "F2".to_string()),
            Event::TriggerBinding("f2".to_string()),
            Event::MasterVolume(0.9),
            Event::MicVolume(0.3),
            Event::GlobalClipVolume(0.7),
            // Rejected, and must not stop the controller.
            Event::MasterVolume(3.0),
            Event::Trigger(ClipId::new(42)),
            Event::List,
            Event::Status,
            Event::Quit,
        ]));
        let mut controller = Controller::new(
            engine.clone(),
            driver,
            std::time::Duration::from_millis(10),
        );
        controller.join().await?;

        assert!(!engine.is_running());
        let clips = engine.list_clips();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].name, "Horn");
        assert_eq!(clips[0].volume, 0.5);
        assert_eq!(clips[0].triggers, vec!["f2".to_string()]);

        let status = engine.status();
        assert_eq!(status.master_volume, 0.9);
        assert_eq!(status.mic_volume, 0.3);
        assert_eq!(status.clip_volume, 0.7);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_stops_when_driver_closes() -> Result<(), Box<dyn Error>> {
        let engine = std::sync::Arc::new(Engine::new(
            EngineSettings::default(),
            std::sync::Arc::new(mock::Device::get("mock-output")),
            None,
        )?);
        engine.start()?;

        let mut controller = Controller::new(
            engine.clone(),
            std::sync::Arc::new(TestDriver::new(vec![Event::StopAll])),
            std::time::Duration::from_millis(10),
        );
        controller.join().await?;
        assert!(!engine.is_running());
        Ok(())
    }
}

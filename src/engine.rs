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

//! The real-time engine and its command surface.
//!
//! A dedicated engine thread runs capture, voice rendering, mixing and output
//! once per block, woken by the output device. Everything else talks to it
//! through [`Engine`], whose methods are safe to call from any thread.

use std::{
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        thread_priority::{
            audio_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
        },
        CircularBuffer, Device, StreamFormat, StreamHandle,
    },
    clips::{decode_file, ClipId, ClipInfo, ClipStore},
    error::{validate_volume, EngineError},
    library::Library,
};

pub mod capture;
pub mod command;
pub mod mixer;
pub mod output;
pub mod params;
pub mod processor;
pub mod voice;

use self::{
    capture::CapturePath,
    command::{Command, CommandSender},
    output::OutputPath,
    processor::{Processor, ProcessorStats},
};
pub use self::{
    params::{MixLevels, MixParams},
    voice::{VoiceId, VoiceState},
};

/// Blocks of microphone input buffered between the capture device and the
/// engine thread.
const CAPTURE_BUFFERED_BLOCKS: usize = 4;

/// Default capacity of the command queue.
pub const DEFAULT_COMMAND_QUEUE_SIZE: usize = 256;

/// Construction-time settings for an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub format: StreamFormat,
    pub command_queue_size: usize,
    pub levels: MixLevels,
    pub max_clips: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            format: StreamFormat::default(),
            command_queue_size: DEFAULT_COMMAND_QUEUE_SIZE,
            levels: MixLevels::default(),
            max_clips: None,
        }
    }
}

/// A snapshot of the engine state, cheap enough to poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub running: bool,
    pub clips_loaded: usize,
    pub master_volume: f32,
    pub mic_volume: f32,
    pub clip_volume: f32,
    pub active_voice_count: usize,
    pub cycles: u64,
    pub normalized_blocks: u64,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | clips: {} | voices: {} | master {:.2} mic {:.2} clips {:.2}",
            if self.running { "running" } else { "stopped" },
            self.clips_loaded,
            self.active_voice_count,
            self.master_volume,
            self.mic_volume,
            self.clip_volume
        )
    }
}

/// Clip metadata and where it's persisted.
struct Catalog {
    store: ClipStore,
    library: Option<Library>,
}

impl Catalog {
    /// Writes a clip's volume and triggers back to the library, if any.
    fn persist(&mut self, id: ClipId) {
        let Some(library) = self.library.as_mut() else {
            return;
        };
        match self.store.info(id) {
            Ok(info) => {
                if let Err(e) = library.update(&info) {
                    error!(clip = %id, err = %e, "Unable to persist clip");
                }
            }
            Err(e) => warn!(clip = %id, err = %e, "Clip vanished before it was persisted"),
        }
    }
}

/// The engine thread and the device streams it runs against.
struct Running {
    shutdown: Arc<AtomicBool>,
    thread: thread::JoinHandle<Processor>,
    input: Option<StreamHandle>,
    output: StreamHandle,
}

/// Either the idle processor or the running engine thread that owns it.
struct Lifecycle {
    processor: Option<Processor>,
    running: Option<Running>,
}

/// The soundboard engine.
pub struct Engine {
    format: StreamFormat,
    output_device: Arc<dyn Device>,
    input_device: Option<Arc<dyn Device>>,
    /// Lock order: catalog before lifecycle.
    catalog: RwLock<Catalog>,
    lifecycle: Mutex<Lifecycle>,
    params: Arc<MixParams>,
    commands: CommandSender,
    /// Kept to rebuild the processor if the engine thread is lost.
    command_rx: Receiver<Command>,
    stats: Arc<ProcessorStats>,
    running: AtomicBool,
    next_voice: AtomicU64,
}

impl Engine {
    /// Creates a stopped engine with an empty, in-memory clip store.
    pub fn new(
        settings: EngineSettings,
        output_device: Arc<dyn Device>,
        input_device: Option<Arc<dyn Device>>,
    ) -> Result<Engine, EngineError> {
        let params = Arc::new(MixParams::new(settings.levels)?);
        let (commands, command_rx) = command::queue(settings.command_queue_size);
        let stats = Arc::new(ProcessorStats::default());
        let processor = Processor::new(
            &settings.format,
            params.clone(),
            command_rx.clone(),
            stats.clone(),
        );

        info!(
            format = %settings.format,
            output = %output_device,
            input = input_device
                .as_ref()
                .map(|device| device.to_string())
                .unwrap_or_else(|| "none".to_string()),
            "Engine created"
        );

        Ok(Engine {
            format: settings.format,
            output_device,
            input_device,
            catalog: RwLock::new(Catalog {
                store: ClipStore::new(settings.format).with_max_clips(settings.max_clips),
                library: None,
            }),
            lifecycle: Mutex::new(Lifecycle {
                processor: Some(processor),
                running: None,
            }),
            params,
            commands,
            command_rx,
            stats,
            running: AtomicBool::new(false),
            next_voice: AtomicU64::new(1),
        })
    }

    /// Backs the clip store with a library: every clip it holds is loaded
    /// now, and later changes are written back to it.
    pub fn with_library(self, library: Library) -> Engine {
        {
            let mut catalog = self.catalog.write();
            library.load_into(&mut catalog.store);
            catalog.library = Some(library);
        }
        self
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    /// Opens the devices and starts the engine thread. Fails with
    /// `DeviceUnavailable` if the output can't be opened; a capture device
    /// that can't be opened only leaves the microphone silent.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let block_len = self.format.block_len();
        let output_ring = Arc::new(CircularBuffer::new(
            block_len * OutputPath::BUFFERED_BLOCKS,
        ));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let output = self
            .output_device
            .open_output(&self.format, output_ring.clone(), ready_tx)?;

        let (input, capture) = match &self.input_device {
            Some(device) => {
                let ring = Arc::new(CircularBuffer::new(block_len * CAPTURE_BUFFERED_BLOCKS));
                match device.open_input(&self.format, ring.clone()) {
                    Ok(handle) => (Some(handle), CapturePath::from_ring(ring, block_len)),
                    Err(e) => {
                        warn!(device = %device, err = %e, "Unable to open input device, microphone is silent");
                        (None, CapturePath::silent(block_len))
                    }
                }
            }
            None => (None, CapturePath::silent(block_len)),
        };

        let mut processor = lifecycle
            .processor
            .take()
            .unwrap_or_else(|| self.new_processor());
        processor.connect(capture, OutputPath::new(output_ring, ready_rx, block_len));

        let shutdown = Arc::new(AtomicBool::new(false));
        let cycle = self.format.cycle_duration();
        let priority = audio_thread_priority();
        let rt_audio = rt_audio_enabled();
        let thread = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("talkless-engine".to_string())
                .spawn(move || {
                    configure_audio_thread_priority(priority, rt_audio);
                    processor.run(shutdown, cycle)
                })?
        };

        lifecycle.running = Some(Running {
            shutdown,
            thread,
            input,
            output,
        });
        self.running.store(true, Ordering::Release);
        info!(format = %self.format, "Engine started");
        Ok(())
    }

    /// Stops the engine thread, releases the devices and retires every voice.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        let running = lifecycle.running.take().ok_or(EngineError::NotRunning)?;

        running.shutdown.store(true, Ordering::Release);
        let mut processor = match running.thread.join() {
            Ok(processor) => processor,
            Err(_) => {
                error!("Engine thread panicked");
                self.new_processor()
            }
        };
        drop(running.input);
        drop(running.output);

        processor.disconnect();
        lifecycle.processor = Some(processor);
        self.running.store(false, Ordering::Release);
        info!("Engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Decodes a file and adds it as a new clip. Decoding happens on the
    /// calling thread before the clip becomes visible.
    pub fn import_clip(&self, path: &Path, name: &str) -> Result<ClipId, EngineError> {
        let name = match name.trim() {
            "" => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("clip")
                .to_string(),
            name => name.to_string(),
        };

        self.catalog.read().store.check_capacity()?;
        let audio = decode_file(path, &self.format)?;
        let staged = {
            let catalog = self.catalog.read();
            match &catalog.library {
                Some(library) => Some(library.stage(path)?),
                None => None,
            }
        };

        let mut guard = self.catalog.write();
        let Catalog { store, library } = &mut *guard;
        let id = match store.insert(&name, audio) {
            Ok(id) => id,
            Err(e) => {
                discard_staged(staged.as_deref());
                return Err(e);
            }
        };
        if let (Some(library), Some(staged)) = (library.as_mut(), staged.as_deref()) {
            let recorded = store.info(id).and_then(|info| library.add(&info, staged));
            if let Err(e) = recorded {
                let _ = store.delete(id);
                discard_staged(Some(staged));
                return Err(e);
            }
        }

        info!(clip = %id, name, file = %path.display(), "Clip imported");
        Ok(id)
    }

    /// Deletes a clip. Voices still playing it are dropped on the next cycle.
    pub fn delete_clip(&self, id: ClipId) -> Result<(), EngineError> {
        let mut catalog = self.catalog.write();
        catalog.store.get(id)?;
        self.dispatch(Command::StopClip(id))?;
        catalog.store.delete(id)?;
        if let Some(library) = catalog.library.as_mut() {
            if let Err(e) = library.remove(id) {
                error!(clip = %id, err = %e, "Unable to remove clip from library");
            }
        }
        info!(clip = %id, "Clip deleted");
        Ok(())
    }

    /// Sets a clip's volume, including for voices already playing it.
    pub fn set_clip_volume(&self, id: ClipId, volume: f32) -> Result<(), EngineError> {
        let volume = validate_volume("clip", volume)?;
        let mut catalog = self.catalog.write();
        catalog.store.get(id)?;
        self.dispatch(Command::SetClipVolume { clip: id, volume })?;
        catalog.store.set_volume(id, volume)?;
        catalog.persist(id);
        Ok(())
    }

    pub fn list_clips(&self) -> Vec<ClipInfo> {
        self.catalog.read().store.list()
    }

    pub fn clip_info(&self, id: ClipId) -> Result<ClipInfo, EngineError> {
        self.catalog.read().store.info(id)
    }

    /// Starts a new voice of the clip.
    pub fn trigger_clip(&self, id: ClipId) -> Result<VoiceId, EngineError> {
        // Held across dispatch so a concurrent delete queues its StopClip
        // after this trigger.
        let catalog = self.catalog.read();
        let (clip, volume) = catalog.store.get(id)?;
        let voice = VoiceId::new(self.next_voice.fetch_add(1, Ordering::Relaxed));
        self.dispatch(Command::Trigger {
            voice,
            clip,
            volume,
        })?;
        debug!(clip = %id, voice = %voice, "Clip triggered");
        Ok(voice)
    }

    /// Triggers the clip bound to the given trigger string.
    pub fn trigger_binding(&self, binding: &str) -> Result<VoiceId, EngineError> {
        let id = self.catalog.read().store.clip_for_trigger(binding)?;
        self.trigger_clip(id)
    }

    /// Stops a voice. Stopping a voice that already finished is a no-op;
    /// only IDs never handed out are rejected.
    pub fn stop_voice(&self, id: VoiceId) -> Result<(), EngineError> {
        if id.value() == 0 || id.value() >= self.next_voice.load(Ordering::Relaxed) {
            return Err(EngineError::VoiceNotFound(id));
        }
        self.dispatch(Command::StopVoice(id))
    }

    pub fn stop_all_voices(&self) -> Result<(), EngineError> {
        self.dispatch(Command::StopAll)
    }

    pub fn set_master_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.params.set_master(volume)
    }

    pub fn set_mic_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.params.set_mic(volume)
    }

    pub fn set_global_clip_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.params.set_clip(volume)
    }

    /// Binds a trigger string to a clip. Returns the normalized binding.
    pub fn assign_trigger(&self, id: ClipId, binding: &str) -> Result<String, EngineError> {
        let mut catalog = self.catalog.write();
        let binding = catalog.store.assign_trigger(id, binding)?;
        catalog.persist(id);
        Ok(binding)
    }

    pub fn unassign_trigger(&self, id: ClipId, binding: &str) -> Result<(), EngineError> {
        let mut catalog = self.catalog.write();
        catalog.store.unassign_trigger(id, binding)?;
        catalog.persist(id);
        Ok(())
    }

    pub fn status(&self) -> Status {
        let levels = self.params.snapshot();
        Status {
            running: self.is_running(),
            clips_loaded: self.catalog.read().store.len(),
            master_volume: levels.master,
            mic_volume: levels.mic,
            clip_volume: levels.clip,
            active_voice_count: self.stats.active_voices(),
            cycles: self.stats.cycles(),
            normalized_blocks: self.stats.normalized_blocks(),
        }
    }

    /// Routes a command to the engine thread, or straight to the idle
    /// processor while stopped.
    fn dispatch(&self, command: Command) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running.is_none() {
            if let Some(processor) = lifecycle.processor.as_mut() {
                processor.apply(command);
                return Ok(());
            }
        }
        self.commands.send(command)
    }

    fn new_processor(&self) -> Processor {
        Processor::new(
            &self.format,
            self.params.clone(),
            self.command_rx.clone(),
            self.stats.clone(),
        )
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                error!(err = %e, "Error stopping engine");
            }
        }
    }
}

fn discard_staged(staged: Option<&Path>) {
    if let Some(staged) = staged {
        if let Err(e) = std::fs::remove_file(staged) {
            warn!(file = %staged.display(), err = %e, "Unable to remove staged clip file");
        }
    }
}

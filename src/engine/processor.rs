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
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::Receiver;
use tracing::{debug, info, span, Level};

use super::{
    capture::CapturePath,
    command::Command,
    mixer::MixBus,
    output::OutputPath,
    params::MixParams,
    voice::VoicePool,
};
use crate::audio::StreamFormat;

/// Voices the pool holds before it has to grow.
const INITIAL_VOICE_CAPACITY: usize = 64;

/// Counters published by the engine thread for the control side.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    active_voices: AtomicUsize,
    cycles: AtomicU64,
    normalized_blocks: AtomicU64,
}

impl ProcessorStats {
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Blocks that had to be scaled down to avoid clipping.
    pub fn normalized_blocks(&self) -> u64 {
        self.normalized_blocks.load(Ordering::Relaxed)
    }

    fn reset_voices(&self) {
        self.active_voices.store(0, Ordering::Relaxed);
    }
}

/// Owns everything the engine thread touches: the voice pool, the capture and
/// output paths and the scratch blocks. One `cycle` produces one output block.
pub struct Processor {
    params: Arc<MixParams>,
    commands: Receiver<Command>,
    pool: VoicePool,
    capture: CapturePath,
    output: Option<OutputPath>,
    bus: MixBus,
    voice_block: Vec<f32>,
    stats: Arc<ProcessorStats>,
}

impl Processor {
    pub fn new(
        format: &StreamFormat,
        params: Arc<MixParams>,
        commands: Receiver<Command>,
        stats: Arc<ProcessorStats>,
    ) -> Processor {
        let block_len = format.block_len();
        Processor {
            params,
            commands,
            pool: VoicePool::new(INITIAL_VOICE_CAPACITY),
            capture: CapturePath::silent(block_len),
            output: None,
            bus: MixBus::new(block_len),
            voice_block: vec![0.0; block_len],
            stats,
        }
    }

    /// Attaches device streams for the next run.
    pub fn connect(&mut self, capture: CapturePath, output: OutputPath) {
        self.capture = capture;
        self.output = Some(output);
    }

    /// Detaches device streams and retires every voice, along with any
    /// commands still queued.
    pub fn disconnect(&mut self) {
        self.capture = CapturePath::silent(self.bus.len());
        self.output = None;
        while self.commands.try_recv().is_ok() {}
        let retired = self.pool.len();
        self.pool.clear();
        self.stats.reset_voices();
        if retired > 0 {
            debug!(retired, "Retired voices");
        }
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Applies a single command to the voice pool.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Trigger {
                voice,
                clip,
                volume,
            } => self.pool.add(voice, clip, volume),
            Command::StopVoice(voice) => {
                self.pool.stop(voice);
            }
            Command::StopAll => {
                self.pool.stop_all();
            }
            Command::StopClip(clip) => {
                self.pool.stop_clip(clip);
            }
            Command::SetClipVolume { clip, volume } => self.pool.set_clip_volume(clip, volume),
        }
    }

    /// Applies every queued command in order.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    /// Produces the next block: drain commands, capture, render voices, mix.
    pub fn render(&mut self) -> &[f32] {
        self.drain_commands();
        let levels = self.params.snapshot();

        self.bus.begin(self.capture.next_block(levels.mic));
        let bus = &mut self.bus;
        self.pool
            .render(levels.clip, &mut self.voice_block, |block| bus.add(block));
        self.stats
            .active_voices
            .store(self.pool.active_count(), Ordering::Relaxed);

        self.bus.finish(levels.master);
        if self.bus.was_normalized() {
            self.stats.normalized_blocks.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.bus.block()
    }

    /// Renders one block and hands it to the output, if connected.
    pub fn cycle(&mut self) {
        self.render();
        if let Some(output) = &self.output {
            output.deliver(self.bus.block());
        }
    }

    /// The engine thread body. Runs a cycle every time the output has room
    /// for a block, until `shutdown` is set. Hands the processor back so it
    /// can be reused by the next start.
    pub fn run(mut self, shutdown: Arc<AtomicBool>, cycle: Duration) -> Processor {
        let span = span!(Level::INFO, "engine cycle");
        let _enter = span.enter();
        info!(live_capture = self.capture.is_live(), "Engine thread running");

        while !shutdown.load(Ordering::Acquire) {
            let ready = match &self.output {
                Some(output) => output.wait_for_space(cycle),
                None => break,
            };
            if ready {
                self.cycle();
            }
        }

        info!(cycles = self.stats.cycles(), "Engine thread stopped");
        self
    }
}

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

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::VoiceId;
use crate::{
    clips::{Clip, ClipId},
    error::EngineError,
};

/// A request from the control side to the engine thread. Drained once per
/// cycle, in the order sent.
pub enum Command {
    /// Start a new voice of the clip at offset 0.
    Trigger {
        voice: VoiceId,
        clip: Arc<Clip>,
        volume: f32,
    },
    /// Finish a single voice.
    StopVoice(VoiceId),
    /// Finish every voice.
    StopAll,
    /// Finish every voice of a clip. Sent when the clip is deleted.
    StopClip(ClipId),
    /// Change the effective volume of every live voice of a clip.
    SetClipVolume { clip: ClipId, volume: f32 },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Trigger {
                voice,
                clip,
                volume,
            } => f
                .debug_struct("Trigger")
                .field("voice", voice)
                .field("clip", &clip.id())
                .field("volume", volume)
                .finish(),
            Command::StopVoice(voice) => f.debug_tuple("StopVoice").field(voice).finish(),
            Command::StopAll => f.write_str("StopAll"),
            Command::StopClip(clip) => f.debug_tuple("StopClip").field(clip).finish(),
            Command::SetClipVolume { clip, volume } => f
                .debug_struct("SetClipVolume")
                .field("clip", clip)
                .field("volume", volume)
                .finish(),
        }
    }
}

/// The control side of the command queue. Never blocks.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::QueueFull,
            TrySendError::Disconnected(_) => EngineError::NotRunning,
        })
    }
}

/// Creates a bounded command queue.
pub fn queue(capacity: usize) -> (CommandSender, Receiver<Command>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (CommandSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full() {
        let (tx, rx) = queue(2);
        tx.send(Command::StopAll).unwrap();
        tx.send(Command::StopVoice(VoiceId::new(1))).unwrap();
        assert!(matches!(
            tx.send(Command::StopAll),
            Err(EngineError::QueueFull)
        ));

        let drained: Vec<Command> = rx.try_iter().collect();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Command::StopAll));
        assert!(matches!(drained[1], Command::StopVoice(id) if id == VoiceId::new(1)));
    }

    #[test]
    fn test_disconnected() {
        let (tx, rx) = queue(2);
        drop(rx);
        assert!(matches!(
            tx.send(Command::StopAll),
            Err(EngineError::NotRunning)
        ));
    }
}

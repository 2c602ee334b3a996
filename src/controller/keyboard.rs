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

use std::{io, path::PathBuf};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::{clips::ClipId, engine::VoiceId};

const PLAY: &str = "play";
const KEY: &str = "key";
const STOP: &str = "stop";
const STOP_ALL: &str = "stop_all";
const MASTER: &str = "master";
const MIC: &str = "mic";
const CLIPS: &str = "clips";
const VOLUME: &str = "volume";
const IMPORT: &str = "import";
const DELETE: &str = "delete";
const BIND: &str = "bind";
const UNBIND: &str = "unbind";
const LIST: &str = "list";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A controller that drives the engine from line commands on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and dispatches one line. Returns false once input is exhausted
    /// or the user quit.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <clip>, {} <binding>, {} <voice>, {}, {}|{}|{} <v>, {} <clip> <v>, {} <path> <name>, {} <clip>, {}|{} <clip> <binding>, {}, {}, {}): ",
            PLAY, KEY, STOP, STOP_ALL, MASTER, MIC, CLIPS, VOLUME, IMPORT, DELETE, BIND, UNBIND, LIST, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(Some(event)) => {
                let quit = event == Event::Quit;
                events_tx
                    .blocking_send(event)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                Ok(!quit)
            }
            Ok(None) => Ok(true),
            Err(reason) => {
                warn!(input = input.trim(), reason, "Unrecognized input");
                Ok(true)
            }
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses a command line into an event. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Event>, String> {
    let line = line.trim();
    let Some((command, rest)) = split_word(line) else {
        return Ok(None);
    };

    let event = match command.to_lowercase().as_str() {
        PLAY => Event::Trigger(clip_id(rest)?),
        KEY => Event::TriggerBinding(required(rest, "binding")?.to_string()),
        STOP => Event::StopVoice(VoiceId::new(number(rest, "voice")?)),
        STOP_ALL => Event::StopAll,
        MASTER => Event::MasterVolume(volume(rest)?),
        MIC => Event::MicVolume(volume(rest)?),
        CLIPS => Event::GlobalClipVolume(volume(rest)?),
        VOLUME => {
            let (clip, rest) = split_word(rest).ok_or("missing clip")?;
            Event::ClipVolume(clip_id(clip)?, volume(rest)?)
        }
        IMPORT => {
            let (path, name) = split_word(rest).ok_or("missing path")?;
            Event::Import {
                path: PathBuf::from(path),
                name: name.to_string(),
            }
        }
        DELETE => Event::Delete(clip_id(rest)?),
        BIND => {
            let (clip, binding) = split_word(rest).ok_or("missing clip")?;
            Event::Bind(clip_id(clip)?, required(binding, "binding")?.to_string())
        }
        UNBIND => {
            let (clip, binding) = split_word(rest).ok_or("missing clip")?;
            Event::Unbind(clip_id(clip)?, required(binding, "binding")?.to_string())
        }
        LIST => Event::List,
        STATUS => Event::Status,
        QUIT => Event::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(event))
}

/// Splits off the first whitespace-separated word.
fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    Some(match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    })
}

fn required<'a>(input: &'a str, what: &str) -> Result<&'a str, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(format!("missing {}", what));
    }
    Ok(input)
}

fn number(input: &str, what: &str) -> Result<u64, String> {
    let input = required(input, what)?;
    input
        .parse::<u64>()
        .map_err(|_| format!("invalid {} '{}'", what, input))
}

fn clip_id(input: &str) -> Result<ClipId, String> {
    Ok(ClipId::new(number(input, "clip")?))
}

fn volume(input: &str) -> Result<f32, String> {
    let input = required(input, "volume")?;
    input
        .parse::<f32>()
        .map_err(|_| format!("invalid volume '{}'", input))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the engine thread when TALKLESS_THREAD_PRIORITY is unset.
const DEFAULT_AUDIO_THREAD_PRIORITY: u8 = 70;

/// Reads TALKLESS_THREAD_PRIORITY (0-99), falling back to the default.
pub fn audio_thread_priority() -> Option<ThreadPriorityValue> {
    parse_priority(std::env::var("TALKLESS_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> Option<ThreadPriorityValue> {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .or(Some(DEFAULT_AUDIO_THREAD_PRIORITY))
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the engine thread.
/// Default: enabled. Opt out with TALKLESS_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("TALKLESS_DISABLE_RT_AUDIO")
}

/// Raises the priority of the calling thread. Failure is logged and otherwise
/// ignored: the engine still runs, just with more risk of underruns.
pub fn configure_audio_thread_priority(priority: Option<ThreadPriorityValue>, rt_audio: bool) {
    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise audio thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!("Enabled RT SCHED_FIFO for audio thread");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to set RT SCHED_FIFO for audio thread"
                );
            }
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        let default = ThreadPriorityValue::try_from(DEFAULT_AUDIO_THREAD_PRIORITY).unwrap();
        assert_eq!(parse_priority(None), Some(default));
        assert_eq!(parse_priority(Some("garbage")), Some(default));
        assert_eq!(parse_priority(Some("150")), Some(default));
        assert_eq!(
            parse_priority(Some(" 42 ")),
            Some(ThreadPriorityValue::try_from(42u8).unwrap())
        );
    }

    #[test]
    fn test_is_truthy() {
        for value in ["1", "true", "TRUE", "yes", "On"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["0", "false", "", "nope"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}

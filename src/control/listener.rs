//! Keyboard signal source
//!
//! Reads commands line by line and posts them as control events:
//!
//! | Input          | Event         |
//! |----------------|---------------|
//! | `q`, `stop`    | Stop          |
//! | `p`, `pause`   | TogglePause   |
//! | `s`, `save`    | ToggleSave    |
//!
//! Anything else is ignored. Read errors end the listener quietly.

use super::{ControlEvent, ControlHandle};
use std::io::BufRead;
use std::thread::JoinHandle;

/// Map one input line to a control event
pub fn parse_command(line: &str) -> Option<ControlEvent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "q" | "stop" => Some(ControlEvent::Stop),
        "p" | "pause" => Some(ControlEvent::TogglePause),
        "s" | "save" => Some(ControlEvent::ToggleSave),
        _ => None,
    }
}

/// Forward commands from `reader` until EOF, a read error, or the run ends
pub fn listen<R: BufRead>(reader: R, handle: &ControlHandle) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!("Control listener read error: {}", e);
                return;
            }
        };
        let Some(event) = parse_command(&line) else {
            continue;
        };
        if !handle.send(event) {
            tracing::debug!("Control channel closed, listener exiting");
            return;
        }
    }
}

/// Listen on stdin from a detached background thread
pub fn spawn_stdin_listener(handle: ControlHandle) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("control-listener".to_string())
        .spawn(move || {
            tracing::info!("Listening for commands: q = stop, p = pause/resume, s = toggle save");
            let stdin = std::io::stdin();
            listen(stdin.lock(), &handle);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::FlowControl;
    use std::io::Cursor;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("q"), Some(ControlEvent::Stop));
        assert_eq!(parse_command("  PAUSE \n"), Some(ControlEvent::TogglePause));
        assert_eq!(parse_command("s"), Some(ControlEvent::ToggleSave));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_listen_forwards_events() {
        let (mut control, handle) = FlowControl::new(true);
        listen(Cursor::new("p\nnoise\ns\nq\n"), &handle);

        assert_eq!(control.poll(), 1);
        let flags = control.flags();
        assert!(flags.stop);
        assert!(flags.pause);
        assert!(!flags.save);
    }
}

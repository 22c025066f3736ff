//! Cooperative run control
//!
//! Stop, pause and save are driven by an external signal source (a keyboard
//! listener, a test, another thread) and observed by the measurement loop at
//! well-defined points. Sources never touch the flags directly: they post
//! [`ControlEvent`]s through a cloneable [`ControlHandle`], and the loop
//! applies them through its [`FlowControl`].
//!
//! # Semantics
//!
//! - **stop** is terminal. Once set it stays set and later pause toggles are
//!   ignored.
//! - **pause** toggles freely until stop. While paused the loop blocks on the
//!   control channel; a stop releases it immediately.
//! - **save** toggles freely and is read once at the end of the run.
//!
//! If every handle is dropped while the loop is paused, nothing could ever
//! resume it, so the run is treated as stopped.
//!
//! # Example
//!
//! ```
//! use labsweep::control::FlowControl;
//!
//! let (mut control, handle) = FlowControl::new(true);
//! handle.toggle_save();
//! handle.stop();
//!
//! assert_eq!(control.poll(), 1);
//! assert!(control.should_stop());
//! assert!(!control.save_enabled());
//! ```

pub mod listener;

pub use listener::{parse_command, spawn_stdin_listener};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

/// User-issued control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlEvent {
    /// End the run after the current iteration
    Stop,
    /// Pause, or resume a paused run
    TogglePause,
    /// Flip whether results are saved at the end
    ToggleSave,
}

/// Sending side of the control channel
#[derive(Debug, Clone)]
pub struct ControlHandle {
    events: Sender<ControlEvent>,
}

impl ControlHandle {
    /// Post an event. Returns false if the run has already gone away.
    pub fn send(&self, event: ControlEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Request a stop
    pub fn stop(&self) {
        let _ = self.send(ControlEvent::Stop);
    }

    /// Toggle pause
    pub fn toggle_pause(&self) {
        let _ = self.send(ControlEvent::TogglePause);
    }

    /// Toggle save
    pub fn toggle_save(&self) {
        let _ = self.send(ControlEvent::ToggleSave);
    }
}

/// Snapshot of the three control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFlags {
    pub stop: bool,
    pub pause: bool,
    pub save: bool,
}

/// Loop-side owner of the control flags
#[derive(Debug)]
pub struct FlowControl {
    events: Receiver<ControlEvent>,
    flags: ControlFlags,
}

impl FlowControl {
    /// Create the control state and its first handle.
    ///
    /// `save` is the initial value of the save flag.
    pub fn new(save: bool) -> (Self, ControlHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let control = Self {
            events: rx,
            flags: ControlFlags {
                save,
                ..Default::default()
            },
        };
        (control, ControlHandle { events: tx })
    }

    /// Current flags
    pub fn flags(&self) -> ControlFlags {
        self.flags
    }

    /// Whether a stop has been observed
    pub fn should_stop(&self) -> bool {
        self.flags.stop
    }

    /// Whether the loop is paused
    pub fn is_paused(&self) -> bool {
        self.flags.pause && !self.flags.stop
    }

    /// Whether results will be saved
    pub fn save_enabled(&self) -> bool {
        self.flags.save
    }

    /// Apply one event. Returns true if it toggled the save flag.
    pub fn apply(&mut self, event: ControlEvent) -> bool {
        match event {
            ControlEvent::Stop => {
                if !self.flags.stop {
                    tracing::info!("Stop requested");
                }
                self.flags.stop = true;
                false
            }
            ControlEvent::TogglePause => {
                if self.flags.stop {
                    tracing::debug!("Ignoring pause toggle after stop");
                } else {
                    self.flags.pause = !self.flags.pause;
                    tracing::info!("{}", if self.flags.pause { "Paused" } else { "Resumed" });
                }
                false
            }
            ControlEvent::ToggleSave => {
                self.flags.save = !self.flags.save;
                tracing::info!("Save {}", if self.flags.save { "enabled" } else { "disabled" });
                true
            }
        }
    }

    /// Apply every pending event without blocking.
    ///
    /// Returns the number of save toggles applied, so the caller can forward
    /// each one downstream.
    pub fn poll(&mut self) -> usize {
        let mut save_toggles = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.apply(event) {
                        save_toggles += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        save_toggles
    }

    /// Block while paused.
    ///
    /// Returns the number of save toggles applied during the wait.
    pub fn wait_while_paused(&mut self) -> usize {
        let mut save_toggles = 0;
        while self.is_paused() {
            match self.events.recv() {
                Ok(event) => {
                    if self.apply(event) {
                        save_toggles += 1;
                    }
                }
                Err(_) => {
                    tracing::warn!("All control handles dropped while paused, stopping");
                    self.flags.stop = true;
                }
            }
        }
        save_toggles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_flags() {
        let (control, _handle) = FlowControl::new(true);
        assert_eq!(
            control.flags(),
            ControlFlags {
                stop: false,
                pause: false,
                save: true
            }
        );
    }

    #[test]
    fn test_stop_is_terminal() {
        let (mut control, handle) = FlowControl::new(false);
        handle.stop();
        handle.toggle_pause();
        handle.stop();
        control.poll();

        assert!(control.should_stop());
        assert!(!control.flags().pause);
        assert!(!control.is_paused());
    }

    #[test]
    fn test_pause_toggles_until_stop() {
        let (mut control, handle) = FlowControl::new(false);
        handle.toggle_pause();
        control.poll();
        assert!(control.is_paused());

        handle.toggle_pause();
        control.poll();
        assert!(!control.is_paused());
    }

    #[test]
    fn test_poll_counts_save_toggles() {
        let (mut control, handle) = FlowControl::new(true);
        handle.toggle_save();
        handle.toggle_pause();
        handle.toggle_save();
        handle.toggle_save();

        assert_eq!(control.poll(), 3);
        assert!(!control.save_enabled());
        assert_eq!(control.poll(), 0);
    }

    #[test]
    fn test_wait_while_paused_released_by_other_thread() {
        let (mut control, handle) = FlowControl::new(true);
        handle.toggle_pause();
        control.poll();

        let remote = handle.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.toggle_save();
            remote.toggle_pause();
        });

        assert_eq!(control.wait_while_paused(), 1);
        assert!(!control.is_paused());
        assert!(!control.should_stop());
        t.join().unwrap();
    }

    #[test]
    fn test_stop_leaves_pause_wait() {
        let (mut control, handle) = FlowControl::new(false);
        handle.toggle_pause();
        handle.stop();
        control.poll();
        assert_eq!(control.wait_while_paused(), 0);
        assert!(control.should_stop());
    }

    #[test]
    fn test_disconnect_while_paused_stops() {
        let (mut control, handle) = FlowControl::new(false);
        handle.toggle_pause();
        control.poll();
        drop(handle);

        control.wait_while_paused();
        assert!(control.should_stop());
    }

    #[test]
    fn test_send_after_drop_reports_failure() {
        let (control, handle) = FlowControl::new(false);
        drop(control);
        assert!(!handle.send(ControlEvent::Stop));
        // Convenience methods swallow the failure
        handle.stop();
    }
}

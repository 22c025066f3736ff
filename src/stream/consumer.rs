//! Visualization consumers
//!
//! A consumer owns the receiving end of the plot queue. The engine only
//! needs three things from it: a sender to hand to the batcher, a liveness
//! check, and a way to wait for it to finish after the final
//! [`PlotMessage::Stop`].
//!
//! - [`ProcessConsumer`] - a child process fed newline-delimited JSON on stdin
//! - [`ThreadConsumer`] - a [`LineViewer`] on a background thread
//! - [`ChannelConsumer`] - hands the receiver to the caller
//! - [`NullConsumer`] - no visualization at all

use super::message::PlotMessage;
use super::viewer::{LineViewer, ViewerSummary};
use crate::error::{Result, SweepError};
use crossbeam_channel::{Receiver, Sender};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How a consumer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Finished on its own
    Exited,
    /// Killed after the exit timeout
    Killed,
    /// Still running after the timeout and left behind
    Detached,
}

/// Receiving side of the plot queue
pub trait VisualizationConsumer: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Sender for the batcher, or `None` if nothing should be streamed
    fn sender(&self) -> Option<Sender<PlotMessage>>;

    /// Whether the consumer is still running
    fn is_alive(&mut self) -> bool;

    /// Wait for the consumer to finish.
    ///
    /// Checks every `poll` and gives up after `timeout`, if one is set.
    fn wait(&mut self, poll: Duration, timeout: Option<Duration>) -> Result<ConsumerExit>;
}

fn timed_out(started: Instant, timeout: Option<Duration>) -> bool {
    timeout.is_some_and(|t| started.elapsed() >= t)
}

/// Child process fed one JSON message per line on stdin
pub struct ProcessConsumer {
    child: Child,
    sender: Sender<PlotMessage>,
    forwarder: Option<JoinHandle<()>>,
}

impl ProcessConsumer {
    /// Spawn `program` with `args` and start forwarding messages to it
    pub fn spawn<I, S>(program: impl Into<OsString>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = program.into();
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SweepError::Consumer(format!(
                    "failed to start {}: {}",
                    program.to_string_lossy(),
                    e
                ))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SweepError::Consumer("child stdin was not captured".to_string()))?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let forwarder = std::thread::Builder::new()
            .name("plot-forwarder".to_string())
            .spawn(move || forward(receiver, stdin))?;

        tracing::info!(
            "Started visualization process {} (pid {})",
            program.to_string_lossy(),
            child.id()
        );
        Ok(Self {
            child,
            sender,
            forwarder: Some(forwarder),
        })
    }

    /// OS process id of the child
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

/// Copy queue messages to the child until stop, disconnect, or a broken pipe
fn forward(receiver: Receiver<PlotMessage>, stdin: ChildStdin) {
    let mut writer = BufWriter::new(stdin);
    for message in receiver.iter() {
        let stop = matches!(message, PlotMessage::Stop);
        let line = match message.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to encode plot message: {}", e);
                continue;
            }
        };
        if let Err(e) = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
        {
            tracing::debug!("Visualization process closed its input: {}", e);
            return;
        }
        if stop {
            break;
        }
    }
    // Dropping the writer closes the pipe, which the child sees as EOF
}

impl VisualizationConsumer for ProcessConsumer {
    fn name(&self) -> &str {
        "process"
    }

    fn sender(&self) -> Option<Sender<PlotMessage>> {
        Some(self.sender.clone())
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn wait(&mut self, poll: Duration, timeout: Option<Duration>) -> Result<ConsumerExit> {
        let started = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                tracing::debug!("Visualization process exited with {}", status);
                if let Some(forwarder) = self.forwarder.take() {
                    let _ = forwarder.join();
                }
                return Ok(ConsumerExit::Exited);
            }
            if timed_out(started, timeout) {
                tracing::warn!("Visualization process did not exit in time, killing it");
                self.child.kill()?;
                let _ = self.child.wait();
                return Ok(ConsumerExit::Killed);
            }
            std::thread::sleep(poll);
        }
    }
}

/// Shared slot where a [`ThreadConsumer`] leaves its viewer summary
pub type SummarySlot = Arc<Mutex<Option<ViewerSummary>>>;

/// In-process viewer on a background thread
pub struct ThreadConsumer {
    sender: Sender<PlotMessage>,
    handle: Option<JoinHandle<()>>,
    summary: SummarySlot,
}

impl ThreadConsumer {
    /// Start `viewer` on its own thread
    pub fn spawn(viewer: LineViewer) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let summary: SummarySlot = Arc::default();
        let slot = summary.clone();
        let handle = std::thread::Builder::new()
            .name("line-viewer".to_string())
            .spawn(move || match viewer.run_channel(receiver) {
                Ok(result) => {
                    if let Ok(mut slot) = slot.lock() {
                        *slot = Some(result);
                    }
                }
                Err(e) => tracing::warn!("Line viewer failed: {}", e),
            })?;
        Ok(Self {
            sender,
            handle: Some(handle),
            summary,
        })
    }

    /// Slot that receives the viewer summary once the thread finishes
    pub fn summary_slot(&self) -> SummarySlot {
        self.summary.clone()
    }
}

impl VisualizationConsumer for ThreadConsumer {
    fn name(&self) -> &str {
        "thread"
    }

    fn sender(&self) -> Option<Sender<PlotMessage>> {
        Some(self.sender.clone())
    }

    fn is_alive(&mut self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn wait(&mut self, poll: Duration, timeout: Option<Duration>) -> Result<ConsumerExit> {
        let started = Instant::now();
        while self.is_alive() {
            if timed_out(started, timeout) {
                tracing::warn!("Line viewer thread did not finish in time, detaching");
                self.handle = None;
                return Ok(ConsumerExit::Detached);
            }
            std::thread::sleep(poll);
        }
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| SweepError::Consumer("line viewer thread panicked".to_string()))?;
        }
        Ok(ConsumerExit::Exited)
    }
}

/// Consumer whose receiver is handed to the caller
pub struct ChannelConsumer {
    sender: Sender<PlotMessage>,
}

impl ChannelConsumer {
    /// Create the consumer and the receiver to read plot messages from
    pub fn new() -> (Self, Receiver<PlotMessage>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl VisualizationConsumer for ChannelConsumer {
    fn name(&self) -> &str {
        "channel"
    }

    fn sender(&self) -> Option<Sender<PlotMessage>> {
        Some(self.sender.clone())
    }

    fn is_alive(&mut self) -> bool {
        false
    }

    fn wait(&mut self, _poll: Duration, _timeout: Option<Duration>) -> Result<ConsumerExit> {
        Ok(ConsumerExit::Exited)
    }
}

/// Consumer that discards everything
#[derive(Debug, Default)]
pub struct NullConsumer;

impl VisualizationConsumer for NullConsumer {
    fn name(&self) -> &str {
        "none"
    }

    fn sender(&self) -> Option<Sender<PlotMessage>> {
        None
    }

    fn is_alive(&mut self) -> bool {
        false
    }

    fn wait(&mut self, _poll: Duration, _timeout: Option<Duration>) -> Result<ConsumerExit> {
        Ok(ConsumerExit::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::message::{LabeledBatch, LabeledColumn};

    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn test_thread_consumer_collects_summary() {
        let mut consumer = ThreadConsumer::spawn(LineViewer::new(None)).unwrap();
        let slot = consumer.summary_slot();
        let tx = consumer.sender().unwrap();

        tx.send(PlotMessage::Data(LabeledBatch {
            columns: vec![LabeledColumn {
                name: "x".into(),
                values: vec![1.0, 2.0],
            }],
        }))
        .unwrap();
        tx.send(PlotMessage::Stop).unwrap();

        assert_eq!(consumer.wait(POLL, None).unwrap(), ConsumerExit::Exited);
        assert!(!consumer.is_alive());
        let summary = slot.lock().unwrap().clone().unwrap();
        assert_eq!(summary.points(), 2);
        assert!(summary.stopped);
    }

    #[test]
    fn test_thread_consumer_detaches_on_timeout() {
        let mut consumer = ThreadConsumer::spawn(LineViewer::new(None)).unwrap();
        // No stop is ever sent
        let exit = consumer
            .wait(POLL, Some(Duration::from_millis(30)))
            .unwrap();
        assert_eq!(exit, ConsumerExit::Detached);
    }

    #[test]
    fn test_channel_consumer_hands_out_receiver() {
        let (mut consumer, rx) = ChannelConsumer::new();
        consumer.sender().unwrap().send(PlotMessage::NewLine).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PlotMessage::NewLine);
        assert_eq!(consumer.wait(POLL, None).unwrap(), ConsumerExit::Exited);
    }

    #[test]
    fn test_null_consumer_has_no_sender() {
        let mut consumer = NullConsumer;
        assert!(consumer.sender().is_none());
        assert!(!consumer.is_alive());
    }

    #[test]
    fn test_missing_program_is_consumer_error() {
        let err = ProcessConsumer::spawn("/definitely/not/a/viewer", Vec::<String>::new())
            .err()
            .unwrap();
        assert!(matches!(err, SweepError::Consumer(_)));
    }
}

//! Streaming of samples to a live visualization consumer
//!
//! The measurement loop never waits on visualization. Samples go through an
//! unbounded FIFO of [`PlotMessage`]s: the [`StreamingBatcher`] cuts each
//! batch at plot-line boundaries and queues labeled segments plus sentinels,
//! and a [`VisualizationConsumer`] drains the queue on its own thread or
//! process.
//!
//! # Protocol
//!
//! - `Data` - one line segment, column name to values
//! - `NewLine` - the following data starts a new plot line
//! - `ToggleSave` - flip the consumer's save flag
//! - `Stop` - final message of a run
//!
//! Consumers must accept `NewLine` and `ToggleSave` at any point.

pub mod batcher;
pub mod consumer;
pub mod message;
pub mod viewer;

pub use batcher::{line_segments, Segment, StreamingBatcher};
pub use consumer::{
    ChannelConsumer, ConsumerExit, NullConsumer, ProcessConsumer, SummarySlot, ThreadConsumer,
    VisualizationConsumer,
};
pub use message::{LabeledBatch, LabeledColumn, PlotMessage};
pub use viewer::{run_viewer, LineViewer, ViewerLine, ViewerSummary};

//! Line segmentation and streaming of sample batches
//!
//! A plot line is one pass over the innermost (fastest) variable, so a line
//! holds `L` points where `L` is the length of that variable's domain. Batches
//! do not line up with lines: a batch may end mid-line, or span several
//! lines. The batcher cuts every batch at line boundaries and prefixes each
//! piece that starts a fresh line with a [`PlotMessage::NewLine`].

use super::message::{LabeledBatch, PlotMessage};
use crate::types::SampleBatch;
use crossbeam_channel::Sender;
use std::ops::Range;

/// Rows of one batch that belong to a single plot line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Row range within the batch
    pub range: Range<usize>,
    /// Whether a new line must be started before these rows
    pub new_line: bool,
}

/// Cut a batch of `rows` rows into line segments.
///
/// `streamed` is the number of points sent before this batch and `line_len`
/// the number of points per line (treated as 1 when zero). Empty segments are
/// never returned.
///
/// ```
/// use labsweep::stream::line_segments;
///
/// let segments = line_segments(0, 7, 3);
/// let ranges: Vec<_> = segments.iter().map(|s| s.range.clone()).collect();
/// assert_eq!(ranges, vec![0..3, 3..6, 6..7]);
/// assert_eq!(
///     segments.iter().map(|s| s.new_line).collect::<Vec<_>>(),
///     vec![false, true, true]
/// );
/// ```
pub fn line_segments(streamed: usize, rows: usize, line_len: usize) -> Vec<Segment> {
    if rows == 0 {
        return Vec::new();
    }
    let l = line_len.max(1);
    let p = streamed;
    let total = p + rows;

    let start = p.div_ceil(l);
    let mut end = total / l;
    if total % l == 0 {
        // Boundary at the very end of the batch belongs to the next batch
        end -= 1;
    }

    let mut bounds = vec![0];
    bounds.extend((start..=end).map(|k| l * k - p));
    bounds.push(rows);
    bounds.dedup();

    bounds
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| {
            let global = p + w[0];
            Segment {
                range: w[0]..w[1],
                new_line: global > 0 && global % l == 0,
            }
        })
        .collect()
}

/// Producer side of the visualization queue
///
/// Sending never blocks. If the consumer has gone away the measurement goes
/// on; the batcher logs once and drops further messages.
#[derive(Debug)]
pub struct StreamingBatcher {
    columns: Vec<String>,
    line_len: usize,
    streamed: usize,
    sender: Sender<PlotMessage>,
    disconnected: bool,
}

impl StreamingBatcher {
    /// Create a batcher for `columns` with `line_len` points per line
    pub fn new(columns: Vec<String>, line_len: usize, sender: Sender<PlotMessage>) -> Self {
        Self {
            columns,
            line_len: line_len.max(1),
            streamed: 0,
            sender,
            disconnected: false,
        }
    }

    /// Points streamed so far
    pub fn streamed(&self) -> usize {
        self.streamed
    }

    /// Whether the consumer end of the queue has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Split `batch` into line segments and queue them.
    ///
    /// Returns the number of messages queued.
    pub fn emit(&mut self, batch: &SampleBatch) -> usize {
        let mut sent = 0;
        for segment in line_segments(self.streamed, batch.len(), self.line_len) {
            if segment.new_line && self.send(PlotMessage::NewLine) {
                sent += 1;
            }
            let data = LabeledBatch::from_segment(&self.columns, batch, segment.range);
            if self.send(PlotMessage::Data(data)) {
                sent += 1;
            }
        }
        self.streamed += batch.len();
        sent
    }

    /// Forward a save toggle
    pub fn toggle_save(&mut self) {
        self.send(PlotMessage::ToggleSave);
    }

    /// Tell the consumer no more data is coming
    pub fn stop(&mut self) {
        self.send(PlotMessage::Stop);
    }

    fn send(&mut self, message: PlotMessage) -> bool {
        if self.disconnected {
            return false;
        }
        if self.sender.send(message).is_err() {
            tracing::warn!("Visualization consumer is gone, dropping further plot messages");
            self.disconnected = true;
            return false;
        }
        true
    }
}

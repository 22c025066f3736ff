//! Consumer-side line accumulator
//!
//! [`LineViewer`] is the headless stand-in for a live plot window. It keeps
//! one column buffer per plot line, tracks the save flag the engine forwards,
//! and on stop writes a JSON summary of what it received (when saving is on
//! and a summary path was given).

use super::message::PlotMessage;
use crate::error::{Result, ResultExt, SweepError};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;

/// Points of one plot line, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerLine {
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl ViewerLine {
    /// Number of points on the line
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns true if the line holds no points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the viewer saw over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerSummary {
    pub lines: Vec<ViewerLine>,
    pub data_messages: usize,
    pub save_toggles: usize,
    pub save: bool,
    pub stopped: bool,
}

impl ViewerSummary {
    /// Total points over all lines
    pub fn points(&self) -> usize {
        self.lines.iter().map(ViewerLine::len).sum()
    }
}

/// Accumulates plot messages into lines
#[derive(Debug)]
pub struct LineViewer {
    summary: ViewerSummary,
    summary_path: Option<PathBuf>,
}

impl LineViewer {
    /// Create a viewer with the save flag on
    pub fn new(summary_path: Option<PathBuf>) -> Self {
        Self {
            summary: ViewerSummary {
                lines: vec![ViewerLine::default()],
                save: true,
                ..Default::default()
            },
            summary_path,
        }
    }

    /// Everything received so far
    pub fn summary(&self) -> &ViewerSummary {
        &self.summary
    }

    /// Apply one message. Returns false once a stop has been received.
    pub fn handle(&mut self, message: PlotMessage) -> bool {
        if self.summary.stopped {
            return false;
        }
        match message {
            PlotMessage::Stop => {
                self.summary.stopped = true;
                return false;
            }
            PlotMessage::ToggleSave => {
                self.summary.save = !self.summary.save;
                self.summary.save_toggles += 1;
            }
            PlotMessage::NewLine => {
                // Consecutive NewLines do not create empty lines
                if self.summary.lines.last().is_some_and(|l| !l.is_empty()) {
                    self.summary.lines.push(ViewerLine::default());
                }
            }
            PlotMessage::Data(batch) => {
                self.summary.data_messages += 1;
                if let Some(line) = self.summary.lines.last_mut() {
                    for column in batch.columns {
                        line.columns
                            .entry(column.name)
                            .or_default()
                            .extend(column.values);
                    }
                }
            }
        }
        true
    }

    /// Drain a channel until stop or disconnect, then finish
    pub fn run_channel(mut self, receiver: Receiver<PlotMessage>) -> Result<ViewerSummary> {
        for message in receiver.iter() {
            if !self.handle(message) {
                break;
            }
        }
        self.finish()
    }

    /// Read JSON lines until stop or EOF, then finish.
    ///
    /// Lines that fail to decode are logged and skipped.
    pub fn run_reader<R: BufRead>(mut self, reader: R) -> Result<ViewerSummary> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match PlotMessage::from_json_line(&line) {
                Ok(message) => {
                    if !self.handle(message) {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed plot message: {}", e),
            }
        }
        self.finish()
    }

    /// Drop a trailing empty line and write the summary if saving
    pub fn finish(mut self) -> Result<ViewerSummary> {
        let trailing_empty = self.summary.lines.last().is_some_and(ViewerLine::is_empty);
        if self.summary.lines.len() > 1 && trailing_empty {
            self.summary.lines.pop();
        }

        tracing::info!(
            "Viewer finished: {} line(s), {} point(s)",
            self.summary.lines.len(),
            self.summary.points()
        );

        if let (true, Some(path)) = (self.summary.save, &self.summary_path) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&self.summary)?;
            std::fs::write(path, json)
                .map_err(SweepError::from)
                .with_context(|| format!("writing viewer summary {}", path.display()))?;
            tracing::info!("Viewer summary saved to {}", path.display());
        }
        Ok(self.summary)
    }
}

/// Run a viewer on stdin, the receiving end of a process consumer
pub fn run_viewer(summary_path: Option<PathBuf>) -> Result<ViewerSummary> {
    let stdin = std::io::stdin();
    LineViewer::new(summary_path).run_reader(stdin.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::message::{LabeledBatch, LabeledColumn};
    use std::io::Cursor;

    fn data(x: &[f64]) -> PlotMessage {
        PlotMessage::Data(LabeledBatch {
            columns: vec![LabeledColumn {
                name: "x".into(),
                values: x.to_vec(),
            }],
        })
    }

    #[test]
    fn test_lines_follow_new_line_sentinels() {
        let mut viewer = LineViewer::new(None);
        for m in [
            data(&[0.0, 1.0]),
            data(&[2.0]),
            PlotMessage::NewLine,
            data(&[3.0]),
            PlotMessage::ToggleSave,
            PlotMessage::Stop,
            data(&[9.0]),
        ] {
            viewer.handle(m);
        }
        let summary = viewer.finish().unwrap();

        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].columns["x"], vec![0.0, 1.0, 2.0]);
        assert_eq!(summary.lines[1].columns["x"], vec![3.0]);
        assert_eq!(summary.data_messages, 3);
        assert!(!summary.save);
        assert!(summary.stopped);
    }

    #[test]
    fn test_summary_written_only_when_saving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("summary.json");

        let input = "\"NewLine\"\n{\"Data\":{\"columns\":[{\"name\":\"x\",\"values\":[1.0]}]}}\n\"Stop\"\n";
        let summary = LineViewer::new(Some(path.clone()))
            .run_reader(Cursor::new(input))
            .unwrap();
        assert_eq!(summary.points(), 1);
        let saved: ViewerSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, summary);

        let other = dir.path().join("unsaved.json");
        let input = "\"ToggleSave\"\n\"Stop\"\n";
        LineViewer::new(Some(other.clone()))
            .run_reader(Cursor::new(input))
            .unwrap();
        assert!(!other.exists());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let input = "garbage\n\n{\"Data\":{\"columns\":[{\"name\":\"x\",\"values\":[1.0,2.0]}]}}\n";
        let summary = LineViewer::new(None).run_reader(Cursor::new(input)).unwrap();
        assert_eq!(summary.points(), 2);
        assert!(!summary.stopped);
    }
}

//! Session data types

use crate::error::{Result, SweepError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the shared run log
pub const DEFAULT_LOG_FILE_NAME: &str = "Test Log.txt";

/// Format a run ID from its start time: `Y-M-D_h-m-s`, no zero padding
pub fn format_run_id(time: &DateTime<Local>) -> String {
    time.format("%Y-%-m-%-d_%-H-%-M-%-S").to_string()
}

/// Format a timestamp for the run log
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Identity and outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSession {
    run_id: String,
    start_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    completed: bool,
}

impl RunSession {
    /// Start a session now
    pub fn start() -> Self {
        Self::starting_at(Local::now())
    }

    /// Start a session at a given time
    pub fn starting_at(start_time: DateTime<Local>) -> Self {
        Self {
            run_id: format_run_id(&start_time),
            start_time,
            end_time: None,
            completed: false,
        }
    }

    /// Run identifier derived from the start time
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// When the session was created
    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    /// When results were saved, if they were
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    /// Whether the sweep ran to the end of the grid
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Record whether the sweep ran to the end
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    /// Stamp the end time
    pub fn mark_end(&mut self) {
        self.end_time = Some(Local::now());
    }
}

/// Where a run's files go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    base_path: PathBuf,
    folder_name: String,
    file_name: String,
    log_file_name: String,
}

impl OutputLayout {
    /// Create a layout rooted at `base_path`, which must be absolute
    pub fn new(
        base_path: impl Into<PathBuf>,
        folder_name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<Self> {
        let base_path = base_path.into();
        if !base_path.is_absolute() {
            return Err(SweepError::Config(format!(
                "output base path must be absolute: {}",
                base_path.display()
            )));
        }
        Ok(Self {
            base_path,
            folder_name: folder_name.into(),
            file_name: file_name.into(),
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
        })
    }

    /// Use a different run log file name
    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    /// Root of all output
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Folder holding the data files
    pub fn folder_path(&self) -> PathBuf {
        self.base_path.join(&self.folder_name)
    }

    /// Data file for a given run
    pub fn data_path(&self, run_id: &str) -> PathBuf {
        self.folder_path()
            .join(format!("{}_{}", run_id, self.file_name))
    }

    /// Shared run log
    pub fn log_path(&self) -> PathBuf {
        self.base_path.join(&self.log_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_has_no_padding() {
        let t = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_run_id(&t), "2024-3-5_7-8-9");

        let t = Local.with_ymd_and_hms(2024, 11, 25, 17, 48, 59).unwrap();
        assert_eq!(format_run_id(&t), "2024-11-25_17-48-59");
    }

    #[test]
    fn test_session_lifecycle() {
        let t = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut session = RunSession::starting_at(t);
        assert_eq!(session.run_id(), "2024-1-2_3-4-5");
        assert!(!session.completed());
        assert!(session.end_time().is_none());

        session.set_completed(true);
        session.mark_end();
        assert!(session.completed());
        assert!(session.end_time().is_some());
        assert!(format_timestamp(&t).starts_with("2024-01-02 03:04:05."));
    }

    #[test]
    fn test_layout_paths() {
        let base = std::env::temp_dir().join("labsweep-layout");
        let layout = OutputLayout::new(&base, "Test_sample", "Test_file.txt").unwrap();
        assert_eq!(
            layout.data_path("2024-1-2_3-4-5"),
            base.join("Test_sample").join("2024-1-2_3-4-5_Test_file.txt")
        );
        assert_eq!(layout.log_path(), base.join("Test Log.txt"));
    }

    #[test]
    fn test_relative_base_path_rejected() {
        let err = OutputLayout::new("relative/dir", "f", "d.txt").unwrap_err();
        assert!(err.is_config());
    }
}

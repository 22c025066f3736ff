//! Run sessions and result persistence
//!
//! This module owns everything that outlives a run on disk:
//!
//! - [`RunSession`] - run ID, start/end time and completion status
//! - [`OutputLayout`] - where data files and the run log live
//! - [`writer`] - the fixed tab-delimited data file with its `#` header
//! - [`RunLog`] - the append-only log with one row per saved run

pub mod log;
pub mod types;
pub mod writer;

pub use log::{LogEntry, RunLog};
pub use types::{format_run_id, format_timestamp, OutputLayout, RunSession, DEFAULT_LOG_FILE_NAME};
pub use writer::{format_g6, format_row, render_data_file, write_data_file, DataHeader};

//! Integration tests driving the labsweep binary
//!
//! These tests validate the process boundary:
//! - The `view` subcommand as a process consumer
//! - `run` on an experiment file, with and without a viewer
//! - Exit codes on success and failure

mod common;

use common::builders::SweepBuilder;
use common::read_data_file;
use labsweep::stream::{ProcessConsumer, ViewerSummary, VisualizationConsumer};
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_labsweep");

fn write_experiment(dir: &Path, viewer: &str, extra: &str) -> std::path::PathBuf {
    let config = format!(
        r#"
[sweep]
batch_size = 4

[[sweep.variables]]
name = "x0"
skip_if_unchanged = true
domain = {{ values = [0, 1] }}

[[sweep.variables]]
name = "x1"
domain = {{ linspace = {{ start = 0, stop = 1, num = 3 }} }}

[[responses]]
name = "y"
expr = "x0 + x1"

[parameters]
p1 = 1
p2 = 2

[readback]
p2 = "2.71828"

[output]
base_path = {base:?}
folder_name = "cli"
file_name = "data.txt"

[viewer]
{viewer}

{extra}
"#,
        base = dir.to_string_lossy(),
        viewer = viewer,
        extra = extra,
    );
    let path = dir.join("experiment.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn data_files(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir.join("cli"))
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}

#[test]
fn test_process_viewer_receives_every_point() {
    let dir = TempDir::new().unwrap();
    let summary_path = dir.path().join("summary.json");
    let consumer = ProcessConsumer::spawn(
        BIN,
        ["view", "--summary", summary_path.to_str().unwrap()],
    )
    .unwrap();
    assert!(consumer.sender().is_some());

    let mut experiment = SweepBuilder::new()
        .batch_size(4)
        .build()
        .consumer(consumer)
        .build()
        .unwrap();
    experiment.measure().unwrap();

    let summary: ViewerSummary =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert!(summary.stopped);
    assert!(summary.save);
    assert_eq!(summary.lines.len(), 2);
    assert_eq!(summary.points(), 6);
    assert_eq!(summary.lines[1].columns["x0"], vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_run_without_viewer_saves_results() {
    let dir = TempDir::new().unwrap();
    let config = write_experiment(dir.path(), "mode = \"none\"", "");

    let status = Command::new(BIN)
        .args(["run", config.to_str().unwrap(), "--no-listen"])
        .stdin(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let files = data_files(dir.path());
    assert_eq!(files.len(), 1);
    let file = read_data_file(&files[0]);
    assert_eq!(
        file.header,
        vec![
            "# p1 = 1",
            "# p2 = 2",
            "# pause = 0",
            "# p2 (Read) = 2.71828",
            "# completed = True",
        ]
    );
    assert_eq!(file.columns, vec!["x0", "x1", "y"]);
    let y: Vec<f64> = file.rows.iter().map(|r| r[2]).collect();
    assert_eq!(y, vec![0.0, 0.5, 1.0, 1.0, 1.5, 2.0]);

    let log = std::fs::read_to_string(dir.path().join("Test Log.txt")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn test_run_with_threaded_io_and_process_viewer() {
    let dir = TempDir::new().unwrap();
    let summary_path = dir.path().join("viewer.json");
    let viewer = format!("mode = \"process\"\nsummary_path = {:?}", summary_path.to_string_lossy());
    let config = write_experiment(dir.path(), &viewer, "[engine]\nio_mode = \"threaded\"");

    let status = Command::new(BIN)
        .args(["run", config.to_str().unwrap(), "--no-listen"])
        .stdin(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(data_files(dir.path()).len(), 1);

    let summary: ViewerSummary =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary.points(), 6);
}

#[test]
fn test_script_error_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let config = write_experiment(dir.path(), "mode = \"none\"", "");
    let broken = std::fs::read_to_string(&config)
        .unwrap()
        .replace("x0 + x1", "x0 + undefined_value");
    std::fs::write(&config, broken).unwrap();

    let status = Command::new(BIN)
        .args(["run", config.to_str().unwrap(), "--no-listen"])
        .stdin(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));

    // The failed run is still saved, marked incomplete
    let files = data_files(dir.path());
    assert_eq!(files.len(), 1);
    let file = read_data_file(&files[0]);
    assert_eq!(file.header.last().map(String::as_str), Some("# completed = False"));
    assert!(file.rows.is_empty());
}

#[test]
fn test_missing_config_fails() {
    let output = Command::new(BIN)
        .args(["run", "/nonexistent/experiment.toml", "--no-listen"])
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load experiment"));
}

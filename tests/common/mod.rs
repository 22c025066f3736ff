//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::path::Path;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// A saved data file split into its parts
#[derive(Debug)]
pub struct DataFile {
    pub header: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Read and split a data file written by the engine
pub fn read_data_file(path: &Path) -> DataFile {
    let content = std::fs::read_to_string(path).expect("data file should exist");
    assert!(content.ends_with("\r\n"), "data file must end with CRLF");

    let (header, body) = content
        .split_once("\r\n\r\n")
        .expect("header and body are separated by a blank line");
    let mut lines = body.split("\r\n").filter(|l| !l.is_empty());
    let columns = lines
        .next()
        .expect("column line")
        .split('\t')
        .map(String::from)
        .collect();
    let rows = lines
        .map(|line| line.split('\t').map(|v| v.parse().unwrap()).collect())
        .collect();

    DataFile {
        header: header.split("\r\n").map(String::from).collect(),
        columns,
        rows,
    }
}

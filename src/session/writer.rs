//! Tab-delimited data file writer
//!
//! File layout:
//!
//! ```text
//! # p1 = 1\r\n
//! # p2 = 2\r\n
//! # p2 (Read) = 2.71828\r\n
//! # completed = True\r\n
//! \r\n
//! x0\tx1\ty\r\n
//! 0\t0\t0.841471\r\n
//! ```
//!
//! Values use the C `%.6g` conversion.

use crate::error::{Result, ResultExt, SweepError};
use std::fmt::Write as _;
use std::path::Path;

const LINE_END: &str = "\r\n";

/// Format a value like C's `%.6g`
pub fn format_g6(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Exponent after rounding to six significant digits
    let sci = format!("{:.5e}", value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if (-4..6).contains(&exp) {
        let decimals = (5 - exp) as usize;
        trim_fraction(format!("{:.*}", decimals, value))
    } else {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa.to_string()),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    }
}

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    s
}

/// Header block of a data file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataHeader {
    entries: Vec<(String, String)>,
    columns: Vec<String>,
}

impl DataHeader {
    /// Create a header from ordered `key = value` entries and column names
    pub fn new(entries: Vec<(String, String)>, columns: Vec<String>) -> Self {
        Self { entries, columns }
    }

    /// Header entries in order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Render the header, column-name line included, without a trailing newline
    pub fn render(&self) -> String {
        let lines: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("# {} = {}", k, v))
            .collect();
        format!(
            "{}{}{}{}",
            lines.join(LINE_END),
            LINE_END,
            LINE_END,
            self.columns.join("\t")
        )
    }
}

/// Render one row of values
pub fn format_row(row: &[f64]) -> String {
    row.iter()
        .map(|v| format_g6(*v))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Render a complete data file
pub fn render_data_file(header: &DataHeader, rows: Option<&[Vec<f64>]>) -> String {
    let mut out = header.render();
    out.push_str(LINE_END);
    for row in rows.unwrap_or_default() {
        let _ = write!(out, "{}{}", format_row(row), LINE_END);
    }
    out
}

/// Write a data file, creating its folder if needed.
///
/// With no rows only the header is written.
pub fn write_data_file(path: &Path, header: &DataHeader, rows: Option<&[Vec<f64>]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(SweepError::from)
            .with_context(|| format!("creating data folder {}", parent.display()))?;
    }
    std::fs::write(path, render_data_file(header, rows))
        .map_err(SweepError::from)
        .with_context(|| format!("writing data file {}", path.display()))?;
    tracing::info!("Saved data to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_g6_matches_c() {
        let cases = [
            (1.0, "1"),
            (2.71828, "2.71828"),
            (3.14159265, "3.14159"),
            (-0.5, "-0.5"),
            (100.0, "100"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (1e100, "1e+100"),
            (0.0, "0"),
            (-10.0, "-10"),
            (999999.6, "1e+06"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_g6(value), expected, "formatting {}", value);
        }
        assert_eq!(format_g6(f64::NAN), "nan");
        assert_eq!(format_g6(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_render_layout() {
        let header = DataHeader::new(
            vec![
                ("p1".into(), "1".into()),
                ("completed".into(), "True".into()),
            ],
            vec!["x".into(), "y".into()],
        );
        let rows = vec![vec![0.0, 0.5], vec![1.0, 1.5]];
        assert_eq!(
            render_data_file(&header, Some(&rows)),
            "# p1 = 1\r\n# completed = True\r\n\r\nx\ty\r\n0\t0.5\r\n1\t1.5\r\n"
        );
    }

    #[test]
    fn test_header_only_without_rows() {
        let header = DataHeader::new(vec![("completed".into(), "False".into())], vec!["x".into()]);
        assert_eq!(
            render_data_file(&header, None),
            "# completed = False\r\n\r\nx\r\n"
        );
    }

    #[test]
    fn test_write_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run_data.txt");
        let header = DataHeader::new(vec![], vec!["x".into()]);
        write_data_file(&path, &header, Some(&[vec![2.0]])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\r\n\r\nx\r\n2\r\n");
    }
}

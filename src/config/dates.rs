//! Sampling dates read from a CSV file
//!
//! Each line is either a single timestamp (sampled as one instant) or a
//! `begin, end, interval` triple. Lines of any other width are ignored.

use crate::error::{GraphError, Result};
use crate::types::{parse_timestamp, DateSpan};
use std::path::Path;

/// Read date spans from a CSV file
pub fn date_spans_from_file(path: impl AsRef<Path>) -> Result<Vec<DateSpan>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| GraphError::Config(format!("Unable to read dates from {:?}: {}", path, e)))?;

    let mut spans = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            GraphError::Config(format!("Bad dates line {} in {:?}: {}", line + 1, path, e))
        })?;
        match record.len() {
            1 => spans.push(DateSpan::instant(parse_timestamp(&record[0])?)),
            3 => spans.push(DateSpan::parse(&record[0], &record[1], &record[2])?),
            n => tracing::debug!("Ignoring dates line {} with {} columns", line + 1, n),
        }
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_one_column_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2022-01-09 18:43:45").unwrap();
        writeln!(file, " 2022-01-10 06:00:00 ").unwrap();

        let spans = date_spans_from_file(file.path()).unwrap();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].is_instant());
        assert_eq!(spans[0].begin().to_string(), "2022-01-09 18:43:45");
        assert_eq!(spans[0].interval().as_str(), "1s");
    }

    #[test]
    fn test_read_three_column_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2022-01-09, 2022-01-10, 1h").unwrap();
        writeln!(file, "2022-02-01,2022-02-03,4h").unwrap();
        writeln!(file, "ignored,line").unwrap();

        let spans = date_spans_from_file(file.path()).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].begin().to_string(), "2022-01-09 00:00:00");
        assert_eq!(spans[0].end().to_string(), "2022-01-10 00:00:00");
        assert_eq!(spans[0].interval().as_str(), "1h");
        assert_eq!(spans[1].interval().as_str(), "4h");
    }

    #[test]
    fn test_unreadable_file() {
        let err = date_spans_from_file("/nonexistent/dates.csv").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }
}

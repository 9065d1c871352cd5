//! Line-delimited JSON ingestion and emission
//!
//! Ingestion assigns each parsed record a 0-based index in file order.
//! Records without a usable URL are skipped with a warning and never reach
//! the dispatcher, but they still consume an index, so the emitted indices
//! can carry holes while staying strictly ascending.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};
use volley_domain::{RequestDescriptor, RequestLine, Result, ResultRecord, VolleyError};

/// The ingested batch: valid descriptors plus the count of skipped records.
#[derive(Debug)]
pub struct BatchInput {
    pub descriptors: Vec<RequestDescriptor>,
    /// Records dropped for a missing/empty URL. Warnings, not errors.
    pub skipped: usize,
}

/// Read request records from a line-delimited JSON stream.
///
/// Blank lines are ignored. A line that is not valid JSON (or carries an
/// unsupported method) aborts ingestion: a malformed input file is a startup
/// error, not a per-record one.
///
/// # Errors
/// Returns `VolleyError::Io` on read failure and
/// `VolleyError::InvalidInput` on an unparseable line.
pub fn read_descriptors<R: BufRead>(reader: R) -> Result<BatchInput> {
    let mut descriptors = Vec::new();
    let mut skipped = 0usize;
    let mut index = 0usize;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line
            .map_err(|e| VolleyError::Io(format!("failed to read input line {}: {e}", line_number + 1)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let parsed: RequestLine = serde_json::from_str(trimmed).map_err(|e| {
            VolleyError::InvalidInput(format!("malformed record on input line {}: {e}", line_number + 1))
        })?;

        let record_index = index;
        index += 1;

        match parsed.url.filter(|url| !url.is_empty()) {
            Some(url) => descriptors.push(RequestDescriptor {
                index: record_index,
                method: parsed.method,
                url,
                body: parsed.body,
            }),
            None => {
                warn!(record = record_index + 1, "request record is missing a URL, skipping");
                skipped += 1;
            }
        }
    }

    info!(records = index, valid = descriptors.len(), skipped, "input ingested");
    Ok(BatchInput { descriptors, skipped })
}

/// Read request records from a file.
///
/// # Errors
/// Returns `VolleyError::Io` if the file cannot be opened, plus everything
/// [`read_descriptors`] can return.
pub fn read_descriptors_from_path(path: &Path) -> Result<BatchInput> {
    let file = File::open(path)
        .map_err(|e| VolleyError::Io(format!("cannot open input file {}: {e}", path.display())))?;
    read_descriptors(BufReader::new(file))
}

/// Write result records as line-delimited JSON, one record per line, in the
/// order given.
///
/// # Errors
/// Returns `VolleyError::Io` on encode or write failure.
pub fn write_results<W: Write>(mut writer: W, results: &[ResultRecord]) -> Result<()> {
    for record in results {
        serde_json::to_writer(&mut writer, record)
            .map_err(|e| VolleyError::Io(format!("failed to encode result record: {e}")))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write result records to a file.
///
/// # Errors
/// Returns `VolleyError::Io` if the file cannot be created, plus everything
/// [`write_results`] can return.
pub fn write_results_to_path(path: &Path, results: &[ResultRecord]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| VolleyError::Io(format!("cannot create output file {}: {e}", path.display())))?;
    write_results(BufWriter::new(file), results)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;
    use volley_domain::HttpMethod;

    use super::*;

    #[test]
    fn ingestion_assigns_indices_in_file_order() {
        let input = concat!(
            r#"{"method": "GET", "url": "https://a"}"#, "\n",
            r#"{"method": "post", "url": "https://b", "body": {"x": 1}}"#, "\n",
        );
        let batch = read_descriptors(Cursor::new(input)).unwrap();

        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.descriptors.len(), 2);
        assert_eq!(batch.descriptors[0].index, 0);
        assert_eq!(batch.descriptors[0].method, HttpMethod::Get);
        assert_eq!(batch.descriptors[1].index, 1);
        assert_eq!(batch.descriptors[1].method, HttpMethod::Post);
        assert_eq!(batch.descriptors[1].body, Some(json!({"x": 1})));
    }

    #[test]
    fn records_without_url_are_skipped_but_keep_their_index() {
        let input = concat!(
            r#"{"url": "https://a"}"#, "\n",
            r#"{"method": "POST"}"#, "\n",
            r#"{"url": ""}"#, "\n",
            r#"{"url": "https://d"}"#, "\n",
        );
        let batch = read_descriptors(Cursor::new(input)).unwrap();

        assert_eq!(batch.skipped, 2);
        let indices: Vec<usize> = batch.descriptors.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let input = concat!(
            r#"{"url": "https://a"}"#, "\n",
            "\n",
            "   \n",
            r#"{"url": "https://b"}"#, "\n",
        );
        let batch = read_descriptors(Cursor::new(input)).unwrap();
        assert_eq!(batch.descriptors.len(), 2);
        assert_eq!(batch.descriptors[1].index, 1);
    }

    #[test]
    fn malformed_line_aborts_with_line_number() {
        let input = concat!(
            r#"{"url": "https://a"}"#, "\n",
            "{not json}\n",
        );
        match read_descriptors(Cursor::new(input)) {
            Err(VolleyError::InvalidInput(message)) => assert!(message.contains("line 2")),
            other => panic!("expected invalid input error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_method_aborts_ingestion() {
        let input = r#"{"method": "TELEPORT", "url": "https://a"}"#;
        assert!(matches!(
            read_descriptors(Cursor::new(input)),
            Err(VolleyError::InvalidInput(_))
        ));
    }

    #[test]
    fn results_round_trip_through_a_file() {
        let descriptor = RequestDescriptor {
            index: 0,
            method: HttpMethod::Get,
            url: "https://a".to_string(),
            body: None,
        };
        let records = vec![ResultRecord::completed(&descriptor, 200, Some(json!({"ok": true})))];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        write_results_to_path(&path, &records).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: ResultRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, records[0]);
    }
}

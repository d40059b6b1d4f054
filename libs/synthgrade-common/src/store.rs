//! Newline-delimited JSON storage for submissions and verdict records.
//!
//! Each stream is a plain file with one JSON object per line; blank lines are
//! ignored on read.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::types::ProblemRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read line {line}: {source}")]
    Read { line: usize, source: io::Error },

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("failed to write record: {0}")]
    Write(#[from] io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Lazily decoded stream of JSON lines
pub struct JsonLines<T> {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonLines<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for JsonLines<T> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line_no = self.line_no;

            let line = match line {
                Ok(line) => line,
                Err(source) => return Some(Err(StoreError::Read { line: line_no, source })),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&line)
                    .map_err(|source| StoreError::Parse { line: line_no, source }),
            );
        }
    }
}

/// Load every verdict record of a results file
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<ProblemRecord>, StoreError> {
    JsonLines::<ProblemRecord>::open(path)?.collect()
}

/// Append-only writer for a results stream
pub struct RecordWriter {
    out: BufWriter<File>,
}

impl RecordWriter {
    /// Create (truncating) the results file, creating its directory if needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Write one record and flush, so an interrupted run keeps what it graded
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), StoreError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputRecord, Outcome, TestVerdict};

    fn sample_record(src_uid: &str) -> ProblemRecord {
        ProblemRecord {
            lang_cluster: "Python".into(),
            src_uid: src_uid.into(),
            difficulty: 900,
            lang: Some(crate::types::Variant::Python3),
            exec_outcome: vec![TestVerdict {
                input: "3\n".into(),
                expected: vec!["9".into()],
                actual: "9".into(),
                error: String::new(),
                exec_outcome: Outcome::Passed,
            }],
        }
    }

    #[test]
    fn test_write_then_read_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/results.jsonl");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer.append(&sample_record("a")).unwrap();
        writer.append(&sample_record("b")).unwrap();
        drop(writer);

        let records = read_records(&path).unwrap();
        assert_eq!(records, vec![sample_record("a"), sample_record("b")]);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"exec_outcome\":\"PASSED\""));
        assert!(text.contains("\"lang\":\"python3\""));
    }

    #[test]
    fn test_blank_lines_skipped_and_errors_carry_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.jsonl");
        let good = r#"{"lang_cluster":"Python","src_uid":"x","difficulty":800,"source_code":"print(1)","lang":"python3","testcases":"[]"}"#;
        fs::write(&path, format!("{}\n\n{{not json}}\n", good)).unwrap();

        let items: Vec<_> = JsonLines::<InputRecord>::open(&path).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().src_uid, "x");
        assert!(matches!(items[1], Err(StoreError::Parse { line: 3, .. })));
    }

    #[test]
    fn test_open_missing_file() {
        let result = JsonLines::<InputRecord>::open("/nonexistent/input.jsonl");
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }
}

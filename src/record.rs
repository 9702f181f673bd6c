// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Step-tagged record logs: the on-disk unit of every test-bench channel.
//!
//! A record log is a line-oriented file of `step; value` pairs (the
//! separator is configurable). Source and checker logs are re-read from the
//! start on every step change; the control log is consumed strictly forward;
//! dump logs are append-only. All four share this one reader/writer pair.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use std::path::Path;

/// One log entry: a simulation step and the data word tagged to it.
///
/// Logs are not guaranteed sorted by step — readers must scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub step: u64,
    pub value: u64,
}

/// Error parsing a record line.
#[derive(Debug)]
pub enum RecordParseError {
    /// The separator character was not found in the line.
    MissingSeparator(String),
    /// One of the two fields was not an unsigned integer.
    BadField(String),
}

impl fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordParseError::MissingSeparator(line) => {
                write!(f, "record line has no separator: {:?}", line)
            }
            RecordParseError::BadField(line) => {
                write!(f, "record line has a non-numeric field: {:?}", line)
            }
        }
    }
}

impl std::error::Error for RecordParseError {}

/// Parse one `step <sep> value` line. Surrounding whitespace on either
/// field is tolerated.
pub fn parse_record(line: &str, separator: char) -> Result<Record, RecordParseError> {
    let (step_str, value_str) = line
        .split_once(separator)
        .ok_or_else(|| RecordParseError::MissingSeparator(line.to_string()))?;
    let step = step_str
        .trim()
        .parse::<u64>()
        .map_err(|_| RecordParseError::BadField(line.to_string()))?;
    let value = value_str
        .trim()
        .parse::<u64>()
        .map_err(|_| RecordParseError::BadField(line.to_string()))?;
    Ok(Record { step, value })
}

// ── Reader ──────────────────────────────────────────────────────────────────

/// Sequential reader over a record log.
///
/// `next_record` yields records until exhaustion or the first malformed
/// line, after which it keeps returning `Ok(None)` without touching the
/// underlying stream until the next [`rewind`](RecordReader::rewind).
/// Blank lines are skipped.
pub struct RecordReader<R> {
    inner: R,
    separator: char,
    line: String,
    exhausted: bool,
}

impl<R: BufRead + Seek> RecordReader<R> {
    pub fn new(inner: R, separator: char) -> Self {
        RecordReader {
            inner,
            separator,
            line: String::new(),
            exhausted: false,
        }
    }

    /// Reposition to the start of the log and clear the exhaustion latch.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.exhausted = false;
        Ok(())
    }

    /// Read the next record. `Ok(None)` means end of stream: either real
    /// EOF or a malformed line (the two are indistinguishable to callers,
    /// matching the "until exhaustion or mismatch" contract).
    pub fn next_record(&mut self) -> io::Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line)?;
            if n == 0 {
                self.exhausted = true;
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_record(trimmed, self.separator) {
                Ok(rec) => return Ok(Some(rec)),
                Err(_) => {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
    }
}

impl RecordReader<io::BufReader<File>> {
    /// Open a log file for reading. `Ok(None)` when the file does not
    /// exist (the channel is simply absent); `Err` on any other I/O error.
    pub fn open(path: &Path, separator: char) -> io::Result<Option<Self>> {
        match File::open(path) {
            Ok(f) => Ok(Some(RecordReader::new(io::BufReader::new(f), separator))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ── Writer ──────────────────────────────────────────────────────────────────

/// Append sink for record logs. Every record is flushed as soon as it is
/// written: the host may terminate the process abruptly, and a dump log
/// that trails reality is worthless.
pub struct RecordWriter {
    file: File,
    separator: char,
}

impl RecordWriter {
    /// Open a log for appending, creating it if needed. Existing content
    /// is never truncated.
    pub fn append(path: &Path, separator: char) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(RecordWriter { file, separator })
    }

    pub fn write_record(&mut self, rec: Record) -> io::Result<()> {
        writeln!(self.file, "{}{} {}", rec.step, self.separator, rec.value)?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(content: &str) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::new(Cursor::new(content.as_bytes().to_vec()), ';')
    }

    #[test]
    fn test_parse_record_basic() {
        assert_eq!(
            parse_record("3; 42", ';').unwrap(),
            Record { step: 3, value: 42 }
        );
        assert_eq!(
            parse_record("  7 ;9  ", ';').unwrap(),
            Record { step: 7, value: 9 }
        );
    }

    #[test]
    fn test_parse_record_custom_separator() {
        assert_eq!(
            parse_record("1, 2", ',').unwrap(),
            Record { step: 1, value: 2 }
        );
    }

    #[test]
    fn test_parse_record_errors() {
        assert!(matches!(
            parse_record("12 34", ';'),
            Err(RecordParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            parse_record("a; 1", ';'),
            Err(RecordParseError::BadField(_))
        ));
        assert!(matches!(
            parse_record("1; -4", ';'),
            Err(RecordParseError::BadField(_))
        ));
    }

    #[test]
    fn test_reader_sequence_and_eof() {
        let mut r = reader("0; 10\n1; 20\n");
        assert_eq!(
            r.next_record().unwrap(),
            Some(Record { step: 0, value: 10 })
        );
        assert_eq!(
            r.next_record().unwrap(),
            Some(Record { step: 1, value: 20 })
        );
        assert_eq!(r.next_record().unwrap(), None);
        // Latched: repeated reads stay at end
        assert_eq!(r.next_record().unwrap(), None);
    }

    #[test]
    fn test_reader_skips_blank_lines() {
        let mut r = reader("\n0; 1\n\n   \n2; 3\n");
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 0, value: 1 }));
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 2, value: 3 }));
        assert_eq!(r.next_record().unwrap(), None);
    }

    #[test]
    fn test_reader_malformed_line_ends_stream() {
        let mut r = reader("0; 1\ngarbage\n2; 3\n");
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 0, value: 1 }));
        // Mismatch behaves exactly like EOF; the trailing valid record is
        // unreachable.
        assert_eq!(r.next_record().unwrap(), None);
        assert_eq!(r.next_record().unwrap(), None);
    }

    #[test]
    fn test_reader_rewind() {
        let mut r = reader("5; 50\n6; 60\n");
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 5, value: 50 }));
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 6, value: 60 }));
        assert_eq!(r.next_record().unwrap(), None);
        r.rewind().unwrap();
        assert_eq!(r.next_record().unwrap(), Some(Record { step: 5, value: 50 }));
    }

    #[test]
    fn test_writer_appends_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump_0.csv");

        let mut w = RecordWriter::append(&path, ';').unwrap();
        w.write_record(Record { step: 1, value: 11 }).unwrap();
        w.write_record(Record { step: 2, value: 22 }).unwrap();
        drop(w);

        // A second append writer must not truncate
        let mut w = RecordWriter::append(&path, ';').unwrap();
        w.write_record(Record { step: 3, value: 33 }).unwrap();
        drop(w);

        let mut r = RecordReader::open(&path, ';').unwrap().unwrap();
        let mut recs = Vec::new();
        while let Some(rec) = r.next_record().unwrap() {
            recs.push(rec);
        }
        assert_eq!(
            recs,
            vec![
                Record { step: 1, value: 11 },
                Record { step: 2, value: 22 },
                Record { step: 3, value: 33 },
            ]
        );
    }

    #[test]
    fn test_open_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let r = RecordReader::open(&dir.path().join("absent.csv"), ';').unwrap();
        assert!(r.is_none());
    }
}

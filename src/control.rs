// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Control sequencer: owns the single global simulation clock and the
//! inter-step wait duration, driven from a dedicated control log.
//!
//! The control log differs from channel logs in two ways: its first line
//! is a `first_step; last_step` header consumed once at construction, and
//! the stream of `step; wait` records after it is consumed strictly
//! forward — never rewound.

use std::fmt;
use std::io::{self, BufRead, Seek};

use crate::diag::DiagnosticsSink;
use crate::record::RecordReader;

#[derive(Debug)]
pub enum ControlError {
    Io(io::Error),
    /// The control log is empty or its first line is not a valid
    /// `first_step; last_step` pair.
    MissingHeader,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Io(e) => write!(f, "control log I/O error: {}", e),
            ControlError::MissingHeader => write!(f, "control log missing first/last step header"),
        }
    }
}

impl std::error::Error for ControlError {}

/// Global clock state machine. `advance` walks `current_step` from
/// undefined to `first_step`, then by one per call up to `last_step`;
/// past that it is a no-op reporting "no more steps".
pub struct ControlSequencer<R> {
    reader: RecordReader<R>,
    first_step: u64,
    last_step: u64,
    current_step: Option<u64>,
    current_wait: u64,
}

impl<R: BufRead + Seek> ControlSequencer<R> {
    /// Consume the header and build the sequencer. The read position is
    /// left just past the header, where the forward-only wait scan begins.
    pub fn from_reader(mut reader: RecordReader<R>) -> Result<Self, ControlError> {
        let header = reader.next_record().map_err(ControlError::Io)?;
        let Some(header) = header else {
            return Err(ControlError::MissingHeader);
        };
        Ok(ControlSequencer {
            reader,
            first_step: header.step,
            last_step: header.value,
            current_step: None,
            current_wait: 1,
        })
    }

    pub fn first_step(&self) -> u64 {
        self.first_step
    }

    pub fn last_step(&self) -> u64 {
        self.last_step
    }

    /// Current step, 0 until the first `advance`.
    pub fn step(&self) -> u64 {
        self.current_step.unwrap_or(0)
    }

    /// Wait duration attached to the current step; 1 before the first
    /// `advance`, 0 once the control log runs out of timing data.
    pub fn wait(&self) -> u64 {
        self.current_wait
    }

    /// Move the clock one step. Returns false (and mutates nothing) once
    /// `last_step` has been reached. On every true transition, scan the
    /// control log forward from the current position for the new step's
    /// wait record; records for other steps are consumed and gone.
    pub fn advance(&mut self, diag: &mut DiagnosticsSink) -> bool {
        let next = match self.current_step {
            None => self.first_step,
            Some(s) if s >= self.last_step => return false,
            Some(s) => s + 1,
        };
        self.current_step = Some(next);

        loop {
            match self.reader.next_record() {
                Ok(Some(rec)) if rec.step == next => {
                    diag.trace(&format!("wait {} for step {}", rec.value, next));
                    self.current_wait = rec.value;
                    break;
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    diag.trace("EOF on control");
                    self.current_wait = 0;
                    break;
                }
                Err(e) => {
                    diag.error(&format!("read error on control: {}", e));
                    self.current_wait = 0;
                    break;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sequencer(content: &str) -> ControlSequencer<Cursor<Vec<u8>>> {
        let reader = RecordReader::new(Cursor::new(content.as_bytes().to_vec()), ';');
        ControlSequencer::from_reader(reader).unwrap()
    }

    fn quiet() -> DiagnosticsSink {
        DiagnosticsSink::from_writer(std::io::sink(), false)
    }

    #[test]
    fn test_header_parsing() {
        let ctl = sequencer("2; 4\n");
        assert_eq!(ctl.first_step(), 2);
        assert_eq!(ctl.last_step(), 4);
        assert_eq!(ctl.step(), 0);
        assert_eq!(ctl.wait(), 1);
    }

    #[test]
    fn test_missing_header() {
        let reader = RecordReader::new(Cursor::new(b"".to_vec()), ';');
        assert!(matches!(
            ControlSequencer::from_reader(reader),
            Err(ControlError::MissingHeader)
        ));

        let reader = RecordReader::new(Cursor::new(b"not a header\n".to_vec()), ';');
        assert!(matches!(
            ControlSequencer::from_reader(reader),
            Err(ControlError::MissingHeader)
        ));
    }

    #[test]
    fn test_sequencing_boundary() {
        // first=2, last=4: true/2, true/3, true/4, then terminal.
        let mut ctl = sequencer("2; 4\n2; 10\n3; 20\n4; 30\n");
        let mut diag = quiet();

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 2);
        assert_eq!(ctl.wait(), 10);

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 3);
        assert_eq!(ctl.wait(), 20);

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 4);
        assert_eq!(ctl.wait(), 30);

        assert!(!ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 4);
        assert_eq!(ctl.wait(), 30);
        // Terminal state is stable.
        assert!(!ctl.advance(&mut diag));
    }

    #[test]
    fn test_wait_defaults_to_zero_at_eof() {
        // Header only: every step exists, but no timing data.
        let mut ctl = sequencer("0; 2\n");
        let mut diag = quiet();

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 0);
        assert_eq!(ctl.wait(), 0);
    }

    #[test]
    fn test_forward_only_consumption() {
        // Step 3's record precedes step 2's. Scanning for step 2 consumes
        // it irreversibly, so step 3 finds nothing and degrades to wait 0.
        let mut ctl = sequencer("2; 3\n3; 99\n2; 10\n3; 88\n");
        let mut diag = quiet();

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.wait(), 10);

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 3);
        assert_eq!(ctl.wait(), 88);

        assert!(!ctl.advance(&mut diag));
    }

    #[test]
    fn test_skipped_steps_consume_records() {
        let mut ctl = sequencer("1; 2\n2; 50\n");
        let mut diag = quiet();

        // Step 1 has no record: the scan for it runs through step 2's
        // record and hits EOF.
        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 1);
        assert_eq!(ctl.wait(), 0);

        // Step 2's record is already gone.
        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 2);
        assert_eq!(ctl.wait(), 0);
    }

    #[test]
    fn test_single_step_range() {
        let mut ctl = sequencer("5; 5\n5; 7\n");
        let mut diag = quiet();

        assert!(ctl.advance(&mut diag));
        assert_eq!(ctl.step(), 5);
        assert_eq!(ctl.wait(), 7);
        assert!(!ctl.advance(&mut diag));
    }
}

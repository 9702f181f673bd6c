// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Source driver: replays precomputed stimulus words into the simulated
//! circuit, one channel per stimulus log.

use std::io::{BufRead, Seek};

use crate::diag::DiagnosticsSink;
use crate::record::RecordReader;

/// A fixed-width data word as the host consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word {
    pub value: u64,
    pub width: u32,
}

impl Word {
    /// Truncate `value` to the low `width` bits.
    pub fn new(value: u64, width: u32) -> Self {
        let value = if width >= 64 {
            value
        } else {
            value & ((1u64 << width) - 1)
        };
        Word { value, width }
    }
}

/// Per-channel stimulus state: the log cursor plus a one-record buffer
/// holding the word for the last requested step.
pub struct SourceChannel<R> {
    id: u32,
    reader: RecordReader<R>,
    last_requested_step: Option<u64>,
    buffer: u64,
    available: bool,
}

impl<R: BufRead + Seek> SourceChannel<R> {
    pub fn new(id: u32, reader: RecordReader<R>) -> Self {
        SourceChannel {
            id,
            reader,
            last_requested_step: None,
            buffer: 0,
            available: false,
        }
    }

    /// Advance to `step`, buffering the step's stimulus word if the log
    /// has one. Requesting the step already loaded is idempotent: the
    /// cached availability is returned and the log is not touched.
    ///
    /// A step change rewinds the log and scans forward for the first
    /// record tagged with exactly `step`; records for other steps are
    /// skipped. The log is assumed to hold at most one record per step.
    pub fn advance(&mut self, step: u64, diag: &mut DiagnosticsSink) -> bool {
        if self.last_requested_step == Some(step) {
            return self.available;
        }

        self.last_requested_step = Some(step);
        self.buffer = 0;
        self.available = false;

        if let Err(e) = self.reader.rewind() {
            diag.error(&format!("cannot rewind source {}: {}", self.id, e));
            return false;
        }

        loop {
            match self.reader.next_record() {
                Ok(Some(rec)) if rec.step == step => {
                    self.buffer = rec.value;
                    self.available = true;
                    diag.trace(&format!("read {} on source {}", rec.value, self.id));
                    return true;
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    diag.trace(&format!("EOF on source {}", self.id));
                    return false;
                }
                Err(e) => {
                    diag.error(&format!("read error on source {}: {}", self.id, e));
                    return false;
                }
            }
        }
    }

    /// Return the buffered word truncated to `width` bits. Does not check
    /// that `advance` ran first: the last buffered value (zero if none)
    /// is what the host gets.
    pub fn fetch(&self, width: u32) -> Word {
        Word::new(self.buffer, width)
    }
}

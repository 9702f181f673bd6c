// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Append-only diagnostics log and the run-wide verification error counter.
//!
//! The host simulator does not surface standard output, so every notable
//! event — informational, success, failure — goes to a dedicated log file,
//! flushed line by line. An external harness judges pass/fail by reading
//! this file; verification failures are data here, never control flow.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Write-and-flush event log plus the monotonically increasing count of
/// verification failures. One per session; reset at initialization.
pub struct DiagnosticsSink {
    out: Box<dyn Write>,
    verbose: bool,
    error_count: u64,
}

impl DiagnosticsSink {
    /// Create the log file, truncating any previous run's log.
    pub fn create(path: &Path, verbose: bool) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file, verbose))
    }

    /// Build a sink over an arbitrary writer (tests, benchmarks).
    pub fn from_writer(out: impl Write + 'static, verbose: bool) -> Self {
        DiagnosticsSink {
            out: Box::new(out),
            verbose,
            error_count: 0,
        }
    }

    /// Number of verification failures recorded so far.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    fn emit(&mut self, line: &str) {
        // Best-effort: a diagnostics write failure has nowhere to report
        // itself, and must never abort the run.
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    /// Plain informational line.
    pub fn info(&mut self, msg: &str) {
        self.emit(msg);
    }

    /// Informational line emitted only in verbose mode (per-record reads,
    /// EOF notices).
    pub fn trace(&mut self, msg: &str) {
        if self.verbose {
            self.emit(msg);
        }
    }

    /// A configuration or I/O problem. Not counted as a verification
    /// failure.
    pub fn error(&mut self, msg: &str) {
        self.emit(&format!("[ERROR] {}", msg));
    }

    /// Degraded-but-continuing condition (e.g. cache capacity exceeded).
    pub fn warning(&mut self, msg: &str) {
        self.emit(&format!("[WARNING] {}", msg));
    }

    /// A value matched its expectation.
    pub fn success(&mut self, msg: &str) {
        self.emit(&format!("[SUCCESS] {}", msg));
    }

    /// A verification failure: increments the error counter and reports
    /// the running total on the line itself.
    pub fn failure(&mut self, msg: &str) {
        self.error_count += 1;
        let line = format!("[FAILURE] {}; error count: {}", msg, self.error_count);
        self.emit(&line);
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The test-bench session: all channel state, the global clock, and the
//! diagnostics sink behind one object.
//!
//! The host simulator invokes one operation at a time and keeps no state
//! of its own; everything lives here between calls. Passing the session
//! explicitly (instead of the ambient globals a plugin ABI would use)
//! makes independent runs in one process possible, which is how the test
//! suite exercises it.

use indexmap::IndexMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use crate::checker::CheckerChannel;
use crate::config::BenchConfig;
use crate::control::{ControlError, ControlSequencer};
use crate::diag::DiagnosticsSink;
use crate::dump::DumpSink;
use crate::record::RecordReader;
use crate::source::{SourceChannel, Word};

/// Session construction failed outright. Only the diagnostics log itself
/// is load-bearing at setup: with no place to report problems, the run
/// cannot start. Every other setup problem degrades the affected channel
/// and is reported through diagnostics instead.
#[derive(Debug)]
pub enum SetupError {
    CreateLog { path: PathBuf, source: io::Error },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::CreateLog { path, source } => {
                write!(f, "cannot create diagnostics log {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::CreateLog { source, .. } => Some(source),
        }
    }
}

/// One test-bench run: discovered channels, the control clock, the dump
/// sink, and the diagnostics log with its error counter.
pub struct Session {
    config: BenchConfig,
    diag: DiagnosticsSink,
    sources: IndexMap<u32, SourceChannel<BufReader<File>>>,
    checkers: IndexMap<u32, CheckerChannel<BufReader<File>>>,
    dumps: DumpSink,
    control: Option<ControlSequencer<BufReader<File>>>,
}

impl Session {
    /// Initialize a run: create the diagnostics log, read the control
    /// header, and probe channel ids `0..max_channels` in each namespace
    /// for their log files. Ids with no file are simply never inserted —
    /// every operation on them fails safely later.
    ///
    /// A missing or headerless control log is a configuration error, not
    /// a fatal one: it is diagnosed and the clock stays inert
    /// (`control_advance` always false).
    pub fn open(config: BenchConfig) -> Result<Session, SetupError> {
        let log_path = config.log_path();
        let mut diag = DiagnosticsSink::create(&log_path, config.verbose)
            .map_err(|source| SetupError::CreateLog { path: log_path, source })?;

        diag.info("==== initialising control ====");
        let control = match RecordReader::open(&config.control_path(), config.separator) {
            Ok(Some(reader)) => match ControlSequencer::from_reader(reader) {
                Ok(ctl) => {
                    diag.info(&format!(
                        "control steps {} to {}",
                        ctl.first_step(),
                        ctl.last_step()
                    ));
                    Some(ctl)
                }
                Err(ControlError::MissingHeader) => {
                    diag.error("empty or headerless control log");
                    None
                }
                Err(ControlError::Io(e)) => {
                    diag.error(&format!("read error on control: {}", e));
                    None
                }
            },
            Ok(None) => {
                diag.error(&format!(
                    "could not open control log {}",
                    config.control_path().display()
                ));
                None
            }
            Err(e) => {
                diag.error(&format!("read error on control: {}", e));
                None
            }
        };

        diag.info("==== initialising source ====");
        let mut sources = IndexMap::new();
        for id in 0..config.max_channels {
            let path = config.source_path(id);
            match RecordReader::open(&path, config.separator) {
                Ok(Some(reader)) => {
                    diag.info(&format!("source id {} -> {}", id, path.display()));
                    sources.insert(id, SourceChannel::new(id, reader));
                }
                Ok(None) => {}
                Err(e) => diag.error(&format!("cannot open source {}: {}", id, e)),
            }
        }

        diag.info("==== initialising check ====");
        let mut checkers = IndexMap::new();
        for id in 0..config.max_channels {
            let path = config.check_path(id);
            match RecordReader::open(&path, config.separator) {
                Ok(Some(reader)) => {
                    diag.info(&format!("check id {} -> {}", id, path.display()));
                    checkers.insert(
                        id,
                        CheckerChannel::new(id, reader, config.max_cached_records),
                    );
                }
                Ok(None) => {}
                Err(e) => diag.error(&format!("cannot open checker {}: {}", id, e)),
            }
        }
        diag.info("==== initialising done ====");

        clilog::info!(
            "test bench session: {} source, {} checker channels, control {}",
            sources.len(),
            checkers.len(),
            if control.is_some() { "ready" } else { "inert" }
        );

        let dumps = DumpSink::new(&config);
        Ok(Session {
            config,
            diag,
            sources,
            checkers,
            dumps,
            control,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Running count of verification failures, as surfaced in the
    /// diagnostics log.
    pub fn error_count(&self) -> u64 {
        self.diag.error_count()
    }

    /// Channel ids that were discovered at open, per namespace.
    pub fn source_channels(&self) -> impl Iterator<Item = u32> + '_ {
        self.sources.keys().copied()
    }

    pub fn checker_channels(&self) -> impl Iterator<Item = u32> + '_ {
        self.checkers.keys().copied()
    }

    /// The control header's `(first_step, last_step)`, if the control log
    /// loaded.
    pub fn control_range(&self) -> Option<(u64, u64)> {
        self.control
            .as_ref()
            .map(|c| (c.first_step(), c.last_step()))
    }

    // ── Host operation surface ──────────────────────────────────────────

    pub fn source_advance(&mut self, channel: u32, step: u64) -> bool {
        match self.sources.get_mut(&channel) {
            Some(ch) => ch.advance(step, &mut self.diag),
            None => {
                self.diag.error(&format!(
                    "could not read source {}, file not open or does not exist",
                    channel
                ));
                false
            }
        }
    }

    pub fn source_fetch(&self, channel: u32, width: u32) -> Word {
        match self.sources.get(&channel) {
            Some(ch) => ch.fetch(width),
            None => Word::new(0, width),
        }
    }

    pub fn checker_advance(&mut self, channel: u32, step: u64) -> bool {
        match self.checkers.get_mut(&channel) {
            Some(ch) => ch.advance(step, &mut self.diag),
            None => {
                self.diag.error(&format!(
                    "could not read check {}, file not open or does not exist",
                    channel
                ));
                false
            }
        }
    }

    pub fn checker_match_in_order(&mut self, channel: u32, value: u64) -> bool {
        match self.checkers.get_mut(&channel) {
            Some(ch) => ch.match_in_order(value, &mut self.diag),
            None => {
                self.diag.error(&format!(
                    "could not read check {}, file not open or does not exist",
                    channel
                ));
                false
            }
        }
    }

    pub fn checker_match_unordered(&mut self, channel: u32, value: u64) -> bool {
        match self.checkers.get_mut(&channel) {
            Some(ch) => ch.match_unordered(value, &mut self.diag),
            None => {
                self.diag.error(&format!(
                    "could not read check {}, file not open or does not exist",
                    channel
                ));
                false
            }
        }
    }

    pub fn dump_write(&mut self, channel: u32, step: u64, value: u64) -> bool {
        self.dumps.write(channel, step, value, &mut self.diag)
    }

    pub fn control_advance(&mut self) -> bool {
        match self.control.as_mut() {
            Some(ctl) => ctl.advance(&mut self.diag),
            None => false,
        }
    }

    pub fn control_step(&self) -> u64 {
        self.control.as_ref().map(|c| c.step()).unwrap_or(0)
    }

    pub fn control_wait(&self) -> u64 {
        self.control.as_ref().map(|c| c.wait()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_bench(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    fn open(dir: &Path) -> Session {
        Session::open(BenchConfig {
            root: dir.to_path_buf(),
            ..BenchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(
            dir.path(),
            &[
                ("control.csv", "0; 1\n0; 5\n1; 5\n"),
                ("source_0.csv", "0; 1\n"),
                ("source_2.csv", "0; 2\n"),
                ("check_1.csv", "0; 3\n"),
            ],
        );
        let session = open(dir.path());

        assert_eq!(session.source_channels().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(session.checker_channels().collect::<Vec<_>>(), vec![1]);
        assert_eq!(session.control_range(), Some((0, 1)));
    }

    #[test]
    fn test_missing_channels_fail_safely() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(dir.path(), &[("control.csv", "0; 1\n")]);
        let mut session = open(dir.path());

        assert!(!session.source_advance(5, 0));
        assert_eq!(session.source_fetch(5, 8), Word::new(0, 8));
        assert!(!session.checker_advance(5, 0));
        assert!(!session.checker_match_in_order(5, 1));
        assert!(!session.checker_match_unordered(5, 1));
        // Inert channels are I/O problems, not verification failures.
        assert_eq!(session.error_count(), 0);

        drop(session);
        let log = fs::read_to_string(dir.path().join("test_bench.log")).unwrap();
        assert!(log.contains("could not read source 5"));
        assert!(log.contains("could not read check 5"));
    }

    #[test]
    fn test_missing_control_is_inert_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(dir.path(), &[("source_0.csv", "0; 1\n")]);
        let mut session = open(dir.path());

        assert_eq!(session.control_range(), None);
        assert!(!session.control_advance());
        assert_eq!(session.control_step(), 0);
        assert_eq!(session.control_wait(), 0);
        // The rest of the bench still works.
        assert!(session.source_advance(0, 0));

        drop(session);
        let log = fs::read_to_string(dir.path().join("test_bench.log")).unwrap();
        assert!(log.contains("could not open control log"));
    }

    #[test]
    fn test_headerless_control_is_diagnosed() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(dir.path(), &[("control.csv", "")]);
        let session = open(dir.path());
        assert_eq!(session.control_range(), None);

        drop(session);
        let log = fs::read_to_string(dir.path().join("test_bench.log")).unwrap();
        assert!(log.contains("empty or headerless control log"));
    }

    #[test]
    fn test_channel_bound_limits_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(
            dir.path(),
            &[
                ("control.csv", "0; 0\n"),
                ("source_0.csv", "0; 1\n"),
                ("source_7.csv", "0; 1\n"),
            ],
        );
        let session = Session::open(BenchConfig {
            root: dir.path().to_path_buf(),
            max_channels: 4,
            ..BenchConfig::default()
        })
        .unwrap();

        // source_7 is beyond the probe bound.
        assert_eq!(session.source_channels().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_independent_sessions() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_bench(
            dir_a.path(),
            &[("control.csv", "0; 0\n"), ("check_0.csv", "0; 5\n")],
        );
        write_bench(
            dir_b.path(),
            &[("control.csv", "0; 0\n"), ("check_0.csv", "0; 5\n")],
        );

        let mut a = open(dir_a.path());
        let mut b = open(dir_b.path());

        assert!(a.checker_advance(0, 0));
        assert!(!a.checker_match_in_order(0, 6));
        assert_eq!(a.error_count(), 1);
        // Session B's counter is untouched.
        assert!(b.checker_advance(0, 0));
        assert_eq!(b.error_count(), 0);
    }

    #[test]
    fn test_error_counter_reset_at_open() {
        let dir = tempfile::tempdir().unwrap();
        write_bench(
            dir.path(),
            &[("control.csv", "0; 0\n"), ("check_0.csv", "0; 5\n")],
        );

        let mut session = open(dir.path());
        assert!(session.checker_advance(0, 0));
        assert!(!session.checker_match_unordered(0, 9));
        assert!(session.error_count() > 0);
        drop(session);

        // A fresh open of the same bench starts from zero.
        let session = open(dir.path());
        assert_eq!(session.error_count(), 0);
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test-bench configuration (loaded from JSON, every field optional).

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Test-bench configuration. Defaults reproduce the conventional bench
/// layout (`source_0.csv`, `check_0.csv`, `dump_0.csv`, `control.csv` in
/// the working directory, `;`-separated), so `BenchConfig::default()` is a
/// working setup for the common case.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Directory all channel logs and the diagnostics log live in.
    pub root: PathBuf,
    /// Source log filename template; `{id}` is replaced by the channel id.
    pub source_template: String,
    /// Checker log filename template.
    pub check_template: String,
    /// Dump log filename template.
    pub dump_template: String,
    /// Control log filename.
    pub control_filename: String,
    /// Diagnostics log filename.
    pub log_filename: String,
    /// Field separator in every log file.
    pub separator: char,
    /// Channel ids probed per namespace at initialization; ids at or above
    /// this bound are never opened.
    pub max_channels: u32,
    /// Upper bound on records cached per checker channel per step. Excess
    /// records are dropped with a warning.
    pub max_cached_records: usize,
    /// Emit per-record trace lines to the diagnostics log.
    pub verbose: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            root: PathBuf::from("."),
            source_template: "source_{id}.csv".to_string(),
            check_template: "check_{id}.csv".to_string(),
            dump_template: "dump_{id}.csv".to_string(),
            control_filename: "control.csv".to_string(),
            log_filename: "test_bench.log".to_string(),
            separator: ';',
            max_channels: 100,
            max_cached_records: 100_000,
            verbose: false,
        }
    }
}

impl BenchConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Expand a filename template for a channel id, rooted at the bench
    /// directory.
    pub fn channel_path(&self, template: &str, id: u32) -> PathBuf {
        self.root.join(template.replace("{id}", &id.to_string()))
    }

    pub fn source_path(&self, id: u32) -> PathBuf {
        self.channel_path(&self.source_template, id)
    }

    pub fn check_path(&self, id: u32) -> PathBuf {
        self.channel_path(&self.check_template, id)
    }

    pub fn dump_path(&self, id: u32) -> PathBuf {
        self.channel_path(&self.dump_template, id)
    }

    pub fn control_path(&self) -> PathBuf {
        self.root.join(&self.control_filename)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(&self.log_filename)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

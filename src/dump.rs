// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Dump sink: records everything the circuit hands back into per-channel
//! append logs.
//!
//! A channel's log is created on the first write — never at
//! initialization, so a bench that dumps nothing leaves no empty files
//! behind. Every record is flushed immediately; the host may kill the
//! process at any moment.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::path::PathBuf;

use crate::config::BenchConfig;
use crate::diag::DiagnosticsSink;
use crate::record::{Record, RecordWriter};

/// Lazily-populated map of open dump writers, one per channel.
pub struct DumpSink {
    root: PathBuf,
    template: String,
    separator: char,
    max_channels: u32,
    writers: IndexMap<u32, RecordWriter>,
}

impl DumpSink {
    pub fn new(config: &BenchConfig) -> Self {
        DumpSink {
            root: config.root.clone(),
            template: config.dump_template.clone(),
            separator: config.separator,
            max_channels: config.max_channels,
            writers: IndexMap::new(),
        }
    }

    /// Append one record to the channel's log, opening it first if this is
    /// the channel's first write. An open that fails leaves the channel
    /// unopened; a later write retries.
    pub fn write(
        &mut self,
        channel: u32,
        step: u64,
        value: u64,
        diag: &mut DiagnosticsSink,
    ) -> bool {
        if channel >= self.max_channels {
            diag.error(&format!(
                "dump {} is beyond the configured channel bound of {}",
                channel, self.max_channels
            ));
            return false;
        }

        let writer = match self.writers.entry(channel) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let path = self
                    .root
                    .join(self.template.replace("{id}", &channel.to_string()));
                match RecordWriter::append(&path, self.separator) {
                    Ok(w) => v.insert(w),
                    Err(e) => {
                        diag.error(&format!(
                            "writing failed, cannot open {} for dump {}: {}",
                            path.display(),
                            channel,
                            e
                        ));
                        return false;
                    }
                }
            }
        };
        match writer.write_record(Record { step, value }) {
            Ok(()) => true,
            Err(e) => {
                diag.error(&format!("write error on dump {}: {}", channel, e));
                false
            }
        }
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Checker engine: verifies circuit outputs against expected values from a
//! step-tagged log.
//!
//! On each step change the channel bulk-loads every record for that step
//! into a bounded cache, then serves two matching disciplines over it:
//! strict positional ([`match_in_order`](CheckerChannel::match_in_order))
//! and multiset membership
//! ([`match_unordered`](CheckerChannel::match_unordered)). Records still
//! unconsumed when the step is abandoned are reported as missed
//! expectations, exactly once, at the moment of the next step change.

use std::io::{BufRead, Seek};

use crate::diag::DiagnosticsSink;
use crate::record::RecordReader;

/// One cached expectation for the current step.
#[derive(Debug, Clone, Copy)]
struct CachedRecord {
    value: u64,
    consumed: bool,
}

/// Per-channel checker state: log cursor, current-step cache, consumed
/// flags.
pub struct CheckerChannel<R> {
    id: u32,
    reader: RecordReader<R>,
    last_requested_step: Option<u64>,
    cache: Vec<CachedRecord>,
    max_records: usize,
}

impl<R: BufRead + Seek> CheckerChannel<R> {
    pub fn new(id: u32, reader: RecordReader<R>, max_records: usize) -> Self {
        CheckerChannel {
            id,
            reader,
            last_requested_step: None,
            cache: Vec::new(),
            max_records,
        }
    }

    /// Advance to `step` and report whether unconsumed expectations exist
    /// for it.
    ///
    /// Re-querying the step already loaded is idempotent: no log read, no
    /// cache churn. A step change first scans the outgoing cache — every
    /// record never matched counts one missed-expectation failure — then
    /// rewinds the log and collects all records for the new step, up to
    /// the cache bound.
    pub fn advance(&mut self, step: u64, diag: &mut DiagnosticsSink) -> bool {
        if self.last_requested_step != Some(step) {
            self.report_missed(diag);
            self.reload(step, diag);
        }
        self.cache.iter().any(|r| !r.consumed)
    }

    /// Compare `value` against the first unconsumed record in log order.
    /// That record is consumed whether or not it matched: positional
    /// discipline means an out-of-place value burns the slot it was
    /// compared against. With nothing left unconsumed there is no record
    /// to mark and the result is false.
    pub fn match_in_order(&mut self, value: u64, diag: &mut DiagnosticsSink) -> bool {
        let id = self.id;
        let found = self
            .cache
            .iter_mut()
            .enumerate()
            .find(|(_, r)| !r.consumed);
        let Some((index, rec)) = found else {
            return false;
        };
        rec.consumed = true;
        if rec.value == value {
            diag.success(&format!("got {} = {} on checker {} - {}", rec.value, value, id, index));
            true
        } else {
            diag.failure(&format!(
                "expected {} got {} on checker {} - {}",
                rec.value, value, id, index
            ));
            false
        }
    }

    /// Look for any unconsumed record whose value equals `value`; consume
    /// the first such record. No match leaves the cache untouched.
    pub fn match_unordered(&mut self, value: u64, diag: &mut DiagnosticsSink) -> bool {
        let id = self.id;
        for (index, rec) in self.cache.iter_mut().enumerate() {
            if !rec.consumed && rec.value == value {
                rec.consumed = true;
                diag.success(&format!("got {} on checker {} - {}", value, id, index));
                return true;
            }
        }
        diag.failure(&format!("could not find {} on checker {}", value, id));
        false
    }

    /// One failure per record left unconsumed in the outgoing step's cache.
    fn report_missed(&mut self, diag: &mut DiagnosticsSink) {
        let Some(old_step) = self.last_requested_step else {
            return;
        };
        for (index, rec) in self.cache.iter().enumerate() {
            if !rec.consumed {
                diag.failure(&format!(
                    "missed {} on checker {} - {} for step {}",
                    rec.value, self.id, index, old_step
                ));
            }
        }
    }

    fn reload(&mut self, step: u64, diag: &mut DiagnosticsSink) {
        self.last_requested_step = Some(step);
        self.cache.clear();

        if let Err(e) = self.reader.rewind() {
            diag.error(&format!("cannot rewind checker {}: {}", self.id, e));
            return;
        }

        // The whole log is scanned: records for this step may be
        // interleaved with records for other steps.
        let mut dropped = 0usize;
        loop {
            match self.reader.next_record() {
                Ok(Some(rec)) if rec.step == step => {
                    if self.cache.len() < self.max_records {
                        diag.trace(&format!(
                            "{} check {} on checker {}",
                            self.cache.len(),
                            rec.value,
                            self.id
                        ));
                        self.cache.push(CachedRecord {
                            value: rec.value,
                            consumed: false,
                        });
                    } else {
                        dropped += 1;
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    diag.trace(&format!("EOF on checker {}", self.id));
                    break;
                }
                Err(e) => {
                    diag.error(&format!("read error on checker {}: {}", self.id, e));
                    break;
                }
            }
        }

        if dropped > 0 {
            clilog::warn!(
                "checker {} step {}: {} records over the {}-record cache bound dropped",
                self.id,
                step,
                dropped,
                self.max_records
            );
            diag.warning(&format!(
                "{} records for step {} on checker {} exceed the cache bound of {}, dropped",
                dropped, step, self.id, self.max_records
            ));
        }
    }
}

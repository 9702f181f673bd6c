// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! cobench — co-simulation test-bench driver.
//!
//! cobench feeds precomputed stimulus words into a simulated circuit,
//! verifies the circuit's outputs against expected values, and coordinates
//! the global simulation step with its inter-step wait duration. The host
//! simulator calls in once per signal event; all state between calls lives
//! in a [`session::Session`].
//!
//! # Data flow
//!
//! ```text
//! source_<id>.csv ──→ SourceChannel  ──→ stimulus words into the circuit
//! check_<id>.csv  ──→ CheckerChannel ──→ ordered / unordered matching
//! circuit outputs ──→ DumpSink       ──→ dump_<id>.csv
//! control.csv     ──→ ControlSequencer → global step + wait duration
//! all components  ──→ DiagnosticsSink → test_bench.log (flushed per line)
//! ```
//!
//! # Key modules
//!
//! - [`record`] — the `step; value` log format: reader (rewind + forward
//!   scan) and append writer shared by every channel class
//! - [`config`] — bench layout, separator, and capacity configuration
//! - [`source`] — stimulus replay with a one-record per-step buffer
//! - [`checker`] — the step-synchronized record-matching engine: bounded
//!   per-step cache, positional and multiset matching, missed-expectation
//!   reporting
//! - [`control`] — the global clock driven from the control log's
//!   `first_step; last_step` header and forward-only wait stream
//! - [`dump`] — lazily-created append logs for circuit outputs
//! - [`diag`] — the append-only diagnostics log and verification error
//!   counter
//! - [`session`] — the per-run object tying it all together, exposing the
//!   host operation surface

pub mod checker;

pub mod config;

pub mod control;

pub mod diag;

pub mod dump;

pub mod record;

pub mod session;

pub mod source;

pub use config::BenchConfig;
pub use session::Session;

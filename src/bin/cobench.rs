// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Unified CLI for the cobench co-simulation test-bench driver.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cobench::config::BenchConfig;
use cobench::record::{parse_record, RecordReader};
use cobench::session::Session;
use indexmap::IndexMap;

#[derive(Parser)]
#[command(name = "cobench", about = "cobench — co-simulation test-bench driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint a bench directory's log files.
    ///
    /// Parses the control log header and every discovered source / check /
    /// dump log, reporting record counts and the first malformed line of
    /// each file. Use this before handing a bench to the simulator.
    Validate(ValidateArgs),

    /// Verify a recorded run offline.
    ///
    /// Replays each dump log from a previous run as the observed-value
    /// stream against the matching check log, driving the real checker
    /// engine step by step under the control log's clock. Exits nonzero
    /// if any expectation was missed or mismatched.
    Verify(VerifyArgs),
}

#[derive(Parser)]
struct ValidateArgs {
    /// Bench directory holding the CSV logs.
    #[clap(long, default_value = ".")]
    dir: PathBuf,

    /// Bench configuration JSON. Field defaults apply for anything the
    /// file does not set; without this flag the conventional layout is
    /// assumed.
    #[clap(long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct VerifyArgs {
    /// Bench directory holding the CSV logs (checks, dumps, control).
    #[clap(long, default_value = ".")]
    dir: PathBuf,

    /// Bench configuration JSON.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Match observed values with multiset semantics instead of strict
    /// log order.
    #[clap(long)]
    unordered: bool,

    /// Emit per-record trace lines to the diagnostics log.
    #[clap(long)]
    verbose: bool,
}

fn load_config(config: &Option<PathBuf>, dir: &PathBuf) -> BenchConfig {
    match config {
        Some(path) => match BenchConfig::from_json_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                clilog::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => BenchConfig {
            root: dir.clone(),
            ..BenchConfig::default()
        },
    }
}

/// Count the parseable records of one log file. Returns
/// `(records, first_bad_line)`.
fn scan_log(path: &std::path::Path, separator: char) -> std::io::Result<(usize, Option<usize>)> {
    let content = std::fs::read_to_string(path)?;
    let mut records = 0;
    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parse_record(trimmed, separator).is_err() {
            return Ok((records, Some(lineno + 1)));
        }
        records += 1;
    }
    Ok((records, None))
}

fn cmd_validate(args: ValidateArgs) -> bool {
    let cfg = load_config(&args.config, &args.dir);
    let mut clean = true;

    // Control log: header plus timing records.
    let control_path = cfg.control_path();
    match scan_log(&control_path, cfg.separator) {
        Ok((0, _)) => {
            clilog::error!("control log {} has no header", control_path.display());
            clean = false;
        }
        Ok((n, bad)) => {
            println!("control: header + {} wait records", n - 1);
            if let Some(lineno) = bad {
                clilog::warn!(
                    "control log {} is malformed at line {}; later records unreachable",
                    control_path.display(),
                    lineno
                );
                clean = false;
            }
        }
        Err(e) => {
            clilog::error!("cannot read control log {}: {}", control_path.display(), e);
            clean = false;
        }
    }

    // Per-namespace channel logs.
    let namespaces = [
        ("source", cfg.source_template.clone()),
        ("check", cfg.check_template.clone()),
        ("dump", cfg.dump_template.clone()),
    ];
    for (name, template) in &namespaces {
        let mut channels = 0;
        let mut records = 0;
        for id in 0..cfg.max_channels {
            let path = cfg.channel_path(template, id);
            if !path.exists() {
                continue;
            }
            channels += 1;
            match scan_log(&path, cfg.separator) {
                Ok((n, bad)) => {
                    records += n;
                    if let Some(lineno) = bad {
                        clilog::warn!(
                            "{} {} is malformed at line {}; later records unreachable",
                            name,
                            path.display(),
                            lineno
                        );
                        clean = false;
                    }
                }
                Err(e) => {
                    clilog::error!("cannot read {} {}: {}", name, path.display(), e);
                    clean = false;
                }
            }
        }
        println!("{}: {} channels, {} records", name, channels, records);
    }

    clean
}

fn cmd_verify(args: VerifyArgs) -> bool {
    let mut cfg = load_config(&args.config, &args.dir);
    cfg.verbose = cfg.verbose || args.verbose;

    let mut session = match Session::open(cfg) {
        Ok(s) => s,
        Err(e) => {
            clilog::error!("{}", e);
            return false;
        }
    };

    let Some((first, last)) = session.control_range() else {
        clilog::error!("control log missing or headerless; nothing to replay");
        return false;
    };

    // Load each checker's recorded outputs, grouped by step. The dump log
    // is the observed-value stream a live run would have produced call by
    // call.
    let mut observed: IndexMap<u32, IndexMap<u64, Vec<u64>>> = IndexMap::new();
    let mut stray_records = 0usize;
    for id in session.checker_channels().collect::<Vec<_>>() {
        let path = session.config().dump_path(id);
        let Ok(Some(mut reader)) = RecordReader::open(&path, session.config().separator) else {
            clilog::warn!("checker {} has no dump log {}; skipped", id, path.display());
            continue;
        };
        let mut by_step: IndexMap<u64, Vec<u64>> = IndexMap::new();
        while let Ok(Some(rec)) = reader.next_record() {
            if rec.step < first || rec.step > last {
                stray_records += 1;
                continue;
            }
            by_step.entry(rec.step).or_default().push(rec.value);
        }
        observed.insert(id, by_step);
    }
    if stray_records > 0 {
        clilog::warn!(
            "{} dump records fall outside control steps {}..={} and were not replayed",
            stray_records,
            first,
            last
        );
    }
    if observed.is_empty() {
        clilog::error!("no checker has a dump log to replay");
        return false;
    }

    let timer = clilog::stimer!("verify");
    let mut steps = 0usize;
    while session.control_advance() {
        let step = session.control_step();
        steps += 1;
        for (&id, by_step) in &observed {
            session.checker_advance(id, step);
            let Some(values) = by_step.get(&step) else {
                continue;
            };
            for &value in values {
                if args.unordered {
                    session.checker_match_unordered(id, value);
                } else {
                    session.checker_match_in_order(id, value);
                }
            }
        }
    }
    // Flush the final step: one advance past the end reports anything
    // still unconsumed.
    for &id in observed.keys() {
        session.checker_advance(id, last + 1);
    }
    clilog::finish!(timer);

    let errors = session.error_count();
    println!(
        "replayed {} steps on {} checkers: {} verification failures",
        steps,
        observed.len(),
        errors
    );
    if errors > 0 {
        clilog::warn!(
            "verification FAILED with {} errors; see {}",
            errors,
            session.config().log_path().display()
        );
    } else {
        clilog::info!("verification PASSED");
    }
    errors == 0
}

fn main() {
    clilog::init_stderr_color_debug();
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Validate(args) => cmd_validate(args),
        Commands::Verify(args) => cmd_verify(args),
    };
    std::process::exit(if ok { 0 } else { 1 });
}

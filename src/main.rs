// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use mosforge::assembler::cli::Cli;
use mosforge::assembler::{run, RunError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Assembly) => ExitCode::from(1),
        Err(RunError::Internal(message)) => {
            tracing::error!("{message}");
            ExitCode::from(3)
        }
    }
}

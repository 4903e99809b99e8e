// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::output::OutputFormat;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "ACME-compatible cross-assembler for the 6502 family \
(6502, NMOS 6502 with undocumented opcodes, 65C02, W65C02S).

Reads ACME-syntax assembly source and writes a plain, CBM, Apple, or Intel \
HEX image. The output path defaults to the source's !to directive, then to \
the input name with a .bin (or .hex) extension.";

#[derive(Parser, Debug)]
#[command(
    name = "mosForge",
    version = VERSION,
    about = "ACME-compatible 6502 cross-assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    /// Input assembly source file
    pub input: PathBuf,

    /// Output image file
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Output container format (overrides the source's !to directive)
    #[arg(short = 'f', long = "format", value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Emit a listing file
    #[arg(short = 'l', long = "list", value_name = "PATH")]
    pub listing: Option<PathBuf>,

    /// Dump the symbol table to stdout
    #[arg(short = 's', long = "symbols", action = ArgAction::SetTrue)]
    pub symbols: bool,

    /// Prepend a directory to the include search path (repeatable)
    #[arg(short = 'I', long = "include", value_name = "DIR", action = ArgAction::Append)]
    pub include: Vec<PathBuf>,

    /// Verbosity level (0 = errors only, 3 = debug)
    #[arg(
        short = 'v',
        long = "verbose",
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub verbosity: u8,

    /// Initial program counter, e.g. $C000, 0xC000, or 49152
    #[arg(long = "setpc", value_name = "ADDR", value_parser = parse_address)]
    pub setpc: Option<i64>,

    /// Emit a VICE-format label file
    #[arg(long = "vicelabels", value_name = "PATH")]
    pub vicelabels: Option<PathBuf>,
}

/// Parse an address argument: `$hex`, `0xhex`, or decimal.
pub fn parse_address(text: &str) -> Result<i64, String> {
    let parsed = if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    match parsed {
        Ok(addr) if (0..=0xffff).contains(&addr) => Ok(addr),
        Ok(addr) => Err(format!("address {addr} is outside $0000-$FFFF")),
        Err(_) => Err(format!("invalid address: {text}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_invocation() {
        let cli = Cli::parse_from([
            "mosForge",
            "prog.asm",
            "-o",
            "prog.prg",
            "-f",
            "cbm",
            "-s",
            "-I",
            "lib",
            "-I",
            "more",
            "--setpc",
            "$c000",
            "--vicelabels",
            "prog.lbl",
        ]);
        assert_eq!(cli.input, PathBuf::from("prog.asm"));
        assert_eq!(cli.output, Some(PathBuf::from("prog.prg")));
        assert_eq!(cli.format, Some(OutputFormat::Cbm));
        assert!(cli.symbols);
        assert_eq!(cli.include.len(), 2);
        assert_eq!(cli.setpc, Some(0xc000));
        assert_eq!(cli.vicelabels, Some(PathBuf::from("prog.lbl")));
        assert_eq!(cli.verbosity, 1);
    }

    #[test]
    fn parses_verbosity_levels() {
        let cli = Cli::parse_from(["mosForge", "prog.asm", "-v", "3"]);
        assert_eq!(cli.verbosity, 3);
        assert!(Cli::try_parse_from(["mosForge", "prog.asm", "-v", "4"]).is_err());
    }

    #[test]
    fn address_formats() {
        assert_eq!(parse_address("$c000"), Ok(0xc000));
        assert_eq!(parse_address("0xC000"), Ok(0xc000));
        assert_eq!(parse_address("49152"), Ok(0xc000));
        assert!(parse_address("banana").is_err());
        assert!(parse_address("$10000").is_err());
    }

    #[test]
    fn requires_input() {
        assert!(Cli::try_parse_from(["mosForge"]).is_err());
    }
}

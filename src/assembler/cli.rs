// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::assembler::error::{AsmErrorKind, AsmRunError};

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "6502 cross-assembler producing a raw binary object plus JSON side tables
for unresolved symbols and expressions.

Single-segment mode takes -f/--source and -o/--object. Build-config mode
takes -c/--config with a JSON file describing segments to assemble (with
their dependencies for the cross-segment resolution pass) and/or a final
combine step. -l/--list writes a listing next to each object file.";

#[derive(Parser, Debug)]
#[command(
    name = "forge65",
    version = VERSION,
    about = "6502 cross-assembler with multi-segment linking",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'f',
        long = "source",
        value_name = "FILE",
        long_help = "Input assembly source file. Required unless -c/--config is given."
    )]
    pub source: Option<PathBuf>,
    #[arg(
        short = 'o',
        long = "object",
        value_name = "FILE",
        long_help = "Output object file (raw binary, no header). Required unless -c/--config is given."
    )]
    pub object: Option<PathBuf>,
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        long_help = "JSON build config describing segments to assemble and/or a combine step. Overrides -f/-o."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        action = ArgAction::SetTrue,
        long_help = "Write a listing file (<object>.lst) for each assembled segment."
    )]
    pub listing: bool,
}

/// Validated single-segment configuration.
#[derive(Debug)]
pub struct SegmentPaths {
    pub source: PathBuf,
    pub object: PathBuf,
}

/// Validate single-segment arguments. Missing paths are the pre-flight
/// fatal errors; nothing is processed before this check.
pub fn validate_cli(cli: &Cli) -> Result<SegmentPaths, AsmRunError> {
    let source = cli
        .source
        .clone()
        .ok_or_else(|| AsmRunError::fatal(AsmErrorKind::Cli, "undefined source file", None))?;
    let object = cli
        .object
        .clone()
        .ok_or_else(|| AsmRunError::fatal(AsmErrorKind::Cli, "undefined object file", None))?;
    Ok(SegmentPaths { source, object })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_parses_single_segment_args() {
        let cli = Cli::parse_from(["forge65", "-f", "prog.asm", "-o", "prog.o", "-l"]);
        assert_eq!(cli.source, Some(PathBuf::from("prog.asm")));
        assert_eq!(cli.object, Some(PathBuf::from("prog.o")));
        assert!(cli.listing);
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_config_mode() {
        let cli = Cli::parse_from(["forge65", "-c", "build.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("build.json")));
    }

    #[test]
    fn validate_requires_source() {
        let cli = Cli::parse_from(["forge65", "-o", "prog.o"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(err.to_string(), "undefined source file");
    }

    #[test]
    fn validate_requires_object() {
        let cli = Cli::parse_from(["forge65", "-f", "prog.asm"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(err.to_string(), "undefined object file");
    }

    #[test]
    fn validate_passes_with_both_paths() {
        let cli = Cli::parse_from(["forge65", "-f", "prog.asm", "-o", "prog.o"]);
        let paths = validate_cli(&cli).expect("validate cli");
        assert_eq!(paths.source, PathBuf::from("prog.asm"));
        assert_eq!(paths.object, PathBuf::from("prog.o"));
    }
}

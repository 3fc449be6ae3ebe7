// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-segment build driver.
//!
//! Segments assemble independently, in parallel worker threads, each with
//! its own [`Assembler`]. After the join barrier, a second parallel phase
//! re-loads each segment's serialized side tables and object bytes, then
//! imports the exported symbol table of every declared dependency in order
//! and re-runs the resolution sweep, patching the object in place. Side
//! files whose tables empty out are removed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Deserialize;

use crate::assembler::error::{AsmErrorKind, AsmRunError, AsmRunReport};
use crate::assembler::{
    symbol_table_path, unresolved_exprs_path, unresolved_path, Assembler,
};
use crate::combine::{self, CombineConf};
use crate::core::expr::Value;
use crate::core::resolver::{UnresolvedExprTable, UnresolvedSymbol};

/// One segment to assemble: a source file and the segments whose exported
/// symbols may satisfy its unresolved references.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SegmentConf {
    pub file_name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The `-c` build config: segments to assemble and/or a combine step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildConf {
    #[serde(default)]
    pub segments: Vec<SegmentConf>,
    #[serde(default)]
    pub combine: Option<CombineConf>,
}

/// Object file name for a segment source: source stem plus `.o`.
#[must_use]
pub fn object_path(segment_file: &str) -> PathBuf {
    Path::new(segment_file).with_extension("o")
}

/// Run a build config: assemble all segments (parallel, with a join
/// barrier), resolve cross-segment references, then combine if requested.
pub fn run(config_path: &Path, listing: bool) -> Result<Vec<AsmRunReport>, AsmRunError> {
    let text = fs::read_to_string(config_path).map_err(|_| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            "File doesn't exist",
            Some(&config_path.display().to_string()),
        )
    })?;
    let config: BuildConf = serde_json::from_str(&text).map_err(|err| {
        AsmRunError::fatal(AsmErrorKind::Cli, &err.to_string(), Some("build config"))
    })?;

    let mut reports = Vec::new();
    if !config.segments.is_empty() {
        reports = assemble_segments(&config.segments, listing)?;
        resolve_segments(&config.segments)?;
    }
    if let Some(combine_conf) = &config.combine {
        combine::process(combine_conf)?;
    }
    Ok(reports)
}

fn assemble_segments(
    segments: &[SegmentConf],
    listing: bool,
) -> Result<Vec<AsmRunReport>, AsmRunError> {
    let mut results: Vec<Result<AsmRunReport, AsmRunError>> = Vec::new();
    thread::scope(|scope| {
        let handles: Vec<_> = segments
            .iter()
            .map(|segment| {
                scope.spawn(move || {
                    let mut assembler = Assembler::new();
                    assembler.set_source_file(Path::new(&segment.file_name));
                    assembler.set_object_file(&object_path(&segment.file_name));
                    assembler.set_listing(listing);
                    assembler.assemble()
                })
            })
            .collect();
        for handle in handles {
            results.push(handle.join().unwrap_or_else(|_| {
                Err(AsmRunError::fatal(
                    AsmErrorKind::Io,
                    "Segment worker panicked",
                    None,
                ))
            }));
        }
    });

    let mut reports = Vec::new();
    for result in results {
        reports.push(result?);
    }
    Ok(reports)
}

fn resolve_segments(segments: &[SegmentConf]) -> Result<(), AsmRunError> {
    let mut results: Vec<Result<(), AsmRunError>> = Vec::new();
    thread::scope(|scope| {
        let handles: Vec<_> = segments
            .iter()
            .map(|segment| scope.spawn(move || resolve_segment(segment)))
            .collect();
        for handle in handles {
            results.push(handle.join().unwrap_or_else(|_| {
                Err(AsmRunError::fatal(
                    AsmErrorKind::Io,
                    "Segment worker panicked",
                    None,
                ))
            }));
        }
    });
    for result in results {
        result?;
    }
    Ok(())
}

/// Resolve one segment against its dependencies, in declared order,
/// stopping early once nothing is left to resolve.
fn resolve_segment(segment: &SegmentConf) -> Result<(), AsmRunError> {
    let object = object_path(&segment.file_name);
    let unresolved_file = unresolved_path(&object);
    let exprs_file = unresolved_exprs_path(&object);
    if !unresolved_file.exists() {
        return Ok(());
    }

    let pending: BTreeMap<String, UnresolvedSymbol> = read_json(&unresolved_file)?;
    let exprs: UnresolvedExprTable = if exprs_file.exists() {
        read_json(&exprs_file)?
    } else {
        UnresolvedExprTable::new()
    };
    let bytes = fs::read(&object).map_err(|_| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            "File doesn't exist",
            Some(&object.display().to_string()),
        )
    })?;

    let mut assembler = Assembler::new();
    assembler.load_unresolved(pending);
    assembler.load_unresolved_exprs(exprs);
    assembler.load_object(bytes);

    for dependency in &segment.dependencies {
        let symbols_file = symbol_table_path(&object_path(dependency));
        if !symbols_file.exists() {
            continue;
        }
        let symbols: BTreeMap<String, Value> = read_json(&symbols_file)?;
        assembler.load_symbol_table(symbols);
        assembler.resolve_pending();
        if assembler.unresolved_exprs().is_empty() {
            let _ = fs::remove_file(&exprs_file);
        }
        if assembler.unresolved_symbols().is_empty() {
            let _ = fs::remove_file(&unresolved_file);
            break;
        }
    }

    fs::write(&object, assembler.output()).map_err(|err| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            &err.to_string(),
            Some(&object.display().to_string()),
        )
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AsmRunError> {
    let text = fs::read_to_string(path).map_err(|_| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            "File doesn't exist",
            Some(&path.display().to_string()),
        )
    })?;
    serde_json::from_str(&text).map_err(|err| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            &err.to_string(),
            Some(&path.display().to_string()),
        )
    })
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Object-file combine step: concatenate named object files in declared
//! order, zero-padding each to its declared hex size first.

use std::fs;

use serde::Deserialize;

use crate::assembler::error::{AsmErrorKind, AsmRunError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConf {
    pub file_name: String,
    /// Target size in hex, e.g. `"$2000"`. Shorter inputs are zero-padded.
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CombineConf {
    pub object_file: String,
    pub files: Vec<FileConf>,
}

pub fn process(config: &CombineConf) -> Result<(), AsmRunError> {
    let mut out: Vec<u8> = Vec::new();
    for file in &config.files {
        let mut bytes = fs::read(&file.file_name).map_err(|_| {
            AsmRunError::fatal(AsmErrorKind::Io, "File doesn't exist", Some(&file.file_name))
        })?;
        if let Some(size) = &file.size {
            let size = parse_hex_size(size).ok_or_else(|| {
                AsmRunError::fatal(AsmErrorKind::Cli, "Error in data type", Some(size))
            })?;
            while bytes.len() < usize::from(size) {
                bytes.push(0);
            }
        }
        out.extend_from_slice(&bytes);
    }
    fs::write(&config.object_file, &out).map_err(|err| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            &err.to_string(),
            Some(&config.object_file),
        )
    })
}

fn parse_hex_size(text: &str) -> Option<u16> {
    u16::from_str_radix(text.trim().trim_start_matches('$'), 16).ok()
}

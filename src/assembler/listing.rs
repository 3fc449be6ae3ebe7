// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Listing file output.

use std::io::{self, Write};

/// One listing row: the address and bytes a source line produced.
/// Bytes are recorded as first emitted; later patch-backs are not
/// reflected in the listing.
#[derive(Debug, Clone)]
pub struct ListingLine {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub line_num: u32,
    pub source: String,
}

pub struct ListingWriter<W: Write> {
    out: W,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out)
    }

    pub fn write_line(&mut self, line: &ListingLine) -> io::Result<()> {
        let hex: String = line
            .bytes
            .iter()
            .map(|b| format!("{b:02X} "))
            .collect::<String>()
            .trim_end()
            .to_string();
        if line.bytes.is_empty() {
            writeln!(self.out, "{:>5}  {:>14}  {}", line.line_num, "", line.source)
        } else {
            writeln!(
                self.out,
                "{:>5}  {:04X}  {:<8}  {}",
                line.line_num, line.addr, hex, line.source
            )
        }
    }

    pub fn footer(&mut self, errors: usize, warnings: usize) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{errors} error(s), {warnings} warning(s)")
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Line classification for assembly source.

use crate::core::text_utils::{is_ident_char, is_ident_start};
use crate::mos6502::table;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

/// One classified source line. Patterns are tried in a fixed priority
/// order; the bare macro call is the catch-all, so an unknown first word
/// surfaces as "Undefined Macro" rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAst {
    Empty,
    ScopeOpen,
    ScopeClose,
    /// `name:` — the rest of the line (if any) is dispatched separately.
    Label { name: String, rest: String },
    /// `name .res count`
    MemReserve { name: String, count: String },
    /// `.keyword value` — keyword lowercased, without the dot.
    Directive { name: String, value: String },
    /// `name = expr`
    Constant { name: String, expr: String },
    /// `[label] MNEM [operands]` — label has no colon in this shape.
    Instruction {
        label: Option<String>,
        mnemonic: String,
        operands: String,
    },
    /// Catch-all: `name [args]`
    MacroCall { name: String, args: String },
}

/// Classify a comment-stripped source line.
pub fn classify_line(line: &str) -> Result<LineAst, ParseError> {
    let code = line.trim();
    if code.is_empty() {
        return Ok(LineAst::Empty);
    }
    if code == "{" {
        return Ok(LineAst::ScopeOpen);
    }
    if code == "}" {
        return Ok(LineAst::ScopeClose);
    }

    if let Some(rest) = code.strip_prefix('.') {
        let (keyword, value) = split_ident(rest);
        if keyword.is_empty() {
            return Err(ParseError {
                message: "Syntax Error".to_string(),
            });
        }
        return Ok(LineAst::Directive {
            name: keyword.to_ascii_lowercase(),
            value: value.trim().to_string(),
        });
    }

    let (name, after) = split_ident(code);
    if name.is_empty() {
        return Err(ParseError {
            message: "Syntax Error".to_string(),
        });
    }
    let after = after.trim_start();

    if let Some(rest) = after.strip_prefix(':') {
        return Ok(LineAst::Label {
            name,
            rest: rest.trim().to_string(),
        });
    }

    if let Some(rest) = after.strip_prefix('.') {
        let (keyword, value) = split_ident(rest);
        if keyword.eq_ignore_ascii_case("res") {
            return Ok(LineAst::MemReserve {
                name,
                count: value.trim().to_string(),
            });
        }
        // Labeled directive: the label is ignored, as the directive
        // pattern never captured one.
        return Ok(LineAst::Directive {
            name: keyword.to_ascii_lowercase(),
            value: value.trim().to_string(),
        });
    }

    if after.starts_with('=') && !after.starts_with("==") {
        return Ok(LineAst::Constant {
            name,
            expr: after[1..].trim().to_string(),
        });
    }

    if is_mnemonic_shaped(&name) {
        return Ok(LineAst::Instruction {
            label: None,
            mnemonic: name,
            operands: after.to_string(),
        });
    }

    let (second, after_second) = split_ident(after);
    if is_mnemonic_shaped(&second) {
        return Ok(LineAst::Instruction {
            label: Some(name),
            mnemonic: second,
            operands: after_second.trim().to_string(),
        });
    }

    Ok(LineAst::MacroCall {
        name,
        args: after.to_string(),
    })
}

fn is_mnemonic_shaped(word: &str) -> bool {
    word.len() == 3 && word.bytes().all(|c| c.is_ascii_alphabetic()) && table::is_mnemonic(word)
}

/// Split a leading identifier off a string, returning it and the rest.
fn split_ident(text: &str) -> (String, &str) {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return (String::new(), text);
    }
    let mut end = 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    (text[..end].to_string(), &text[end..])
}

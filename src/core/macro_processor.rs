// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Macro storage and textual expansion.

use std::collections::HashMap;

use crate::core::text_utils::{is_ident_char, is_ident_start};

/// Maximum nesting of macro invocations from expanded lines.
pub const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct MacroError {
    pub message: String,
}

impl MacroError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacroDef {
    pub params: Vec<String>,
    pub lines: Vec<String>,
}

/// Named macros with stored, unexpanded bodies. Expansion is literal
/// find/replace of parameter names across each stored line — not hygienic,
/// and a parameter name occurring inside a longer identifier is replaced
/// too. Callers re-parse the returned lines, so macro invocations inside a
/// body expand naturally.
#[derive(Debug, Default)]
pub struct MacroProcessor {
    macros: HashMap<String, MacroDef>,
}

impl MacroProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.macros.clear();
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn define(&mut self, name: &str, params: Vec<String>) -> Result<(), MacroError> {
        if self.macros.contains_key(name) {
            return Err(MacroError::new(
                "Macro with the same name already defined",
            ));
        }
        self.macros.insert(
            name.to_string(),
            MacroDef {
                params,
                lines: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn push_line(&mut self, name: &str, line: &str) {
        if let Some(def) = self.macros.get_mut(name) {
            def.lines.push(line.to_string());
        }
    }

    /// Substitute arguments into a macro body, returning the lines to
    /// re-parse. Arguments are whitespace-stripped and comma-split, as the
    /// invocation syntax allows no spaces inside an argument.
    pub fn expand(&self, name: &str, args: &str) -> Result<Vec<String>, MacroError> {
        let def = self
            .macros
            .get(name)
            .ok_or_else(|| MacroError::new("Undefined Macro"))?;

        let cleaned: String = args.chars().filter(|c| !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            if !def.params.is_empty() {
                return Err(MacroError::new("Macro called without params"));
            }
            return Ok(def.lines.clone());
        }

        let values: Vec<&str> = cleaned.split(',').collect();
        let mut out = Vec::with_capacity(def.lines.len());
        for line in &def.lines {
            let mut expanded = line.clone();
            for (param, value) in def.params.iter().zip(values.iter()) {
                expanded = expanded.replace(param.as_str(), value);
            }
            out.push(expanded);
        }
        Ok(out)
    }
}

/// Parse a `.macro` directive value: `name [p1, p2, ...]`.
pub fn parse_macro_header(value: &str) -> Option<(String, Vec<String>)> {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return None;
    }
    let mut end = 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    let name = value[..end].to_string();
    let rest = value[end..].trim();
    if rest.is_empty() {
        return Some((name, Vec::new()));
    }
    let params: Vec<String> = rest
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Some((name, params))
}

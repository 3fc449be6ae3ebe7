// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Forward-reference tracking and resolution.
//!
//! Every symbol referenced before its definition gets an
//! [`UnresolvedSymbol`] record in the enclosing frame's pending table:
//! the constants whose expressions mention it and the image positions
//! whose bytes depend on it. When the symbol is finally defined,
//! [`resolve_defined`] runs an explicit worklist over those records,
//! decrementing remaining-undefined counters and finalizing each dependent
//! the moment its counter reaches zero. Dependent constants re-enter the
//! worklist, so resolution cascades without recursive table mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{self, EvalOutcome, Value, ValueWidth};
use crate::core::imagestore::ImageStore;
use crate::core::scope::{LexicalScope, ScopeResult};
use crate::core::tokenizer::tokenize;
use crate::mos6502::operand::AddrMode;

/// Pending state for a symbol that is referenced but not yet defined.
///
/// `expr`/`nbr_undefined` are set when the name is itself a constant whose
/// expression could not be folded yet; the two lists are the reverse edges
/// from this name to everything waiting on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedSymbol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default)]
    pub nbr_undefined: u16,
    #[serde(default)]
    pub depending_symbols: Vec<String>,
    #[serde(default)]
    pub expr_positions: Vec<u16>,
}

impl UnresolvedSymbol {
    /// Union another record into this one (scope-exit merge-up).
    /// Duplicate dependents and positions are dropped.
    pub fn merge(&mut self, other: UnresolvedSymbol) {
        if self.expr.is_none() {
            self.expr = other.expr;
            self.nbr_undefined = other.nbr_undefined;
        }
        for dep in other.depending_symbols {
            if !self.depending_symbols.contains(&dep) {
                self.depending_symbols.push(dep);
            }
        }
        for pos in other.expr_positions {
            if !self.expr_positions.contains(&pos) {
                self.expr_positions.push(pos);
            }
        }
    }
}

/// A not-yet-patchable expression at a fixed image position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedExpr {
    pub position: u16,
    pub expr: String,
    pub width: ValueWidth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr_mode: Option<AddrMode>,
    pub nbr_undefined: u16,
}

/// All pending expressions of a run, keyed by image position. Carries the
/// origin so a fresh resolution pass patches relative branches identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedExprTable {
    pub origin: u16,
    pub exprs: BTreeMap<u16, UnresolvedExpr>,
}

impl UnresolvedExprTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.origin = 0;
        self.exprs.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn insert(&mut self, expr: UnresolvedExpr) {
        self.exprs.insert(expr.position, expr);
    }
}

/// Cascade resolution after `name` was bound in the current frame.
///
/// Classic ready-when-counter-hits-zero worklist: dependents whose last
/// undefined input was `name` are evaluated and defined (joining the
/// worklist themselves); ready expressions are evaluated and patched into
/// the image. Errors are collected, not fatal.
pub fn resolve_defined(
    name: &str,
    scope: &mut LexicalScope,
    exprs: &mut UnresolvedExprTable,
    image: &mut ImageStore,
) -> Vec<AsmError> {
    let mut errors = Vec::new();
    let mut work = vec![name.to_string()];

    while let Some(current) = work.pop() {
        let record = match scope.take_pending(&current) {
            Some(record) => record,
            None => continue,
        };

        // Dependent constants: decrement, collect the ones now computable.
        let mut ready_symbols: Vec<(String, String)> = Vec::new();
        for dep in &record.depending_symbols {
            if let Some(dep_record) = scope.pending_mut(dep) {
                if dep_record.nbr_undefined > 0 {
                    dep_record.nbr_undefined -= 1;
                }
                if dep_record.nbr_undefined == 0 {
                    if let Some(text) = dep_record.expr.clone() {
                        ready_symbols.push((dep.clone(), text));
                    }
                }
            }
        }

        // Dependent expressions: decrement, collect the ready positions.
        let mut ready_positions: Vec<u16> = Vec::new();
        for pos in &record.expr_positions {
            if let Some(expr_record) = exprs.exprs.get_mut(pos) {
                if expr_record.nbr_undefined > 0 {
                    expr_record.nbr_undefined -= 1;
                }
                if expr_record.nbr_undefined == 0 {
                    ready_positions.push(*pos);
                }
            }
        }

        for (dep, text) in ready_symbols {
            match expr::eval_tokens(&tokenize(&text), scope) {
                Ok(EvalOutcome::Value(value)) => match scope.bind(&dep, value) {
                    ScopeResult::Ok => work.push(dep),
                    ScopeResult::Duplicate => errors.push(AsmError::new(
                        AsmErrorKind::Symbol,
                        "Label already declared",
                        Some(&dep),
                    )),
                    _ => errors.push(AsmError::new(
                        AsmErrorKind::Symbol,
                        "Cannot bind symbol",
                        Some(&dep),
                    )),
                },
                Ok(EvalOutcome::Undefined(names)) => {
                    // Counter said ready but evaluation still misses names;
                    // restore the counter so a later definition retries.
                    if let Some(dep_record) = scope.pending_mut(&dep) {
                        dep_record.nbr_undefined = names.len() as u16;
                    }
                }
                Err(err) => errors.push(AsmError::new(
                    AsmErrorKind::Expression,
                    &err.message,
                    Some(&dep),
                )),
            }
        }

        for pos in ready_positions {
            let expr_record = match exprs.exprs.remove(&pos) {
                Some(record) => record,
                None => continue,
            };
            match expr::eval_tokens(&tokenize(&expr_record.expr), scope) {
                Ok(EvalOutcome::Value(value)) => {
                    if let Err(err) = patch_expr(image, exprs.origin, &expr_record, value) {
                        errors.push(err);
                    }
                }
                Ok(EvalOutcome::Undefined(names)) => {
                    let mut restored = expr_record;
                    restored.nbr_undefined = names.len() as u16;
                    exprs.insert(restored);
                }
                Err(err) => errors.push(AsmError::new(
                    AsmErrorKind::Expression,
                    &err.message,
                    Some(&expr_record.expr),
                )),
            }
        }
    }

    errors
}

/// Sweep the current frame's pending table, cascading every name that has
/// a definition by now. Used at end of run and by the multi-segment
/// resolution pass after importing a dependency's symbol table.
pub fn resolve_all(
    scope: &mut LexicalScope,
    exprs: &mut UnresolvedExprTable,
    image: &mut ImageStore,
) -> Vec<AsmError> {
    let mut errors = Vec::new();
    loop {
        let ready: Vec<String> = scope
            .pending_names()
            .into_iter()
            .filter(|name| scope.lookup(name).is_some())
            .collect();
        if ready.is_empty() {
            break;
        }
        for name in ready {
            errors.extend(resolve_defined(&name, scope, exprs, image));
        }
    }
    errors
}

/// Patch a resolved expression value into the image, using the width and
/// addressing mode recorded at emission time.
fn patch_expr(
    image: &mut ImageStore,
    origin: u16,
    record: &UnresolvedExpr,
    value: Value,
) -> Result<(), AsmError> {
    let bytes: Vec<u8> = if record.addr_mode == Some(AddrMode::Relative) {
        match value {
            Value::Word(target) => {
                // position + origin is the address just past the opcode.
                let opcode_addr = origin.wrapping_add(record.position).wrapping_sub(1);
                let offset = expr::encode_relative(target, opcode_addr).map_err(|err| {
                    AsmError::new(AsmErrorKind::Instruction, &err.message, Some(&record.expr))
                })?;
                vec![offset]
            }
            // Byte results are literal offsets, as in direct encoding.
            other => vec![other.low_byte()],
        }
    } else {
        match record.width {
            ValueWidth::Byte => vec![value.low_byte()],
            ValueWidth::Word => {
                let word = value.as_word();
                vec![(word & 0xff) as u8, (word >> 8) as u8]
            }
        }
    };

    if !image.patch(record.position, &bytes) {
        return Err(AsmError::new(
            AsmErrorKind::Symbol,
            "Patch position out of range",
            Some(&record.expr),
        ));
    }
    Ok(())
}

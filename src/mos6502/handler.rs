// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction encoding for the MOS 6502.
//!
//! Resolves the addressing mode from the operand shape, evaluates the
//! operand expression, applies the zero-page downgrade, and produces the
//! final byte sequence. When the operand still has undefined symbols the
//! bytes contain a placeholder and the caller registers the returned
//! pending record as a forward reference. When an error is reported
//! alongside bytes, the bytes keep the image length consistent with the
//! intended instruction length.

use crate::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{self, EvalContext, EvalOutcome, Value, ValueWidth};
use crate::core::tokenizer::tokenize;
use crate::mos6502::operand::{classify_operand, AddrMode};
use crate::mos6502::table;

/// Branch mnemonics (relative addressing).
pub const REL_OPC: &[&str] = &["BCC", "BCS", "BEQ", "BMI", "BNE", "BPL", "BVC", "BVS"];

/// Shift/rotate mnemonics that take accumulator mode with no operand.
pub const ACC_OPC: &[&str] = &["ASL", "LSR", "ROL", "ROR"];

#[must_use]
pub fn is_branch(mnemonic: &str) -> bool {
    REL_OPC.iter().any(|opc| opc.eq_ignore_ascii_case(mnemonic))
}

#[must_use]
pub fn is_shift(mnemonic: &str) -> bool {
    ACC_OPC.iter().any(|opc| opc.eq_ignore_ascii_case(mnemonic))
}

/// Forward-reference metadata for an operand that could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperand {
    pub expr: String,
    pub width: ValueWidth,
    pub mode: AddrMode,
    pub undefined: Vec<String>,
}

/// Result of encoding one instruction line.
#[derive(Debug, Default)]
pub struct EncodeOutcome {
    /// Bytes to emit; empty when the line produces nothing.
    pub bytes: Vec<u8>,
    /// Set when byte 1 is a placeholder awaiting resolution.
    pub pending: Option<PendingOperand>,
    /// Non-fatal error to record for this line.
    pub error: Option<AsmError>,
}

impl EncodeOutcome {
    fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    fn error(error: AsmError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    fn operand_error() -> Self {
        Self::error(AsmError::new(AsmErrorKind::Instruction, "Error in operands", None))
    }
}

/// Encode an instruction, evaluating its operand against `ctx`.
/// `current_addr` is the address of the opcode byte (used for relative
/// branches).
pub fn encode_instruction(
    mnemonic: &str,
    operands: &str,
    current_addr: u16,
    ctx: &dyn EvalContext,
) -> EncodeOutcome {
    let entry = match table::lookup(mnemonic) {
        Some(entry) => entry,
        None => return EncodeOutcome::operand_error(),
    };

    let operands = operands.trim();
    if operands.is_empty() {
        let mode = if is_shift(mnemonic) {
            AddrMode::Accumulator
        } else {
            AddrMode::Implied
        };
        return match entry.opcode(mode) {
            Some(opcode) => EncodeOutcome::bytes(vec![opcode]),
            None => EncodeOutcome::operand_error(),
        };
    }

    if is_branch(mnemonic) {
        return encode_branch(entry, operands, current_addr, ctx);
    }

    let classified = classify_operand(operands);
    match classified.mode {
        AddrMode::Immediate | AddrMode::IndexedIndirectX | AddrMode::IndirectIndexedY => {
            encode_byte_operand(entry, classified.mode, &classified.expr, ctx)
        }
        AddrMode::Indirect => encode_word_operand(entry, AddrMode::Indirect, &classified.expr, ctx),
        AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY => {
            encode_wide_operand(entry, classified.mode, &classified.expr, ctx)
        }
        // classify_operand never yields the remaining modes.
        _ => EncodeOutcome::operand_error(),
    }
}

fn encode_branch(
    entry: &table::OpcodeEntry,
    operands: &str,
    current_addr: u16,
    ctx: &dyn EvalContext,
) -> EncodeOutcome {
    let opcode = match entry.opcode(AddrMode::Relative) {
        Some(opcode) => opcode,
        None => return EncodeOutcome::operand_error(),
    };
    match expr::eval_tokens(&tokenize(operands), ctx) {
        Ok(EvalOutcome::Value(Value::Word(target))) => {
            match expr::encode_relative(target, current_addr) {
                Ok(offset) => EncodeOutcome::bytes(vec![opcode, offset]),
                Err(err) => EncodeOutcome {
                    bytes: vec![opcode, 0],
                    pending: None,
                    error: Some(AsmError::new(
                        AsmErrorKind::Instruction,
                        &err.message,
                        None,
                    )),
                },
            }
        }
        // A byte-ranged result is used as the literal offset.
        Ok(EvalOutcome::Value(value)) => EncodeOutcome::bytes(vec![opcode, value.low_byte()]),
        Ok(EvalOutcome::Undefined(undefined)) => EncodeOutcome {
            bytes: vec![opcode, 0],
            pending: Some(PendingOperand {
                expr: operands.trim().to_string(),
                width: ValueWidth::Byte,
                mode: AddrMode::Relative,
                undefined,
            }),
            error: None,
        },
        Err(err) => EncodeOutcome {
            bytes: vec![opcode, 0],
            pending: None,
            error: Some(AsmError::new(AsmErrorKind::Expression, &err.message, None)),
        },
    }
}

/// Modes whose operand is a single byte: immediate and the zero-page
/// indirect forms. Word-ranged values truncate to the low byte.
fn encode_byte_operand(
    entry: &table::OpcodeEntry,
    mode: AddrMode,
    expr_text: &str,
    ctx: &dyn EvalContext,
) -> EncodeOutcome {
    let opcode = match entry.opcode(mode) {
        Some(opcode) => opcode,
        None => return EncodeOutcome::operand_error(),
    };
    match expr::eval_tokens(&tokenize(expr_text), ctx) {
        Ok(EvalOutcome::Value(value)) => EncodeOutcome::bytes(vec![opcode, value.low_byte()]),
        Ok(EvalOutcome::Undefined(undefined)) => EncodeOutcome {
            bytes: vec![opcode, 0],
            pending: Some(PendingOperand {
                expr: expr_text.to_string(),
                width: ValueWidth::Byte,
                mode,
                undefined,
            }),
            error: None,
        },
        Err(err) => EncodeOutcome {
            bytes: vec![opcode, 0],
            pending: None,
            error: Some(AsmError::new(AsmErrorKind::Expression, &err.message, None)),
        },
    }
}

/// Indirect mode: always a word operand, no downgrade.
fn encode_word_operand(
    entry: &table::OpcodeEntry,
    mode: AddrMode,
    expr_text: &str,
    ctx: &dyn EvalContext,
) -> EncodeOutcome {
    let opcode = match entry.opcode(mode) {
        Some(opcode) => opcode,
        None => return EncodeOutcome::operand_error(),
    };
    match expr::eval_tokens(&tokenize(expr_text), ctx) {
        Ok(EvalOutcome::Value(value)) => {
            let word = value.as_word();
            EncodeOutcome::bytes(vec![opcode, (word & 0xff) as u8, (word >> 8) as u8])
        }
        Ok(EvalOutcome::Undefined(undefined)) => EncodeOutcome {
            bytes: vec![opcode, 0, 0],
            pending: Some(PendingOperand {
                expr: expr_text.to_string(),
                width: ValueWidth::Word,
                mode,
                undefined,
            }),
            error: None,
        },
        Err(err) => EncodeOutcome {
            bytes: vec![opcode, 0, 0],
            pending: None,
            error: Some(AsmError::new(AsmErrorKind::Expression, &err.message, None)),
        },
    }
}

/// Absolute-family modes: downgrade to the zero-page variant when the
/// value fits a byte and the narrower slot exists; keep the wide form
/// otherwise. Forward references stay wide because the placeholder size is
/// fixed at emission.
fn encode_wide_operand(
    entry: &table::OpcodeEntry,
    mode: AddrMode,
    expr_text: &str,
    ctx: &dyn EvalContext,
) -> EncodeOutcome {
    match expr::eval_tokens(&tokenize(expr_text), ctx) {
        Ok(EvalOutcome::Value(value)) => {
            if value.fits_byte() {
                if let Some(zp_opcode) = mode.zero_page().and_then(|zp| entry.opcode(zp)) {
                    return EncodeOutcome::bytes(vec![zp_opcode, value.low_byte()]);
                }
            }
            match entry.opcode(mode) {
                Some(opcode) => {
                    let word = value.as_word();
                    EncodeOutcome::bytes(vec![opcode, (word & 0xff) as u8, (word >> 8) as u8])
                }
                None => EncodeOutcome::operand_error(),
            }
        }
        Ok(EvalOutcome::Undefined(undefined)) => match entry.opcode(mode) {
            Some(opcode) => EncodeOutcome {
                bytes: vec![opcode, 0, 0],
                pending: Some(PendingOperand {
                    expr: expr_text.to_string(),
                    width: ValueWidth::Word,
                    mode,
                    undefined,
                }),
                error: None,
            },
            None => EncodeOutcome::operand_error(),
        },
        Err(err) => match entry.opcode(mode) {
            Some(opcode) => EncodeOutcome {
                bytes: vec![opcode, 0, 0],
                pending: None,
                error: Some(AsmError::new(AsmErrorKind::Expression, &err.message, None)),
            },
            None => EncodeOutcome::operand_error(),
        },
    }
}

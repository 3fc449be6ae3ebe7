// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Addressing modes and syntactic operand classification.
//!
//! Classification is purely textual; zero-page versus absolute cannot be
//! decided here because it depends on the evaluated operand magnitude. The
//! classifier therefore yields the wide mode and the instruction handler
//! downgrades it afterwards when the value fits a byte.

use serde::{Deserialize, Serialize};

/// The 13 addressing modes, in opcode-table slot order. The zero-page
/// variants sit exactly three slots after their absolute counterparts,
/// which is what makes the downgrade a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Indirect,
    IndexedIndirectX,
    IndirectIndexedY,
    Relative,
}

impl AddrMode {
    /// Slot index into an opcode-table row.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AddrMode::Implied => 0,
            AddrMode::Accumulator => 1,
            AddrMode::Immediate => 2,
            AddrMode::Absolute => 3,
            AddrMode::AbsoluteX => 4,
            AddrMode::AbsoluteY => 5,
            AddrMode::ZeroPage => 6,
            AddrMode::ZeroPageX => 7,
            AddrMode::ZeroPageY => 8,
            AddrMode::Indirect => 9,
            AddrMode::IndexedIndirectX => 10,
            AddrMode::IndirectIndexedY => 11,
            AddrMode::Relative => 12,
        }
    }

    /// The zero-page counterpart of an absolute-family mode.
    #[must_use]
    pub fn zero_page(self) -> Option<AddrMode> {
        match self {
            AddrMode::Absolute => Some(AddrMode::ZeroPage),
            AddrMode::AbsoluteX => Some(AddrMode::ZeroPageX),
            AddrMode::AbsoluteY => Some(AddrMode::ZeroPageY),
            _ => None,
        }
    }

    /// Number of operand bytes this mode carries.
    #[must_use]
    pub fn operand_size(self) -> u8 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndexedIndirectX
            | AddrMode::IndirectIndexedY
            | AddrMode::Relative => 1,
            AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => {
                2
            }
        }
    }
}

/// An operand classified by shape, with the expression text extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedOperand {
    pub mode: AddrMode,
    pub expr: String,
}

/// Classify a raw operand string by its syntactic shape. Whitespace is
/// irrelevant to the shape and is stripped. Checks run in a fixed order so
/// `(zp,x)` is not mistaken for an `,x`-indexed absolute and `(zp),y` wins
/// over plain `,y`.
#[must_use]
pub fn classify_operand(operands: &str) -> ClassifiedOperand {
    let inst: String = operands.chars().filter(|c| !c.is_whitespace()).collect();
    let lower = inst.to_ascii_lowercase();

    if let Some(rest) = inst.strip_prefix('#') {
        return ClassifiedOperand {
            mode: AddrMode::Immediate,
            expr: rest.to_string(),
        };
    }
    if lower.ends_with(",x") && !(lower.starts_with('(') && lower.ends_with(",x)")) {
        return ClassifiedOperand {
            mode: AddrMode::AbsoluteX,
            expr: inst[..inst.len() - 2].to_string(),
        };
    }
    if lower.starts_with('(') && lower.ends_with(",x)") {
        return ClassifiedOperand {
            mode: AddrMode::IndexedIndirectX,
            expr: inst[1..inst.len() - 3].to_string(),
        };
    }
    if lower.starts_with('(') && lower.ends_with("),y") {
        return ClassifiedOperand {
            mode: AddrMode::IndirectIndexedY,
            expr: inst[1..inst.len() - 3].to_string(),
        };
    }
    if lower.ends_with(",y") {
        return ClassifiedOperand {
            mode: AddrMode::AbsoluteY,
            expr: inst[..inst.len() - 2].to_string(),
        };
    }
    if lower.starts_with('(') && lower.ends_with(')') {
        return ClassifiedOperand {
            mode: AddrMode::Indirect,
            expr: inst[1..inst.len() - 1].to_string(),
        };
    }
    ClassifiedOperand {
        mode: AddrMode::Absolute,
        expr: inst,
    }
}

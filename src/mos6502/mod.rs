// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 instruction set: opcode tables, addressing-mode
//! classification, and instruction encoding.

pub mod handler;
pub mod operand;
pub mod table;

pub use handler::{encode_instruction, is_branch, is_shift, EncodeOutcome, PendingOperand};
pub use operand::{classify_operand, AddrMode};

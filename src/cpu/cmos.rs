// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 65C02 CMOS extensions.
//!
//! New mnemonics plus additional addressing modes on base mnemonics, most
//! notably zero-page indirect `(zp)`.

use crate::cpu::AddrMode::*;
use crate::cpu::{e, Entry};

pub const CMOS_INSTRUCTIONS: &[Entry] = &[
    // Store zero
    e("STZ", ZeroPage, 0x64),
    e("STZ", ZeroPageX, 0x74),
    e("STZ", Absolute, 0x9C),
    e("STZ", AbsoluteX, 0x9E),
    // Branch always
    e("BRA", Relative, 0x80),
    // Index register stack ops
    e("PHX", Implied, 0xDA),
    e("PLX", Implied, 0xFA),
    e("PHY", Implied, 0x5A),
    e("PLY", Implied, 0x7A),
    // Test and set/reset bits
    e("TSB", ZeroPage, 0x04),
    e("TSB", Absolute, 0x0C),
    e("TRB", ZeroPage, 0x14),
    e("TRB", Absolute, 0x1C),
    // Zero-page indirect on the accumulator ops
    e("ORA", ZeroPageIndirect, 0x12),
    e("AND", ZeroPageIndirect, 0x32),
    e("EOR", ZeroPageIndirect, 0x52),
    e("ADC", ZeroPageIndirect, 0x72),
    e("STA", ZeroPageIndirect, 0x92),
    e("LDA", ZeroPageIndirect, 0xB2),
    e("CMP", ZeroPageIndirect, 0xD2),
    e("SBC", ZeroPageIndirect, 0xF2),
    // BIT gains immediate and indexed forms
    e("BIT", ZeroPageX, 0x34),
    e("BIT", AbsoluteX, 0x3C),
    e("BIT", Immediate, 0x89),
    // Indexed indirect jump
    e("JMP", AbsoluteXIndirect, 0x7C),
    // Accumulator increment/decrement, with the WDC aliases
    e("INC", Accumulator, 0x1A),
    e("INA", Implied, 0x1A),
    e("DEC", Accumulator, 0x3A),
    e("DEA", Implied, 0x3A),
];

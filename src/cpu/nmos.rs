// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Undocumented NMOS 6502 opcodes, selected with `!cpu nmos6502`.
//!
//! Bare `TOP` and `DOP` emit a single `$0C`/`$80` byte; the encoder handles
//! that case outside these tables.

use crate::cpu::AddrMode::*;
use crate::cpu::{e, Entry};

pub const NMOS_INSTRUCTIONS: &[Entry] = &[
    // Shift left then OR
    e("SLO", ZeroPage, 0x07),
    e("SLO", ZeroPageX, 0x17),
    e("SLO", Absolute, 0x0F),
    e("SLO", AbsoluteX, 0x1F),
    e("SLO", AbsoluteY, 0x1B),
    e("SLO", IndexedIndirectX, 0x03),
    e("SLO", IndirectIndexedY, 0x13),
    // Rotate left then AND
    e("RLA", ZeroPage, 0x27),
    e("RLA", ZeroPageX, 0x37),
    e("RLA", Absolute, 0x2F),
    e("RLA", AbsoluteX, 0x3F),
    e("RLA", AbsoluteY, 0x3B),
    e("RLA", IndexedIndirectX, 0x23),
    e("RLA", IndirectIndexedY, 0x33),
    // Shift right then EOR
    e("SRE", ZeroPage, 0x47),
    e("SRE", ZeroPageX, 0x57),
    e("SRE", Absolute, 0x4F),
    e("SRE", AbsoluteX, 0x5F),
    e("SRE", AbsoluteY, 0x5B),
    e("SRE", IndexedIndirectX, 0x43),
    e("SRE", IndirectIndexedY, 0x53),
    // Rotate right then ADC
    e("RRA", ZeroPage, 0x67),
    e("RRA", ZeroPageX, 0x77),
    e("RRA", Absolute, 0x6F),
    e("RRA", AbsoluteX, 0x7F),
    e("RRA", AbsoluteY, 0x7B),
    e("RRA", IndexedIndirectX, 0x63),
    e("RRA", IndirectIndexedY, 0x73),
    // Store A AND X
    e("SAX", ZeroPage, 0x87),
    e("SAX", ZeroPageY, 0x97),
    e("SAX", Absolute, 0x8F),
    e("SAX", IndexedIndirectX, 0x83),
    // Load A and X
    e("LAX", ZeroPage, 0xA7),
    e("LAX", ZeroPageY, 0xB7),
    e("LAX", Absolute, 0xAF),
    e("LAX", AbsoluteY, 0xBF),
    e("LAX", IndexedIndirectX, 0xA3),
    e("LAX", IndirectIndexedY, 0xB3),
    // Decrement then compare
    e("DCP", ZeroPage, 0xC7),
    e("DCP", ZeroPageX, 0xD7),
    e("DCP", Absolute, 0xCF),
    e("DCP", AbsoluteX, 0xDF),
    e("DCP", AbsoluteY, 0xDB),
    e("DCP", IndexedIndirectX, 0xC3),
    e("DCP", IndirectIndexedY, 0xD3),
    // Increment then SBC
    e("ISC", ZeroPage, 0xE7),
    e("ISC", ZeroPageX, 0xF7),
    e("ISC", Absolute, 0xEF),
    e("ISC", AbsoluteX, 0xFF),
    e("ISC", AbsoluteY, 0xFB),
    e("ISC", IndexedIndirectX, 0xE3),
    e("ISC", IndirectIndexedY, 0xF3),
    // Immediate-only oddities
    e("ANC", Immediate, 0x0B),
    e("ALR", Immediate, 0x4B),
    e("ASR", Immediate, 0x4B),
    e("ARR", Immediate, 0x6B),
    e("SBX", Immediate, 0xCB),
    e("LXA", Immediate, 0xAB),
    e("ANE", Immediate, 0x8B),
    // Unstable high-byte stores
    e("SHA", AbsoluteY, 0x9F),
    e("SHA", IndirectIndexedY, 0x93),
    e("SHX", AbsoluteY, 0x9E),
    e("SHY", AbsoluteX, 0x9C),
    e("TAS", AbsoluteY, 0x9B),
    e("LAS", AbsoluteY, 0xBB),
    // Halt
    e("JAM", Implied, 0x02),
    // Undocumented NOP forms
    e("NOP", ZeroPage, 0x04),
    e("NOP", ZeroPageX, 0x14),
    e("NOP", Absolute, 0x0C),
    e("NOP", AbsoluteX, 0x1C),
    e("NOP", Immediate, 0x80),
    // Double/triple NOPs
    e("DOP", ZeroPage, 0x04),
    e("DOP", ZeroPageX, 0x14),
    e("DOP", Immediate, 0x80),
    e("TOP", Absolute, 0x0C),
    e("TOP", AbsoluteX, 0x1C),
];

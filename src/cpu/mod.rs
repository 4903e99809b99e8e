// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6502-family CPU variants and instruction tables.
//!
//! Each variant is served by a chain of static tables searched in order, so
//! CPU extensions (new mnemonics or new addressing modes on base mnemonics)
//! shadow nothing and add naturally:
//!
//! - 6502: base table
//! - NMOS 6502: undocumented opcodes, then base
//! - 65C02: CMOS extensions, then base
//! - W65C02S: Rockwell/WDC bit ops, then CMOS, then base

pub mod cmos;
pub mod encoder;
pub mod nmos;
pub mod table;
pub mod wdc;

pub use encoder::{encode_instruction, EncodeError, EncodedInstruction};

/// Addressing modes of the 6502 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `(abs)` - JMP only.
    Indirect,
    /// `(zp,X)`
    IndexedIndirectX,
    /// `(zp),Y`
    IndirectIndexedY,
    /// `(zp)` - 65C02 and up.
    ZeroPageIndirect,
    /// `(abs,X)` - 65C02 JMP.
    AbsoluteXIndirect,
    Relative,
    /// `zp, target` - W65C02S BBR/BBS.
    ZeroPageRelative,
}

impl AddrMode {
    /// Operand bytes following the opcode.
    #[must_use]
    pub fn operand_size(self) -> u16 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndexedIndirectX
            | AddrMode::IndirectIndexedY
            | AddrMode::ZeroPageIndirect
            | AddrMode::Relative => 1,
            AddrMode::Absolute
            | AddrMode::AbsoluteX
            | AddrMode::AbsoluteY
            | AddrMode::Indirect
            | AddrMode::AbsoluteXIndirect
            | AddrMode::ZeroPageRelative => 2,
        }
    }
}

/// An instruction table entry.
pub struct Entry {
    pub mnemonic: &'static str,
    pub mode: AddrMode,
    pub opcode: u8,
}

pub(crate) const fn e(mnemonic: &'static str, mode: AddrMode, opcode: u8) -> Entry {
    Entry {
        mnemonic,
        mode,
        opcode,
    }
}

/// CPU variant selected by `!cpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuType {
    #[default]
    Mos6502,
    Nmos6502,
    Cmos65c02,
    W65c02s,
}

impl CpuType {
    /// Parse the argument of a `!cpu` directive.
    #[must_use]
    pub fn by_name(name: &str) -> Option<CpuType> {
        match name.to_ascii_lowercase().as_str() {
            "6502" => Some(CpuType::Mos6502),
            "nmos6502" => Some(CpuType::Nmos6502),
            "65c02" | "r65c02" => Some(CpuType::Cmos65c02),
            "w65c02" | "w65c02s" => Some(CpuType::W65c02s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CpuType::Mos6502 => "6502",
            CpuType::Nmos6502 => "nmos6502",
            CpuType::Cmos65c02 => "65c02",
            CpuType::W65c02s => "w65c02",
        }
    }

    /// The table chain for this variant, extensions first.
    #[must_use]
    pub fn tables(self) -> &'static [&'static [Entry]] {
        match self {
            CpuType::Mos6502 => &[table::BASE_INSTRUCTIONS],
            CpuType::Nmos6502 => &[nmos::NMOS_INSTRUCTIONS, table::BASE_INSTRUCTIONS],
            CpuType::Cmos65c02 => &[cmos::CMOS_INSTRUCTIONS, table::BASE_INSTRUCTIONS],
            CpuType::W65c02s => &[
                wdc::WDC_INSTRUCTIONS,
                cmos::CMOS_INSTRUCTIONS,
                table::BASE_INSTRUCTIONS,
            ],
        }
    }
}

/// Look up the opcode for a mnemonic/mode pair on the given CPU.
#[must_use]
pub fn lookup(cpu: CpuType, mnemonic: &str, mode: AddrMode) -> Option<u8> {
    for table in cpu.tables() {
        for entry in *table {
            if entry.mnemonic == mnemonic && entry.mode == mode {
                return Some(entry.opcode);
            }
        }
    }
    None
}

/// Check if a mnemonic exists at all on the given CPU, in any mode.
#[must_use]
pub fn has_mnemonic(cpu: CpuType, mnemonic: &str) -> bool {
    cpu.tables()
        .iter()
        .any(|table| table.iter().any(|entry| entry.mnemonic == mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_lookup() {
        assert_eq!(lookup(CpuType::Mos6502, "LDA", AddrMode::Immediate), Some(0xa9));
        assert_eq!(lookup(CpuType::Mos6502, "RTS", AddrMode::Implied), Some(0x60));
        assert_eq!(lookup(CpuType::Mos6502, "JMP", AddrMode::Absolute), Some(0x4c));
    }

    #[test]
    fn extensions_are_gated_by_cpu() {
        assert_eq!(lookup(CpuType::Mos6502, "BRA", AddrMode::Relative), None);
        assert_eq!(lookup(CpuType::Cmos65c02, "BRA", AddrMode::Relative), Some(0x80));
        assert_eq!(lookup(CpuType::Mos6502, "SLO", AddrMode::ZeroPage), None);
        assert_eq!(lookup(CpuType::Nmos6502, "SLO", AddrMode::ZeroPage), Some(0x07));
        assert_eq!(lookup(CpuType::Cmos65c02, "WAI", AddrMode::Implied), None);
        assert_eq!(lookup(CpuType::W65c02s, "WAI", AddrMode::Implied), Some(0xcb));
    }

    #[test]
    fn cmos_adds_modes_to_base_mnemonics() {
        assert_eq!(
            lookup(CpuType::Mos6502, "LDA", AddrMode::ZeroPageIndirect),
            None
        );
        assert_eq!(
            lookup(CpuType::Cmos65c02, "LDA", AddrMode::ZeroPageIndirect),
            Some(0xb2)
        );
        // W65C02S inherits the CMOS set.
        assert_eq!(
            lookup(CpuType::W65c02s, "JMP", AddrMode::AbsoluteXIndirect),
            Some(0x7c)
        );
    }

    #[test]
    fn cpu_names() {
        assert_eq!(CpuType::by_name("6502"), Some(CpuType::Mos6502));
        assert_eq!(CpuType::by_name("NMOS6502"), Some(CpuType::Nmos6502));
        assert_eq!(CpuType::by_name("65c02"), Some(CpuType::Cmos65c02));
        assert_eq!(CpuType::by_name("w65c02s"), Some(CpuType::W65c02s));
        assert_eq!(CpuType::by_name("65816"), None);
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(AddrMode::Implied.operand_size(), 0);
        assert_eq!(AddrMode::Immediate.operand_size(), 1);
        assert_eq!(AddrMode::Absolute.operand_size(), 2);
        assert_eq!(AddrMode::ZeroPageRelative.operand_size(), 2);
    }
}

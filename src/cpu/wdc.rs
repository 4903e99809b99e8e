// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! W65C02S extensions: Rockwell bit ops and the WDC wait/stop pair.

use crate::cpu::AddrMode::*;
use crate::cpu::{e, Entry};

pub const WDC_INSTRUCTIONS: &[Entry] = &[
    // Branch on bit reset/set: zp, target
    e("BBR0", ZeroPageRelative, 0x0F),
    e("BBR1", ZeroPageRelative, 0x1F),
    e("BBR2", ZeroPageRelative, 0x2F),
    e("BBR3", ZeroPageRelative, 0x3F),
    e("BBR4", ZeroPageRelative, 0x4F),
    e("BBR5", ZeroPageRelative, 0x5F),
    e("BBR6", ZeroPageRelative, 0x6F),
    e("BBR7", ZeroPageRelative, 0x7F),
    e("BBS0", ZeroPageRelative, 0x8F),
    e("BBS1", ZeroPageRelative, 0x9F),
    e("BBS2", ZeroPageRelative, 0xAF),
    e("BBS3", ZeroPageRelative, 0xBF),
    e("BBS4", ZeroPageRelative, 0xCF),
    e("BBS5", ZeroPageRelative, 0xDF),
    e("BBS6", ZeroPageRelative, 0xEF),
    e("BBS7", ZeroPageRelative, 0xFF),
    // Reset/set memory bit: zp only
    e("RMB0", ZeroPage, 0x07),
    e("RMB1", ZeroPage, 0x17),
    e("RMB2", ZeroPage, 0x27),
    e("RMB3", ZeroPage, 0x37),
    e("RMB4", ZeroPage, 0x47),
    e("RMB5", ZeroPage, 0x57),
    e("RMB6", ZeroPage, 0x67),
    e("RMB7", ZeroPage, 0x77),
    e("SMB0", ZeroPage, 0x87),
    e("SMB1", ZeroPage, 0x97),
    e("SMB2", ZeroPage, 0xA7),
    e("SMB3", ZeroPage, 0xB7),
    e("SMB4", ZeroPage, 0xC7),
    e("SMB5", ZeroPage, 0xD7),
    e("SMB6", ZeroPage, 0xE7),
    e("SMB7", ZeroPage, 0xF7),
    // Stop and wait
    e("STP", Implied, 0xDB),
    e("WAI", Implied, 0xCB),
];

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional assembly blocks.
//!
//! `!if expr { ... } else { ... }`, `!ifdef`, `!ifndef`. A frame is pushed
//! per conditional; the not-taken branch is scanned at token level with only
//! brace nesting tracked (see `process_skip_tokens` in the driver).

use crate::assembler::{Assembler, Block};

#[derive(Debug)]
pub(crate) struct CondFrame {
    /// Whether any branch of this conditional has been (or is being) taken.
    pub taken: bool,
    /// An `else` branch has been seen.
    pub in_else: bool,
}

impl Assembler {
    /// Push a conditional frame. When the condition is false the branch
    /// body is skipped until its closing brace.
    pub(crate) fn open_conditional(&mut self, taken: bool) {
        self.blocks.push(Block::Cond(CondFrame {
            taken,
            in_else: false,
        }));
        if !taken {
            self.skip_depth = Some(1);
        }
    }
}

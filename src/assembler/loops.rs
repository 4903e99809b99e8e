// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Loop execution: `!for`, `!while`, `!do ... !until`.
//!
//! Bodies are captured as raw source lines and re-played through the pass
//! driver each iteration. All loops are bounded by the configurable
//! iteration limit; exceeding it is fatal.

use crate::assembler::{Assembler, LoopControl};
use crate::core::error::AsmErrorKind;
use crate::core::tokenizer::{Token, Tokenizer};
use crate::core::value::Value;

/// Parsed header of a `!for` loop. Endpoints are inclusive.
pub(crate) struct ForHeader {
    pub var: String,
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

/// How a body replay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyOutcome {
    Completed,
    Broke,
    Aborted,
}

impl Assembler {
    pub(crate) fn run_for(&mut self, header: &ForHeader, body: &[String]) {
        if header.step == 0 {
            self.error_at(AsmErrorKind::Semantic, "!for step must not be zero", None);
            return;
        }
        self.loop_nesting += 1;
        let mut iterations: u64 = 0;
        let mut current = header.start;
        while (header.step > 0 && current <= header.end)
            || (header.step < 0 && current >= header.end)
        {
            if !self.check_iteration_limit(&mut iterations) {
                break;
            }
            let _ = self.symbols.define(&header.var, Value::Int(current), true);
            match self.run_body(body) {
                BodyOutcome::Completed => {}
                BodyOutcome::Broke => break,
                BodyOutcome::Aborted => break,
            }
            current += header.step;
        }
        self.loop_nesting -= 1;
    }

    pub(crate) fn run_while(&mut self, cond: &[Token], body: &[String]) {
        self.loop_nesting += 1;
        let mut iterations: u64 = 0;
        loop {
            let Some(truthy) = self.eval_loop_condition(cond, 0) else {
                break;
            };
            if !truthy {
                break;
            }
            if !self.check_iteration_limit(&mut iterations) {
                break;
            }
            match self.run_body(body) {
                BodyOutcome::Completed => {}
                BodyOutcome::Broke | BodyOutcome::Aborted => break,
            }
        }
        self.loop_nesting -= 1;
    }

    /// Complete a `!do { ... }` block: the tail after the closing brace must
    /// carry the `!until` condition.
    pub(crate) fn finish_do(&mut self, body: Vec<String>, tail: &str) {
        let toks = match Tokenizer::new(tail, self.current_line).tokenize() {
            Ok(toks) => toks,
            Err(err) => {
                self.error_at(AsmErrorKind::Syntax, err.message, Some(err.span));
                return;
            }
        };
        let is_until = matches!(
            toks.first().map(|t| &t.kind),
            Some(crate::core::tokenizer::TokenKind::Directive(name)) if name == "until"
        );
        if !is_until {
            self.error_at(
                AsmErrorKind::Syntax,
                "Expected !until after !do block",
                toks.first().map(|t| t.span),
            );
            return;
        }

        self.loop_nesting += 1;
        let mut iterations: u64 = 0;
        let mut cond_end = toks.len();
        loop {
            if !self.check_iteration_limit(&mut iterations) {
                break;
            }
            match self.run_body(&body) {
                BodyOutcome::Completed => {}
                BodyOutcome::Broke | BodyOutcome::Aborted => break,
            }
            match self.eval(&toks, 1) {
                Ok((value, next, _)) => {
                    cond_end = next;
                    if value.is_undefined() {
                        self.error_at(
                            AsmErrorKind::Semantic,
                            "!until condition must be resolvable",
                            None,
                        );
                        break;
                    }
                    if value.is_truthy() {
                        break;
                    }
                }
                Err(err) => {
                    self.eval_error(err);
                    break;
                }
            }
        }
        self.loop_nesting -= 1;

        if !self.fatal && cond_end < toks.len() {
            self.process_statements(&toks, cond_end, tail);
        }
    }

    fn check_iteration_limit(&mut self, iterations: &mut u64) -> bool {
        if *iterations >= self.limits.max_loop_iterations {
            self.error_at(
                AsmErrorKind::Limit,
                format!(
                    "Loop exceeded {} iterations (safety limit)",
                    self.limits.max_loop_iterations
                ),
                None,
            );
            return false;
        }
        *iterations += 1;
        true
    }

    fn eval_loop_condition(&mut self, toks: &[Token], start: usize) -> Option<bool> {
        match self.eval(toks, start) {
            Ok((value, _, _)) => {
                if value.is_undefined() {
                    self.error_at(
                        AsmErrorKind::Semantic,
                        "Loop condition must be resolvable",
                        None,
                    );
                    return None;
                }
                Some(value.is_truthy())
            }
            Err(err) => {
                self.eval_error(err);
                None
            }
        }
    }

    /// Re-play captured body lines. Consumes `!break`/`!continue` requests
    /// from the body; open blocks from an abandoned iteration are unwound.
    fn run_body(&mut self, body: &[String]) -> BodyOutcome {
        let block_depth = self.blocks.len();
        for line in body {
            self.process_line(line);
            if self.fatal {
                return BodyOutcome::Aborted;
            }
            match self.loop_control.take() {
                None => {}
                Some(LoopControl::Continue) => {
                    self.blocks.truncate(block_depth);
                    self.skip_depth = None;
                    return BodyOutcome::Completed;
                }
                Some(LoopControl::Break) => {
                    self.blocks.truncate(block_depth);
                    self.skip_depth = None;
                    return BodyOutcome::Broke;
                }
            }
        }
        BodyOutcome::Completed
    }
}

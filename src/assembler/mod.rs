// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass assembler driver.
//!
//! Pass 1 lays out the program and collects symbols; pass 2 re-traverses the
//! source against the complete symbol table and emits the final bytes. The
//! symbol table persists between passes, so pass 2 resolves forward
//! references from pass-1 values; a label whose address differs between
//! passes is a phase error and aborts the run.
//!
//! The driver owns all shared state: symbol table, output image, program
//! counter, include stack, conditional/pseudo-PC block stack, macro
//! definitions, and the diagnostic sink. Macro and loop bodies are captured
//! as raw source lines and re-played through [`Assembler::process_line`].

pub mod cli;
mod conditionals;
mod directives;
mod loops;
mod macros;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::convtab::Table;
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic, PassCounts, Severity};
use crate::core::expr::{eval_expr, EvalContext, EvalError, SymbolRef};
use crate::core::files::FileManager;
use crate::core::image::{Image, ProgramCounter, StoreResult};
use crate::core::symbols::{DefineOutcome, SymbolTable};
use crate::core::text_utils::{brace_delta, split_at_closing_brace};
use crate::core::tokenizer::{Span, Token, TokenKind, Tokenizer};
use crate::core::value::Value;
use crate::cpu::{encode_instruction, has_mnemonic, CpuType};
use crate::output::OutputFormat;

use conditionals::CondFrame;
use macros::MacroDef;

pub const MAX_MACRO_DEPTH: usize = 32;
pub const MAX_LOOP_ITERATIONS: u64 = u32::MAX as u64;

/// A `{ ... }` block open at runtime.
#[derive(Debug)]
pub(crate) enum Block {
    Cond(CondFrame),
    PseudoPc,
    Zone(usize),
}

/// `!break` / `!continue` request for the innermost loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Break,
    Continue,
}

/// What a captured `{ ... }` body will become.
pub(crate) enum CaptureKind {
    Macro(String, Vec<macros::MacroParam>),
    For(loops::ForHeader),
    While(Vec<Token>),
    Do,
}

/// An in-progress multi-line body capture.
pub(crate) struct Capture {
    kind: CaptureKind,
    depth: i32,
    lines: Vec<String>,
    start_line: u32,
}

/// Safety limits, all overridable by library users.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_loop_iterations: u64,
    pub max_macro_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_loop_iterations: MAX_LOOP_ITERATIONS,
            max_macro_depth: MAX_MACRO_DEPTH,
        }
    }
}

/// One line of the pass-2 listing.
#[derive(Debug, Clone)]
pub struct ListingLine {
    pub line: u32,
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub source: String,
}

/// Output file/format requested by `!to` in the source.
#[derive(Debug, Default, Clone)]
pub struct OutputRequest {
    pub file: Option<String>,
    pub format: Option<OutputFormat>,
}

pub struct Assembler {
    pub(crate) symbols: SymbolTable,
    pub(crate) image: Image,
    pub(crate) pc: ProgramCounter,
    pub(crate) cpu: CpuType,
    pub(crate) convtab: Table,
    pub(crate) files: FileManager,
    pub(crate) macros: HashMap<String, MacroDef>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) pass: u8,
    pub(crate) stmt_index: u64,
    pub(crate) blocks: Vec<Block>,
    pub(crate) skip_depth: Option<i32>,
    pub(crate) capture: Option<Capture>,
    pub(crate) loop_control: Option<LoopControl>,
    pub(crate) loop_nesting: u32,
    pub(crate) param_scopes: Vec<HashMap<String, Value>>,
    pub(crate) macro_depth: usize,
    pub limits: Limits,
    pub(crate) output_request: OutputRequest,
    pub(crate) symbollist: Option<Option<String>>,
    pub(crate) current_file: String,
    pub(crate) current_line: u32,
    pub(crate) current_text: String,
    pub(crate) fatal: bool,
    pub(crate) initial_pc: i64,
    pub(crate) overlap_warned: bool,
    pub(crate) listing_enabled: bool,
    pub(crate) listing: Vec<ListingLine>,
    pub(crate) line_bytes: Vec<u8>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            image: Image::new(),
            pc: ProgramCounter::new(),
            cpu: CpuType::default(),
            convtab: Table::Raw,
            files: FileManager::new(),
            macros: HashMap::new(),
            diagnostics: Vec::new(),
            pass: 1,
            stmt_index: 0,
            blocks: Vec::new(),
            skip_depth: None,
            capture: None,
            loop_control: None,
            loop_nesting: 0,
            param_scopes: Vec::new(),
            macro_depth: 0,
            limits: Limits::default(),
            output_request: OutputRequest::default(),
            symbollist: None,
            current_file: String::new(),
            current_line: 0,
            current_text: String::new(),
            fatal: false,
            initial_pc: 0,
            overlap_warned: false,
            listing_enabled: false,
            listing: Vec::new(),
            line_bytes: Vec::new(),
        }
    }

    pub fn set_initial_pc(&mut self, pc: i64) {
        self.initial_pc = pc;
    }

    pub fn add_include_path(&mut self, path: impl Into<std::path::PathBuf>) {
        self.files.add_search_path(path.into());
    }

    pub fn enable_listing(&mut self) {
        self.listing_enabled = true;
    }

    #[must_use]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn listing(&self) -> &[ListingLine] {
        &self.listing
    }

    #[must_use]
    pub fn output_request(&self) -> &OutputRequest {
        &self.output_request
    }

    #[must_use]
    pub fn symbollist_request(&self) -> Option<&Option<String>> {
        self.symbollist.as_ref()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity != Severity::Warning)
            .count()
    }

    /// Assemble source lines in two passes. Returns true when no error or
    /// serious diagnostic was recorded.
    pub fn assemble(&mut self, lines: &[String], filename: &str) -> bool {
        for pass in 1..=2u8 {
            tracing::debug!("starting pass {pass}");
            self.begin_pass(pass);
            self.current_file = filename.to_string();
            self.run_source_lines(lines);
            self.finish_pass();
            if self.fatal || (pass == 1 && self.error_count() > 0) {
                return false;
            }
            if pass == 1 {
                // Pass 2 re-traverses everything; report its diagnostics only.
                self.diagnostics.clear();
            }
        }
        tracing::debug!(
            "assembly finished: {} bytes, {} diagnostics",
            self.image.bytes_written(),
            self.diagnostics.len()
        );
        self.error_count() == 0
    }

    fn begin_pass(&mut self, pass: u8) {
        self.pass = pass;
        self.symbols.begin_pass(pass);
        self.pc.reset(self.initial_pc);
        self.image.clear();
        self.image.set_init_byte(0);
        self.cpu = CpuType::default();
        self.convtab = Table::Raw;
        self.files.reset();
        self.blocks.clear();
        self.skip_depth = None;
        self.capture = None;
        self.loop_control = None;
        self.loop_nesting = 0;
        self.param_scopes.clear();
        self.macro_depth = 0;
        self.stmt_index = 0;
        self.overlap_warned = false;
        self.fatal = false;
        self.listing.clear();
    }

    fn finish_pass(&mut self) {
        if let Some(capture) = self.capture.take() {
            self.error_at(
                AsmErrorKind::Semantic,
                format!("Unclosed '{{' block opened at line {}", capture.start_line),
                None,
            );
        }
        if self.skip_depth.take().is_some()
            || self
                .blocks
                .iter()
                .any(|block| matches!(block, Block::Cond(_)))
        {
            self.error_at(
                AsmErrorKind::Semantic,
                "Unterminated conditional block",
                None,
            );
        }
        if self
            .blocks
            .iter()
            .any(|block| matches!(block, Block::PseudoPc))
        {
            self.error_at(AsmErrorKind::Semantic, "Unterminated !pseudopc block", None);
        }
        if self
            .blocks
            .iter()
            .any(|block| matches!(block, Block::Zone(_)))
        {
            self.error_at(AsmErrorKind::Semantic, "Unterminated !zone block", None);
        }
        self.blocks.clear();
    }

    fn run_source_lines(&mut self, lines: &[String]) {
        for (ix, line) in lines.iter().enumerate() {
            if self.fatal {
                break;
            }
            self.current_line = (ix + 1) as u32;
            let addr_before = self.pc.real();
            self.line_bytes.clear();
            self.process_line(line);
            if self.listing_enabled && self.pass == 2 {
                self.listing.push(ListingLine {
                    line: self.current_line,
                    addr: (addr_before & 0xffff) as u16,
                    bytes: std::mem::take(&mut self.line_bytes),
                    source: line.clone(),
                });
            }
        }
    }

    /// Process one logical source line: body capture first, then skip-mode
    /// brace tracking, then normal statement dispatch.
    pub(crate) fn process_line(&mut self, line: &str) {
        if self.fatal {
            return;
        }
        if self.capture.is_some() {
            self.capture_line(line);
            return;
        }
        self.current_text = line.to_string();
        let cpu = self.cpu;
        let toks = match Tokenizer::with_mnemonic_checker(
            line,
            self.current_line,
            Arc::new(move |name: &str| has_mnemonic(cpu, name)),
        )
        .tokenize()
        {
            Ok(toks) => toks,
            Err(err) => {
                // Skipped branches are lexed but must not fail the build.
                if self.skip_depth.is_none() {
                    self.error_at(AsmErrorKind::Syntax, err.message, Some(err.span));
                }
                return;
            }
        };
        self.process_statements(&toks, 0, line);
    }

    /// Tokenize and process a text fragment (block tails, included text).
    pub(crate) fn process_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.process_line(text);
    }

    pub(crate) fn process_statements(&mut self, toks: &[Token], mut i: usize, line: &str) {
        while i < toks.len() {
            if self.fatal || self.loop_control.is_some() {
                return;
            }
            if self.skip_depth.is_some() {
                i = self.process_skip_tokens(toks, i);
                continue;
            }
            let token = &toks[i];
            match &token.kind {
                TokenKind::Colon => {
                    i += 1;
                }
                TokenKind::Label(name) => {
                    self.stmt_index += 1;
                    self.define_label_here(&name.clone());
                    i += 1;
                }
                TokenKind::Anon(marker) if i == 0 => {
                    self.stmt_index += 1;
                    self.define_label_here(&marker.clone());
                    i += 1;
                }
                TokenKind::Star
                    if matches!(toks.get(i + 1).map(|t| &t.kind), Some(TokenKind::Equals)) =>
                {
                    self.stmt_index += 1;
                    i = self.set_origin(toks, i + 2);
                }
                TokenKind::Ident(name)
                    if matches!(toks.get(i + 1).map(|t| &t.kind), Some(TokenKind::Equals)) =>
                {
                    self.stmt_index += 1;
                    i = self.assign_symbol(&name.clone(), toks, i + 2);
                }
                TokenKind::Ident(name) if self.at_statement_end(toks, i + 1) => {
                    self.stmt_index += 1;
                    self.define_label_here(&name.clone());
                    i += 1;
                }
                TokenKind::Mnemonic { name, force_width } => {
                    self.stmt_index += 1;
                    let name = name.clone();
                    let force_width = *force_width;
                    match self.encode(&name, force_width, toks, i + 1) {
                        Some(next) => i = next,
                        None => return,
                    }
                }
                TokenKind::Directive(name) => {
                    self.stmt_index += 1;
                    match self.directive(&name.clone(), toks, i + 1, line) {
                        Some(next) => i = next,
                        None => return,
                    }
                }
                TokenKind::MacroCall(name) => {
                    self.stmt_index += 1;
                    match self.invoke_macro(&name.clone(), toks, i + 1) {
                        Some(next) => i = next,
                        None => return,
                    }
                }
                TokenKind::CloseBrace => {
                    i = self.close_block(toks, i);
                }
                other => {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        format!("Unexpected token: {other:?}"),
                        Some(token.span),
                    );
                    return;
                }
            }
        }
    }

    /// Brace tracking inside a not-taken conditional branch. Tokens are
    /// lexed but nothing is evaluated; nested braces (from inner
    /// conditionals, loops, or pseudo-PC blocks) only move the depth.
    fn process_skip_tokens(&mut self, toks: &[Token], mut i: usize) -> usize {
        while i < toks.len() {
            match &toks[i].kind {
                TokenKind::OpenBrace => {
                    if let Some(depth) = self.skip_depth.as_mut() {
                        *depth += 1;
                    }
                    i += 1;
                }
                TokenKind::CloseBrace => {
                    i += 1;
                    let closed = match self.skip_depth.as_mut() {
                        Some(depth) => {
                            *depth -= 1;
                            *depth == 0
                        }
                        None => false,
                    };
                    if closed {
                        self.skip_depth = None;
                        return self.end_skipped_branch(toks, i);
                    }
                }
                _ => {
                    i += 1;
                }
            }
        }
        i
    }

    /// The skipped branch just closed; an `else {` continues the
    /// conditional, anything else pops it.
    fn end_skipped_branch(&mut self, toks: &[Token], i: usize) -> usize {
        let has_else = matches!(
            toks.get(i).map(|t| &t.kind),
            Some(TokenKind::Ident(name)) if name.eq_ignore_ascii_case("else")
        );
        if !has_else {
            self.pop_cond_frame();
            return i;
        }
        if !matches!(
            toks.get(i + 1).map(|t| &t.kind),
            Some(TokenKind::OpenBrace)
        ) {
            self.error_at(
                AsmErrorKind::Syntax,
                "Expected '{' after else",
                toks.get(i).map(|t| t.span),
            );
            return toks.len();
        }
        let in_else = match self.blocks.last() {
            Some(Block::Cond(frame)) => Some(frame.in_else),
            _ => None,
        };
        match in_else {
            Some(true) => {
                self.error_at(
                    AsmErrorKind::Semantic,
                    "Multiple else branches in conditional",
                    toks.get(i).map(|t| t.span),
                );
                toks.len()
            }
            Some(false) => {
                // The skipped branch was the not-taken if branch, so the
                // else branch is live.
                if let Some(Block::Cond(frame)) = self.blocks.last_mut() {
                    frame.in_else = true;
                    frame.taken = true;
                }
                i + 2
            }
            None => {
                self.error_at(AsmErrorKind::Semantic, "else without !if", None);
                toks.len()
            }
        }
    }

    /// Handle `}` in active code: closes the innermost block.
    fn close_block(&mut self, toks: &[Token], i: usize) -> usize {
        enum Top {
            Cond { in_else: bool },
            Pseudo,
            Zone(usize),
            Nothing,
        }
        let top = match self.blocks.last() {
            Some(Block::Cond(frame)) => Top::Cond {
                in_else: frame.in_else,
            },
            Some(Block::PseudoPc) => Top::Pseudo,
            Some(Block::Zone(prev)) => Top::Zone(*prev),
            None => Top::Nothing,
        };
        match top {
            Top::Cond { in_else } => {
                let has_else = matches!(
                    toks.get(i + 1).map(|t| &t.kind),
                    Some(TokenKind::Ident(name)) if name.eq_ignore_ascii_case("else")
                );
                if has_else {
                    if in_else {
                        self.error_at(
                            AsmErrorKind::Semantic,
                            "Multiple else branches in conditional",
                            Some(toks[i].span),
                        );
                        return toks.len();
                    }
                    if !matches!(
                        toks.get(i + 2).map(|t| &t.kind),
                        Some(TokenKind::OpenBrace)
                    ) {
                        self.error_at(
                            AsmErrorKind::Syntax,
                            "Expected '{' after else",
                            Some(toks[i].span),
                        );
                        return toks.len();
                    }
                    // Taken branch finished; skip the else branch.
                    if let Some(Block::Cond(frame)) = self.blocks.last_mut() {
                        frame.in_else = true;
                    }
                    self.skip_depth = Some(1);
                    return i + 3;
                }
                self.pop_cond_frame();
                i + 1
            }
            Top::Pseudo => {
                self.pc.leave_pseudo();
                self.blocks.pop();
                i + 1
            }
            Top::Zone(prev) => {
                self.symbols.restore_zone(prev);
                self.blocks.pop();
                i + 1
            }
            Top::Nothing => {
                self.error_at(AsmErrorKind::Syntax, "Unexpected '}'", Some(toks[i].span));
                i + 1
            }
        }
    }

    fn pop_cond_frame(&mut self) {
        if !matches!(self.blocks.pop(), Some(Block::Cond(_))) {
            self.error_at(AsmErrorKind::Internal, "Conditional stack out of sync", None);
        }
    }

    fn define_label_here(&mut self, name: &str) {
        let pc_val = self.pc.effective();
        if name.chars().all(|c| c == '+') || name.chars().all(|c| c == '-') {
            self.symbols.record_anon(name, self.stmt_index, pc_val);
            return;
        }
        match self.symbols.define_label(name, Value::Int(pc_val)) {
            DefineOutcome::Ok => {}
            DefineOutcome::Duplicate => {
                self.error_at(
                    AsmErrorKind::Semantic,
                    format!("Symbol already defined: {name}"),
                    None,
                );
            }
            DefineOutcome::PhaseMismatch(old) => {
                self.error_at(
                    AsmErrorKind::Phase,
                    format!(
                        "Phase error: symbol {name} resolved to {old} in pass 1 but {pc_val} in pass 2"
                    ),
                    None,
                );
            }
        }
    }

    fn set_origin(&mut self, toks: &[Token], start: usize) -> usize {
        match self.eval(toks, start) {
            Ok((value, next, _)) => match value.as_int() {
                Some(addr) => {
                    self.pc.set_origin(addr);
                    next
                }
                None => {
                    self.error_at(
                        AsmErrorKind::Semantic,
                        "Program counter must be a known value",
                        toks.get(start).map(|t| t.span),
                    );
                    toks.len()
                }
            },
            Err(err) => {
                self.eval_error(err);
                toks.len()
            }
        }
    }

    fn assign_symbol(&mut self, name: &str, toks: &[Token], start: usize) -> usize {
        match self.eval(toks, start) {
            Ok((value, next, _)) => {
                if value.is_undefined() && self.pass == 2 {
                    self.error_at(
                        AsmErrorKind::UndefinedSymbol,
                        format!("Value of {name} is unresolved"),
                        None,
                    );
                    return next;
                }
                match self.symbols.define(name, value, false) {
                    DefineOutcome::Ok => {}
                    DefineOutcome::Duplicate => {
                        self.error_at(
                            AsmErrorKind::Semantic,
                            format!("Symbol already defined: {name}"),
                            None,
                        );
                    }
                    DefineOutcome::PhaseMismatch(old) => {
                        self.error_at(
                            AsmErrorKind::Phase,
                            format!(
                                "Phase error: symbol {name} changed from {old} between passes"
                            ),
                            None,
                        );
                    }
                }
                next
            }
            Err(err) => {
                self.eval_error(err);
                toks.len()
            }
        }
    }

    fn encode(
        &mut self,
        mnemonic: &str,
        force_width: Option<u8>,
        toks: &[Token],
        start: usize,
    ) -> Option<usize> {
        let pc = self.pc.effective();
        let result = {
            let mut ctx = AsmContext {
                symbols: &self.symbols,
                params: self.param_scopes.last(),
                pc,
                pass: self.pass,
                stmt: self.stmt_index,
            };
            encode_instruction(
                self.cpu,
                mnemonic,
                force_width,
                toks,
                start,
                &mut ctx,
                pc,
                self.pass,
            )
        };
        match result {
            Ok(encoded) => {
                for warning in encoded.warnings {
                    self.warn_at(warning.kind, warning.message, None);
                }
                self.emit(&encoded.bytes);
                Some(encoded.next)
            }
            Err(err) => {
                self.error_at(err.error.kind, err.error.message, err.span);
                None
            }
        }
    }

    /// Place bytes at the real PC and advance it.
    pub(crate) fn emit(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match self.image.store(self.pc.real(), b) {
                StoreResult::Ok => {}
                StoreResult::Overwrite => {
                    if self.pass == 2 && !self.overlap_warned {
                        self.overlap_warned = true;
                        self.warn_at(
                            AsmErrorKind::Semantic,
                            format!(
                                "Overlapping segments: ${:04x} written more than once",
                                self.pc.real()
                            ),
                            None,
                        );
                    }
                }
                StoreResult::OutOfRange => {
                    self.error_at(
                        AsmErrorKind::Range,
                        format!("Program counter out of range: {}", self.pc.real()),
                        None,
                    );
                    self.fatal = true;
                    return;
                }
            }
            if self.pass == 2 {
                self.line_bytes.push(b);
            }
            self.pc.advance(1);
        }
    }

    /// Advance the PC without writing (`!skip`, `!align` gap semantics are
    /// different: align writes fill bytes).
    pub(crate) fn advance_pc(&mut self, amount: i64) {
        self.pc.advance(amount);
    }

    /// Evaluate an expression with the assembler's symbol and parameter
    /// scopes.
    pub(crate) fn eval(
        &self,
        toks: &[Token],
        start: usize,
    ) -> Result<(Value, usize, bool), EvalError> {
        let mut ctx = AsmContext {
            symbols: &self.symbols,
            params: self.param_scopes.last(),
            pc: self.pc.effective(),
            pass: self.pass,
            stmt: self.stmt_index,
        };
        eval_expr(toks, start, &mut ctx)
    }

    /// Evaluate an expression that must produce a known integer.
    pub(crate) fn eval_known_int(
        &mut self,
        toks: &[Token],
        start: usize,
        what: &str,
    ) -> Option<(i64, usize)> {
        match self.eval(toks, start) {
            Ok((value, next, _)) => match value.as_int() {
                Some(v) => Some((v, next)),
                None => {
                    self.error_at(
                        AsmErrorKind::Semantic,
                        format!("{what} must be a known value"),
                        toks.get(start).map(|t| t.span),
                    );
                    None
                }
            },
            Err(err) => {
                self.eval_error(err);
                None
            }
        }
    }

    pub(crate) fn eval_error(&mut self, err: EvalError) {
        self.error_at(err.kind, err.message, Some(err.span));
    }

    pub(crate) fn error_at(
        &mut self,
        kind: AsmErrorKind,
        message: impl Into<String>,
        span: Option<Span>,
    ) {
        let error = AsmError::new(kind, message);
        if error.is_fatal() {
            self.fatal = true;
        }
        self.push_diagnostic(Severity::Error, error, span);
    }

    pub(crate) fn serious_at(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.fatal = true;
        let error = AsmError::new(AsmErrorKind::Semantic, message);
        self.push_diagnostic(Severity::Serious, error, span);
    }

    pub(crate) fn warn_at(
        &mut self,
        kind: AsmErrorKind,
        message: impl Into<String>,
        span: Option<Span>,
    ) {
        let error = AsmError::new(kind, message);
        self.push_diagnostic(Severity::Warning, error, span);
    }

    fn push_diagnostic(&mut self, severity: Severity, error: AsmError, span: Option<Span>) {
        let mut diagnostic = Diagnostic::new(severity, error, self.current_line)
            .with_file(Some(self.current_file.clone()))
            .with_source(Some(self.current_text.clone()));
        if let Some(span) = span {
            diagnostic = diagnostic.with_span(span);
        }
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn pass_counts(&self) -> PassCounts {
        let mut counts = PassCounts::new();
        counts.statements = self.stmt_index.min(u64::from(u32::MAX)) as u32;
        for d in &self.diagnostics {
            match d.severity {
                Severity::Warning => counts.warnings += 1,
                _ => counts.errors += 1,
            }
        }
        counts
    }

    // -- body capture ----------------------------------------------------

    /// Open a `{ ... }` body. If the closing brace is on the same line the
    /// body runs immediately, otherwise capture continues line by line.
    pub(crate) fn begin_body(&mut self, kind: CaptureKind, rest: &str) {
        match split_at_closing_brace(rest, 1) {
            Some((body, tail)) => {
                let lines = if body.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![body.to_string()]
                };
                let tail = tail.to_string();
                self.finish_body(kind, lines, &tail);
            }
            None => {
                let depth = 1 + brace_delta(rest);
                let lines = if rest.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![rest.to_string()]
                };
                self.capture = Some(Capture {
                    kind,
                    depth,
                    lines,
                    start_line: self.current_line,
                });
            }
        }
    }

    fn capture_line(&mut self, line: &str) {
        let depth = match &self.capture {
            Some(capture) => capture.depth,
            None => return,
        };
        match split_at_closing_brace(line, depth) {
            Some((prefix, tail)) => {
                let Some(mut capture) = self.capture.take() else {
                    return;
                };
                if !prefix.trim().is_empty() {
                    capture.lines.push(prefix.to_string());
                }
                let tail = tail.to_string();
                self.finish_body(capture.kind, capture.lines, &tail);
            }
            None => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.depth += brace_delta(line);
                    capture.lines.push(line.to_string());
                }
            }
        }
    }

    fn finish_body(&mut self, kind: CaptureKind, lines: Vec<String>, tail: &str) {
        match kind {
            CaptureKind::Macro(name, params) => {
                self.macros.insert(
                    name,
                    MacroDef {
                        params,
                        body: lines,
                    },
                );
                self.process_text(tail);
            }
            CaptureKind::For(header) => {
                self.run_for(&header, &lines);
                self.process_text(tail);
            }
            CaptureKind::While(cond) => {
                self.run_while(&cond, &lines);
                self.process_text(tail);
            }
            CaptureKind::Do => {
                self.finish_do(lines, tail);
            }
        }
    }
}

/// Failure of a whole assembler run, mapped to the process exit code.
#[derive(Debug)]
pub enum RunError {
    /// Assembly errors were reported (exit code 1).
    Assembly,
    /// An unexpected I/O or environment failure (exit code 3).
    Internal(String),
}

/// Run the assembler for a parsed command line: read the source, assemble,
/// report diagnostics on stderr, and write the requested outputs.
pub fn run(cli: &cli::Cli) -> Result<(), RunError> {
    let source = match std::fs::read_to_string(&cli.input) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Error: cannot read {}: {err}", cli.input.display());
            return Err(RunError::Assembly);
        }
    };
    let lines: Vec<String> = source.lines().map(str::to_string).collect();

    let mut assembler = Assembler::new();
    for dir in &cli.include {
        assembler.add_include_path(dir.clone());
    }
    if let Some(pc) = cli.setpc {
        assembler.set_initial_pc(pc);
    }
    if cli.listing.is_some() {
        assembler.enable_listing();
    }

    let filename = cli.input.display().to_string();
    tracing::info!("assembling {filename}");
    let success = assembler.assemble(&lines, &filename);
    let counts = assembler.pass_counts();
    tracing::debug!(
        "{} statements, {} errors, {} warnings",
        counts.statements,
        counts.errors,
        counts.warnings
    );

    for diagnostic in assembler.diagnostics() {
        eprintln!("{}", diagnostic.format());
    }
    if !success {
        return Err(RunError::Assembly);
    }

    let format = cli
        .format
        .or(assembler.output_request().format)
        .unwrap_or_default();
    let output_path = match (&cli.output, &assembler.output_request().file) {
        (Some(path), _) => path.clone(),
        (None, Some(name)) => std::path::PathBuf::from(name),
        (None, None) => {
            let ext = if format == OutputFormat::Hex { "hex" } else { "bin" };
            cli.input.with_extension(ext)
        }
    };

    let internal = |err: std::io::Error, what: &str| RunError::Internal(format!("{what}: {err}"));

    let mut out = std::fs::File::create(&output_path)
        .map_err(|err| internal(err, "cannot create output file"))?;
    crate::output::write_image(assembler.image(), format, &mut out)
        .map_err(|err| internal(err, "cannot write output file"))?;
    let written = assembler.image().bytes_written();
    println!(
        "Assembly completed: {written} bytes written to {}",
        output_path.display()
    );

    if let Some(path) = &cli.listing {
        let mut list = std::fs::File::create(path)
            .map_err(|err| internal(err, "cannot create listing file"))?;
        crate::output::write_listing(assembler.listing(), &mut list)
            .map_err(|err| internal(err, "cannot write listing file"))?;
    }

    if cli.symbols {
        crate::output::write_symbol_dump(assembler.symbols(), std::io::stdout())
            .map_err(|err| internal(err, "cannot write symbol dump"))?;
    }

    if let Some(path) = &cli.vicelabels {
        let mut labels = std::fs::File::create(path)
            .map_err(|err| internal(err, "cannot create VICE label file"))?;
        crate::output::write_vice_labels(assembler.symbols(), &mut labels)
            .map_err(|err| internal(err, "cannot write VICE label file"))?;
    }

    if let Some(request) = assembler.symbollist_request() {
        match request {
            Some(path) => {
                let mut file = std::fs::File::create(path)
                    .map_err(|err| internal(err, "cannot create symbol list file"))?;
                crate::output::write_symbol_dump(assembler.symbols(), &mut file)
                    .map_err(|err| internal(err, "cannot write symbol list file"))?;
            }
            None => {
                crate::output::write_symbol_dump(assembler.symbols(), std::io::stdout())
                    .map_err(|err| internal(err, "cannot write symbol list"))?;
            }
        }
    }

    Ok(())
}

/// Evaluation context backed by the assembler's symbol table and the
/// innermost macro parameter scope.
struct AsmContext<'a> {
    symbols: &'a SymbolTable,
    params: Option<&'a HashMap<String, Value>>,
    pc: i64,
    pass: u8,
    stmt: u64,
}

impl EvalContext for AsmContext<'_> {
    fn lookup_symbol(&mut self, name: &str, span: Span) -> Result<SymbolRef, EvalError> {
        if let Some(params) = self.params {
            if let Some(value) = params.get(name) {
                return Ok(SymbolRef::resolved(value.clone()));
            }
        }
        match self.symbols.resolve(name) {
            Some((value, forward)) => Ok(SymbolRef { value, forward }),
            None if self.pass == 1 => Ok(SymbolRef::forward(Value::Undefined)),
            None => Err(EvalError::undefined(name, span)),
        }
    }

    fn lookup_anon(&mut self, marker: &str, span: Span) -> Result<SymbolRef, EvalError> {
        match self.symbols.resolve_anon(marker, self.stmt) {
            Some((pc, forward)) => Ok(SymbolRef {
                value: Value::Int(pc),
                forward,
            }),
            None if self.pass == 1 && marker.starts_with('+') => {
                Ok(SymbolRef::forward(Value::Undefined))
            }
            None => Err(EvalError::new(
                format!("Unresolved anonymous label: {marker}"),
                span,
            )),
        }
    }

    fn program_counter(&self) -> Value {
        Value::Int(self.pc)
    }
}

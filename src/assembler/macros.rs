// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro definition and expansion.
//!
//! `!macro name [(]p1[, p2=default][)] { body }` captures the body as raw
//! lines. Invocation `+name a, b` evaluates the arguments, binds them into
//! a parameter scope consulted by the expression evaluator (no text
//! substitution, so float arguments survive exactly), opens a fresh zone so
//! the body's `.locals` are private per call, and re-plays the body through
//! the pass driver. Recursion is bounded by the macro depth limit.

use std::collections::HashMap;

use crate::assembler::{Assembler, CaptureKind};
use crate::core::error::AsmErrorKind;
use crate::core::tokenizer::{Token, TokenKind};
use crate::core::value::Value;

#[derive(Debug, Clone)]
pub(crate) struct MacroParam {
    pub name: String,
    pub default: Option<Vec<Token>>,
}

#[derive(Debug, Clone)]
pub(crate) struct MacroDef {
    pub params: Vec<MacroParam>,
    pub body: Vec<String>,
}

impl Assembler {
    /// Handle `!macro`: parse name and parameter list, then capture the
    /// brace-delimited body.
    pub(crate) fn define_macro(
        &mut self,
        toks: &[Token],
        mut i: usize,
        line: &str,
    ) -> Option<usize> {
        let name = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!macro requires a macro name",
                    toks.get(i).map(|t| t.span),
                );
                return None;
            }
        };
        i += 1;

        let parenthesized = matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::OpenParen));
        if parenthesized {
            i += 1;
        }

        let mut params = Vec::new();
        loop {
            match toks.get(i).map(|t| &t.kind) {
                Some(TokenKind::Ident(param)) => {
                    let param = param.clone();
                    i += 1;
                    let default = if matches!(
                        toks.get(i).map(|t| &t.kind),
                        Some(TokenKind::Equals)
                    ) {
                        i += 1;
                        let (tokens, next) = collect_default_tokens(toks, i);
                        i = next;
                        Some(tokens)
                    } else {
                        None
                    };
                    params.push(MacroParam {
                        name: param,
                        default,
                    });
                    if matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::Comma)) {
                        i += 1;
                    }
                }
                Some(TokenKind::CloseParen) if parenthesized => {
                    i += 1;
                    break;
                }
                Some(TokenKind::OpenBrace) if !parenthesized => break,
                other => {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        format!("Unexpected token in macro parameter list: {other:?}"),
                        toks.get(i).map(|t| t.span),
                    );
                    return None;
                }
            }
        }

        let Some(brace) = toks.get(i) else {
            self.error_at(AsmErrorKind::Syntax, "Expected '{' after !macro header", None);
            return None;
        };
        if !matches!(brace.kind, TokenKind::OpenBrace) {
            self.error_at(
                AsmErrorKind::Syntax,
                "Expected '{' after !macro header",
                Some(brace.span),
            );
            return None;
        }

        let rest = &line[brace.span.col_end - 1..];
        self.begin_body(CaptureKind::Macro(name, params), rest);
        None
    }

    /// Handle `+name arg, arg`: bind arguments and re-play the body.
    pub(crate) fn invoke_macro(
        &mut self,
        name: &str,
        toks: &[Token],
        mut i: usize,
    ) -> Option<usize> {
        let Some(def) = self.macros.get(name).cloned() else {
            self.error_at(
                AsmErrorKind::Semantic,
                format!("Undefined macro: {name}"),
                None,
            );
            return None;
        };
        if self.macro_depth >= self.limits.max_macro_depth {
            self.error_at(
                AsmErrorKind::Limit,
                format!(
                    "Macro recursion deeper than {} (safety limit)",
                    self.limits.max_macro_depth
                ),
                None,
            );
            return None;
        }

        let mut args = Vec::new();
        if !self.at_statement_end(toks, i) {
            loop {
                match self.eval(toks, i) {
                    Ok((value, next, _)) => {
                        args.push(value);
                        i = next;
                    }
                    Err(err) => {
                        self.eval_error(err);
                        return None;
                    }
                }
                if matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::Comma)) {
                    i += 1;
                } else {
                    break;
                }
            }
        }

        if args.len() > def.params.len() {
            self.error_at(
                AsmErrorKind::Semantic,
                format!(
                    "Macro {name} expects {} arguments, got {}",
                    def.params.len(),
                    args.len()
                ),
                None,
            );
            return None;
        }

        let mut bindings: HashMap<String, Value> = HashMap::new();
        for (ix, param) in def.params.iter().enumerate() {
            let value = if ix < args.len() {
                args[ix].clone()
            } else if let Some(default) = &param.default {
                match self.eval(default, 0) {
                    Ok((value, _, _)) => value,
                    Err(err) => {
                        self.eval_error(err);
                        return None;
                    }
                }
            } else {
                self.error_at(
                    AsmErrorKind::Semantic,
                    format!(
                        "Macro {name} expects {} arguments, got {}",
                        def.params.len(),
                        args.len()
                    ),
                    None,
                );
                return None;
            };
            bindings.insert(param.name.clone(), value);
        }

        self.macro_depth += 1;
        self.param_scopes.push(bindings);
        let saved_zone = self.symbols.enter_zone();
        let saved_line = self.current_line;
        let saved_text = self.current_text.clone();

        for body_line in &def.body {
            self.process_line(body_line);
            if self.fatal || self.loop_control.is_some() {
                break;
            }
        }

        self.symbols.restore_zone(saved_zone);
        self.param_scopes.pop();
        self.macro_depth -= 1;
        self.current_line = saved_line;
        self.current_text = saved_text;

        Some(i)
    }

    pub(crate) fn at_statement_end(&self, toks: &[Token], pos: usize) -> bool {
        matches!(
            toks.get(pos).map(|t| &t.kind),
            None | Some(TokenKind::Colon) | Some(TokenKind::CloseBrace)
        )
    }
}

/// Collect the tokens of a default-value expression, stopping at the comma,
/// closing parenthesis, or opening brace that ends it. Nested parentheses
/// are kept together.
fn collect_default_tokens(toks: &[Token], start: usize) -> (Vec<Token>, usize) {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut i = start;
    while let Some(token) = toks.get(i) {
        match &token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            TokenKind::Comma | TokenKind::OpenBrace if depth == 0 => break,
            _ => {}
        }
        out.push(token.clone());
        i += 1;
    }
    (out, i)
}

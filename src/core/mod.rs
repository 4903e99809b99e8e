// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic assembler core.
//!
//! # Components
//!
//! - [`text_utils`] - Text processing utilities (comments, brace counting)
//! - [`tokenizer`] - Token scanning with configurable mnemonic detection
//! - [`value`] - Tagged value domain (int, float, string, list, undefined)
//! - [`expr`] - Operator-precedence expression evaluation
//! - [`symbols`] - Symbol table with zone/cheap-local/anonymous scoping
//! - [`image`] - Output image and program counter state
//! - [`convtab`] - Text conversion tables
//! - [`files`] - Include path resolution and the include stack
//! - [`error`] - Error types, diagnostics, pass statistics

pub mod convtab;
pub mod error;
pub mod expr;
pub mod files;
pub mod image;
pub mod symbols;
pub mod text_utils;
pub mod tokenizer;
pub mod value;

// Re-exports for convenience
pub use error::{AsmError, AsmErrorKind, Diagnostic, PassCounts, Severity};
pub use expr::{eval_expr, EvalContext, EvalError, ExprEval, SimpleEvalContext, SymbolRef};
pub use image::{Image, ProgramCounter, StoreResult};
pub use symbols::{DefineOutcome, SymbolTable};
pub use tokenizer::{
    mnemonic_checker_from_fn, mnemonic_checker_none, MnemonicChecker, OperatorKind, Span, Token,
    TokenKind, Tokenizer,
};
pub use value::Value;

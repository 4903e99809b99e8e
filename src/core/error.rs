// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types and diagnostics.
//!
//! Diagnostics carry their source location and render in the fixed format
//! `{Severity} - File {path}, line {n}: {message}` followed by the offending
//! source line and a caret span. `!warn` is informational; errors are
//! recorded and assembly continues where possible so one run can report
//! several; serious errors, phase errors, and exceeded safety limits abort.

use thiserror::Error;

use crate::core::tokenizer::Span;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Syntax,
    UndefinedSymbol,
    Phase,
    Range,
    AddressingMode,
    File,
    Semantic,
    Limit,
    Io,
    Internal,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Phase errors and exceeded safety limits terminate the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, AsmErrorKind::Phase | AsmErrorKind::Limit)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Serious,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
            Severity::Serious => write!(f, "Serious error"),
        }
    }
}

/// A diagnostic message with location and source context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub kind: AsmErrorKind,
    pub file: Option<String>,
    pub line: u32,
    pub columns: Option<(usize, usize)>,
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, error: AsmError, line: u32) -> Self {
        Self {
            severity,
            message: error.message,
            kind: error.kind,
            file: None,
            line,
            columns: None,
            source_line: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.columns = Some((span.col_start, span.col_end.max(span.col_start + 1)));
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source_line = source;
        self
    }

    /// Render as `{Severity} - File {path}, line {n}: {message}`, then the
    /// offending line with a caret span under the triggering column.
    #[must_use]
    pub fn format(&self) -> String {
        let file = self.file.as_deref().unwrap_or("<input>");
        let mut out = format!(
            "{} - File {}, line {}: {}",
            self.severity, file, self.line, self.message
        );
        if let Some(source) = &self.source_line {
            out.push_str(&format!("\n  {source}"));
            let (start, end) = match self.columns {
                Some((start, end)) => (start, end),
                None => (1, source.trim_end().len() + 1),
            };
            let pad = " ".repeat(start.saturating_sub(1));
            let width = end.saturating_sub(start).max(1);
            out.push_str(&format!("\n  {pad}{}", "^".repeat(width)));
        }
        out
    }
}

/// Pass statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassCounts {
    pub statements: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_matches_contract() {
        let err = AsmError::new(AsmErrorKind::Syntax, "Unexpected token");
        let diag = Diagnostic::new(Severity::Error, err, 12)
            .with_file(Some("prog.asm".to_string()))
            .with_source(Some("lda #$$".to_string()))
            .with_span(Span {
                line: 12,
                col_start: 5,
                col_end: 7,
            });
        let text = diag.format();
        assert!(text.starts_with("Error - File prog.asm, line 12: Unexpected token"));
        assert!(text.contains("\n  lda #$$"));
        assert!(text.contains("\n      ^^"));
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Warning.to_string(), "Warning");
        assert_eq!(Severity::Serious.to_string(), "Serious error");
    }

    #[test]
    fn fatal_kinds() {
        assert!(AsmError::new(AsmErrorKind::Phase, "x").is_fatal());
        assert!(AsmError::new(AsmErrorKind::Limit, "x").is_fatal());
        assert!(!AsmError::new(AsmErrorKind::Range, "x").is_fatal());
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for ACME assembly source with spans.
//!
//! The tokenizer is line-oriented and stateless between lines, which makes
//! it safe for macro and loop body re-play. Mnemonic detection is provided
//! via a function passed to [`Tokenizer::with_mnemonic_checker`] so the
//! active CPU's instruction set decides which identifiers are reserved.
//!
//! Context-sensitive lexemes:
//! - `%` starts a binary literal in prefix position, otherwise it is modulo.
//! - `&` starts an octal literal in prefix position, otherwise bitwise AND.
//! - `+`/`-` runs are anonymous labels in statement or operand-head position,
//!   otherwise operators; `+name` is a macro invocation.
//! - `*` is emitted as its own token; the evaluator reads it as the program
//!   counter in atom position and as multiplication between values.

use crate::core::text_utils::{
    bin_digit_value, is_bin_digit, is_ident_char, is_ident_start, is_space,
};
use std::sync::Arc;

/// Function type for checking if an identifier is a mnemonic of the active CPU.
pub type MnemonicChecker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Default checker that treats no identifiers as mnemonics.
pub fn no_mnemonics(_ident: &str) -> bool {
    false
}

pub fn mnemonic_checker_none() -> MnemonicChecker {
    mnemonic_checker_from_fn(no_mnemonics)
}

pub fn mnemonic_checker_from_fn(func: fn(&str) -> bool) -> MnemonicChecker {
    Arc::new(func)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    fn new(line: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            col_start: start + 1,
            col_end: end + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier, with its `.` (zone-local) or `@` (cheap-local) sigil kept.
    Ident(String),
    /// Label definition: identifier or anonymous marker followed by `:`.
    Label(String),
    /// CPU mnemonic, optionally with a glued width suffix (`lda+2`).
    Mnemonic {
        name: String,
        force_width: Option<u8>,
    },
    /// `!name` pseudo opcode, stored lowercase without the `!`.
    Directive(String),
    /// `+name` macro invocation, stored without the `+`.
    MacroCall(String),
    /// Anonymous label reference: a run of `+` or `-`.
    Anon(String),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Star,
    Equals,
    Hash,
    Comma,
    Colon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Op(OperatorKind),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Plus,
    Minus,
    Multiply,
    Power,
    Divide,
    Mod,
    Shl,
    Shr,
    LogShr,
    BitNot,
    LogicNot,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub fn is_value_like(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::CloseParen
                | TokenKind::Star
        )
    }

    /// True for tokens that begin a statement: line start, after a label,
    /// after a `:` statement separator, or at a block-brace boundary (inline
    /// conditional branches put statements right after `{`).
    fn starts_statement(prev: Option<&TokenKind>) -> bool {
        matches!(
            prev,
            None | Some(
                TokenKind::Label(_)
                    | TokenKind::Colon
                    | TokenKind::OpenBrace
                    | TokenKind::CloseBrace
            )
        )
    }
}

#[derive(Debug, Clone)]
pub struct TokenizeError {
    pub message: String,
    pub span: Span,
}

pub struct Tokenizer<'a> {
    line_num: u32,
    input: &'a [u8],
    cursor: usize,
    is_mnemonic: MnemonicChecker,
    prev_kind: Option<TokenKind>,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer with no mnemonic detection.
    #[must_use]
    pub fn new(line: &'a str, line_num: u32) -> Self {
        Self::with_mnemonic_checker(line, line_num, mnemonic_checker_none())
    }

    /// Create a new tokenizer with a custom mnemonic checker.
    #[must_use]
    pub fn with_mnemonic_checker(
        line: &'a str,
        line_num: u32,
        is_mnemonic: MnemonicChecker,
    ) -> Self {
        Self {
            line_num,
            input: line.as_bytes(),
            cursor: 0,
            is_mnemonic,
            prev_kind: None,
        }
    }

    /// Tokenize the whole line.
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.kind == TokenKind::End {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token, TokenizeError> {
        let token = self.scan_token()?;
        if token.kind != TokenKind::End {
            self.prev_kind = Some(token.kind.clone());
        }
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token, TokenizeError> {
        self.skip_white();
        let start = self.cursor;
        let c = self.current_byte();
        match c {
            0 => Ok(self.token(TokenKind::End, start)),
            b';' => {
                self.cursor = self.input.len();
                Ok(self.token(TokenKind::End, start))
            }
            b'/' if self.peek_raw_byte(1) == b'/' => {
                self.cursor = self.input.len();
                Ok(self.token(TokenKind::End, start))
            }
            _ if is_ident_start(c) => self.scan_identifier(start, ""),
            _ if c.is_ascii_digit() => self.scan_number(start),
            b'"' => self.scan_string(start),
            b'\'' => self.scan_char(start),
            b'$' => {
                if self.peek_raw_byte(1).is_ascii_hexdigit() {
                    self.scan_hex(start)
                } else {
                    Err(self.error("Expected hex digits after '$'", start))
                }
            }
            b'%' => {
                if is_bin_digit(self.peek_raw_byte(1)) && !self.prev_is_value() {
                    self.scan_binary(start)
                } else {
                    self.cursor += 1;
                    Ok(self.token(TokenKind::Op(OperatorKind::Mod), start))
                }
            }
            b'&' => {
                if (b'0'..=b'7').contains(&self.peek_raw_byte(1)) && !self.prev_is_value() {
                    self.scan_octal(start)
                } else {
                    self.cursor += 1;
                    Ok(self.token(TokenKind::Op(OperatorKind::BitAnd), start))
                }
            }
            b'.' => {
                if self.peek_raw_byte(1).is_ascii_digit() {
                    self.scan_number(start)
                } else if is_ident_start(self.peek_raw_byte(1)) {
                    self.cursor += 1;
                    self.scan_identifier(start, ".")
                } else {
                    Err(self.error("Unexpected '.'", start))
                }
            }
            b'@' => {
                if is_ident_start(self.peek_raw_byte(1)) {
                    self.cursor += 1;
                    self.scan_identifier(start, "@")
                } else {
                    Err(self.error("Expected name after '@'", start))
                }
            }
            b'!' => {
                if self.peek_raw_byte(1) == b'=' {
                    self.cursor += 2;
                    Ok(self.token(TokenKind::Op(OperatorKind::Ne), start))
                } else if is_ident_char(self.peek_raw_byte(1)) {
                    self.scan_directive(start)
                } else {
                    self.cursor += 1;
                    Ok(self.token(TokenKind::Op(OperatorKind::LogicNot), start))
                }
            }
            b'+' | b'-' => self.scan_plus_minus(start, c),
            _ => self.scan_operator(start, c),
        }
    }

    fn scan_operator(&mut self, start: usize, c: u8) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let kind = match c {
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'#' => TokenKind::Hash,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'~' => TokenKind::Op(OperatorKind::BitNot),
            b'/' => TokenKind::Op(OperatorKind::Divide),
            b'*' => {
                if self.peek_raw_byte(0) == b'*' {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Power)
                } else {
                    TokenKind::Star
                }
            }
            b'=' => {
                if self.peek_raw_byte(0) == b'=' {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Eq)
                } else {
                    TokenKind::Equals
                }
            }
            b'&' => {
                if self.peek_raw_byte(0) == b'&' {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::LogicAnd)
                } else {
                    TokenKind::Op(OperatorKind::BitAnd)
                }
            }
            b'|' => {
                if self.peek_raw_byte(0) == b'|' {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::LogicOr)
                } else {
                    TokenKind::Op(OperatorKind::BitOr)
                }
            }
            b'^' => TokenKind::Op(OperatorKind::BitXor),
            b'<' => match self.peek_raw_byte(0) {
                b'<' => {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Shl)
                }
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Le)
                }
                b'>' => {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Ne)
                }
                _ => TokenKind::Op(OperatorKind::Lt),
            },
            b'>' => match (self.peek_raw_byte(0), self.peek_raw_byte(1)) {
                (b'>', b'>') => {
                    self.cursor += 2;
                    TokenKind::Op(OperatorKind::LogShr)
                }
                (b'>', _) => {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Shr)
                }
                (b'=', _) => {
                    self.cursor += 1;
                    TokenKind::Op(OperatorKind::Ge)
                }
                _ => TokenKind::Op(OperatorKind::Gt),
            },
            _ => return Err(self.error("Illegal character", start)),
        };
        Ok(self.token(kind, start))
    }

    /// `+`/`-`: macro call, anonymous label, or arithmetic operator.
    fn scan_plus_minus(&mut self, start: usize, c: u8) -> Result<Token, TokenizeError> {
        if c == b'+'
            && is_ident_start(self.peek_raw_byte(1))
            && Token::starts_statement(self.prev_kind.as_ref())
        {
            self.cursor += 1;
            let name_start = self.cursor;
            while is_ident_char(self.current_byte()) {
                self.cursor += 1;
            }
            let name = self.text(name_start, self.cursor);
            return Ok(self.token(TokenKind::MacroCall(name), start));
        }

        let mut run = self.cursor;
        while self.input.get(run) == Some(&c) {
            run += 1;
        }
        let run_len = run - self.cursor;
        let after = self.input.get(run).copied().unwrap_or(0);

        let is_anon = if self.prev_is_value() {
            false
        } else {
            run_len >= 2
                || after == b':'
                || after == 0
                || (is_space(after)
                    && matches!(self.prev_kind, Some(TokenKind::Mnemonic { .. }))
                    && self.rest_is_blank(run))
        };

        if is_anon {
            self.cursor = run;
            let marker = self.text(start, run);
            if after == b':' {
                self.cursor += 1;
                return Ok(self.token(TokenKind::Label(marker), start));
            }
            return Ok(self.token(TokenKind::Anon(marker), start));
        }

        self.cursor += 1;
        let op = if c == b'+' {
            OperatorKind::Plus
        } else {
            OperatorKind::Minus
        };
        Ok(self.token(TokenKind::Op(op), start))
    }

    fn scan_identifier(&mut self, start: usize, sigil: &str) -> Result<Token, TokenizeError> {
        let name_start = self.cursor;
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        let name = format!("{sigil}{}", self.text(name_start, self.cursor));

        if self.current_byte() == b':' {
            self.cursor += 1;
            return Ok(self.token(TokenKind::Label(name), start));
        }

        if sigil.is_empty()
            && Token::starts_statement(self.prev_kind.as_ref())
            && (self.is_mnemonic)(&name.to_ascii_uppercase())
        {
            let force_width = self.scan_width_suffix();
            return Ok(self.token(
                TokenKind::Mnemonic {
                    name: name.to_ascii_uppercase(),
                    force_width,
                },
                start,
            ));
        }

        Ok(self.token(TokenKind::Ident(name), start))
    }

    /// Width suffix glued to a mnemonic: `lda+1` forces zero page, `lda+2`
    /// forces absolute.
    fn scan_width_suffix(&mut self) -> Option<u8> {
        if self.current_byte() != b'+' {
            return None;
        }
        let digit = self.peek_raw_byte(1);
        if !matches!(digit, b'1' | b'2') {
            return None;
        }
        if is_ident_char(self.peek_raw_byte(2)) {
            return None;
        }
        self.cursor += 2;
        Some(digit - b'0')
    }

    fn scan_directive(&mut self, start: usize) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let name_start = self.cursor;
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        let name = self.text(name_start, self.cursor).to_ascii_lowercase();
        Ok(self.token(TokenKind::Directive(name), start))
    }

    fn scan_number(&mut self, start: usize) -> Result<Token, TokenizeError> {
        // 0x / 0b prefixes are accepted alongside the ACME $ and % forms.
        if self.current_byte() == b'0' {
            match self.peek_raw_byte(1) {
                b'x' | b'X' if self.peek_raw_byte(2).is_ascii_hexdigit() => {
                    self.cursor += 1;
                    return self.scan_hex(start);
                }
                b'b' | b'B' if is_bin_digit(self.peek_raw_byte(2)) => {
                    self.cursor += 1;
                    return self.scan_binary(start);
                }
                _ => {}
            }
        }

        while self.current_byte().is_ascii_digit() {
            self.cursor += 1;
        }
        let mut is_float = false;
        if self.current_byte() == b'.' && self.peek_raw_byte(1).is_ascii_digit() {
            is_float = true;
            self.cursor += 1;
            while self.current_byte().is_ascii_digit() {
                self.cursor += 1;
            }
        }

        let text = self.text(start, self.cursor);
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error_at("Invalid number", start))?;
            Ok(self.token(TokenKind::Float(value), start))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error_at("Number out of range", start))?;
            Ok(self.token(TokenKind::Int(value), start))
        }
    }

    fn scan_hex(&mut self, start: usize) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let mut value: i64 = 0;
        let mut saw_digit = false;
        while self.current_byte().is_ascii_hexdigit() {
            let d = hex_digit(self.current_byte());
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(i64::from(d)))
                .ok_or_else(|| self.error_at("Number out of range", start))?;
            saw_digit = true;
            self.cursor += 1;
        }
        if !saw_digit {
            return Err(self.error_at("Expected hex digits", start));
        }
        Ok(self.token(TokenKind::Int(value), start))
    }

    fn scan_binary(&mut self, start: usize) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let mut value: i64 = 0;
        let mut saw_digit = false;
        while is_bin_digit(self.current_byte()) {
            value = value
                .checked_mul(2)
                .and_then(|v| v.checked_add(bin_digit_value(self.current_byte())))
                .ok_or_else(|| self.error_at("Number out of range", start))?;
            saw_digit = true;
            self.cursor += 1;
        }
        if !saw_digit {
            return Err(self.error_at("Expected binary digits", start));
        }
        Ok(self.token(TokenKind::Int(value), start))
    }

    fn scan_octal(&mut self, start: usize) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let mut value: i64 = 0;
        while (b'0'..=b'7').contains(&self.current_byte()) {
            value = value
                .checked_mul(8)
                .and_then(|v| v.checked_add(i64::from(self.current_byte() - b'0')))
                .ok_or_else(|| self.error_at("Number out of range", start))?;
            self.cursor += 1;
        }
        Ok(self.token(TokenKind::Int(value), start))
    }

    fn scan_string(&mut self, start: usize) -> Result<Token, TokenizeError> {
        let bytes = self.scan_quoted(start, b'"')?;
        Ok(self.token(TokenKind::Str(bytes), start))
    }

    /// Character literals evaluate to their byte value; multi-character
    /// literals up to four bytes pack big-endian.
    fn scan_char(&mut self, start: usize) -> Result<Token, TokenizeError> {
        let bytes = self.scan_quoted(start, b'\'')?;
        if bytes.is_empty() {
            return Err(self.error_at("Empty character literal", start));
        }
        if bytes.len() > 4 {
            return Err(self.error_at("Character literal too long", start));
        }
        let mut value: i64 = 0;
        for b in &bytes {
            value = (value << 8) | i64::from(*b);
        }
        Ok(self.token(TokenKind::Int(value), start))
    }

    fn scan_quoted(&mut self, start: usize, quote: u8) -> Result<Vec<u8>, TokenizeError> {
        self.cursor += 1;
        let mut out = Vec::new();
        while self.current_byte() != 0 && self.current_byte() != quote {
            let c = self.current_byte();
            if c == b'\\' {
                let esc = self.peek_raw_byte(1);
                match esc {
                    b'"' | b'\\' | b'\'' => {
                        out.push(esc);
                        self.cursor += 2;
                        continue;
                    }
                    _ => {}
                }
            }
            out.push(c);
            self.cursor += 1;
        }
        if self.current_byte() != quote {
            return Err(self.error_at("Unterminated string", start));
        }
        self.cursor += 1;
        Ok(out)
    }

    fn skip_white(&mut self) {
        while is_space(self.current_byte()) {
            self.cursor += 1;
        }
    }

    fn current_byte(&self) -> u8 {
        self.input.get(self.cursor).copied().unwrap_or(0)
    }

    fn peek_raw_byte(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }

    fn prev_is_value(&self) -> bool {
        self.prev_kind.as_ref().is_some_and(|kind| {
            matches!(
                kind,
                TokenKind::Ident(_)
                    | TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::CloseParen
                    | TokenKind::Star
                    | TokenKind::Anon(_)
            )
        })
    }

    fn rest_is_blank(&self, from: usize) -> bool {
        let mut ix = from;
        while let Some(&c) = self.input.get(ix) {
            if c == b';' {
                return true;
            }
            if !is_space(c) {
                return false;
            }
            ix += 1;
        }
        true
    }

    fn text(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.input[start..end]).to_string()
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(self.line_num, start, self.cursor),
        }
    }

    fn error(&mut self, message: &str, start: usize) -> TokenizeError {
        self.cursor += 1;
        self.error_at(message, start)
    }

    fn error_at(&self, message: &str, start: usize) -> TokenizeError {
        TokenizeError {
            message: message.to_string(),
            span: Span::new(self.line_num, start, self.cursor.max(start + 1)),
        }
    }
}

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        _ => c - b'a' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::{OperatorKind, TokenKind, Tokenizer};

    fn mnemonics(ident: &str) -> bool {
        matches!(ident, "LDA" | "STA" | "BNE" | "JMP" | "RTS" | "DEX" | "AND")
    }

    fn tokenize(line: &str) -> Vec<TokenKind> {
        Tokenizer::with_mnemonic_checker(line, 1, super::mnemonic_checker_from_fn(mnemonics))
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_label_and_instruction() {
        let toks = tokenize("start: lda #$42");
        assert_eq!(toks[0], TokenKind::Label("start".to_string()));
        assert!(matches!(toks[1], TokenKind::Mnemonic { ref name, .. } if name == "LDA"));
        assert_eq!(toks[2], TokenKind::Hash);
        assert_eq!(toks[3], TokenKind::Int(0x42));
    }

    #[test]
    fn tokenizes_number_bases() {
        assert_eq!(tokenize("x = $ff")[2], TokenKind::Int(0xff));
        assert_eq!(tokenize("x = %1010")[2], TokenKind::Int(0b1010));
        assert_eq!(tokenize("x = %#..#")[2], TokenKind::Int(0b1001));
        assert_eq!(tokenize("x = 0x2a")[2], TokenKind::Int(0x2a));
        assert_eq!(tokenize("x = 0b101")[2], TokenKind::Int(0b101));
        assert_eq!(tokenize("x = &17")[2], TokenKind::Int(0o17));
        assert_eq!(tokenize("x = 42")[2], TokenKind::Int(42));
        assert_eq!(tokenize("x = 3.25")[2], TokenKind::Float(3.25));
    }

    #[test]
    fn percent_is_modulo_after_value() {
        let toks = tokenize("x = 7 % 101");
        assert_eq!(toks[3], TokenKind::Op(OperatorKind::Mod));
        assert_eq!(toks[4], TokenKind::Int(101));
    }

    #[test]
    fn ampersand_is_and_after_value() {
        let toks = tokenize("x = $ff & 7");
        assert_eq!(toks[3], TokenKind::Op(OperatorKind::BitAnd));
    }

    #[test]
    fn tokenizes_char_literals() {
        assert_eq!(tokenize("x = 'A'")[2], TokenKind::Int(65));
        assert_eq!(tokenize("x = 'AB'")[2], TokenKind::Int(0x4142));
    }

    #[test]
    fn tokenizes_string_with_escapes() {
        let toks = tokenize("!text \"a\\\"b\\\\c\"");
        assert_eq!(toks[1], TokenKind::Str(b"a\"b\\c".to_vec()));
    }

    #[test]
    fn tokenizes_directives_and_macro_calls() {
        let toks = tokenize("!byte 1, 2");
        assert_eq!(toks[0], TokenKind::Directive("byte".to_string()));
        let toks = tokenize("+poke $d020, 0");
        assert_eq!(toks[0], TokenKind::MacroCall("poke".to_string()));
    }

    #[test]
    fn tokenizes_anonymous_labels() {
        assert_eq!(tokenize("-")[0], TokenKind::Anon("-".to_string()));
        assert_eq!(tokenize("--:")[0], TokenKind::Label("--".to_string()));
        let toks = tokenize("bne -");
        assert_eq!(toks[1], TokenKind::Anon("-".to_string()));
        let toks = tokenize("jmp ++");
        assert_eq!(toks[1], TokenKind::Anon("++".to_string()));
    }

    #[test]
    fn plus_minus_are_operators_in_expressions() {
        let toks = tokenize("x = 1 + 2 - 3");
        assert_eq!(toks[3], TokenKind::Op(OperatorKind::Plus));
        assert_eq!(toks[5], TokenKind::Op(OperatorKind::Minus));
        let toks = tokenize("lda #-1");
        assert_eq!(toks[2], TokenKind::Op(OperatorKind::Minus));
        assert_eq!(toks[3], TokenKind::Int(1));
    }

    #[test]
    fn longest_match_operators() {
        let toks = tokenize("x = 1 << 2 >> 3 >>> 4 <> 5 <= 6 >= 7");
        assert_eq!(toks[3], TokenKind::Op(OperatorKind::Shl));
        assert_eq!(toks[5], TokenKind::Op(OperatorKind::Shr));
        assert_eq!(toks[7], TokenKind::Op(OperatorKind::LogShr));
        assert_eq!(toks[9], TokenKind::Op(OperatorKind::Ne));
        assert_eq!(toks[11], TokenKind::Op(OperatorKind::Le));
        assert_eq!(toks[13], TokenKind::Op(OperatorKind::Ge));
    }

    #[test]
    fn star_and_power() {
        let toks = tokenize("* = $c000");
        assert_eq!(toks[0], TokenKind::Star);
        assert_eq!(toks[1], TokenKind::Equals);
        let toks = tokenize("x = 2 ** 8");
        assert_eq!(toks[3], TokenKind::Op(OperatorKind::Power));
    }

    #[test]
    fn zone_and_cheap_sigils_kept() {
        let toks = tokenize(".loop: lda .target");
        assert_eq!(toks[0], TokenKind::Label(".loop".to_string()));
        assert_eq!(toks[2], TokenKind::Ident(".target".to_string()));
        let toks = tokenize("@tmp: sta @tmp");
        assert_eq!(toks[0], TokenKind::Label("@tmp".to_string()));
        assert_eq!(toks[2], TokenKind::Ident("@tmp".to_string()));
    }

    #[test]
    fn mnemonic_width_suffix() {
        let toks = tokenize("lda+2 $12");
        assert!(
            matches!(&toks[0], TokenKind::Mnemonic { name, force_width: Some(2) } if name == "LDA")
        );
        let toks = tokenize("lda+1 $1234");
        assert!(
            matches!(&toks[0], TokenKind::Mnemonic { name, force_width: Some(1) } if name == "LDA")
        );
    }

    #[test]
    fn mnemonics_only_at_statement_start() {
        // AND is a mnemonic but must lex as an identifier inside an operand.
        let toks = tokenize("lda and");
        assert!(matches!(toks[0], TokenKind::Mnemonic { .. }));
        assert_eq!(toks[1], TokenKind::Ident("and".to_string()));
    }

    #[test]
    fn colon_separates_statements() {
        let toks = tokenize("lda #0 : sta $d020");
        assert_eq!(toks[3], TokenKind::Colon);
        assert!(matches!(toks[4], TokenKind::Mnemonic { ref name, .. } if name == "STA"));
    }

    #[test]
    fn comments_end_the_line() {
        assert!(tokenize("; just a comment").is_empty());
        assert_eq!(tokenize("rts ; done").len(), 1);
        assert_eq!(tokenize("rts // done").len(), 1);
    }
}

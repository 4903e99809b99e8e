// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The `!xxx` pseudo opcode dispatcher.
//!
//! Handlers return the position of the first unconsumed token, or `None`
//! when the rest of the line has been consumed or abandoned after an error.

use crate::assembler::{Assembler, Block, CaptureKind, LoopControl};
use crate::core::convtab::Table;
use crate::core::error::AsmErrorKind;
use crate::core::files::FileError;
use crate::core::tokenizer::{Token, TokenKind};
use crate::core::value::{fits_width, Value};
use crate::cpu::CpuType;
use crate::output::OutputFormat;

use super::loops::ForHeader;

impl Assembler {
    pub(crate) fn directive(
        &mut self,
        name: &str,
        toks: &[Token],
        i: usize,
        line: &str,
    ) -> Option<usize> {
        match name {
            "byte" | "8" => self.data_directive(toks, i, 1, true),
            "word" | "16" | "le16" => self.data_directive(toks, i, 2, true),
            "be16" | "16be" => self.data_directive(toks, i, 2, false),
            "24" | "le24" => self.data_directive(toks, i, 3, true),
            "be24" | "24be" => self.data_directive(toks, i, 3, false),
            "32" | "le32" => self.data_directive(toks, i, 4, true),
            "be32" | "32be" => self.data_directive(toks, i, 4, false),
            "hex" | "h" => self.hex_directive(toks, i),
            "fill" => self.fill_directive(toks, i),
            "skip" => self.skip_directive(toks, i),
            "align" => self.align_directive(toks, i),
            "text" => self.text_directive(toks, i, None),
            "raw" => self.text_directive(toks, i, Some(Table::Raw)),
            "pet" => self.text_directive(toks, i, Some(Table::Pet)),
            "scr" => self.text_directive(toks, i, Some(Table::Scr)),
            "scrxor" => self.scrxor_directive(toks, i),
            "convtab" | "ct" => self.convtab_directive(toks, i),
            "if" => self.if_directive(toks, i),
            "ifdef" => self.ifdef_directive(toks, i, false),
            "ifndef" => self.ifdef_directive(toks, i, true),
            "for" => self.for_directive(toks, i, line),
            "while" => self.while_directive(toks, i, line),
            "do" => self.do_directive(toks, i, line),
            "until" => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!until without matching !do",
                    toks.get(i).map(|t| t.span),
                );
                None
            }
            "break" => self.loop_control_directive(toks, i, LoopControl::Break),
            "continue" => self.loop_control_directive(toks, i, LoopControl::Continue),
            "macro" => self.define_macro(toks, i, line),
            "source" | "src" => self.source_directive(toks, i),
            "binary" | "bin" => self.binary_directive(toks, i),
            "to" => self.to_directive(toks, i),
            "zone" | "zn" => self.zone_directive(toks, i),
            "cpu" => self.cpu_directive(toks, i),
            "set" => self.set_directive(toks, i),
            "pseudopc" => self.pseudopc_directive(toks, i),
            "realpc" => {
                self.pc.leave_all_pseudo();
                Some(i)
            }
            "initmem" => {
                let (value, next) = self.eval_known_int(toks, i, "!initmem value")?;
                self.image.set_init_byte((value & 0xff) as u8);
                Some(next)
            }
            "xor" => {
                let (value, next) = self.eval_known_int(toks, i, "!xor value")?;
                self.image.set_xor_mask((value & 0xff) as u8);
                Some(next)
            }
            "warn" | "error" | "serious" => self.message_directive(name, toks, i),
            "symbollist" | "sl" => self.symbollist_directive(toks, i),
            "address" | "addr" => Some(i),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    format!("Unknown directive: !{name}"),
                    None,
                );
                None
            }
        }
    }

    // -- data emission ---------------------------------------------------

    fn data_directive(
        &mut self,
        toks: &[Token],
        mut i: usize,
        size: u32,
        little_endian: bool,
    ) -> Option<usize> {
        loop {
            match toks.get(i).map(|t| &t.kind) {
                Some(TokenKind::Str(s)) => {
                    let bytes = s.clone();
                    self.emit(&bytes);
                    i += 1;
                }
                _ => match self.eval(toks, i) {
                    Ok((value, next, _)) => {
                        self.emit_value(value, size, little_endian);
                        i = next;
                    }
                    Err(err) => {
                        self.eval_error(err);
                        return None;
                    }
                },
            }
            if matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::Comma)) {
                i += 1;
            } else {
                break;
            }
        }
        Some(i)
    }

    /// Emit the low `size` bytes of a value. Out-of-range values warn and
    /// emit truncated, matching ACME.
    fn emit_value(&mut self, value: Value, size: u32, little_endian: bool) {
        let n = match value {
            Value::Undefined => 0,
            other => match other.as_int() {
                Some(n) => n,
                None => {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        format!("Expected a numeric value, got {}", other.type_name()),
                        None,
                    );
                    return;
                }
            },
        };
        if self.pass == 2 && !fits_width(n, size) {
            self.warn_at(
                AsmErrorKind::Range,
                format!("Value {n} does not fit in {} bits", size * 8),
                None,
            );
        }
        let mut bytes: Vec<u8> = (0..size).map(|ix| ((n >> (8 * ix)) & 0xff) as u8).collect();
        if !little_endian {
            bytes.reverse();
        }
        self.emit(&bytes);
    }

    fn hex_directive(&mut self, toks: &[Token], mut i: usize) -> Option<usize> {
        while !self.at_statement_end(toks, i) {
            match toks.get(i).map(|t| &t.kind) {
                Some(TokenKind::Str(s)) => {
                    let digits: Vec<u8> = s
                        .iter()
                        .copied()
                        .filter(|b| !b.is_ascii_whitespace())
                        .collect();
                    if digits.len() % 2 != 0 {
                        self.error_at(
                            AsmErrorKind::Syntax,
                            "Hex string must have an even number of digits",
                            Some(toks[i].span),
                        );
                        return None;
                    }
                    let mut bytes = Vec::with_capacity(digits.len() / 2);
                    for pair in digits.chunks(2) {
                        let text = std::str::from_utf8(pair).unwrap_or("");
                        match u8::from_str_radix(text, 16) {
                            Ok(b) => bytes.push(b),
                            Err(_) => {
                                self.error_at(
                                    AsmErrorKind::Syntax,
                                    format!("Invalid hex byte: {text}"),
                                    Some(toks[i].span),
                                );
                                return None;
                            }
                        }
                    }
                    self.emit(&bytes);
                    i += 1;
                }
                Some(TokenKind::Int(n)) => {
                    let byte = (*n & 0xff) as u8;
                    self.emit(&[byte]);
                    i += 1;
                }
                _ => {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        "!hex takes hex strings or bytes",
                        toks.get(i).map(|t| t.span),
                    );
                    return None;
                }
            }
            if matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::Comma)) {
                i += 1;
            }
        }
        Some(i)
    }

    fn fill_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let (count, mut next) = self.eval_known_int(toks, i, "!fill count")?;
        if count < 0 {
            self.error_at(AsmErrorKind::Range, "!fill count must not be negative", None);
            return None;
        }
        let mut value = self.image.init_byte();
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            let (v, after) = self.eval_known_int(toks, next + 1, "!fill value")?;
            value = (v & 0xff) as u8;
            next = after;
        }
        let bytes = vec![value; count as usize];
        self.emit(&bytes);
        Some(next)
    }

    fn skip_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let (count, next) = self.eval_known_int(toks, i, "!skip count")?;
        self.advance_pc(count);
        Some(next)
    }

    /// `!align mask, value [, fill]`: advance until `(pc & mask) == value`.
    fn align_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let (mask, mut next) = self.eval_known_int(toks, i, "!align mask")?;
        if !matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            self.error_at(
                AsmErrorKind::Syntax,
                "!align requires 'mask, value'",
                toks.get(next).map(|t| t.span),
            );
            return None;
        }
        let (value, after) = self.eval_known_int(toks, next + 1, "!align value")?;
        next = after;
        let mut fill = self.image.init_byte();
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            let (f, after) = self.eval_known_int(toks, next + 1, "!align fill")?;
            fill = (f & 0xff) as u8;
            next = after;
        }
        let mut guard = 0usize;
        while (self.pc.effective() & mask) != value {
            self.emit(&[fill]);
            guard += 1;
            if guard > 0x10000 || self.fatal {
                self.error_at(
                    AsmErrorKind::Semantic,
                    "!align never reaches the requested value",
                    None,
                );
                return None;
            }
        }
        Some(next)
    }

    // -- text ------------------------------------------------------------

    /// `!text`/`!raw`/`!pet`/`!scr`: strings through a conversion table,
    /// numeric expressions as single bytes.
    fn text_directive(
        &mut self,
        toks: &[Token],
        mut i: usize,
        table: Option<Table>,
    ) -> Option<usize> {
        let table = table.unwrap_or_else(|| self.convtab.clone());
        loop {
            match toks.get(i).map(|t| &t.kind) {
                Some(TokenKind::Str(s)) => {
                    let bytes = table.convert(s);
                    self.emit(&bytes);
                    i += 1;
                }
                _ => match self.eval(toks, i) {
                    Ok((value, next, _)) => {
                        self.emit_value(value, 1, true);
                        i = next;
                    }
                    Err(err) => {
                        self.eval_error(err);
                        return None;
                    }
                },
            }
            if matches!(toks.get(i).map(|t| &t.kind), Some(TokenKind::Comma)) {
                i += 1;
            } else {
                break;
            }
        }
        Some(i)
    }

    /// `!scrxor value, "..."` (the original string-first order is accepted
    /// too). The mask applies after screen-code conversion.
    fn scrxor_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        if let Some(TokenKind::Str(s)) = toks.get(i).map(|t| &t.kind) {
            let s = s.clone();
            let mut next = i + 1;
            let mut mask = 0u8;
            if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
                let (v, after) = self.eval_known_int(toks, next + 1, "!scrxor value")?;
                mask = (v & 0xff) as u8;
                next = after;
            }
            let bytes = Table::Scr.convert_xor(&s, mask);
            self.emit(&bytes);
            return Some(next);
        }

        let (value, mut next) = self.eval_known_int(toks, i, "!scrxor value")?;
        let mask = (value & 0xff) as u8;
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            next += 1;
        }
        match toks.get(next).map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => {
                let bytes = Table::Scr.convert_xor(s, mask);
                self.emit(&bytes);
                Some(next + 1)
            }
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!scrxor requires a string",
                    toks.get(next).map(|t| t.span),
                );
                None
            }
        }
    }

    fn convtab_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => match Table::by_name(&name.to_ascii_lowercase()) {
                Some(table) => {
                    self.convtab = table;
                    Some(i + 1)
                }
                None => {
                    self.error_at(
                        AsmErrorKind::Semantic,
                        format!("Unknown conversion table: {name}"),
                        Some(toks[i].span),
                    );
                    None
                }
            },
            Some(TokenKind::Str(s)) => {
                let name = String::from_utf8_lossy(s).to_string();
                if let Some(table) = Table::by_name(&name) {
                    self.convtab = table;
                    return Some(i + 1);
                }
                match self.files.find(&name) {
                    Ok(path) => match Table::from_file(&path) {
                        Ok(table) => {
                            self.convtab = table;
                            Some(i + 1)
                        }
                        Err(err) => {
                            self.error_at(AsmErrorKind::File, err.to_string(), Some(toks[i].span));
                            None
                        }
                    },
                    Err(err) => {
                        self.error_at(AsmErrorKind::File, err.to_string(), Some(toks[i].span));
                        None
                    }
                }
            }
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!convtab requires a table name or file",
                    toks.get(i).map(|t| t.span),
                );
                None
            }
        }
    }

    // -- conditionals ----------------------------------------------------

    fn if_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let (value, next) = match self.eval(toks, i) {
            Ok((value, next, _)) => (value, next),
            Err(err) => {
                self.eval_error(err);
                return None;
            }
        };
        if value.is_undefined() {
            self.error_at(
                AsmErrorKind::Semantic,
                "!if condition must be resolvable",
                toks.get(i).map(|t| t.span),
            );
            return None;
        }
        self.expect_open_brace(toks, next)?;
        self.open_conditional(value.is_truthy());
        Some(next + 1)
    }

    fn ifdef_directive(&mut self, toks: &[Token], i: usize, negate: bool) -> Option<usize> {
        let name = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "Expected a symbol name",
                    toks.get(i).map(|t| t.span),
                );
                return None;
            }
        };
        let defined = self
            .param_scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&name))
            || self.symbols.is_defined(&name);
        self.expect_open_brace(toks, i + 1)?;
        self.open_conditional(defined != negate);
        Some(i + 2)
    }

    fn expect_open_brace(&mut self, toks: &[Token], pos: usize) -> Option<()> {
        if matches!(toks.get(pos).map(|t| &t.kind), Some(TokenKind::OpenBrace)) {
            Some(())
        } else {
            self.error_at(
                AsmErrorKind::Syntax,
                "Expected '{' to open the block",
                toks.get(pos).map(|t| t.span),
            );
            None
        }
    }

    // -- loops -----------------------------------------------------------

    /// `!for var = start to end [step s] { ... }`; the comma form
    /// `!for var, start, end [, step]` is accepted as well.
    fn for_directive(&mut self, toks: &[Token], i: usize, line: &str) -> Option<usize> {
        let var = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!for requires a variable name",
                    toks.get(i).map(|t| t.span),
                );
                return None;
            }
        };

        let (start, end, step, brace_pos) = match toks.get(i + 1).map(|t| &t.kind) {
            Some(TokenKind::Equals) => {
                let (start, mut pos) = self.eval_known_int(toks, i + 2, "!for start")?;
                if !matches!(
                    toks.get(pos).map(|t| &t.kind),
                    Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("to")
                ) {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        "!for requires 'to' after the start value",
                        toks.get(pos).map(|t| t.span),
                    );
                    return None;
                }
                let (end, mut after) = self.eval_known_int(toks, pos + 1, "!for end")?;
                let mut step = 1;
                if matches!(
                    toks.get(after).map(|t| &t.kind),
                    Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("step")
                ) {
                    let (s, next) = self.eval_known_int(toks, after + 1, "!for step")?;
                    step = s;
                    after = next;
                }
                pos = after;
                (start, end, step, pos)
            }
            Some(TokenKind::Comma) => {
                let (start, pos) = self.eval_known_int(toks, i + 2, "!for start")?;
                if !matches!(toks.get(pos).map(|t| &t.kind), Some(TokenKind::Comma)) {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        "!for requires ',' after the start value",
                        toks.get(pos).map(|t| t.span),
                    );
                    return None;
                }
                let (end, mut after) = self.eval_known_int(toks, pos + 1, "!for end")?;
                let mut step = 1;
                if matches!(toks.get(after).map(|t| &t.kind), Some(TokenKind::Comma)) {
                    let (s, next) = self.eval_known_int(toks, after + 1, "!for step")?;
                    step = s;
                    after = next;
                }
                (start, end, step, after)
            }
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!for requires '=' or ',' after the variable",
                    toks.get(i + 1).map(|t| t.span),
                );
                return None;
            }
        };

        self.expect_open_brace(toks, brace_pos)?;
        let rest = &line[toks[brace_pos].span.col_end - 1..];
        self.begin_body(
            CaptureKind::For(ForHeader {
                var,
                start,
                end,
                step,
            }),
            rest,
        );
        None
    }

    fn while_directive(&mut self, toks: &[Token], i: usize, line: &str) -> Option<usize> {
        let brace_pos = toks[i..]
            .iter()
            .position(|t| matches!(t.kind, TokenKind::OpenBrace))
            .map(|ix| i + ix);
        let Some(brace_pos) = brace_pos else {
            self.error_at(
                AsmErrorKind::Syntax,
                "!while requires a '{' block",
                toks.get(i).map(|t| t.span),
            );
            return None;
        };
        if brace_pos == i {
            self.error_at(
                AsmErrorKind::Syntax,
                "!while requires a condition",
                Some(toks[i].span),
            );
            return None;
        }
        let cond: Vec<Token> = toks[i..brace_pos].to_vec();
        let rest = &line[toks[brace_pos].span.col_end - 1..];
        self.begin_body(CaptureKind::While(cond), rest);
        None
    }

    fn do_directive(&mut self, toks: &[Token], i: usize, line: &str) -> Option<usize> {
        self.expect_open_brace(toks, i)?;
        let rest = &line[toks[i].span.col_end - 1..];
        self.begin_body(CaptureKind::Do, rest);
        None
    }

    fn loop_control_directive(
        &mut self,
        toks: &[Token],
        i: usize,
        control: LoopControl,
    ) -> Option<usize> {
        if self.loop_nesting == 0 {
            self.error_at(
                AsmErrorKind::Semantic,
                "!break/!continue outside of a loop",
                toks.get(i.saturating_sub(1)).map(|t| t.span),
            );
            return None;
        }
        self.loop_control = Some(control);
        Some(i)
    }

    // -- files -----------------------------------------------------------

    fn source_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let name = self.expect_string(toks, i, "!source requires a filename")?;
        let lines = match self.files.push_source(&name) {
            Ok(lines) => lines,
            Err(err) => {
                let kind = match err {
                    FileError::DepthExceeded(_) => AsmErrorKind::Limit,
                    _ => AsmErrorKind::File,
                };
                self.error_at(kind, err.to_string(), toks.get(i).map(|t| t.span));
                return None;
            }
        };

        let saved_file = self.current_file.clone();
        let saved_line = self.current_line;
        let saved_text = self.current_text.clone();
        self.current_file = self
            .files
            .current_file()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| name.clone());

        for (ix, included) in lines.iter().enumerate() {
            self.current_line = (ix + 1) as u32;
            self.process_line(included);
            if self.fatal {
                break;
            }
        }

        self.files.pop_source();
        self.current_file = saved_file;
        self.current_line = saved_line;
        self.current_text = saved_text;
        Some(i + 1)
    }

    fn binary_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let name = self.expect_string(toks, i, "!binary requires a filename")?;
        let mut next = i + 1;
        let mut size = None;
        let mut skip = 0usize;
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            let (s, after) = self.eval_known_int(toks, next + 1, "!binary size")?;
            size = Some(s.max(0) as usize);
            next = after;
            if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
                let (k, after) = self.eval_known_int(toks, next + 1, "!binary skip")?;
                skip = k.max(0) as usize;
                next = after;
            }
        }
        match self.files.read_binary(&name, size, skip) {
            Ok(data) => {
                self.emit(&data);
                Some(next)
            }
            Err(err) => {
                self.error_at(AsmErrorKind::File, err.to_string(), toks.get(i).map(|t| t.span));
                None
            }
        }
    }

    // -- control ---------------------------------------------------------

    fn to_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let name = self.expect_string(toks, i, "!to requires a filename")?;
        self.output_request.file = Some(name);
        let mut next = i + 1;
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            match toks.get(next + 1).map(|t| &t.kind) {
                Some(TokenKind::Ident(format)) => {
                    match OutputFormat::by_name(&format.to_ascii_lowercase()) {
                        Some(format) => {
                            self.output_request.format = Some(format);
                            next += 2;
                        }
                        None => {
                            self.error_at(
                                AsmErrorKind::Semantic,
                                format!("Unknown output format: {format}"),
                                toks.get(next + 1).map(|t| t.span),
                            );
                            return None;
                        }
                    }
                }
                _ => {
                    self.error_at(
                        AsmErrorKind::Syntax,
                        "Expected an output format after ','",
                        toks.get(next + 1).map(|t| t.span),
                    );
                    return None;
                }
            }
        }
        Some(next)
    }

    /// `!zone [name]` switches to a fresh zone; with a `{` block the
    /// previous zone is restored at the closing brace.
    fn zone_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let next = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(_)) | Some(TokenKind::Str(_)) => i + 1,
            _ => i,
        };
        let previous = self.symbols.enter_zone();
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::OpenBrace)) {
            self.blocks.push(Block::Zone(previous));
            return Some(next + 1);
        }
        Some(next)
    }

    /// `!cpu`: CPU names like `65c02` tokenize as a number and an
    /// identifier, so the pieces are re-joined textually.
    fn cpu_directive(&mut self, toks: &[Token], mut i: usize) -> Option<usize> {
        let mut name = String::new();
        let start_span = toks.get(i).map(|t| t.span);
        while let Some(token) = toks.get(i) {
            match &token.kind {
                TokenKind::Int(n) => name.push_str(&n.to_string()),
                TokenKind::Ident(part) => name.push_str(part),
                _ => break,
            }
            i += 1;
        }
        if name.is_empty() {
            self.error_at(AsmErrorKind::Syntax, "!cpu requires a CPU type", start_span);
            return None;
        }
        match CpuType::by_name(&name) {
            Some(cpu) => {
                self.cpu = cpu;
                Some(i)
            }
            None => {
                self.error_at(
                    AsmErrorKind::Semantic,
                    format!("Unknown CPU type: {name}"),
                    start_span,
                );
                None
            }
        }
    }

    fn set_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let name = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    "!set requires a variable name",
                    toks.get(i).map(|t| t.span),
                );
                return None;
            }
        };
        if !matches!(toks.get(i + 1).map(|t| &t.kind), Some(TokenKind::Equals)) {
            self.error_at(
                AsmErrorKind::Syntax,
                "!set requires '=' after the variable name",
                toks.get(i + 1).map(|t| t.span),
            );
            return None;
        }
        match self.eval(toks, i + 2) {
            Ok((value, next, _)) => {
                let _ = self.symbols.define(&name, value, true);
                Some(next)
            }
            Err(err) => {
                self.eval_error(err);
                None
            }
        }
    }

    fn pseudopc_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        let (addr, next) = self.eval_known_int(toks, i, "!pseudopc address")?;
        self.pc.enter_pseudo(addr);
        if matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::OpenBrace)) {
            self.blocks.push(Block::PseudoPc);
            return Some(next + 1);
        }
        Some(next)
    }

    // -- diagnostics -----------------------------------------------------

    fn message_directive(&mut self, name: &str, toks: &[Token], i: usize) -> Option<usize> {
        let mut message = match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => String::from_utf8_lossy(s).to_string(),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    format!("!{name} requires a message string"),
                    toks.get(i).map(|t| t.span),
                );
                return None;
            }
        };
        let mut next = i + 1;
        while matches!(toks.get(next).map(|t| &t.kind), Some(TokenKind::Comma)) {
            match self.eval(toks, next + 1) {
                Ok((value, after, _)) => {
                    message.push(' ');
                    message.push_str(&value.to_string());
                    next = after;
                }
                Err(err) => {
                    self.eval_error(err);
                    return None;
                }
            }
        }
        // Only report once, during the final pass.
        if self.pass == 2 {
            match name {
                "warn" => self.warn_at(AsmErrorKind::Semantic, message, None),
                "error" => self.error_at(AsmErrorKind::Semantic, message, None),
                _ => self.serious_at(message, None),
            }
        } else if name == "serious" {
            self.serious_at(message, None);
        }
        Some(next)
    }

    fn symbollist_directive(&mut self, toks: &[Token], i: usize) -> Option<usize> {
        match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => {
                self.symbollist = Some(Some(String::from_utf8_lossy(s).to_string()));
                Some(i + 1)
            }
            _ => {
                self.symbollist = Some(None);
                Some(i)
            }
        }
    }

    fn expect_string(&mut self, toks: &[Token], i: usize, message: &str) -> Option<String> {
        match toks.get(i).map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => Some(String::from_utf8_lossy(s).to_string()),
            _ => {
                self.error_at(
                    AsmErrorKind::Syntax,
                    message,
                    toks.get(i).map(|t| t.span),
                );
                None
            }
        }
    }
}

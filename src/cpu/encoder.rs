// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction encoding: operand syntax to addressing mode to bytes.
//!
//! Mode selection picks the smallest legal encoding: a known operand value
//! that fits in eight bits uses the zero-page form when the mnemonic has
//! one. Operands that depend on a forward reference reserve the absolute
//! form instead; because pass 2 applies the same forward test (symbol not
//! yet redefined this pass), both passes make identical width choices and
//! the encoding is stable. A `+1`/`+2` mnemonic suffix overrides the
//! selection.

use crate::core::error::{AsmError, AsmErrorKind};
use crate::core::expr::{eval_expr, EvalContext};
use crate::core::tokenizer::{Span, Token, TokenKind};
use crate::core::value::{fits_byte, Value};
use crate::cpu::{lookup, AddrMode, CpuType};

/// Error from instruction encoding, with the triggering token span when
/// known.
#[derive(Debug)]
pub struct EncodeError {
    pub error: AsmError,
    pub span: Option<Span>,
}

impl EncodeError {
    fn new(kind: AsmErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            error: AsmError::new(kind, message),
            span,
        }
    }
}

impl From<crate::core::expr::EvalError> for EncodeError {
    fn from(err: crate::core::expr::EvalError) -> Self {
        Self {
            error: AsmError::new(err.kind, err.message),
            span: Some(err.span),
        }
    }
}

/// Result of encoding one instruction.
#[derive(Debug)]
pub struct EncodedInstruction {
    pub bytes: Vec<u8>,
    /// Position of the first token after the operand.
    pub next: usize,
    /// Non-fatal range complaints (over-wide immediates, data overflow).
    pub warnings: Vec<AsmError>,
}

/// A parsed operand value: the integer it evaluated to, and whether any
/// forward reference was involved (Undefined evaluates to 0 with the flag
/// set).
#[derive(Debug, Clone, Copy)]
struct OperandValue {
    value: i64,
    forward: bool,
}

/// Encode one instruction starting after the mnemonic token.
///
/// `pc` is the effective program counter at the start of the instruction;
/// relative displacements are computed against the address after it.
/// Branch range and forced-width violations are errors in pass 2 only,
/// since pass 1 may not know the operand value yet.
#[allow(clippy::too_many_arguments)]
pub fn encode_instruction(
    cpu: CpuType,
    mnemonic: &str,
    force_width: Option<u8>,
    toks: &[Token],
    start: usize,
    ctx: &mut dyn EvalContext,
    pc: i64,
    pass: u8,
) -> Result<EncodedInstruction, EncodeError> {
    Encoder {
        cpu,
        mnemonic,
        force_width,
        toks,
        ctx,
        pc,
        pass,
        warnings: Vec::new(),
    }
    .run(start)
}

struct Encoder<'a, 'c> {
    cpu: CpuType,
    mnemonic: &'a str,
    force_width: Option<u8>,
    toks: &'a [Token],
    ctx: &'c mut dyn EvalContext,
    pc: i64,
    pass: u8,
    warnings: Vec<AsmError>,
}

impl<'a, 'c> Encoder<'a, 'c> {
    fn run(mut self, start: usize) -> Result<EncodedInstruction, EncodeError> {
        let (mode, operand, next) = self.parse_operand(start)?;
        let opcode = self.opcode_for(mode)?;
        let mut bytes = vec![opcode];
        self.emit_operand(&mut bytes, mode, operand)?;
        Ok(EncodedInstruction {
            bytes,
            next,
            warnings: self.warnings,
        })
    }

    /// Determine the addressing mode and operand from the token stream.
    fn parse_operand(
        &mut self,
        start: usize,
    ) -> Result<(AddrMode, Option<OperandValue>, usize), EncodeError> {
        if self.at_statement_end(start) {
            return Ok((self.implied_mode()?, None, start));
        }

        let token = &self.toks[start];
        match &token.kind {
            // Explicit accumulator operand: ASL A
            TokenKind::Ident(name)
                if name.eq_ignore_ascii_case("a")
                    && self.at_statement_end(start + 1)
                    && lookup(self.cpu, self.mnemonic, AddrMode::Accumulator).is_some() =>
            {
                Ok((AddrMode::Accumulator, None, start + 1))
            }

            // Immediate: #expr
            TokenKind::Hash => {
                let (operand, next) = self.eval(start + 1)?;
                if self.pass == 2 && !(-128..=255).contains(&operand.value) && !operand.forward {
                    self.warnings.push(AsmError::new(
                        AsmErrorKind::Range,
                        format!("Immediate value {} does not fit in one byte", operand.value),
                    ));
                }
                Ok((AddrMode::Immediate, Some(operand), next))
            }

            // Indirect family: (expr) / (expr,X) / (expr),Y
            TokenKind::OpenParen => self.parse_indirect(start),

            // zp,target bit branches
            _ if self.mnemonic.starts_with("BBR") || self.mnemonic.starts_with("BBS") => {
                self.parse_zp_relative(start)
            }

            // Direct: expr / expr,X / expr,Y / relative branch target
            _ => self.parse_direct(start),
        }
    }

    fn parse_indirect(
        &mut self,
        start: usize,
    ) -> Result<(AddrMode, Option<OperandValue>, usize), EncodeError> {
        let (operand, mut pos) = self.eval(start + 1)?;

        // (expr,X)
        if self.peek_is(pos, |k| matches!(k, TokenKind::Comma)) && self.peek_index(pos + 1, "x") {
            pos += 2;
            self.expect_close(pos)?;
            pos += 1;
            let mode = if self.zp_eligible(operand)
                && lookup(self.cpu, self.mnemonic, AddrMode::IndexedIndirectX).is_some()
            {
                AddrMode::IndexedIndirectX
            } else if lookup(self.cpu, self.mnemonic, AddrMode::AbsoluteXIndirect).is_some() {
                AddrMode::AbsoluteXIndirect
            } else {
                AddrMode::IndexedIndirectX
            };
            return Ok((mode, Some(operand), pos));
        }

        self.expect_close(pos)?;
        pos += 1;

        // (expr),Y
        if self.peek_is(pos, |k| matches!(k, TokenKind::Comma)) && self.peek_index(pos + 1, "y") {
            pos += 2;
            return Ok((AddrMode::IndirectIndexedY, Some(operand), pos));
        }

        // (expr): zero-page indirect when available, else absolute indirect
        let mode = if self.zp_eligible(operand)
            && lookup(self.cpu, self.mnemonic, AddrMode::ZeroPageIndirect).is_some()
        {
            AddrMode::ZeroPageIndirect
        } else {
            AddrMode::Indirect
        };
        Ok((mode, Some(operand), pos))
    }

    fn parse_zp_relative(
        &mut self,
        start: usize,
    ) -> Result<(AddrMode, Option<OperandValue>, usize), EncodeError> {
        let (zp, pos) = self.eval(start)?;
        if !self.peek_is(pos, |k| matches!(k, TokenKind::Comma)) {
            return Err(EncodeError::new(
                AsmErrorKind::Syntax,
                format!("{} requires 'zeropage, target' operands", self.mnemonic),
                self.span_at(pos),
            ));
        }
        let (target, next) = self.eval(pos + 1)?;
        // Pack both into one operand: low 8 bits zp, high bits the target.
        let packed = OperandValue {
            value: (target.value << 8) | (zp.value & 0xff),
            forward: zp.forward || target.forward,
        };
        Ok((AddrMode::ZeroPageRelative, Some(packed), next))
    }

    fn parse_direct(
        &mut self,
        start: usize,
    ) -> Result<(AddrMode, Option<OperandValue>, usize), EncodeError> {
        let (operand, mut pos) = self.eval(start)?;

        if lookup(self.cpu, self.mnemonic, AddrMode::Relative).is_some() {
            return Ok((AddrMode::Relative, Some(operand), pos));
        }

        if self.peek_is(pos, |k| matches!(k, TokenKind::Comma)) {
            if self.peek_index(pos + 1, "x") {
                pos += 2;
                let mode = self.pick_width(operand, AddrMode::ZeroPageX, AddrMode::AbsoluteX)?;
                return Ok((mode, Some(operand), pos));
            }
            if self.peek_index(pos + 1, "y") {
                pos += 2;
                let mode = self.pick_width(operand, AddrMode::ZeroPageY, AddrMode::AbsoluteY)?;
                return Ok((mode, Some(operand), pos));
            }
            return Err(EncodeError::new(
                AsmErrorKind::Syntax,
                "Expected index register X or Y",
                self.span_at(pos + 1),
            ));
        }

        let mode = self.pick_width(operand, AddrMode::ZeroPage, AddrMode::Absolute)?;
        Ok((mode, Some(operand), pos))
    }

    /// Smallest-legal-width selection between a zero-page and an absolute
    /// mode, honoring forward references and explicit width forcing.
    fn pick_width(
        &mut self,
        operand: OperandValue,
        zp: AddrMode,
        abs: AddrMode,
    ) -> Result<AddrMode, EncodeError> {
        let has_zp = lookup(self.cpu, self.mnemonic, zp).is_some();
        let has_abs = lookup(self.cpu, self.mnemonic, abs).is_some();

        match self.force_width {
            Some(1) => {
                if !has_zp {
                    return Err(self.mode_error(zp));
                }
                if self.pass == 2 && !operand.forward && !fits_byte(operand.value) {
                    return Err(EncodeError::new(
                        AsmErrorKind::Range,
                        format!(
                            "Value {} does not fit in zero page (forced with +1)",
                            operand.value
                        ),
                        None,
                    ));
                }
                Ok(zp)
            }
            Some(_) => {
                if !has_abs {
                    return Err(self.mode_error(abs));
                }
                Ok(abs)
            }
            None => {
                if operand.forward {
                    // Reserve the wide form; pass 2 repeats this choice.
                    if has_abs {
                        return Ok(abs);
                    }
                    if has_zp {
                        return Ok(zp);
                    }
                    return Err(self.mode_error(abs));
                }
                if fits_byte(operand.value) && has_zp {
                    return Ok(zp);
                }
                if has_abs {
                    return Ok(abs);
                }
                if has_zp {
                    if self.pass == 2 {
                        return Err(EncodeError::new(
                            AsmErrorKind::Range,
                            format!(
                                "Value {} does not fit in zero page for {}",
                                operand.value, self.mnemonic
                            ),
                            None,
                        ));
                    }
                    return Ok(zp);
                }
                Err(self.mode_error(abs))
            }
        }
    }

    fn implied_mode(&mut self) -> Result<AddrMode, EncodeError> {
        if lookup(self.cpu, self.mnemonic, AddrMode::Implied).is_some() {
            return Ok(AddrMode::Implied);
        }
        if lookup(self.cpu, self.mnemonic, AddrMode::Accumulator).is_some() {
            return Ok(AddrMode::Accumulator);
        }
        if self.cpu == CpuType::Nmos6502 && matches!(self.mnemonic, "TOP" | "DOP") {
            return Ok(AddrMode::Implied);
        }
        Err(self.mode_error(AddrMode::Implied))
    }

    fn opcode_for(&mut self, mode: AddrMode) -> Result<u8, EncodeError> {
        // Bare TOP/DOP emit their single NOP byte (ACME compatibility).
        if matches!(mode, AddrMode::Implied) && self.cpu == CpuType::Nmos6502 {
            match self.mnemonic {
                "TOP" => return Ok(0x0C),
                "DOP" => return Ok(0x80),
                _ => {}
            }
        }
        lookup(self.cpu, self.mnemonic, mode).ok_or_else(|| self.mode_error(mode))
    }

    fn emit_operand(
        &mut self,
        bytes: &mut Vec<u8>,
        mode: AddrMode,
        operand: Option<OperandValue>,
    ) -> Result<(), EncodeError> {
        let Some(operand) = operand else {
            return Ok(());
        };
        match mode {
            AddrMode::Implied | AddrMode::Accumulator => {}
            AddrMode::Relative => {
                let displacement = self.branch_displacement(operand, 2)?;
                bytes.push(displacement as u8);
            }
            AddrMode::ZeroPageRelative => {
                bytes.push((operand.value & 0xff) as u8);
                let target = OperandValue {
                    value: operand.value >> 8,
                    forward: operand.forward,
                };
                let displacement = self.branch_displacement(target, 3)?;
                bytes.push(displacement as u8);
            }
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndexedIndirectX
            | AddrMode::IndirectIndexedY
            | AddrMode::ZeroPageIndirect => {
                if self.pass == 2
                    && !operand.forward
                    && matches!(
                        mode,
                        AddrMode::IndexedIndirectX
                            | AddrMode::IndirectIndexedY
                            | AddrMode::ZeroPageIndirect
                    )
                    && !fits_byte(operand.value)
                {
                    return Err(EncodeError::new(
                        AsmErrorKind::Range,
                        format!(
                            "Indirect operand {} does not fit in zero page",
                            operand.value
                        ),
                        None,
                    ));
                }
                bytes.push((operand.value & 0xff) as u8);
            }
            AddrMode::Absolute
            | AddrMode::AbsoluteX
            | AddrMode::AbsoluteY
            | AddrMode::Indirect
            | AddrMode::AbsoluteXIndirect => {
                let value = operand.value & 0xffff;
                bytes.push((value & 0xff) as u8);
                bytes.push((value >> 8) as u8);
            }
        }
        Ok(())
    }

    /// Displacement from the end of the instruction, range-checked in pass 2.
    fn branch_displacement(
        &mut self,
        target: OperandValue,
        size: i64,
    ) -> Result<i64, EncodeError> {
        if target.forward && self.pass == 1 {
            return Ok(0);
        }
        let displacement = target.value - (self.pc + size);
        if self.pass == 2 && !(-128..=127).contains(&displacement) {
            return Err(EncodeError::new(
                AsmErrorKind::Range,
                format!("Branch target out of range: displacement {displacement}"),
                None,
            ));
        }
        Ok(displacement & 0xff)
    }

    fn eval(&mut self, start: usize) -> Result<(OperandValue, usize), EncodeError> {
        let (value, next, forward) = eval_expr(self.toks, start, self.ctx)?;
        let operand = match value {
            Value::Undefined => OperandValue {
                value: 0,
                forward: true,
            },
            other => match other.as_int() {
                Some(value) => OperandValue { value, forward },
                None => {
                    return Err(EncodeError::new(
                        AsmErrorKind::Syntax,
                        format!("Operand must be a number, got {}", other.type_name()),
                        self.span_at(start),
                    ))
                }
            },
        };
        Ok((operand, next))
    }

    fn zp_eligible(&self, operand: OperandValue) -> bool {
        !operand.forward && fits_byte(operand.value)
    }

    fn at_statement_end(&self, pos: usize) -> bool {
        match self.toks.get(pos).map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Colon | TokenKind::CloseBrace) => true,
            _ => false,
        }
    }

    fn peek_is(&self, pos: usize, test: impl Fn(&TokenKind) -> bool) -> bool {
        self.toks.get(pos).is_some_and(|t| test(&t.kind))
    }

    fn peek_index(&self, pos: usize, register: &str) -> bool {
        self.peek_is(pos, |k| {
            matches!(k, TokenKind::Ident(name) if name.eq_ignore_ascii_case(register))
        })
    }

    fn expect_close(&self, pos: usize) -> Result<(), EncodeError> {
        if self.peek_is(pos, |k| matches!(k, TokenKind::CloseParen)) {
            Ok(())
        } else {
            Err(EncodeError::new(
                AsmErrorKind::Syntax,
                "Expected ')' in indirect operand",
                self.span_at(pos),
            ))
        }
    }

    fn span_at(&self, pos: usize) -> Option<Span> {
        self.toks
            .get(pos.min(self.toks.len().saturating_sub(1)))
            .map(|t| t.span)
    }

    fn mode_error(&self, mode: AddrMode) -> EncodeError {
        EncodeError::new(
            AsmErrorKind::AddressingMode,
            format!(
                "{} does not support {:?} addressing on the {}",
                self.mnemonic,
                mode,
                self.cpu.as_str()
            ),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::{EvalError, SymbolRef};
    use crate::core::tokenizer::Tokenizer;

    struct TestCtx {
        symbols: Vec<(&'static str, i64, bool)>,
        pc: i64,
    }

    impl EvalContext for TestCtx {
        fn lookup_symbol(&mut self, name: &str, span: Span) -> Result<SymbolRef, EvalError> {
            for (sym, value, forward) in &self.symbols {
                if *sym == name {
                    return Ok(SymbolRef {
                        value: Value::Int(*value),
                        forward: *forward,
                    });
                }
            }
            Err(EvalError::new(format!("Undefined symbol: {name}"), span))
        }

        fn lookup_anon(&mut self, marker: &str, span: Span) -> Result<SymbolRef, EvalError> {
            Err(EvalError::new(format!("no anon {marker}"), span))
        }

        fn program_counter(&self) -> Value {
            Value::Int(self.pc)
        }
    }

    fn encode_on(cpu: CpuType, line: &str, pc: i64) -> Vec<u8> {
        encode_with(cpu, line, pc, Vec::new())
    }

    fn encode_with(
        cpu: CpuType,
        line: &str,
        pc: i64,
        symbols: Vec<(&'static str, i64, bool)>,
    ) -> Vec<u8> {
        try_encode(cpu, line, pc, symbols).unwrap().bytes
    }

    fn try_encode(
        cpu: CpuType,
        line: &str,
        pc: i64,
        symbols: Vec<(&'static str, i64, bool)>,
    ) -> Result<EncodedInstruction, EncodeError> {
        let checker = move |name: &str| crate::cpu::has_mnemonic(CpuType::W65c02s, name);
        let toks = Tokenizer::with_mnemonic_checker(line, 1, std::sync::Arc::new(checker))
            .tokenize()
            .unwrap();
        let (mnemonic, force_width) = match &toks[0].kind {
            TokenKind::Mnemonic { name, force_width } => (name.clone(), *force_width),
            other => panic!("not a mnemonic: {other:?}"),
        };
        let mut ctx = TestCtx { symbols, pc };
        encode_instruction(cpu, &mnemonic, force_width, &toks, 1, &mut ctx, pc, 2)
    }

    #[test]
    fn implied_and_accumulator() {
        assert_eq!(encode_on(CpuType::Mos6502, "rts", 0), vec![0x60]);
        assert_eq!(encode_on(CpuType::Mos6502, "asl", 0), vec![0x0a]);
        assert_eq!(encode_on(CpuType::Mos6502, "asl a", 0), vec![0x0a]);
        assert_eq!(encode_on(CpuType::Cmos65c02, "inc", 0), vec![0x1a]);
    }

    #[test]
    fn immediate() {
        assert_eq!(encode_on(CpuType::Mos6502, "lda #$42", 0), vec![0xa9, 0x42]);
        assert_eq!(
            encode_on(CpuType::Mos6502, "lda #'A'", 0),
            vec![0xa9, 0x41]
        );
    }

    #[test]
    fn zero_page_vs_absolute() {
        assert_eq!(encode_on(CpuType::Mos6502, "lda $12", 0), vec![0xa5, 0x12]);
        assert_eq!(
            encode_on(CpuType::Mos6502, "lda $1234", 0),
            vec![0xad, 0x34, 0x12]
        );
        assert_eq!(encode_on(CpuType::Mos6502, "lda $12,x", 0), vec![0xb5, 0x12]);
        assert_eq!(
            encode_on(CpuType::Mos6502, "lda $1234,y", 0),
            vec![0xb9, 0x34, 0x12]
        );
        // LDX has zp,Y
        assert_eq!(encode_on(CpuType::Mos6502, "ldx $12,y", 0), vec![0xb6, 0x12]);
    }

    #[test]
    fn forward_reference_reserves_absolute() {
        let bytes = encode_with(CpuType::Mos6502, "lda target", 0, vec![("target", 0x12, true)]);
        assert_eq!(bytes, vec![0xad, 0x12, 0x00]);
        // Known value of the same size picks zero page.
        let bytes = encode_with(
            CpuType::Mos6502,
            "lda target",
            0,
            vec![("target", 0x12, false)],
        );
        assert_eq!(bytes, vec![0xa5, 0x12]);
    }

    #[test]
    fn width_forcing() {
        let bytes = encode_with(CpuType::Mos6502, "lda+2 $12", 0, Vec::new());
        assert_eq!(bytes, vec![0xad, 0x12, 0x00]);
        let err = try_encode(CpuType::Mos6502, "lda+1 $1234", 0, Vec::new()).unwrap_err();
        assert_eq!(err.error.kind, AsmErrorKind::Range);
    }

    #[test]
    fn indirect_modes() {
        assert_eq!(
            encode_on(CpuType::Mos6502, "jmp ($1234)", 0),
            vec![0x6c, 0x34, 0x12]
        );
        assert_eq!(
            encode_on(CpuType::Mos6502, "lda ($20,x)", 0),
            vec![0xa1, 0x20]
        );
        assert_eq!(
            encode_on(CpuType::Mos6502, "lda ($20),y", 0),
            vec![0xb1, 0x20]
        );
        // 65C02 zero-page indirect and indexed indirect jump
        assert_eq!(encode_on(CpuType::Cmos65c02, "lda ($20)", 0), vec![0xb2, 0x20]);
        assert_eq!(
            encode_on(CpuType::Cmos65c02, "jmp ($1234,x)", 0),
            vec![0x7c, 0x34, 0x12]
        );
    }

    #[test]
    fn relative_branches() {
        // S3: displacement back over a one-byte instruction: -3
        assert_eq!(
            encode_with(CpuType::Mos6502, "bne loop", 0x0801, vec![("loop", 0x0800, false)]),
            vec![0xd0, 0xfd]
        );
        let err = try_encode(
            CpuType::Mos6502,
            "bne far",
            0x0800,
            vec![("far", 0x1000, false)],
        )
        .unwrap_err();
        assert_eq!(err.error.kind, AsmErrorKind::Range);
    }

    #[test]
    fn wdc_bit_ops() {
        assert_eq!(
            encode_with(
                CpuType::W65c02s,
                "bbr3 $12, target",
                0x1000,
                vec![("target", 0x1005, false)]
            ),
            vec![0x3f, 0x12, 0x02]
        );
        assert_eq!(encode_on(CpuType::W65c02s, "smb7 $12", 0), vec![0xf7, 0x12]);
        assert_eq!(encode_on(CpuType::W65c02s, "wai", 0), vec![0xcb]);
    }

    #[test]
    fn nmos_specials() {
        assert_eq!(encode_on(CpuType::Nmos6502, "top", 0), vec![0x0c]);
        assert_eq!(encode_on(CpuType::Nmos6502, "dop", 0), vec![0x80]);
        assert_eq!(
            encode_on(CpuType::Nmos6502, "lax $12", 0),
            vec![0xa7, 0x12]
        );
    }

    #[test]
    fn addressing_mode_errors() {
        let err = try_encode(CpuType::Mos6502, "bra *", 0, Vec::new()).unwrap_err();
        assert_eq!(err.error.kind, AsmErrorKind::AddressingMode);
        let err = try_encode(CpuType::Mos6502, "lda ($20)", 0, Vec::new()).unwrap_err();
        assert_eq!(err.error.kind, AsmErrorKind::AddressingMode);
        let err = try_encode(CpuType::Mos6502, "tsb $12", 0, Vec::new()).unwrap_err();
        assert_eq!(err.error.kind, AsmErrorKind::AddressingMode);
    }

    #[test]
    fn jmp_never_uses_zero_page() {
        assert_eq!(
            encode_on(CpuType::Mos6502, "jmp $0012", 0),
            vec![0x4c, 0x12, 0x00]
        );
        assert_eq!(
            encode_on(CpuType::Mos6502, "jsr $0012", 0),
            vec![0x20, 0x12, 0x00]
        );
    }
}

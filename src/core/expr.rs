// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operator-precedence expression evaluation.
//!
//! The evaluator walks the token stream directly and produces a [`Value`],
//! using Pratt-style binding powers. Symbol resolution goes through the
//! [`EvalContext`] trait; the evaluator records whether any consulted symbol
//! was a forward reference so the instruction encoder can reserve the wide
//! encoding in a way that is stable between passes.
//!
//! Precedence, loosest to tightest: `||`, `&&`, `|`, `^`, `&`,
//! `== != <>`, `< > <= >=`, `<< >> >>>`, `+ -`, `* / %`, `**` (right
//! associative), unary `+ - ! ~ <`(low byte) `>`(high byte), atoms.
//! `&&` and `||` evaluate both sides and yield 0 or 1.

use crate::core::error::AsmErrorKind;
use crate::core::tokenizer::{OperatorKind, Span, Token, TokenKind};
use crate::core::value::Value;

/// Error returned from expression evaluation.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub span: Span,
    pub kind: AsmErrorKind,
}

impl EvalError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: AsmErrorKind::Syntax,
        }
    }

    /// An unresolved symbol reference in pass 2.
    pub fn undefined(name: &str, span: Span) -> Self {
        Self {
            message: format!("Undefined symbol: {name}"),
            span,
            kind: AsmErrorKind::UndefinedSymbol,
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// A resolved symbol value plus whether it was a forward reference.
#[derive(Debug, Clone)]
pub struct SymbolRef {
    pub value: Value,
    pub forward: bool,
}

impl SymbolRef {
    pub fn resolved(value: Value) -> Self {
        Self {
            value,
            forward: false,
        }
    }

    pub fn forward(value: Value) -> Self {
        Self {
            value,
            forward: true,
        }
    }
}

/// Context for expression evaluation.
pub trait EvalContext {
    /// Look up a named symbol. Returning `Undefined` with `forward` set is
    /// how pass 1 lets layout proceed past unresolved names.
    fn lookup_symbol(&mut self, name: &str, span: Span) -> Result<SymbolRef, EvalError>;

    /// Resolve an anonymous label marker (`+`, `--`, ...).
    fn lookup_anon(&mut self, marker: &str, span: Span) -> Result<SymbolRef, EvalError>;

    /// The current program counter (`*`).
    fn program_counter(&self) -> Value;
}

/// Simple evaluation context backed by a lookup function, for tests and
/// standalone evaluation.
pub struct SimpleEvalContext<F>
where
    F: FnMut(&str) -> Option<Value>,
{
    lookup: F,
    pc: Value,
}

impl<F> SimpleEvalContext<F>
where
    F: FnMut(&str) -> Option<Value>,
{
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            pc: Value::Undefined,
        }
    }

    pub fn with_pc(lookup: F, pc: i64) -> Self {
        Self {
            lookup,
            pc: Value::Int(pc),
        }
    }
}

impl<F> EvalContext for SimpleEvalContext<F>
where
    F: FnMut(&str) -> Option<Value>,
{
    fn lookup_symbol(&mut self, name: &str, span: Span) -> Result<SymbolRef, EvalError> {
        match (self.lookup)(name) {
            Some(value) => Ok(SymbolRef::resolved(value)),
            None => Err(EvalError::undefined(name, span)),
        }
    }

    fn lookup_anon(&mut self, marker: &str, span: Span) -> Result<SymbolRef, EvalError> {
        Err(EvalError::new(
            format!("Anonymous label '{marker}' not available here"),
            span,
        ))
    }

    fn program_counter(&self) -> Value {
        self.pc.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Power,
    Shl,
    Shr,
    LogShr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicAnd,
    LogicOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicNot,
    BitNot,
    LowByte,
    HighByte,
    BankByte,
}

/// Apply a unary operator to a value. Undefined propagates.
pub fn apply_unary(op: UnaryOp, val: Value, span: Span) -> Result<Value, EvalError> {
    if val.is_undefined() {
        return Ok(Value::Undefined);
    }
    match op {
        UnaryOp::Plus => match val {
            Value::Int(_) | Value::Float(_) => Ok(val),
            other => Err(type_error("+", &other, span)),
        },
        UnaryOp::Minus => match val {
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Float(v) => Ok(Value::Float(-v)),
            other => Err(type_error("-", &other, span)),
        },
        UnaryOp::LogicNot => Ok(Value::Int(i64::from(!val.is_truthy()))),
        UnaryOp::BitNot => match val {
            Value::Int(v) => Ok(Value::Int(!v)),
            other => Err(type_error("~", &other, span)),
        },
        UnaryOp::LowByte => byte_of(&val, 0, span),
        UnaryOp::HighByte => byte_of(&val, 8, span),
        UnaryOp::BankByte => byte_of(&val, 16, span),
    }
}

fn byte_of(val: &Value, shift: u32, span: Span) -> Result<Value, EvalError> {
    match val.as_int() {
        Some(v) => Ok(Value::Int((v >> shift) & 0xff)),
        None => Err(EvalError::new(
            format!("Byte operator requires a number, got {}", val.type_name()),
            span,
        )),
    }
}

/// Apply a binary operator with integer/float promotion. Undefined
/// propagates; division and modulo by a known zero are errors.
pub fn apply_binary(op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
    if l.is_undefined() || r.is_undefined() {
        return Ok(Value::Undefined);
    }
    match op {
        BinaryOp::Add => numeric(op, l, r, span, i64::wrapping_add, |a, b| a + b),
        BinaryOp::Subtract => numeric(op, l, r, span, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Multiply => numeric(op, l, r, span, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Divide => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(EvalError::new("Division by zero", span));
                }
                Ok(Value::Int(a.wrapping_div(*b)))
            }
            _ => {
                let (a, b) = floats(op, &l, &r, span)?;
                if b == 0.0 {
                    return Err(EvalError::new("Division by zero", span));
                }
                Ok(Value::Float(a / b))
            }
        },
        BinaryOp::Mod => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(EvalError::new("Modulo by zero", span));
                }
                Ok(Value::Int(a.wrapping_rem(*b)))
            }
            _ => {
                let (a, b) = floats(op, &l, &r, span)?;
                if b == 0.0 {
                    return Err(EvalError::new("Modulo by zero", span));
                }
                Ok(Value::Float(a % b))
            }
        },
        BinaryOp::Power => {
            let (a, b) = floats(op, &l, &r, span)?;
            Ok(Value::Float(a.powf(b)))
        }
        BinaryOp::Shl => shift(l, r, span, |a, n| a.wrapping_shl(n), |a, f| a * f),
        BinaryOp::Shr => shift(l, r, span, |a, n| a.wrapping_shr(n), |a, f| a / f),
        BinaryOp::LogShr => {
            let (a, b) = ints(op, &l, &r, span)?;
            let masked = (a & 0xffff_ffff) as u64;
            Ok(Value::Int((masked >> (b & 0x3f)) as i64))
        }
        BinaryOp::BitAnd => {
            let (a, b) = ints(op, &l, &r, span)?;
            Ok(Value::Int(a & b))
        }
        BinaryOp::BitOr => {
            let (a, b) = ints(op, &l, &r, span)?;
            Ok(Value::Int(a | b))
        }
        BinaryOp::BitXor => {
            let (a, b) = ints(op, &l, &r, span)?;
            Ok(Value::Int(a ^ b))
        }
        BinaryOp::Eq => Ok(Value::Int(i64::from(values_equal(&l, &r)))),
        BinaryOp::Ne => Ok(Value::Int(i64::from(!values_equal(&l, &r)))),
        BinaryOp::Lt => compare(l, r, span, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => compare(l, r, span, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(l, r, span, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare(l, r, span, |o| o != std::cmp::Ordering::Less),
        BinaryOp::LogicAnd => Ok(Value::Int(i64::from(l.is_truthy() && r.is_truthy()))),
        BinaryOp::LogicOr => Ok(Value::Int(i64::from(l.is_truthy() || r.is_truthy()))),
    }
}

fn numeric(
    op: BinaryOp,
    l: Value,
    r: Value,
    span: Span,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        _ => {
            let (a, b) = floats(op, &l, &r, span)?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

/// Shifting a float multiplies or divides by a power of two.
fn shift(
    l: Value,
    r: Value,
    span: Span,
    int_op: fn(i64, u32) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let amount = r.as_int().ok_or_else(|| {
        EvalError::new(
            format!("Shift amount must be a number, got {}", r.type_name()),
            span,
        )
    })?;
    match l {
        Value::Int(a) => Ok(Value::Int(int_op(a, (amount & 0x3f) as u32))),
        Value::Float(a) => Ok(Value::Float(float_op(a, (amount as f64).exp2()))),
        other => Err(type_error("shift", &other, span)),
    }
}

fn ints(op: BinaryOp, l: &Value, r: &Value, span: Span) -> Result<(i64, i64), EvalError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        _ => Err(EvalError::new(
            format!(
                "Operator {} requires integer operands, got {} and {}",
                op_name(op),
                l.type_name(),
                r.type_name()
            ),
            span,
        )),
    }
}

fn floats(op: BinaryOp, l: &Value, r: &Value, span: Span) -> Result<(f64, f64), EvalError> {
    match (l.as_float(), r.as_float()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::new(
            format!(
                "Operator {} requires numeric operands, got {} and {}",
                op_name(op),
                l.type_name(),
                r.type_name()
            ),
            span,
        )),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => a == b,
        _ => match (l.as_float(), r.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(
    l: Value,
    r: Value,
    span: Span,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvalError> {
    let ordering = match (&l, &r) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => match (l.as_float(), r.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            _ => {
                return Err(EvalError::new(
                    format!(
                        "Cannot compare {} with {}",
                        l.type_name(),
                        r.type_name()
                    ),
                    span,
                ))
            }
        },
    };
    Ok(Value::Int(i64::from(test(ordering))))
}

fn type_error(op: &str, val: &Value, span: Span) -> EvalError {
    EvalError::new(
        format!("Operator {op} not defined for {}", val.type_name()),
        span,
    )
}

fn op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Power => "**",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::LogShr => ">>>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::LogicAnd => "&&",
        BinaryOp::LogicOr => "||",
    }
}

/// Built-in function dispatch. All functions take one argument.
fn apply_function(name: &str, arg: Value, span: Span) -> Result<Value, EvalError> {
    if arg.is_undefined() {
        return Ok(Value::Undefined);
    }
    let float_fn = |f: fn(f64) -> f64, arg: &Value| -> Result<Value, EvalError> {
        match arg.as_float() {
            Some(v) => Ok(Value::Float(f(v))),
            None => Err(EvalError::new(
                format!("Function {name} requires a number, got {}", arg.type_name()),
                span,
            )),
        }
    };
    match name {
        "sin" => float_fn(f64::sin, &arg),
        "cos" => float_fn(f64::cos, &arg),
        "tan" => float_fn(f64::tan, &arg),
        "arcsin" => float_fn(f64::asin, &arg),
        "arccos" => float_fn(f64::acos, &arg),
        "arctan" => float_fn(f64::atan, &arg),
        "int" | "addr" | "address" => match arg.as_int() {
            Some(v) => Ok(Value::Int(v)),
            None => Err(EvalError::new(
                format!("Function {name} requires a number, got {}", arg.type_name()),
                span,
            )),
        },
        "float" => match arg.as_float() {
            Some(v) => Ok(Value::Float(v)),
            None => Err(EvalError::new(
                format!("Function float requires a number, got {}", arg.type_name()),
                span,
            )),
        },
        "is_number" => Ok(Value::Int(i64::from(arg.is_number()))),
        "is_list" => Ok(Value::Int(i64::from(matches!(arg, Value::List(_))))),
        "is_string" => Ok(Value::Int(i64::from(matches!(arg, Value::Str(_))))),
        "len" => match &arg {
            Value::Str(s) => Ok(Value::Int(s.len() as i64)),
            Value::List(l) => Ok(Value::Int(l.len() as i64)),
            other => Err(EvalError::new(
                format!("Function len requires a string or list, got {}", other.type_name()),
                span,
            )),
        },
        _ => Err(EvalError::new(format!("Unknown function: {name}"), span)),
    }
}

fn is_function_name(name: &str) -> bool {
    matches!(
        name,
        "sin" | "cos" | "tan" | "arcsin" | "arccos" | "arctan" | "int" | "float" | "is_number"
            | "is_list" | "is_string" | "len" | "addr" | "address"
    )
}

const UNARY_BP: u8 = 24;

fn infix_binding(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
    let (op, lvl, right_assoc) = match kind {
        TokenKind::Star => (BinaryOp::Multiply, 10, false),
        TokenKind::Equals => (BinaryOp::Eq, 6, false),
        TokenKind::Op(op) => match op {
            OperatorKind::LogicOr => (BinaryOp::LogicOr, 1, false),
            OperatorKind::LogicAnd => (BinaryOp::LogicAnd, 2, false),
            OperatorKind::BitOr => (BinaryOp::BitOr, 3, false),
            OperatorKind::BitXor => (BinaryOp::BitXor, 4, false),
            OperatorKind::BitAnd => (BinaryOp::BitAnd, 5, false),
            OperatorKind::Eq => (BinaryOp::Eq, 6, false),
            OperatorKind::Ne => (BinaryOp::Ne, 6, false),
            OperatorKind::Lt => (BinaryOp::Lt, 7, false),
            OperatorKind::Le => (BinaryOp::Le, 7, false),
            OperatorKind::Gt => (BinaryOp::Gt, 7, false),
            OperatorKind::Ge => (BinaryOp::Ge, 7, false),
            OperatorKind::Shl => (BinaryOp::Shl, 8, false),
            OperatorKind::Shr => (BinaryOp::Shr, 8, false),
            OperatorKind::LogShr => (BinaryOp::LogShr, 8, false),
            OperatorKind::Plus => (BinaryOp::Add, 9, false),
            OperatorKind::Minus => (BinaryOp::Subtract, 9, false),
            OperatorKind::Multiply => (BinaryOp::Multiply, 10, false),
            OperatorKind::Divide => (BinaryOp::Divide, 10, false),
            OperatorKind::Mod => (BinaryOp::Mod, 10, false),
            OperatorKind::Power => (BinaryOp::Power, 11, true),
            _ => return None,
        },
        _ => return None,
    };
    let lbp = lvl * 2;
    let rbp = if right_assoc { lbp } else { lbp + 1 };
    Some((op, lbp, rbp))
}

/// Pratt evaluator over a token slice.
pub struct ExprEval<'a, 'c> {
    toks: &'a [Token],
    pos: usize,
    ctx: &'c mut dyn EvalContext,
    forward: bool,
}

impl<'a, 'c> ExprEval<'a, 'c> {
    pub fn new(toks: &'a [Token], start: usize, ctx: &'c mut dyn EvalContext) -> Self {
        Self {
            toks,
            pos: start,
            ctx,
            forward: false,
        }
    }

    /// Evaluate one expression, leaving the cursor on the first token that is
    /// not part of it.
    pub fn evaluate(&mut self) -> Result<Value, EvalError> {
        self.eval_bp(0)
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// True if any symbol consulted during evaluation was a forward reference.
    #[must_use]
    pub fn depends_on_forward(&self) -> bool {
        self.forward
    }

    fn eval_bp(&mut self, min_bp: u8) -> Result<Value, EvalError> {
        let mut lhs = self.eval_prefix()?;
        while let Some(token) = self.toks.get(self.pos) {
            let Some((op, lbp, rbp)) = infix_binding(&token.kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            let span = token.span;
            self.pos += 1;
            let rhs = self.eval_bp(rbp)?;
            lhs = apply_binary(op, lhs, rhs, span)?;
        }
        Ok(lhs)
    }

    fn eval_prefix(&mut self) -> Result<Value, EvalError> {
        let token = self
            .toks
            .get(self.pos)
            .ok_or_else(|| EvalError::new("Expected expression", self.end_span()))?
            .clone();
        self.pos += 1;
        match token.kind {
            TokenKind::Int(v) => Ok(Value::Int(v)),
            TokenKind::Float(v) => Ok(Value::Float(v)),
            TokenKind::Str(s) => Ok(Value::Str(s)),
            TokenKind::Star => Ok(self.ctx.program_counter()),
            TokenKind::Anon(marker) => {
                let sym = self.ctx.lookup_anon(&marker, token.span)?;
                self.forward |= sym.forward;
                Ok(sym.value)
            }
            TokenKind::Ident(name) => {
                let lower = name.to_ascii_lowercase();
                if is_function_name(&lower)
                    && matches!(
                        self.toks.get(self.pos).map(|t| &t.kind),
                        Some(TokenKind::OpenParen)
                    )
                {
                    return self.eval_call(&lower, token.span);
                }
                let sym = self.ctx.lookup_symbol(&name, token.span)?;
                self.forward |= sym.forward;
                Ok(sym.value)
            }
            TokenKind::OpenParen => {
                let value = self.eval_bp(0)?;
                self.expect_close_paren()?;
                Ok(value)
            }
            TokenKind::Op(op) => {
                let unary = match op {
                    OperatorKind::Plus => UnaryOp::Plus,
                    OperatorKind::Minus => UnaryOp::Minus,
                    OperatorKind::LogicNot => UnaryOp::LogicNot,
                    OperatorKind::BitNot => UnaryOp::BitNot,
                    OperatorKind::Lt => UnaryOp::LowByte,
                    OperatorKind::Gt => UnaryOp::HighByte,
                    OperatorKind::BitXor => UnaryOp::BankByte,
                    _ => {
                        return Err(EvalError::new("Expected expression", token.span));
                    }
                };
                let operand = self.eval_bp(UNARY_BP)?;
                apply_unary(unary, operand, token.span)
            }
            _ => Err(EvalError::new("Expected expression", token.span)),
        }
    }

    fn eval_call(&mut self, name: &str, span: Span) -> Result<Value, EvalError> {
        // Skip the opening parenthesis.
        self.pos += 1;
        let arg = self.eval_bp(0)?;
        if matches!(
            self.toks.get(self.pos).map(|t| &t.kind),
            Some(TokenKind::Comma)
        ) {
            return Err(EvalError::new(
                format!("Function {name} expects exactly one argument"),
                span,
            ));
        }
        self.expect_close_paren()?;
        apply_function(name, arg, span)
    }

    fn expect_close_paren(&mut self) -> Result<(), EvalError> {
        match self.toks.get(self.pos).map(|t| &t.kind) {
            Some(TokenKind::CloseParen) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(EvalError::new(
                "Missing closing parenthesis",
                self.end_span(),
            )),
        }
    }

    fn end_span(&self) -> Span {
        self.toks
            .get(self.pos.min(self.toks.len().saturating_sub(1)))
            .map(|t| t.span)
            .unwrap_or_default()
    }
}

/// Evaluate an expression starting at `start`, returning the value, the
/// position of the first token after it, and the forward-reference flag.
pub fn eval_expr(
    toks: &[Token],
    start: usize,
    ctx: &mut dyn EvalContext,
) -> Result<(Value, usize, bool), EvalError> {
    let mut eval = ExprEval::new(toks, start, ctx);
    let value = eval.evaluate()?;
    Ok((value, eval.pos(), eval.depends_on_forward()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::Tokenizer;

    fn eval(src: &str) -> Value {
        eval_with(src, |_| None)
    }

    fn eval_with(src: &str, lookup: fn(&str) -> Option<Value>) -> Value {
        let toks = Tokenizer::new(src, 1).tokenize().unwrap();
        let mut ctx = SimpleEvalContext::with_pc(lookup, 0x1000);
        let (value, pos, _) = eval_expr(&toks, 0, &mut ctx).unwrap();
        assert_eq!(pos, toks.len(), "expression did not consume all of {src}");
        value
    }

    fn eval_err(src: &str) -> EvalError {
        let toks = Tokenizer::new(src, 1).tokenize().unwrap();
        let mut ctx = SimpleEvalContext::new(|_| None);
        eval_expr(&toks, 0, &mut ctx).unwrap_err()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval("$ff & %1010"), Value::Int(0x0a));
        assert_eq!(eval("1 | 2 ^ 3 & 2"), Value::Int(1 | (2 ^ (3 & 2))));
        assert_eq!(eval("1 + 2 << 3"), Value::Int((1 + 2) << 3));
    }

    #[test]
    fn low_and_high_byte() {
        assert_eq!(eval("<($1234)"), Value::Int(0x34));
        assert_eq!(eval(">($1234)"), Value::Int(0x12));
        assert_eq!(eval("<$ffff"), Value::Int(0xff));
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval("2 < 3"), Value::Int(1));
        assert_eq!(eval("3 < 2"), Value::Int(0));
        assert_eq!(eval("3 == 3"), Value::Int(1));
        assert_eq!(eval("3 <> 3"), Value::Int(0));
        assert_eq!(eval("3 != 4"), Value::Int(1));
        assert_eq!(eval("2 <= 2"), Value::Int(1));
        assert_eq!(eval("2 >= 3"), Value::Int(0));
    }

    #[test]
    fn logic_ops_are_truthiness() {
        assert_eq!(eval("1 && 2"), Value::Int(1));
        assert_eq!(eval("1 && 0"), Value::Int(0));
        assert_eq!(eval("0 || 3"), Value::Int(1));
        assert_eq!(eval("0 || 0"), Value::Int(0));
        assert_eq!(eval("!0"), Value::Int(1));
        assert_eq!(eval("!5"), Value::Int(0));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(eval("7 / 2"), Value::Int(3));
        assert_eq!(eval("0 - 7 / 2"), Value::Int(-3));
        assert_eq!(eval("7 % 3"), Value::Int(1));
        assert_eq!(eval("(0 - 7) % 3"), Value::Int(-1));
    }

    #[test]
    fn float_promotion() {
        assert_eq!(eval("1 + 2.5"), Value::Float(3.5));
        assert_eq!(eval("5 / 2.0"), Value::Float(2.5));
        assert_eq!(eval("2 ** 8"), Value::Float(256.0));
        assert_eq!(eval("int(2.9)"), Value::Int(2));
        assert_eq!(eval("float(2)"), Value::Float(2.0));
    }

    #[test]
    fn bitwise_requires_integers() {
        assert!(eval_err("1.5 & 2").message.contains("integer"));
        assert!(eval_err("1 | 2.0").message.contains("integer"));
        assert!(eval_err("~1.5").message.contains("float"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval_err("1 / 0").message, "Division by zero");
        assert_eq!(eval_err("1 % 0").message, "Modulo by zero");
    }

    #[test]
    fn undefined_propagates() {
        let toks = Tokenizer::new("missing + 1", 1).tokenize().unwrap();
        // SimpleEvalContext errors on unknown names; emulate pass 1 with a
        // context that hands back Undefined instead.
        struct Pass1;
        impl EvalContext for Pass1 {
            fn lookup_symbol(&mut self, _: &str, _: Span) -> Result<SymbolRef, EvalError> {
                Ok(SymbolRef::forward(Value::Undefined))
            }
            fn lookup_anon(&mut self, _: &str, span: Span) -> Result<SymbolRef, EvalError> {
                Err(EvalError::new("no anon", span))
            }
            fn program_counter(&self) -> Value {
                Value::Int(0)
            }
        }
        let mut pass1 = Pass1;
        let (value, _, forward) = eval_expr(&toks, 0, &mut pass1).unwrap();
        assert_eq!(value, Value::Undefined);
        assert!(forward);
        // Division by an undefined value stays silent in pass 1.
        let toks = Tokenizer::new("1 / missing", 1).tokenize().unwrap();
        let (value, _, _) = eval_expr(&toks, 0, &mut pass1).unwrap();
        assert_eq!(value, Value::Undefined);
    }

    #[test]
    fn trig_and_type_functions() {
        match eval("sin(0)") {
            Value::Float(v) => assert!(v.abs() < 1e-12),
            other => panic!("expected float, got {other:?}"),
        }
        assert_eq!(eval("is_number(1)"), Value::Int(1));
        assert_eq!(eval("is_string(\"x\")"), Value::Int(1));
        assert_eq!(eval("is_number(\"x\")"), Value::Int(0));
        assert_eq!(eval("len(\"abc\")"), Value::Int(3));
    }

    #[test]
    fn power_is_right_associative() {
        // 2 ** 3 ** 2 = 2 ** 9 = 512
        assert_eq!(eval("2 ** 3 ** 2"), Value::Float(512.0));
    }

    #[test]
    fn star_reads_program_counter() {
        assert_eq!(eval("* + 2"), Value::Int(0x1002));
        assert_eq!(eval("* * 2"), Value::Int(0x2000));
    }

    #[test]
    fn symbols_resolve_through_context() {
        let value = eval_with("base + 1", |name| {
            (name == "base").then_some(Value::Int(0x1000))
        });
        assert_eq!(value, Value::Int(0x1001));
    }

    #[test]
    fn stops_at_comma() {
        let toks = Tokenizer::new("1 + 2, 3", 1).tokenize().unwrap();
        let mut ctx = SimpleEvalContext::new(|_| None);
        let (value, pos, _) = eval_expr(&toks, 0, &mut ctx).unwrap();
        assert_eq!(value, Value::Int(3));
        assert_eq!(pos, 3);
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for tokenization and block capture.

/// Check if a byte is a valid identifier start character (letter or underscore).
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Check if a byte is a valid identifier continuation character.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Check if a byte is whitespace (space or tab).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Check if a byte is a binary digit in ACME notation.
///
/// ACME accepts `.` for 0 and `#` for 1 inside binary literals, which makes
/// sprite and charset data readable.
#[inline]
pub fn is_bin_digit(c: u8) -> bool {
    c == b'0' || c == b'1' || c == b'.' || c == b'#'
}

#[inline]
pub fn bin_digit_value(c: u8) -> i64 {
    i64::from(c == b'1' || c == b'#')
}

/// Split a line into code and comment parts.
///
/// Comments start at the first `;` or `//` outside string and character
/// literals and run to end of line.
pub fn split_comment(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        match c {
            _ if escape => {
                escape = false;
            }
            b'\\' if in_single || in_double => {
                escape = true;
            }
            b'\'' if !in_double => {
                in_single = !in_single;
            }
            b'"' if !in_single => {
                in_double = !in_double;
            }
            b';' if !in_single && !in_double => {
                return (&line[..idx], &line[idx..]);
            }
            b'/' if !in_single && !in_double && bytes.get(idx + 1) == Some(&b'/') => {
                return (&line[..idx], &line[idx..]);
            }
            _ => {}
        }
        idx += 1;
    }
    (line, "")
}

/// Net brace depth change of a line, ignoring braces in comments and literals.
///
/// Used by the block collectors to find the end of a captured `{ ... }` body.
pub fn brace_delta(line: &str) -> i32 {
    let (code, _) = split_comment(line);
    let bytes = code.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut delta = 0i32;
    for &c in bytes {
        match c {
            _ if escape => escape = false,
            b'\\' if in_single || in_double => escape = true,
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'{' if !in_single && !in_double => delta += 1,
            b'}' if !in_single && !in_double => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Split a line at the `}` that brings `depth` open braces down to zero,
/// ignoring braces in comments and literals. Returns the text before the
/// brace and the text after it.
pub fn split_at_closing_brace(line: &str, mut depth: i32) -> Option<(&str, &str)> {
    let (code, _) = split_comment(line);
    let bytes = code.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    for (ix, &c) in bytes.iter().enumerate() {
        match c {
            _ if escape => escape = false,
            b'\\' if in_single || in_double => escape = true,
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'{' if !in_single && !in_double => depth += 1,
            b'}' if !in_single && !in_double => {
                depth -= 1;
                if depth == 0 {
                    return Some((&line[..ix], &line[ix + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

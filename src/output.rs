// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output container writers: plain, CBM, Apple, Intel HEX, plus the VICE
//! label file, the symbol dump, and the listing file.

use std::io::{self, Write};

use crate::assembler::ListingLine;
use crate::core::image::Image;
use crate::core::symbols::SymbolTable;
use crate::core::value::Value;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Raw bytes from the lowest to the highest touched address.
    #[default]
    Plain,
    /// Little-endian 16-bit load address, then plain bytes (C64 `.prg`).
    Cbm,
    /// AppleDOS B file: load address and length headers, then plain bytes.
    Apple,
    /// Intel HEX records.
    Hex,
}

impl OutputFormat {
    #[must_use]
    pub fn by_name(name: &str) -> Option<OutputFormat> {
        match name {
            "plain" => Some(OutputFormat::Plain),
            "cbm" => Some(OutputFormat::Cbm),
            "apple" => Some(OutputFormat::Apple),
            "hex" => Some(OutputFormat::Hex),
            _ => None,
        }
    }
}

/// Serialize the image in the chosen container format.
pub fn write_image<W: Write>(image: &Image, format: OutputFormat, mut out: W) -> io::Result<()> {
    match format {
        OutputFormat::Plain => out.write_all(&image.to_plain()),
        OutputFormat::Cbm => {
            let start = image.touched_range().map(|(s, _)| s).unwrap_or(0);
            out.write_all(&start.to_le_bytes())?;
            out.write_all(&image.to_plain())
        }
        OutputFormat::Apple => {
            let start = image.touched_range().map(|(s, _)| s).unwrap_or(0);
            let data = image.to_plain();
            out.write_all(&start.to_le_bytes())?;
            out.write_all(&(data.len() as u16).to_le_bytes())?;
            out.write_all(&data)
        }
        OutputFormat::Hex => write_hex(image, out),
    }
}

/// Intel HEX: type-00 data records of at most 16 bytes, then the EOF
/// record. The checksum is the two's complement of the record byte sum.
fn write_hex<W: Write>(image: &Image, mut out: W) -> io::Result<()> {
    for (start, data) in image.written_runs() {
        let mut addr = start;
        for chunk in data.chunks(16) {
            let mut sum: u8 = chunk.len() as u8;
            sum = sum.wrapping_add((addr >> 8) as u8);
            sum = sum.wrapping_add((addr & 0xff) as u8);
            write!(out, ":{:02X}{:04X}00", chunk.len(), addr)?;
            for &b in chunk {
                sum = sum.wrapping_add(b);
                write!(out, "{b:02X}")?;
            }
            writeln!(out, "{:02X}", sum.wrapping_neg())?;
            addr = addr.wrapping_add(chunk.len() as u16);
        }
    }
    writeln!(out, ":00000001FF")
}

/// VICE label file: one `al C:HHHH .name` line per global label, sorted by
/// address.
pub fn write_vice_labels<W: Write>(symbols: &SymbolTable, mut out: W) -> io::Result<()> {
    let mut labels: Vec<(i64, &str)> = symbols
        .globals_sorted()
        .into_iter()
        .filter_map(|(name, sym)| match &sym.value {
            Value::Int(addr) => Some((*addr, name)),
            _ => None,
        })
        .collect();
    labels.sort();
    for (addr, name) in labels {
        writeln!(out, "al C:{:04X} .{name}", addr & 0xffff)?;
    }
    Ok(())
}

/// Symbol table dump for `-s` and `!symbollist`.
pub fn write_symbol_dump<W: Write>(symbols: &SymbolTable, mut out: W) -> io::Result<()> {
    for (name, sym) in symbols.globals_sorted() {
        match &sym.value {
            Value::Int(v) => writeln!(out, "{name:<16} = ${:04X} ({v})", v & 0xffff)?,
            other => writeln!(out, "{name:<16} = {other}")?,
        }
    }
    Ok(())
}

/// Listing file: address, emitted bytes, and source per line.
pub fn write_listing<W: Write>(listing: &[ListingLine], mut out: W) -> io::Result<()> {
    for entry in listing {
        let bytes: Vec<String> = entry
            .bytes
            .iter()
            .take(4)
            .map(|b| format!("{b:02X}"))
            .collect();
        let more = if entry.bytes.len() > 4 { "+" } else { " " };
        writeln!(
            out,
            "{:4}  {:04X}  {:<12}{} {}",
            entry.line,
            entry.addr,
            bytes.join(" "),
            more,
            entry.source
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::Image;

    fn sample_image() -> Image {
        let mut image = Image::new();
        let _ = image.store(0xc000, 0xa9);
        let _ = image.store(0xc001, 0x42);
        let _ = image.store(0xc002, 0x60);
        image
    }

    #[test]
    fn plain_output() {
        let mut out = Vec::new();
        write_image(&sample_image(), OutputFormat::Plain, &mut out).unwrap();
        assert_eq!(out, vec![0xa9, 0x42, 0x60]);
    }

    #[test]
    fn cbm_prepends_load_address() {
        let mut out = Vec::new();
        write_image(&sample_image(), OutputFormat::Cbm, &mut out).unwrap();
        assert_eq!(out, vec![0x00, 0xc0, 0xa9, 0x42, 0x60]);
    }

    #[test]
    fn apple_prepends_address_and_length() {
        let mut out = Vec::new();
        write_image(&sample_image(), OutputFormat::Apple, &mut out).unwrap();
        assert_eq!(out, vec![0x00, 0xc0, 0x03, 0x00, 0xa9, 0x42, 0x60]);
    }

    #[test]
    fn hex_records_and_checksums() {
        let mut out = Vec::new();
        write_image(&sample_image(), OutputFormat::Hex, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let record = lines.next().unwrap();
        // 3 bytes at C000: sum = 03 + C0 + 00 + 00 + A9 + 42 + 60, low byte
        // 0E, checksum = two's complement = F2.
        assert_eq!(record, ":03C00000A94260F2");
        assert_eq!(lines.next().unwrap(), ":00000001FF");
    }

    #[test]
    fn hex_splits_records_at_16_bytes() {
        let mut image = Image::new();
        for ix in 0..20 {
            let _ = image.store(0x1000 + ix, ix as u8);
        }
        let mut out = Vec::new();
        write_image(&image, OutputFormat::Hex, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(":10100000"));
        assert!(lines[1].starts_with(":04101000"));
    }

    #[test]
    fn vice_label_format() {
        let mut symbols = SymbolTable::new();
        symbols.begin_pass(1);
        let _ = symbols.define_label("start", Value::Int(0xc000));
        let _ = symbols.define_label("irq", Value::Int(0x0314));
        let mut out = Vec::new();
        write_vice_labels(&symbols, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "al C:0314 .irq\nal C:C000 .start\n");
    }
}

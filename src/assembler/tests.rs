// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::Assembler;
use crate::core::error::{AsmErrorKind, Severity};
use crate::core::value::Value;

fn assemble(src: &str) -> (Assembler, bool) {
    let lines: Vec<String> = src.lines().map(str::to_string).collect();
    let mut assembler = Assembler::new();
    let ok = assembler.assemble(&lines, "test.asm");
    (assembler, ok)
}

fn assemble_ok(src: &str) -> Vec<u8> {
    let (assembler, ok) = assemble(src);
    let formatted: Vec<String> = assembler
        .diagnostics()
        .iter()
        .map(|d| d.format())
        .collect();
    assert!(ok, "assembly failed: {formatted:?}");
    assembler.image().to_plain()
}

fn assemble_err(src: &str) -> (Assembler, Vec<AsmErrorKind>) {
    let (assembler, ok) = assemble(src);
    assert!(!ok, "assembly unexpectedly succeeded");
    let kinds = assembler
        .diagnostics()
        .iter()
        .filter(|d| d.severity != Severity::Warning)
        .map(|d| d.kind)
        .collect();
    (assembler, kinds)
}

// -- the reference scenarios ---------------------------------------------

#[test]
fn minimal_instruction() {
    let bytes = assemble_ok(
        "* = $c000\n\
         start: lda #$42\n\
         \x20      rts\n",
    );
    assert_eq!(bytes, vec![0xa9, 0x42, 0x60]);
}

#[test]
fn forward_absolute_jump() {
    let bytes = assemble_ok(
        "* = $1000\n\
         \x20 jmp target\n\
         target: rts\n",
    );
    assert_eq!(bytes, vec![0x4c, 0x03, 0x10, 0x60]);
}

#[test]
fn relative_branch_back() {
    let bytes = assemble_ok(
        "* = $0800\n\
         loop: dex\n\
         \x20     bne loop\n",
    );
    assert_eq!(bytes, vec![0xca, 0xd0, 0xfd]);
}

#[test]
fn expression_and_data() {
    let bytes = assemble_ok("* = $0000\n!byte 1+2*3, $ff & %1010, <($1234), >($1234)\n");
    assert_eq!(bytes, vec![0x07, 0x0a, 0x34, 0x12]);
}

#[test]
fn macro_expansion() {
    let bytes = assemble_ok(
        "!macro poke addr, val { lda #val : sta addr }\n\
         * = $c000\n\
         \x20 +poke $d020, 0\n",
    );
    assert_eq!(bytes, vec![0xa9, 0x00, 0x8d, 0x20, 0xd0]);
}

#[test]
fn conditional_skipping() {
    let bytes = assemble_ok(
        "DEBUG = 0\n\
         * = $c000\n\
         !if DEBUG { lda #$ff } else { lda #$00 }\n",
    );
    assert_eq!(bytes, vec![0xa9, 0x00]);
}

// -- pass behavior --------------------------------------------------------

#[test]
fn reassembly_is_idempotent() {
    let src = "* = $c000\nstart: ldx #8\nloop: dex\n bne loop\n jmp start\n";
    assert_eq!(assemble_ok(src), assemble_ok(src));
}

#[test]
fn forward_reference_forces_absolute_width() {
    // `target` ends up in the zero page but is defined after its use, so
    // the absolute form must be reserved in both passes.
    let bytes = assemble_ok(
        "* = $0000\n\
         \x20 lda later\n\
         \x20 nop\n\
         later = $12\n",
    );
    assert_eq!(bytes, vec![0xad, 0x12, 0x00, 0xea]);
}

#[test]
fn backward_reference_uses_zero_page() {
    let bytes = assemble_ok(
        "earlier = $12\n\
         * = $0000\n\
         \x20 lda earlier\n",
    );
    assert_eq!(bytes, vec![0xa5, 0x12]);
}

#[test]
fn labels_capture_the_pc_at_line_start() {
    let (assembler, ok) = assemble("* = $c000\nfirst: !byte 1, 2\nsecond: !byte 3\n");
    assert!(ok);
    assert_eq!(
        assembler.symbols().resolve("first"),
        Some((Value::Int(0xc000), false))
    );
    assert_eq!(
        assembler.symbols().resolve("second"),
        Some((Value::Int(0xc002), false))
    );
}

#[test]
fn undefined_symbol_is_an_error() {
    let (_, kinds) = assemble_err("* = $1000\n lda missing\n");
    assert!(kinds.contains(&AsmErrorKind::UndefinedSymbol));
}

#[test]
fn duplicate_definition_is_an_error() {
    let (_, kinds) = assemble_err("x = 1\nx = 2\n");
    assert!(kinds.contains(&AsmErrorKind::Semantic));
}

#[test]
fn branch_out_of_range_is_an_error() {
    let (_, kinds) = assemble_err("* = $0800\n bne far\n!skip 300\nfar: rts\n");
    assert!(kinds.contains(&AsmErrorKind::Range));
}

// -- symbols and scoping --------------------------------------------------

#[test]
fn zone_local_labels() {
    let bytes = assemble_ok(
        "* = $1000\n\
         !zone first\n\
         .loop: dex\n\
         \x20 bne .loop\n\
         !zone second\n\
         .loop: dey\n\
         \x20 bne .loop\n",
    );
    assert_eq!(bytes, vec![0xca, 0xd0, 0xfd, 0x88, 0xd0, 0xfd]);
}

#[test]
fn cheap_locals_scope_to_global_labels() {
    let bytes = assemble_ok(
        "* = $1000\n\
         first: ldx #1\n\
         @skip: dex\n\
         \x20 bne @skip\n\
         second: ldx #2\n\
         @skip: dex\n\
         \x20 bne @skip\n",
    );
    assert_eq!(
        bytes,
        vec![0xa2, 0x01, 0xca, 0xd0, 0xfd, 0xa2, 0x02, 0xca, 0xd0, 0xfd]
    );
}

#[test]
fn anonymous_labels_resolve_positionally() {
    let bytes = assemble_ok(
        "* = $0800\n\
         -\n\
         \x20 dex\n\
         \x20 bne -\n\
         \x20 beq +\n\
         \x20 nop\n\
         +\n\
         \x20 rts\n",
    );
    // dex; bne back to $0800 (-4); beq forward over nop (+1); nop; rts
    assert_eq!(bytes, vec![0xca, 0xd0, 0xfd, 0xf0, 0x01, 0xea, 0x60]);
}

#[test]
fn zone_blocks_restore_the_outer_zone() {
    let bytes = assemble_ok(
        "* = $1000\n\
         .here: nop\n\
         !zone inner {\n\
         .here: nop\n\
         }\n\
         \x20 jmp .here\n",
    );
    // The trailing jmp resolves .here in the outer zone ($1000).
    assert_eq!(bytes, vec![0xea, 0xea, 0x4c, 0x00, 0x10]);
}

#[test]
fn set_variables_reassign() {
    let bytes = assemble_ok(
        "!set v = 1\n\
         !set v = v + 1\n\
         * = $0000\n\
         !byte v\n",
    );
    assert_eq!(bytes, vec![2]);
}

#[test]
fn symbol_assignment_accepts_pc() {
    let (assembler, ok) = assemble("* = $c000\nhere = *\n rts\n");
    assert!(ok);
    assert_eq!(
        assembler.symbols().resolve("here"),
        Some((Value::Int(0xc000), false))
    );
}

// -- program counter and segments -----------------------------------------

#[test]
fn pseudopc_redirects_labels_not_bytes() {
    let (assembler, ok) = assemble(
        "* = $c000\n\
         !pseudopc $0400 {\n\
         moved: lda #1\n\
         }\n\
         after: rts\n",
    );
    assert!(ok);
    // Labels see the pseudo origin...
    assert_eq!(
        assembler.symbols().resolve("moved"),
        Some((Value::Int(0x0400), false))
    );
    // ...but bytes land at the real PC.
    assert_eq!(assembler.image().touched_range(), Some((0xc000, 0xc002)));
    assert_eq!(
        assembler.symbols().resolve("after"),
        Some((Value::Int(0xc002), false))
    );
}

#[test]
fn xor_mask_applies_to_output_only() {
    let (assembler, ok) = assemble(
        "* = $c000\n\
         !xor $ff\n\
         here: lda #0\n\
         !xor 0\n\
         \x20 rts\n",
    );
    assert!(ok);
    assert_eq!(assembler.image().to_plain(), vec![0x56, 0xff, 0x60]);
    assert_eq!(
        assembler.symbols().resolve("here"),
        Some((Value::Int(0xc000), false))
    );
}

#[test]
fn align_advances_to_the_requested_residue() {
    let bytes = assemble_ok(
        "* = $0801\n\
         !byte 1\n\
         !align $ff, 0, $aa\n\
         !byte 2\n",
    );
    // From $0802 to $0900, filling $fe bytes with $aa.
    assert_eq!(bytes.len(), 0x100);
    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[1], 0xaa);
    assert_eq!(bytes[0xff], 2);
}

#[test]
fn skip_leaves_a_gap_filled_with_the_init_byte() {
    let bytes = assemble_ok(
        "* = $1000\n\
         !initmem $ea\n\
         !byte 1\n\
         !skip 3\n\
         !byte 2\n",
    );
    assert_eq!(bytes, vec![1, 0xea, 0xea, 0xea, 2]);
}

#[test]
fn fill_writes_bytes() {
    let bytes = assemble_ok("* = $1000\n!fill 3, $21\n!fill 2\n");
    assert_eq!(bytes, vec![0x21, 0x21, 0x21, 0, 0]);
}

// -- data and text directives ---------------------------------------------

#[test]
fn word_widths_and_endianness() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !word $1234\n\
         !be16 $1234\n\
         !24 $123456\n\
         !be24 $123456\n\
         !32 $12345678\n\
         !be32 $12345678\n",
    );
    assert_eq!(
        bytes,
        vec![
            0x34, 0x12, 0x12, 0x34, 0x56, 0x34, 0x12, 0x12, 0x34, 0x56, 0x78, 0x56, 0x34, 0x12,
            0x12, 0x34, 0x56, 0x78,
        ]
    );
}

#[test]
fn byte_range_overflow_warns_but_emits() {
    let (assembler, ok) = assemble("* = $0000\n!byte 300\n");
    assert!(ok, "warnings must not fail the build");
    assert_eq!(assembler.image().to_plain(), vec![44]);
    assert!(assembler
        .diagnostics()
        .iter()
        .any(|d| d.severity == Severity::Warning && d.kind == AsmErrorKind::Range));
}

#[test]
fn hex_directive_emits_pairs() {
    let bytes = assemble_ok("* = $0000\n!hex \"deadbeef\"\n!hex \"0d 0a\"\n");
    assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef, 0x0d, 0x0a]);
}

#[test]
fn byte_strings_emit_raw() {
    let bytes = assemble_ok("* = $0000\n!byte \"AB\", 3\n");
    assert_eq!(bytes, vec![0x41, 0x42, 3]);
}

#[test]
fn pet_and_scr_conversion() {
    let bytes = assemble_ok("* = $0000\n!pet \"Az\"\n!scr \"A0\"\n");
    // PETSCII: 'A' -> 1, 'z' -> 90; screen codes: 'A' -> 1, '0' -> 16.
    assert_eq!(bytes, vec![1, 90, 1, 16]);
}

#[test]
fn scrxor_applies_after_conversion() {
    let bytes = assemble_ok("* = $0000\n!scrxor $80, \"A\"\n");
    assert_eq!(bytes, vec![0x81]);
}

#[test]
fn convtab_switches_the_text_table() {
    let bytes = assemble_ok("* = $0000\n!convtab scr\n!text \"A\"\n!ct raw\n!text \"A\"\n");
    assert_eq!(bytes, vec![1, 0x41]);
}

// -- conditionals ----------------------------------------------------------

#[test]
fn nested_conditionals_in_skipped_branch() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !if 0 {\n\
         !if 1 { !byte 1 } else { !byte 2 }\n\
         !byte 3\n\
         } else {\n\
         !byte 4\n\
         }\n",
    );
    assert_eq!(bytes, vec![4]);
}

#[test]
fn ifdef_and_ifndef() {
    let bytes = assemble_ok(
        "present = 1\n\
         * = $0000\n\
         !ifdef present { !byte 1 } else { !byte 2 }\n\
         !ifndef absent { !byte 3 } else { !byte 4 }\n",
    );
    assert_eq!(bytes, vec![1, 3]);
}

#[test]
fn multiline_conditional_branches() {
    let bytes = assemble_ok(
        "flag = 1\n\
         * = $0000\n\
         !if flag {\n\
         !byte 1\n\
         } else {\n\
         !byte 2\n\
         }\n\
         !byte 3\n",
    );
    assert_eq!(bytes, vec![1, 3]);
}

#[test]
fn unterminated_conditional_is_an_error() {
    let (_, kinds) = assemble_err("!if 1 {\n!byte 1\n");
    assert!(kinds.contains(&AsmErrorKind::Semantic));
}

// -- loops ------------------------------------------------------------------

#[test]
fn for_loop_emits_each_iteration() {
    let bytes = assemble_ok("* = $0000\n!for i = 1 to 4 { !byte i }\n");
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[test]
fn for_loop_comma_form_and_step() {
    let bytes = assemble_ok("* = $0000\n!for i, 8, 2, -2 { !byte i }\n");
    assert_eq!(bytes, vec![8, 6, 4, 2]);
}

#[test]
fn for_loop_multiline_body() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !for i = 0 to 2 {\n\
         !byte i\n\
         !byte i * 16\n\
         }\n",
    );
    assert_eq!(bytes, vec![0, 0, 1, 16, 2, 32]);
}

#[test]
fn while_loop_with_set_variable() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !set n = 3\n\
         !while n > 0 {\n\
         !byte n\n\
         !set n = n - 1\n\
         }\n",
    );
    assert_eq!(bytes, vec![3, 2, 1]);
}

#[test]
fn do_until_runs_at_least_once() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !set n = 0\n\
         !do {\n\
         !byte n\n\
         !set n = n + 1\n\
         } !until n >= 3\n",
    );
    assert_eq!(bytes, vec![0, 1, 2]);
}

#[test]
fn break_exits_the_innermost_loop() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !for i = 0 to 9 {\n\
         !if i = 3 { !break }\n\
         !byte i\n\
         }\n",
    );
    assert_eq!(bytes, vec![0, 1, 2]);
}

#[test]
fn continue_skips_the_rest_of_the_iteration() {
    let bytes = assemble_ok(
        "* = $0000\n\
         !for i = 0 to 4 {\n\
         !if i & 1 { !continue }\n\
         !byte i\n\
         }\n",
    );
    assert_eq!(bytes, vec![0, 2, 4]);
}

#[test]
fn loop_iteration_limit_is_fatal() {
    let lines: Vec<String> = "* = $0000\n!set n = 1\n!while n { !set n = 1 }\n"
        .lines()
        .map(str::to_string)
        .collect();
    let mut assembler = Assembler::new();
    assembler.limits.max_loop_iterations = 10;
    assert!(!assembler.assemble(&lines, "test.asm"));
    assert!(assembler
        .diagnostics()
        .iter()
        .any(|d| d.kind == AsmErrorKind::Limit));
}

// -- macros -----------------------------------------------------------------

#[test]
fn macro_with_default_parameter() {
    let bytes = assemble_ok(
        "!macro fill2 (value = $ea) { !byte value, value }\n\
         * = $0000\n\
         \x20 +fill2\n\
         \x20 +fill2 1\n",
    );
    assert_eq!(bytes, vec![0xea, 0xea, 1, 1]);
}

#[test]
fn macro_zone_isolates_locals() {
    let bytes = assemble_ok(
        "!macro wait {\n\
         .loop: dex\n\
         \x20 bne .loop\n\
         }\n\
         * = $1000\n\
         \x20 +wait\n\
         \x20 +wait\n",
    );
    assert_eq!(bytes, vec![0xca, 0xd0, 0xfd, 0xca, 0xd0, 0xfd]);
}

#[test]
fn macro_arity_mismatch_is_an_error() {
    let (_, kinds) = assemble_err(
        "!macro two a, b { !byte a, b }\n\
         * = $0000\n\
         \x20 +two 1\n",
    );
    assert!(kinds.contains(&AsmErrorKind::Semantic));
}

#[test]
fn macro_recursion_limit_is_fatal() {
    let (_, kinds) = assemble_err(
        "!macro deep { +deep }\n\
         * = $0000\n\
         \x20 +deep\n",
    );
    assert!(kinds.contains(&AsmErrorKind::Limit));
}

#[test]
fn macro_arguments_bind_by_value() {
    let bytes = assemble_ok(
        "!macro half x { !byte int(x / 2) }\n\
         * = $0000\n\
         \x20 +half 7\n\
         \x20 +half 2.5 * 4\n",
    );
    assert_eq!(bytes, vec![3, 5]);
}

// -- CPU variants ------------------------------------------------------------

#[test]
fn cmos_instructions_require_the_cpu_directive() {
    let (_, kinds) = assemble_err("* = $0000\n bra next\nnext: rts\n");
    // BRA is not a 6502 mnemonic, so it lexes as a label-ish identifier and
    // trips a syntax diagnostic.
    assert!(!kinds.is_empty());

    let bytes = assemble_ok("!cpu 65c02\n* = $0000\n bra next\nnext: rts\n");
    assert_eq!(bytes, vec![0x80, 0x00, 0x60]);
}

#[test]
fn wdc_bit_branches() {
    let bytes = assemble_ok(
        "!cpu w65c02\n\
         * = $1000\n\
         \x20 bbr3 $12, over\n\
         \x20 wai\n\
         over: stp\n",
    );
    assert_eq!(bytes, vec![0x3f, 0x12, 0x01, 0xcb, 0xdb]);
}

#[test]
fn nmos_illegal_opcodes() {
    let bytes = assemble_ok(
        "!cpu nmos6502\n\
         * = $0000\n\
         \x20 lax $12\n\
         \x20 top\n\
         \x20 dop\n",
    );
    assert_eq!(bytes, vec![0xa7, 0x12, 0x0c, 0x80]);
}

#[test]
fn zp_indirect_needs_cmos() {
    let (_, kinds) = assemble_err("* = $0000\n lda ($20)\n");
    assert!(kinds.contains(&AsmErrorKind::AddressingMode));
}

// -- includes and diagnostics -------------------------------------------------

#[test]
fn source_include_and_binary() {
    use std::io::Write;
    let dir = std::env::temp_dir().join(format!("mosforge-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::File::create(dir.join("inc.asm"))
        .unwrap()
        .write_all(b"!byte 9\n")
        .unwrap();
    std::fs::File::create(dir.join("data.bin"))
        .unwrap()
        .write_all(&[1, 2, 3, 4])
        .unwrap();

    let lines: Vec<String> =
        "* = $0000\n!source \"inc.asm\"\n!binary \"data.bin\", 2, 1\n"
            .lines()
            .map(str::to_string)
            .collect();
    let mut assembler = Assembler::new();
    assembler.add_include_path(dir.clone());
    let ok = assembler.assemble(&lines, "test.asm");
    let formatted: Vec<String> = assembler.diagnostics().iter().map(|d| d.format()).collect();
    assert!(ok, "assembly failed: {formatted:?}");
    assert_eq!(assembler.image().to_plain(), vec![9, 2, 3]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_include_is_a_file_error() {
    let (_, kinds) = assemble_err("!source \"nowhere.asm\"\n");
    assert!(kinds.contains(&AsmErrorKind::File));
}

#[test]
fn warn_does_not_fail_the_build() {
    let (assembler, ok) = assemble("* = $0000\n!warn \"value is\", 40 + 2\n!byte 0\n");
    assert!(ok);
    let warning = assembler
        .diagnostics()
        .iter()
        .find(|d| d.severity == Severity::Warning)
        .expect("warning recorded");
    assert!(warning.message.contains("value is 42"));
}

#[test]
fn error_directive_fails_the_build_but_continues() {
    let (assembler, ok) = assemble("* = $0000\n!error \"first\"\n!error \"second\"\n!byte 0\n");
    assert!(!ok);
    assert_eq!(assembler.error_count(), 2);
    // Assembly continued to the end of the file.
    assert_eq!(assembler.image().to_plain(), vec![0]);
}

#[test]
fn serious_aborts_immediately() {
    let (assembler, ok) = assemble("* = $0000\n!serious \"stop\"\n!byte 1\n");
    assert!(!ok);
    assert!(assembler
        .diagnostics()
        .iter()
        .any(|d| d.severity == Severity::Serious));
    assert_eq!(assembler.image().to_plain(), Vec::<u8>::new());
}

#[test]
fn diagnostic_carries_file_and_line() {
    let (assembler, _) = assemble("* = $0000\n lda missing\n");
    let diagnostic = &assembler.diagnostics()[0];
    let text = diagnostic.format();
    assert!(text.starts_with("Error - File test.asm, line 2:"), "{text}");
    assert!(text.contains("lda missing"));
}

// -- listing -----------------------------------------------------------------

#[test]
fn listing_records_addresses_and_bytes() {
    let lines: Vec<String> = "* = $c000\n lda #$42\n rts\n"
        .lines()
        .map(str::to_string)
        .collect();
    let mut assembler = Assembler::new();
    assembler.enable_listing();
    assert!(assembler.assemble(&lines, "test.asm"));
    let listing = assembler.listing();
    assert_eq!(listing.len(), 3);
    assert_eq!(listing[1].addr, 0xc000);
    assert_eq!(listing[1].bytes, vec![0xa9, 0x42]);
    assert_eq!(listing[2].addr, 0xc002);
    assert_eq!(listing[2].bytes, vec![0x60]);
}

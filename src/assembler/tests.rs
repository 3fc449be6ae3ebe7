use super::{symbol_table_path, unresolved_exprs_path, unresolved_path, Assembler};
use crate::assembler::error::Severity;
use crate::core::expr::Value;
use crate::core::resolver::{UnresolvedExprTable, UnresolvedSymbol};
use crate::multiseg;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn assemble_lines(lines: &[&str]) -> Assembler {
    let mut assembler = Assembler::new();
    let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
    assembler.run_lines(Path::new("test.asm"), lines);
    assembler
}

fn assemble_ok(lines: &[&str]) -> Assembler {
    let assembler = assemble_lines(lines);
    let errors: Vec<String> = assembler
        .diagnostics()
        .iter()
        .filter(|d| d.severity() == Severity::Error)
        .map(|d| d.format())
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assembler
}

fn assemble_bytes(lines: &[&str]) -> Vec<u8> {
    assemble_ok(lines).output().to_vec()
}

fn error_messages(assembler: &Assembler) -> Vec<String> {
    assembler
        .diagnostics()
        .iter()
        .filter(|d| d.severity() == Severity::Error)
        .map(|d| d.error().message().to_string())
        .collect()
}

fn create_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("forge65-{label}-{}-{nanos}", process::id()));
    fs::create_dir_all(&dir).expect("Create temp dir");
    dir
}

#[test]
fn assembles_documented_encodings() {
    assert_eq!(assemble_bytes(&["  LDA #$10"]), vec![0xa9, 0x10]);
    assert_eq!(assemble_bytes(&["  LDA $10"]), vec![0xa5, 0x10]);
    assert_eq!(assemble_bytes(&["  LDA $1234"]), vec![0xad, 0x34, 0x12]);
}

#[test]
fn assembles_a_small_program() {
    let bytes = assemble_bytes(&[
        ".org $8000",
        "start:",
        "  LDA #$01",
        "  STA $0200",
        "  RTS",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x01, 0x8d, 0x00, 0x02, 0x60]);
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let bytes = assemble_bytes(&[
        "; leading comment",
        "",
        "  LDA #$01 ; load the flag",
        "   ",
        "  RTS",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x01, 0x60]);
}

#[test]
fn zero_page_downgrade_applies_to_byte_constants() {
    let bytes = assemble_bytes(&["ptr = $20", "  STA ptr", "  STA ptr,X", "  LDA ptr,X"]);
    assert_eq!(bytes, vec![0x85, 0x20, 0x95, 0x20, 0xb5, 0x20]);
}

#[test]
fn no_zero_page_form_keeps_absolute() {
    let bytes = assemble_bytes(&["vec = $20", "  JMP vec"]);
    assert_eq!(bytes, vec![0x4c, 0x20, 0x00]);
}

#[test]
fn backward_branch_to_self_encodes_fe() {
    let bytes = assemble_bytes(&[".org $8000", "loop:", "  BNE loop"]);
    assert_eq!(bytes, vec![0xd0, 0xfe]);
}

#[test]
fn forward_branch_patches_to_direct_encoding() {
    let forward = assemble_bytes(&[
        ".org $8000",
        "  BEQ done",
        "  LDA #$01",
        "done:",
        "  RTS",
    ]);
    // Same program with the target already known.
    let direct = assemble_bytes(&[
        ".org $8000",
        "done = $8004",
        "  BEQ done",
        "  LDA #$01",
        "  RTS",
    ]);
    assert_eq!(forward, direct);
    assert_eq!(forward, vec![0xf0, 0x02, 0xa9, 0x01, 0x60]);
}

#[test]
fn branch_out_of_range_is_an_error_with_placeholder() {
    let assembler = assemble_lines(&[".org $8000", "far = $9000", "  BNE far", "  RTS"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Relative jump is too big".to_string()]
    );
    // The placeholder offset keeps the image length consistent.
    assert_eq!(assembler.output(), &[0xd0, 0x00, 0x60]);
}

#[test]
fn forward_reference_round_trip_matches_direct_encoding() {
    let forward = assemble_bytes(&[
        ".org $8000",
        "  JMP entry",
        "  NOP",
        "entry:",
        "  RTS",
    ]);
    let direct = assemble_bytes(&[
        ".org $8000",
        "entry = $8004",
        "  JMP entry",
        "  NOP",
        "  RTS",
    ]);
    assert_eq!(forward, direct);
    assert_eq!(forward, vec![0x4c, 0x04, 0x80, 0xea, 0x60]);
}

#[test]
fn forward_reference_in_expression_waits_for_all_names() {
    let bytes = assemble_bytes(&[
        ".org $8000",
        "  .word first + second",
        "first = $1000",
        "second = $0234",
    ]);
    assert_eq!(bytes, vec![0x34, 0x12]);
}

#[test]
fn dependent_constants_cascade() {
    let bytes = assemble_bytes(&[
        "  LDA #derived",
        "derived = base + 1",
        "base = $41",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x42]);
}

#[test]
fn scope_shadowing_restores_outer_binding() {
    let bytes = assemble_bytes(&[
        "val = $10",
        "{",
        "val = $20",
        "  LDA #val",
        "}",
        "  LDX #val",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x20, 0xa2, 0x10]);
}

#[test]
fn scope_exit_merges_unresolved_references_up() {
    // The reference is registered inside the block; the symbol is defined
    // at global scope afterwards, so the merge-up must carry it out.
    let bytes = assemble_bytes(&[
        ".org $8000",
        "{",
        "  LDA shared",
        "}",
        "shared = $1234",
    ]);
    assert_eq!(bytes, vec![0xad, 0x34, 0x12]);
}

#[test]
fn unbalanced_scope_braces_are_errors() {
    let assembler = assemble_lines(&["}"]);
    assert_eq!(error_messages(&assembler), vec!["'}' without '{'".to_string()]);
}

#[test]
fn duplicate_label_is_an_error() {
    let assembler = assemble_lines(&["foo:", "foo:"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Label already declared: foo".to_string()]
    );
}

#[test]
fn data_byte_mixes_strings_and_expressions() {
    assert_eq!(
        assemble_bytes(&["  .byte \"AB\", $41"]),
        vec![0x41, 0x42, 0x41]
    );
}

#[test]
fn data_byte_rejects_word_values() {
    let assembler = assemble_lines(&["  .byte $1234"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Error in insert data byte: $1234".to_string()]
    );
}

#[test]
fn data_word_is_little_endian() {
    assert_eq!(
        assemble_bytes(&["  .word $1234, $ff"]),
        vec![0x34, 0x12, 0xff, 0x00]
    );
}

#[test]
fn expression_operands_follow_precedence() {
    assert_eq!(assemble_bytes(&["  LDA #1 + 2 * 3"]), vec![0xa9, 0x07]);
    assert_eq!(assemble_bytes(&["  LDA #(1 + 2) * 3"]), vec![0xa9, 0x09]);
    assert_eq!(assemble_bytes(&["  LDA #$10 << 2"]), vec![0xa9, 0x40]);
    assert_eq!(assemble_bytes(&["  LDA #<$1234"]), vec![0xa9, 0x34]);
    assert_eq!(assemble_bytes(&["  LDA #>$1234"]), vec![0xa9, 0x12]);
}

#[test]
fn mem_reserve_allocates_and_promotes() {
    let assembler = assemble_ok(&[
        ".memarea $fe",
        "first .res 1",
        "second .res 2",
        "third .res 1",
    ]);
    let symbols = assembler.symbols();
    assert_eq!(symbols.get("first"), Some(&Value::Byte(0xfe)));
    assert_eq!(symbols.get("second"), Some(&Value::Byte(0xff)));
    // The cursor crossed 255 and promoted to word.
    assert_eq!(symbols.get("third"), Some(&Value::Word(0x101)));
}

#[test]
fn mem_reserve_count_must_resolve() {
    let assembler = assemble_lines(&["buf .res later", "later = 2"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Undefined symbol: later".to_string()]
    );
}

#[test]
fn conditional_assembly_selects_branch() {
    let bytes = assemble_bytes(&[
        "flag = 1",
        ".if flag",
        "  LDA #$01",
        ".else",
        "  LDA #$02",
        ".endif",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x01]);

    let bytes = assemble_bytes(&[
        "flag = 0",
        ".if flag",
        "  LDA #$01",
        ".else",
        "  LDA #$02",
        ".endif",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x02]);
}

#[test]
fn conditionals_nest() {
    let bytes = assemble_bytes(&[
        "outer = 1",
        "inner = 0",
        ".if outer",
        "  LDA #$01",
        ".if inner",
        "  LDA #$02",
        ".endif",
        "  LDA #$03",
        ".endif",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x01, 0xa9, 0x03]);
}

#[test]
fn suppressed_blocks_keep_nesting_balanced() {
    let bytes = assemble_bytes(&[
        ".if 0",
        ".if 1",
        "  LDA #$01",
        ".endif",
        "  LDA #$02",
        ".endif",
        "  LDA #$03",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x03]);
}

#[test]
fn ifdef_checks_visible_symbols() {
    let bytes = assemble_bytes(&[
        "present = 1",
        ".ifdef present",
        "  LDA #$01",
        ".endif",
        ".ifdef missing",
        "  LDA #$02",
        ".endif",
        ".ifndef missing",
        "  LDA #$03",
        ".endif",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x01, 0xa9, 0x03]);
}

#[test]
fn if_condition_must_be_statically_known() {
    let assembler = assemble_lines(&[".if later", "  NOP", ".endif", "later = 1"]);
    let errors = error_messages(&assembler);
    assert_eq!(errors, vec!["Undefined symbol: later".to_string()]);
}

#[test]
fn unbalanced_conditionals_are_reported() {
    let assembler = assemble_lines(&[".endif"]);
    assert_eq!(
        error_messages(&assembler),
        vec![".endif without .if".to_string()]
    );

    let assembler = assemble_lines(&[".if 1", "  NOP"]);
    assert_eq!(error_messages(&assembler), Vec::<String>::new());
    assert_eq!(assembler.diagnostics().len(), 1);
    assert_eq!(
        assembler.diagnostics()[0].error().message(),
        "Found .if without .endif"
    );
}

#[test]
fn macro_expansion_substitutes_parameters() {
    let bytes = assemble_bytes(&[
        ".macro store val, addr",
        "  LDA #val",
        "  STA addr",
        ".endmacro",
        "store $10, $2000",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x10, 0x8d, 0x00, 0x20]);
}

#[test]
fn macro_without_params_expands_verbatim() {
    let bytes = assemble_bytes(&[
        ".macro return_zero",
        "  LDA #$00",
        "  RTS",
        ".endmacro",
        "return_zero",
        "return_zero",
    ]);
    assert_eq!(bytes, vec![0xa9, 0x00, 0x60, 0xa9, 0x00, 0x60]);
}

#[test]
fn macro_invocation_from_macro_body_expands() {
    let bytes = assemble_bytes(&[
        ".macro inner",
        "  NOP",
        ".endmacro",
        ".macro outer",
        "inner",
        "inner",
        ".endmacro",
        "outer",
    ]);
    assert_eq!(bytes, vec![0xea, 0xea]);
}

#[test]
fn macro_errors() {
    let assembler = assemble_lines(&["unknown_thing 1"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Undefined Macro: unknown_thing".to_string()]
    );

    let assembler = assemble_lines(&[
        ".macro m val",
        "  LDA #val",
        ".endmacro",
        "m",
    ]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Macro called without params: m".to_string()]
    );

    let assembler = assemble_lines(&[
        ".macro m",
        ".endmacro",
        ".macro m",
        ".endmacro",
    ]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Macro with the same name already defined: m".to_string()]
    );
}

#[test]
fn nested_macro_definition_is_rejected() {
    // The nested .macro line is rejected and skipped; the first .endmacro
    // closes the outer definition, so the trailing one is unmatched.
    let assembler = assemble_lines(&[
        ".macro outer",
        ".macro inner",
        "  NOP",
        ".endmacro",
        "outer",
    ]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Nested macro definitions are not allowed".to_string()]
    );
    assert_eq!(assembler.output(), &[0xea]);
}

#[test]
fn endmacro_without_macro_is_an_error() {
    let assembler = assemble_lines(&[".endmacro"]);
    assert_eq!(
        error_messages(&assembler),
        vec![".endmacro without .macro".to_string()]
    );
}

#[test]
fn repeat_block_replays_lines() {
    let bytes = assemble_bytes(&[".rep 3", "  NOP", ".endrep", "  RTS"]);
    assert_eq!(bytes, vec![0xea, 0xea, 0xea, 0x60]);
}

#[test]
fn repeat_count_can_be_an_expression() {
    let bytes = assemble_bytes(&["n = 2", ".rep n * 2", "  NOP", ".endrep"]);
    assert_eq!(bytes, vec![0xea, 0xea, 0xea, 0xea]);
}

#[test]
fn labels_inside_repeat_collide_on_second_iteration() {
    // Replayed lines are re-parsed fresh, so the label re-declares.
    let assembler = assemble_lines(&[".rep 2", "again: NOP", ".endrep"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Label already declared: again".to_string()]
    );
    assert_eq!(assembler.output(), &[0xea, 0xea]);
}

#[test]
fn nested_repeat_is_rejected() {
    let assembler = assemble_lines(&[".rep 2", ".rep 2", "  NOP", ".endrep"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Nested repeat blocks are not allowed".to_string()]
    );
}

#[test]
fn endrep_without_rep_is_an_error() {
    let assembler = assemble_lines(&[".endrep"]);
    assert_eq!(
        error_messages(&assembler),
        vec![".endrep without .rep".to_string()]
    );
}

#[test]
fn end_stops_processing() {
    let bytes = assemble_bytes(&["  LDA #$01", ".end", "  LDA #$02"]);
    assert_eq!(bytes, vec![0xa9, 0x01]);
}

#[test]
fn label_with_trailing_instruction() {
    let bytes = assemble_bytes(&[".org $8000", "loop: LDA #$10", "  BNE loop"]);
    assert_eq!(bytes, vec![0xa9, 0x10, 0xd0, 0xfc]);
}

#[test]
fn org_sets_origin_and_address() {
    let assembler = assemble_ok(&[".org $c000", "entry:", "  RTS"]);
    assert_eq!(assembler.origin(), 0xc000);
    assert_eq!(assembler.symbols().get("entry"), Some(&Value::Word(0xc000)));
}

#[test]
fn org_requires_immediate_resolution() {
    let assembler = assemble_lines(&[".org base", "base = $8000"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Undefined symbol: base".to_string()]
    );
}

#[test]
fn syntax_error_for_unclassifiable_line() {
    let assembler = assemble_lines(&["123garbage"]);
    assert_eq!(error_messages(&assembler), vec!["Syntax Error".to_string()]);
}

#[test]
fn errors_do_not_stop_subsequent_lines() {
    let assembler = assemble_lines(&["123garbage", "  LDA #$01"]);
    assert_eq!(error_messages(&assembler), vec!["Syntax Error".to_string()]);
    assert_eq!(assembler.output(), &[0xa9, 0x01]);
}

#[test]
fn never_defined_symbol_stays_in_side_tables() {
    let assembler = assemble_ok(&[".org $8000", "  LDA external", "  .word external"]);
    assert_eq!(assembler.output(), &[0xad, 0x00, 0x00, 0x00, 0x00]);

    let pending = assembler.unresolved_symbols();
    let record = pending.get("external").expect("pending record");
    assert_eq!(record.expr_positions, vec![1, 3]);

    let exprs = assembler.unresolved_exprs();
    assert_eq!(exprs.len(), 2);
    assert_eq!(exprs.origin, 0x8000);
}

#[test]
fn side_table_round_trip_matches_single_pass() {
    // Assemble with `external` unknown, serialize the side tables, then
    // resolve in a fresh context against a supplied symbol table.
    let assembler = assemble_ok(&[
        ".org $8000",
        "  LDA external",
        "  BNE external_near",
        "  .word external",
    ]);
    let object = assembler.output().to_vec();
    let pending_json = serde_json::to_string(&assembler.unresolved_symbols()).unwrap();
    let exprs_json = serde_json::to_string(assembler.unresolved_exprs()).unwrap();

    let pending: BTreeMap<String, UnresolvedSymbol> =
        serde_json::from_str(&pending_json).unwrap();
    let exprs: UnresolvedExprTable = serde_json::from_str(&exprs_json).unwrap();

    let mut resolver = Assembler::new();
    resolver.load_object(object);
    resolver.load_unresolved(pending);
    resolver.load_unresolved_exprs(exprs);
    let mut symbols = BTreeMap::new();
    symbols.insert("external".to_string(), Value::Word(0x1234));
    symbols.insert("external_near".to_string(), Value::Word(0x8007));
    resolver.load_symbol_table(symbols);
    resolver.resolve_pending();
    assert!(resolver.unresolved_symbols().is_empty());
    assert!(resolver.unresolved_exprs().is_empty());

    // The same program assembled with both symbols predefined.
    let direct = assemble_bytes(&[
        ".org $8000",
        "external = $1234",
        "external_near = $8007",
        "  LDA external",
        "  BNE external_near",
        "  .word external",
    ]);
    assert_eq!(resolver.output(), &direct[..]);
}

#[test]
fn include_reads_nested_files() {
    let dir = create_temp_dir("include");
    fs::write(dir.join("defs.inc"), "value = $22\n").unwrap();
    fs::write(
        dir.join("main.asm"),
        ".include \"defs.inc\"\n  LDA #value\n",
    )
    .unwrap();

    let mut assembler = Assembler::new();
    assembler.set_source_file(&dir.join("main.asm"));
    assembler.set_object_file(&dir.join("main.o"));
    let report = assembler.assemble().expect("assemble");
    assert_eq!(report.error_count(), 0);
    assert_eq!(fs::read(dir.join("main.o")).unwrap(), vec![0xa9, 0x22]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn incbin_inlines_raw_bytes() {
    let dir = create_temp_dir("incbin");
    fs::write(dir.join("blob.bin"), [0xde, 0xad, 0xbe]).unwrap();
    fs::write(
        dir.join("main.asm"),
        ".incbin \"blob.bin\"\n  RTS\n",
    )
    .unwrap();

    let mut assembler = Assembler::new();
    assembler.set_source_file(&dir.join("main.asm"));
    assembler.set_object_file(&dir.join("main.o"));
    let report = assembler.assemble().expect("assemble");
    assert_eq!(report.error_count(), 0);
    assert_eq!(
        fs::read(dir.join("main.o")).unwrap(),
        vec![0xde, 0xad, 0xbe, 0x60]
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_include_is_reported() {
    let dir = create_temp_dir("include-missing");
    fs::write(dir.join("main.asm"), ".include \"nope.inc\"\n  RTS\n").unwrap();

    let mut assembler = Assembler::new();
    assembler.set_source_file(&dir.join("main.asm"));
    assembler.set_object_file(&dir.join("main.o"));
    let report = assembler.assemble().expect("assemble");
    assert_eq!(report.error_count(), 1);
    assert!(report.diagnostics()[0]
        .error()
        .message()
        .starts_with("File doesn't exist"));
    // The run still writes what it produced.
    assert_eq!(fs::read(dir.join("main.o")).unwrap(), vec![0x60]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn assemble_requires_paths() {
    let mut assembler = Assembler::new();
    let err = assembler.assemble().unwrap_err();
    assert_eq!(err.to_string(), "undefined source file");

    let mut assembler = Assembler::new();
    assembler.set_source_file(Path::new("prog.asm"));
    let err = assembler.assemble().unwrap_err();
    assert_eq!(err.to_string(), "undefined object file");
}

#[test]
fn assemble_exports_symbol_table_and_listing() {
    let dir = create_temp_dir("exports");
    fs::write(
        dir.join("main.asm"),
        ".org $8000\nentry:\n  LDA #$01\n  RTS\n",
    )
    .unwrap();

    let object = dir.join("main.o");
    let mut assembler = Assembler::new();
    assembler.set_source_file(&dir.join("main.asm"));
    assembler.set_object_file(&object);
    assembler.set_listing(true);
    let report = assembler.assemble().expect("assemble");
    assert_eq!(report.error_count(), 0);

    let symbols: BTreeMap<String, Value> =
        serde_json::from_str(&fs::read_to_string(symbol_table_path(&object)).unwrap()).unwrap();
    assert_eq!(symbols.get("entry"), Some(&Value::Word(0x8000)));

    // No forward references, so no unresolved side files.
    assert!(!unresolved_path(&object).exists());
    assert!(!unresolved_exprs_path(&object).exists());

    let listing = fs::read_to_string(dir.join("main.lst")).unwrap();
    assert!(listing.contains("A9 01"));
    assert!(listing.contains("LDA #$01"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn multisegment_build_resolves_across_segments() {
    let dir = create_temp_dir("multiseg");
    let seg1 = dir.join("seg1.asm");
    let seg2 = dir.join("seg2.asm");
    fs::write(&seg1, ".org $8000\n  JMP shared_entry\n  .word shared_entry\n").unwrap();
    fs::write(&seg2, ".org $9000\nshared_entry:\n  RTS\n").unwrap();

    let config = dir.join("build.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "segments": [
                    {{ "file_name": "{}", "dependencies": ["{}"] }},
                    {{ "file_name": "{}" }}
                ]
            }}"#,
            seg1.display(),
            seg2.display(),
            seg2.display()
        ),
    )
    .unwrap();

    let reports = multiseg::run(&config, false).expect("multiseg run");
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.error_count(), 0);
    }

    let seg1_obj = fs::read(dir.join("seg1.o")).unwrap();
    assert_eq!(seg1_obj, vec![0x4c, 0x00, 0x90, 0x00, 0x90]);
    let seg2_obj = fs::read(dir.join("seg2.o")).unwrap();
    assert_eq!(seg2_obj, vec![0x60]);

    // Fully resolved, so the side files were cleaned up.
    assert!(!unresolved_path(&dir.join("seg1.o")).exists());
    assert!(!unresolved_exprs_path(&dir.join("seg1.o")).exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn multisegment_build_with_combine_step() {
    let dir = create_temp_dir("multiseg-combine");
    let seg1 = dir.join("seg1.asm");
    let seg2 = dir.join("seg2.asm");
    fs::write(&seg1, "  LDA #$01\n").unwrap();
    fs::write(&seg2, "  RTS\n").unwrap();

    let out = dir.join("game.bin");
    let config = dir.join("build.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "segments": [
                    {{ "file_name": "{}" }},
                    {{ "file_name": "{}" }}
                ],
                "combine": {{
                    "object_file": "{}",
                    "files": [
                        {{ "file_name": "{}", "size": "$4" }},
                        {{ "file_name": "{}" }}
                    ]
                }}
            }}"#,
            seg1.display(),
            seg2.display(),
            out.display(),
            dir.join("seg1.o").display(),
            dir.join("seg2.o").display()
        ),
    )
    .unwrap();

    multiseg::run(&config, false).expect("multiseg run");
    let bytes = fs::read(&out).unwrap();
    assert_eq!(bytes, vec![0xa9, 0x01, 0x00, 0x00, 0x60]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn macro_shadowing_a_mnemonic_wins() {
    // A macro named like a mnemonic is rerouted by the instruction handler.
    let bytes = assemble_bytes(&[
        ".macro nop",
        "  RTS",
        ".endmacro",
        "  NOP",
    ]);
    // NOP is a valid mnemonic but the macro table is consulted first with
    // the written name; "NOP" != "nop", so the instruction assembles.
    assert_eq!(bytes, vec![0xea]);
}

#[test]
fn indirect_and_indexed_forms_assemble() {
    let bytes = assemble_bytes(&[
        "zp = $20",
        "  LDA (zp,X)",
        "  LDA (zp),Y",
        "  JMP ($1234)",
        "  LDX $10,Y",
        "  LDA $1234,Y",
    ]);
    assert_eq!(
        bytes,
        vec![0xa1, 0x20, 0xb1, 0x20, 0x6c, 0x34, 0x12, 0xb6, 0x10, 0xb9, 0x34, 0x12]
    );
}

#[test]
fn invalid_mode_for_mnemonic_is_reported_without_bytes() {
    let assembler = assemble_lines(&["  STA #$10", "  RTS"]);
    assert_eq!(
        error_messages(&assembler),
        vec!["Error in operands".to_string()]
    );
    assert_eq!(assembler.output(), &[0x60]);
}

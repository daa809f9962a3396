//! End-to-end decompilation of single modules.

use wasmdec::{DecompileError, Decompiler, DisasmConfig, DisasmMode};

const PROGRAM: &str = r#"(module
    (import "env" "print" (func $print (param i32)))
    (memory 1)
    (table 2 funcref)
    (global $counter (mut i32) (i32.const 0))
    (data (i32.const 16) "\01\02\03\04")
    (elem (i32.const 0) $double $pick)

    (func $double (param i32) (result i32)
        (i32.mul (local.get 0) (i32.const 2)))

    (func $pick (export "pick") (param i32) (result i32)
        (block (result i32)
            (i32.const 1)
            (br_if 0 (local.get 0))
            (drop)
            (i32.const 2)))

    (func (export "sum") (param i32) (result i32) (local i32)
        (local.set 1 (i32.const 0))
        (block
            (loop
                (br_if 1 (i32.eqz (local.get 0)))
                (local.set 0 (i32.sub (local.get 0) (i32.const 1)))
                (local.set 1
                    (i32.add (local.get 1) (i32.load8_u offset=16 (local.get 0))))
                (br 0)))
        (local.get 1))

    (func (export "classify") (param i32) (result i32)
        (block (block (block
            (br_table 0 1 2 (local.get 0)))
            (return (i32.const 10)))
            (return (i32.const 20)))
        (i32.const 30))

    (func (export "tick") (result i32)
        (global.set $counter (i32.add (global.get $counter) (i32.const 1)))
        (call $print (global.get $counter))
        (call_indirect (param i32) (result i32)
            (global.get $counter) (i32.const 0)))

    (func (export "grow") (result i32)
        (drop (memory.grow (i32.const 1)))
        (memory.size)))"#;

fn config(extra_info: bool) -> DisasmConfig {
    DisasmConfig {
        debug: false,
        extra_info,
        mode: DisasmMode::Wast,
    }
}

fn decompile(wat: &str, extra_info: bool) -> String {
    let result = Decompiler::new(config(extra_info), wat.as_bytes())
        .unwrap()
        .decompile();
    assert!(!result.failed(), "{:?}", result.errors());
    result.into_code()
}

#[test]
fn supported_modules_do_not_fail() {
    let code = decompile(PROGRAM, false);
    assert!(code.contains("extern void env_print(int32_t);\n"));
    assert!(code.contains("static int32_t double_(int32_t arg0) {\n"));
    assert!(code.contains("int32_t pick(int32_t arg0) {\n"));
    assert!(code.contains("switch ((uint32_t)(arg0)) {"));
    assert!(code.contains("memory_grow(1)"));
    assert!(code.contains("table[0] = (wasm_funcref)double_;"));
    assert!(code.contains("table[1] = (wasm_funcref)pick;"));
}

#[test]
fn branch_if_guards_the_jump() {
    let code = decompile(PROGRAM, false);
    let start = code.find("int32_t pick(int32_t arg0) {").unwrap();
    let pick = &code[start..];
    let pick = &pick[..pick.find("\n}\n").unwrap()];
    let guard = pick.find("if (arg0) {").unwrap();
    let jump = pick.find("goto label_1;").unwrap();
    let second = pick.find(" = 2;").unwrap();
    let label = pick.find("label_1:;").unwrap();
    assert!(guard < jump && jump < second && second < label);
}

#[test]
fn extra_info_is_deterministic() {
    let first = decompile(PROGRAM, true);
    let second = decompile(PROGRAM, true);
    assert_eq!(first, second);
    assert!(first.contains("  // Parsed 1 WASM function locals\n"));
    assert!(first.contains("  int32_t local1 = 0; // Local with index '1'\n"));
}

#[test]
fn extra_info_only_changes_declarations() {
    let plain = decompile(PROGRAM, false);
    let extra = decompile(PROGRAM, true);
    let stripped = extra
        .lines()
        .filter(|line| !line.trim_start().starts_with("// Parsed "))
        .map(|line| match line.find(" = 0; // ") {
            Some(pos) => format!("{};", &line[..pos]),
            None => line.to_owned(),
        })
        .collect::<Vec<_>>();
    assert_eq!(plain.lines().collect::<Vec<_>>(), stripped);
}

#[test]
fn dumps_match_declared_sizes() {
    let decompiler = Decompiler::new(config(false), PROGRAM.as_bytes()).unwrap();
    let memory = decompiler.dump_memory();
    assert_eq!(memory.len(), 65536);
    assert_eq!(&memory[16..20], &[1, 2, 3, 4]);
    let table = decompiler.dump_table();
    assert_eq!(table.len(), 2 * 4);
    // Function indices count the import.
    assert_eq!(&table[0..4], &1u32.to_le_bytes());
    assert_eq!(&table[4..8], &2u32.to_le_bytes());
}

#[test]
fn unsupported_operations_keep_partial_output() {
    let result = Decompiler::new(
        config(false),
        br#"(module
            (func (export "vec") (result i32)
                (i32x4.extract_lane 0 (i32x4.splat (i32.const 7))))
            (func (export "fine") (result i32) (i32.const 5)))"#,
    )
    .unwrap()
    .decompile();
    assert!(result.failed());
    assert!(result
        .errors()
        .iter()
        .all(|error| matches!(error, DecompileError::Unsupported { .. })));
    assert!(result.code().contains("int32_t fine(void) {\n  return 5;\n}\n"));
}

#[test]
fn binary_input_is_detected() {
    let bytes = wat::parse_str(r#"(module (func (export "f") (result i64) (i64.const -1)))"#)
        .unwrap();
    let result = Decompiler::new(DisasmConfig::default(), &bytes)
        .unwrap()
        .decompile();
    assert!(!result.failed());
    assert!(result.code().contains("int64_t f(void) {\n  return INT64_C(-1);\n}\n"));
}

#[test]
fn asm_js_is_rejected() {
    let config = DisasmConfig {
        mode: DisasmMode::AsmJs,
        ..Default::default()
    };
    assert!(Decompiler::new(config, b"function f() {}").is_err());
}

//! Compile emitted C with the host compiler and run it. Skipped when
//! no `cc` is available.

use std::path::PathBuf;
use std::process::Command;
use wasmdec::{Decompiler, DisasmConfig, DisasmMode, MultiDecompiler};

const HARNESS: &str = r#"
#include <stdio.h>

void env_print(int32_t value) {
  printf("print %d\n", value);
}
"#;

fn have_cc() -> bool {
    Command::new("cc")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wasmdec-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Compile `code` followed by `main_body` wrapped in `main()`, run it,
/// and return its standard output.
fn run(name: &str, code: &str, main_body: &str) -> String {
    let source = scratch(&format!("{}.c", name));
    let exe = scratch(name);
    let program = format!(
        "{}\n{}\nint main(void) {{\n{}\n  return 0;\n}}\n",
        code, HARNESS, main_body
    );
    std::fs::write(&source, program).unwrap();
    let status = Command::new("cc")
        .arg("-o")
        .arg(&exe)
        .arg(&source)
        .arg("-lm")
        .status()
        .unwrap();
    assert!(status.success(), "failed to compile {}", source.display());
    let out = Command::new(&exe).output().unwrap();
    assert!(out.status.success());
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn control_flow_memory_and_calls() {
    if !have_cc() {
        eprintln!("skipping: no C compiler");
        return;
    }
    let wat = r#"(module
        (import "env" "print" (func $print (param i32)))
        (memory 1)
        (table 1 funcref)
        (global $counter (mut i32) (i32.const 0))
        (data (i32.const 16) "\01\02\03\04")
        (elem (i32.const 0) $double)

        (func $double (param i32) (result i32)
            (i32.mul (local.get 0) (i32.const 2)))

        (func (export "pick") (param i32) (result i32)
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
    let config = DisasmConfig {
        mode: DisasmMode::Wast,
        ..Default::default()
    };
    let result = Decompiler::new(config, wat.as_bytes()).unwrap().decompile();
    assert!(!result.failed(), "{:?}", result.errors());

    let out = run(
        "single",
        result.code(),
        r#"  init();
  printf("%d %d\n", pick(1), pick(0));
  printf("%d\n", sum(4));
  printf("%d %d %d %d\n", classify(0), classify(1), classify(2), classify(7));
  printf("%d\n", tick());
  printf("%d\n", grow());"#,
    );
    assert_eq!(out, "1 2\n10\n10 20 30 30\nprint 1\n2\n2\n");
}

#[test]
fn float_min_max_and_unaligned_memory() {
    if !have_cc() {
        eprintln!("skipping: no C compiler");
        return;
    }
    let wat = r#"(module
        (memory 1)
        (func (export "neg_zero_min") (result f64)
            (f64.min (f64.const 0) (f64.const -0)))
        (func (export "nan_max") (result f32)
            (f32.max (f32.const nan) (f32.const 1)))
        (func (export "unaligned") (result i32)
            (i32.store offset=1 (i32.const 0) (i32.const 0x01020304))
            (i32.load offset=1 (i32.const 0))))"#;
    let config = DisasmConfig {
        mode: DisasmMode::Wast,
        ..Default::default()
    };
    let result = Decompiler::new(config, wat.as_bytes()).unwrap().decompile();
    assert!(!result.failed(), "{:?}", result.errors());

    let out = run(
        "float_memory",
        result.code(),
        r#"  init();
  printf("%d %d %d\n", signbit(neg_zero_min()) != 0, isnan(nan_max()) != 0, unaligned());"#,
    );
    assert_eq!(out, "1 1 16909060\n");
}

#[test]
fn linked_modules_share_one_translation_unit() {
    if !have_cc() {
        eprintln!("skipping: no C compiler");
        return;
    }
    let config = DisasmConfig {
        mode: DisasmMode::Wast,
        ..Default::default()
    };
    let inputs = vec![
        (
            "lib.wat".to_owned(),
            br#"(module
                (global (export "base") i32 (i32.const 40))
                (func (export "add") (param i32 i32) (result i32)
                    (i32.add (local.get 0) (local.get 1))))"#
                .to_vec(),
        ),
        (
            "app.wat".to_owned(),
            br#"(module
                (import "lib" "add" (func $add (param i32 i32) (result i32)))
                (import "lib" "base" (global $base i32))
                (func (export "answer") (result i32)
                    (call $add (global.get $base) (i32.const 2))))"#
                .to_vec(),
        ),
    ];
    let result = MultiDecompiler::new(config, inputs).unwrap().decompile();
    assert!(!result.failed(), "{:?}", result.errors());

    let out = run(
        "linked",
        result.code(),
        r#"  m0_init();
  m1_init();
  printf("%d\n", answer());"#,
    );
    assert_eq!(out, "42\n");
}

#[test]
fn linked_modules_share_memory() {
    if !have_cc() {
        eprintln!("skipping: no C compiler");
        return;
    }
    let config = DisasmConfig {
        mode: DisasmMode::Wast,
        ..Default::default()
    };
    let inputs = vec![
        (
            "a.wat".to_owned(),
            br#"(module
                (memory (export "mem") 1)
                (func (export "put") (i32.store (i32.const 0) (i32.const 7))))"#
                .to_vec(),
        ),
        (
            "b.wat".to_owned(),
            br#"(module
                (import "a" "mem" (memory 1))
                (data (i32.const 8) "\05")
                (func (export "get") (result i32)
                    (i32.add (i32.load (i32.const 0)) (i32.load8_u (i32.const 8)))))"#
                .to_vec(),
        ),
    ];
    let result = MultiDecompiler::new(config, inputs).unwrap().decompile();
    assert!(!result.failed(), "{:?}", result.errors());

    let out = run(
        "shared_memory",
        result.code(),
        r#"  m0_init();
  m1_init();
  put();
  printf("%d\n", get());"#,
    );
    assert_eq!(out, "12\n");
}

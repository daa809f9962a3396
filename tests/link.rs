//! Multi-module decompilation from files on disk.

use std::path::PathBuf;
use wasmdec::{DecompileError, DisasmConfig, MultiDecompiler};

fn write_inputs(test: &str, modules: &[(&str, &str)]) -> Vec<PathBuf> {
    let dir = std::env::temp_dir().join(format!("wasmdec-{}-{}", test, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    modules
        .iter()
        .map(|(name, wat)| {
            let path = dir.join(name);
            if name.ends_with(".wasm") {
                std::fs::write(&path, wat::parse_str(wat).unwrap()).unwrap();
            } else {
                std::fs::write(&path, wat).unwrap();
            }
            path
        })
        .collect()
}

#[test]
fn import_resolves_across_files() {
    let paths = write_inputs(
        "resolve",
        &[
            (
                "a.wasm",
                r#"(module (func (export "foo") (result i32) (i32.const 7)))"#,
            ),
            (
                "b.wat",
                r#"(module
                    (import "a" "foo" (func $foo (result i32)))
                    (func (export "bar") (result i32) (call $foo)))"#,
            ),
        ],
    );
    let multi = MultiDecompiler::from_paths(DisasmConfig::default(), &paths).unwrap();
    assert_eq!(multi.len(), 2);
    let result = multi.decompile();
    assert!(!result.failed(), "{:?}", result.errors());
    let code = result.code();
    let a = code.find("a.wasm */").unwrap();
    let b = code.find("b.wat */").unwrap();
    assert!(a < b);
    assert!(code[b..].contains("int32_t bar(void) {\n  return foo();\n}\n"));
    assert!(code[..b].contains("int32_t foo(void) {\n  return 7;\n}\n"));
}

#[test]
fn duplicate_export_fails_the_merge() {
    let paths = write_inputs(
        "conflict",
        &[
            ("a.wat", r#"(module (func (export "foo")))"#),
            ("b.wat", r#"(module (func (export "foo")))"#),
        ],
    );
    let result = MultiDecompiler::from_paths(DisasmConfig::default(), &paths)
        .unwrap()
        .decompile();
    assert!(result.failed());
    assert!(matches!(
        &result.errors()[0],
        DecompileError::UnresolvedSymbol { name, .. } if name == "foo"
    ));
    // Best-effort output still has both modules.
    assert!(result.code().contains("a.wat */"));
    assert!(result.code().contains("b.wat */"));
}

#[test]
fn shared_memory_across_files() {
    let paths = write_inputs(
        "memory",
        &[
            (
                "a.wat",
                r#"(module
                    (memory (export "mem") 1)
                    (func (export "put") (i32.store (i32.const 0) (i32.const 7))))"#,
            ),
            (
                "b.wat",
                r#"(module
                    (import "a" "mem" (memory 1))
                    (func (export "get") (result i32) (i32.load (i32.const 0))))"#,
            ),
        ],
    );
    let result = MultiDecompiler::from_paths(DisasmConfig::default(), &paths)
        .unwrap()
        .decompile();
    assert!(!result.failed(), "{:?}", result.errors());
    let code = result.code();
    let b = code.find("b.wat */").unwrap();
    assert!(code[..b].contains("uint8_t *m0_memory;\n"));
    assert!(code[..b].contains("int32_t m0_memory_grow(int32_t delta) {\n"));
    assert!(code[b..].contains("extern uint8_t *m0_memory;\n"));
    assert!(code[b..].contains("extern uint32_t m0_memory_pages;\n"));
    assert!(code[b..].contains("m0_memory + (uint32_t)(0)"));
    assert!(!code[b..].contains("m1_memory"));
}

#[test]
fn unreadable_input_is_an_error() {
    let missing = std::env::temp_dir().join("wasmdec-no-such-file.wasm");
    assert!(MultiDecompiler::from_paths(DisasmConfig::default(), &[missing]).is_err());
}

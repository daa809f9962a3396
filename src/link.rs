//! Decompilation of several modules into one translation unit, with
//! imports resolved against the other modules' exports.

use crate::config::{DisasmConfig, DisasmMode};
use crate::decompiler::{Decompiled, Decompiler};
use crate::errors::DecompileError;
use crate::entity::EntityRef;
use crate::ir::{ExportKind, Func, Global, ImportKind, MemoryData};
use anyhow::{Context, Result};
use fxhash::FxHashMap;
use log::{debug, warn};
use rayon::prelude::*;
use std::path::Path;

/// Symbols an import takes from the module that exports it.
#[derive(Debug)]
enum Resolution {
    Func(Func, String),
    Global(Global, String),
    Memory {
        memory: String,
        pages: String,
        grow: String,
    },
    Table(String),
}

/// An import with limits `(initial, max)` can be satisfied by an export
/// that is at least as large initially and never grows past the
/// import's maximum.
fn limits_fit(import: (u64, Option<u64>), export: (u64, Option<u64>)) -> bool {
    export.0 >= import.0
        && match (import.1, export.1) {
            (None, _) => true,
            (Some(import_max), Some(export_max)) => export_max <= import_max,
            (Some(_), None) => false,
        }
}

fn page_limits(memory: &MemoryData) -> (u64, Option<u64>) {
    (
        memory.initial_pages as u64,
        memory.maximum_pages.map(|max| max as u64),
    )
}

pub struct MultiDecompiler {
    /// One display name (file name) per module, in input order.
    names: Vec<String>,
    decompilers: Vec<Decompiler>,
}

impl MultiDecompiler {
    /// Parse every `(name, bytes)` input with the same configuration.
    pub fn new(config: DisasmConfig, inputs: Vec<(String, Vec<u8>)>) -> Result<Self> {
        Self::load(
            inputs
                .into_iter()
                .map(|(name, bytes)| (name, config, bytes))
                .collect(),
        )
    }

    /// Read and parse every file. Unless `config` names a mode, each
    /// file's mode comes from its extension.
    pub fn from_paths<P: AsRef<Path>>(config: DisasmConfig, paths: &[P]) -> Result<Self> {
        let inputs = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let mut config = config;
                if config.mode == DisasmMode::None {
                    config.mode = DisasmMode::from_path(path);
                }
                Ok((path.display().to_string(), config, bytes))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::load(inputs)
    }

    fn load(inputs: Vec<(String, DisasmConfig, Vec<u8>)>) -> Result<Self> {
        let mut names = vec![];
        let mut decompilers = vec![];
        for (i, (name, config, bytes)) in inputs.into_iter().enumerate() {
            let decompiler = Decompiler::with_prefix(config, &bytes, &format!("m{}_", i))
                .with_context(|| format!("failed to load {}", name))?;
            names.push(name);
            decompilers.push(decompiler);
        }
        Ok(MultiDecompiler { names, decompilers })
    }

    pub fn len(&self) -> usize {
        self.decompilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decompilers.is_empty()
    }

    /// Point every import at the symbols of the one module that
    /// exports it, and report everything that cannot be resolved that
    /// way.
    fn link(&mut self) -> Vec<DecompileError> {
        let mut errors = vec![];

        let mut exporters: FxHashMap<String, Vec<(usize, ExportKind)>> = FxHashMap::default();
        for (i, decompiler) in self.decompilers.iter().enumerate() {
            for export in &decompiler.module().exports {
                exporters
                    .entry(export.name.clone())
                    .or_default()
                    .push((i, export.kind));
            }
        }
        let mut conflicts = exporters
            .iter()
            .filter(|(_, defs)| defs.len() > 1)
            .collect::<Vec<_>>();
        conflicts.sort_by(|a, b| a.0.cmp(b.0));
        for (name, defs) in conflicts {
            let modules = defs
                .iter()
                .map(|&(i, _)| &self.names[i][..])
                .collect::<Vec<_>>();
            let reason = format!("exported by {}", modules.join(", "));
            warn!("symbol '{}' {}", name, reason);
            errors.push(DecompileError::UnresolvedSymbol {
                module: modules[1..].join(", "),
                name: name.clone(),
                reason,
            });
        }

        let mut resolutions = vec![];
        for (i, decompiler) in self.decompilers.iter().enumerate() {
            let module = decompiler.module();
            for import in &module.imports {
                let unresolved = |reason: String| {
                    warn!(
                        "{}: import '{}.{}' {}",
                        self.names[i], import.module, import.name, reason
                    );
                    DecompileError::UnresolvedSymbol {
                        module: self.names[i].clone(),
                        name: import.name.clone(),
                        reason,
                    }
                };
                let candidates = exporters
                    .get(&import.name)
                    .map(|defs| {
                        defs.iter()
                            .filter(|&&(j, kind)| {
                                j != i
                                    && matches!(
                                        (import.kind, kind),
                                        (ImportKind::Func(_), ExportKind::Func(_))
                                            | (ImportKind::Global(_), ExportKind::Global(_))
                                            | (ImportKind::Memory(_), ExportKind::Memory(_))
                                            | (ImportKind::Table(_), ExportKind::Table(_))
                                    )
                            })
                            .copied()
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let (j, kind) = match &candidates[..] {
                    [] => {
                        errors.push(unresolved("is not exported by any module".to_owned()));
                        continue;
                    }
                    &[def] => def,
                    _ => {
                        errors.push(unresolved("is ambiguous".to_owned()));
                        continue;
                    }
                };
                let exporter = &self.decompilers[j];
                match (import.kind, kind) {
                    (ImportKind::Func(func), ExportKind::Func(def)) => {
                        let expected = module.func_signature(func);
                        let actual = exporter.module().func_signature(def);
                        match exporter.names().func(def) {
                            Some(symbol) if expected.is_some() && expected == actual => {
                                resolutions.push((i, Resolution::Func(func, symbol.to_owned())));
                            }
                            _ => errors.push(unresolved(format!(
                                "does not match the signature exported by {}",
                                self.names[j]
                            ))),
                        }
                    }
                    (ImportKind::Global(global), ExportKind::Global(def)) => {
                        let expected = module.globals.get(global).map(|data| data.ty);
                        let actual = exporter.module().globals.get(def).map(|data| data.ty);
                        match exporter.names().global(def) {
                            Some(symbol) if expected.is_some() && expected == actual => {
                                resolutions
                                    .push((i, Resolution::Global(global, symbol.to_owned())));
                            }
                            _ => errors.push(unresolved(format!(
                                "does not match the type exported by {}",
                                self.names[j]
                            ))),
                        }
                    }
                    (ImportKind::Memory(memory), ExportKind::Memory(def)) => {
                        let expected = module.memories.get(memory);
                        let actual = exporter.module().memories.get(def);
                        match (expected, actual) {
                            _ if memory.index() != 0 || def.index() != 0 => {
                                errors.push(unresolved("is not memory 0".to_owned()))
                            }
                            (Some(expected), Some(actual))
                                if limits_fit(page_limits(expected), page_limits(actual)) =>
                            {
                                let names = exporter.names();
                                resolutions.push((
                                    i,
                                    Resolution::Memory {
                                        memory: names.memory.clone(),
                                        pages: names.memory_pages.clone(),
                                        grow: names.memory_grow.clone(),
                                    },
                                ));
                            }
                            _ => errors.push(unresolved(format!(
                                "does not match the limits of the memory exported by {}",
                                self.names[j]
                            ))),
                        }
                    }
                    (ImportKind::Table(table), ExportKind::Table(def)) => {
                        let expected = module.tables.get(table);
                        let actual = exporter.module().tables.get(def);
                        match (expected, actual) {
                            _ if table.index() != 0 || def.index() != 0 => {
                                errors.push(unresolved("is not table 0".to_owned()))
                            }
                            (Some(expected), Some(actual))
                                if limits_fit(
                                    (expected.initial, expected.max),
                                    (actual.initial, actual.max),
                                ) =>
                            {
                                resolutions
                                    .push((i, Resolution::Table(exporter.names().table.clone())));
                            }
                            _ => errors.push(unresolved(format!(
                                "does not match the limits of the table exported by {}",
                                self.names[j]
                            ))),
                        }
                    }
                    _ => {}
                }
            }
        }

        for (i, resolution) in resolutions {
            debug!("{}: {:?}", self.names[i], resolution);
            let names = self.decompilers[i].names_mut();
            match resolution {
                Resolution::Func(func, symbol) => names.resolve_func(func, symbol),
                Resolution::Global(global, symbol) => names.resolve_global(global, symbol),
                Resolution::Memory { memory, pages, grow } => {
                    names.resolve_memory(memory, pages, grow)
                }
                Resolution::Table(table) => names.resolve_table(table),
            }
        }
        errors
    }

    /// Link and decompile every module. The result is the modules'
    /// code in input order; it fails if any module fails or any import
    /// cannot be resolved.
    pub fn decompile(mut self) -> Decompiled {
        let mut errors = self.link();
        let results = self
            .decompilers
            .into_par_iter()
            .map(|decompiler| decompiler.decompile())
            .collect::<Vec<_>>();

        let mut code = String::new();
        for (name, result) in self.names.iter().zip(results) {
            code += &format!("/* {} */\n", name.replace("*/", "* /"));
            errors.extend(result.errors().iter().cloned());
            code += &result.into_code();
            code.push('\n');
        }
        if errors.is_empty() {
            Decompiled::Succeeded { code }
        } else {
            Decompiled::Failed { code, errors }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decompile(modules: &[&str]) -> Decompiled {
        let config = DisasmConfig {
            mode: DisasmMode::Wast,
            ..Default::default()
        };
        let inputs = modules
            .iter()
            .enumerate()
            .map(|(i, wat)| (format!("m{}.wat", i), wat.as_bytes().to_vec()))
            .collect();
        MultiDecompiler::new(config, inputs).unwrap().decompile()
    }

    #[test]
    fn imports_resolve_to_exports() {
        let result = decompile(&[
            r#"(module (func (export "foo") (param i32) (result i32) (local.get 0)))"#,
            r#"(module
                (import "env" "foo" (func $foo (param i32) (result i32)))
                (func (export "bar") (result i32) (call $foo (i32.const 3))))"#,
        ]);
        assert!(!result.failed(), "{:?}", result.errors());
        let code = result.code();
        assert!(code.starts_with("/* m0.wat */\n"));
        assert!(code.contains("extern int32_t foo(int32_t);\n"));
        assert!(code.contains("  return foo(3);\n"));
        assert!(!code.contains("env_foo"));
        assert!(code.contains("void m0_init(void)"));
        assert!(code.contains("void m1_init(void)"));
    }

    #[test]
    fn duplicate_exports_conflict() {
        let result = decompile(&[
            r#"(module (func (export "foo")))"#,
            r#"(module (func (export "foo")))"#,
        ]);
        assert!(result.failed());
        assert_eq!(
            result.errors(),
            &[DecompileError::UnresolvedSymbol {
                module: "m1.wat".to_owned(),
                name: "foo".to_owned(),
                reason: "exported by m0.wat, m1.wat".to_owned(),
            }]
        );
    }

    #[test]
    fn memory_and_table_imports_share_the_exporter_state() {
        let result = decompile(&[
            r#"(module
                (memory (export "mem") 1)
                (table (export "tbl") 1 funcref)
                (func (export "put") (i32.store (i32.const 0) (i32.const 7))))"#,
            r#"(module
                (import "a" "mem" (memory 1))
                (import "a" "tbl" (table 1 funcref))
                (func (export "get") (result i32) (i32.load (i32.const 0))))"#,
        ]);
        assert!(!result.failed(), "{:?}", result.errors());
        let code = result.code();
        let second = code.find("/* m1.wat */").unwrap();
        assert!(code[..second].contains("\nuint8_t *m0_memory;\n"));
        assert!(code[..second].contains("\nwasm_funcref m0_table[1];\n"));
        let importer = &code[second..];
        assert!(importer.contains("extern uint8_t *m0_memory;\n"));
        assert!(importer.contains("extern int32_t m0_memory_grow(int32_t);\n"));
        assert!(importer.contains("extern wasm_funcref m0_table[];\n"));
        assert!(!importer.contains("m1_memory"));
        assert!(!importer.contains("m1_table"));
        assert!(importer.contains("void m1_init(void) {\n}\n"));
    }

    #[test]
    fn memory_import_needs_a_large_enough_export() {
        let result = decompile(&[
            r#"(module (memory (export "mem") 1 4))"#,
            r#"(module (import "a" "mem" (memory 2)))"#,
            r#"(module (import "a" "mem" (memory 1 2)))"#,
            r#"(module (import "a" "nothing" (table 1 funcref)))"#,
        ]);
        assert!(result.failed());
        let modules = result
            .errors()
            .iter()
            .map(|error| match error {
                DecompileError::UnresolvedSymbol { module, .. } => &module[..],
                _ => "",
            })
            .collect::<Vec<_>>();
        assert_eq!(modules, &["m1.wat", "m2.wat", "m3.wat"]);
        // Unresolved imports fall back to state of their own.
        assert!(result.code().contains("static uint8_t *m1_memory;\n"));
    }

    #[test]
    fn mismatched_and_missing_imports_fail() {
        let result = decompile(&[
            r#"(module (func (export "foo") (param i64)))"#,
            r#"(module
                (import "env" "foo" (func (param i32)))
                (import "env" "missing" (global i32)))"#,
        ]);
        assert!(result.failed());
        let names = result
            .errors()
            .iter()
            .map(|error| match error {
                DecompileError::UnresolvedSymbol { name, .. } => &name[..],
                _ => "",
            })
            .collect::<Vec<_>>();
        assert_eq!(names, &["foo", "missing"]);
    }
}

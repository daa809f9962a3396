//! Decompilation of a single module.

use crate::backend::{self, Names};
use crate::config::DisasmConfig;
use crate::errors::DecompileError;
use crate::ir::Module;
use anyhow::Result;
use log::{debug, log_enabled, Level};

/// A parsed module, ready to be translated to C.
///
/// `decompile()` consumes the decompiler, so a module is translated at
/// most once, and its output can only be read from the result.
#[derive(Clone, Debug)]
pub struct Decompiler {
    config: DisasmConfig,
    module: Module,
    names: Names,
}

impl Decompiler {
    pub fn new(config: DisasmConfig, bytes: &[u8]) -> Result<Self> {
        Self::with_prefix(config, bytes, "")
    }

    /// Like `new()`, but every symbol that is neither imported nor
    /// exported is prefixed with `prefix`.
    pub fn with_prefix(config: DisasmConfig, bytes: &[u8], prefix: &str) -> Result<Self> {
        let module = Module::from_wasm_bytes(bytes, config.mode)?;
        debug!(
            "Parsed module: {} functions, {} globals, {} imports, {} exports",
            module.funcs.len(),
            module.globals.len(),
            module.imports.len(),
            module.exports.len()
        );
        let names = Names::compute(&module, prefix);
        Ok(Decompiler {
            config,
            module,
            names,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub(crate) fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }

    /// The initial linear memory, with data segments applied. Empty if
    /// the module has no memory.
    pub fn dump_memory(&self) -> Vec<u8> {
        self.module
            .memories
            .values()
            .next()
            .map(|memory| memory.image())
            .unwrap_or_default()
    }

    /// The initial indirect-call table, one little-endian `u32`
    /// function index per element. Empty if the module has no table.
    pub fn dump_table(&self) -> Vec<u8> {
        self.module
            .tables
            .values()
            .next()
            .map(|table| table.image())
            .unwrap_or_default()
    }

    pub fn decompile(self) -> Decompiled {
        if self.config.debug && log_enabled!(Level::Debug) {
            debug!("{}", self.module.display());
        }
        let compiled = backend::compile(&self.module, &self.names, self.config.extra_info);
        if compiled.errors.is_empty() {
            Decompiled::Succeeded {
                code: compiled.code,
            }
        } else {
            debug!("Decompilation failed with {} errors", compiled.errors.len());
            Decompiled::Failed {
                code: compiled.code,
                errors: compiled.errors,
            }
        }
    }
}

/// The outcome of decompiling one module. A failed decompilation still
/// carries all the code that could be produced, with placeholders for
/// what could not.
#[derive(Clone, Debug)]
pub enum Decompiled {
    Succeeded {
        code: String,
    },
    Failed {
        code: String,
        errors: Vec<DecompileError>,
    },
}

impl Decompiled {
    pub fn code(&self) -> &str {
        match self {
            Decompiled::Succeeded { code } | Decompiled::Failed { code, .. } => code,
        }
    }

    pub fn into_code(self) -> String {
        match self {
            Decompiled::Succeeded { code } | Decompiled::Failed { code, .. } => code,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self, Decompiled::Failed { .. })
    }

    pub fn errors(&self) -> &[DecompileError] {
        match self {
            Decompiled::Succeeded { .. } => &[],
            Decompiled::Failed { errors, .. } => &errors[..],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DisasmMode;

    fn config() -> DisasmConfig {
        DisasmConfig {
            mode: DisasmMode::Wast,
            ..Default::default()
        }
    }

    #[test]
    fn succeeds_without_unsupported_nodes() {
        let decompiler = Decompiler::new(
            config(),
            br#"(module (func (export "add") (param i64 i64) (result i64)
                (i64.add (local.get 0) (local.get 1))))"#,
        )
        .unwrap();
        let result = decompiler.decompile();
        assert!(!result.failed());
        assert!(result.errors().is_empty());
        assert!(result.code().contains(
            "int64_t add(int64_t arg0, int64_t arg1) {\n  return (int64_t)((uint64_t)(arg0) + (uint64_t)(arg1));\n}\n"
        ));
    }

    #[test]
    fn failure_keeps_partial_output() {
        let decompiler = Decompiler::new(
            config(),
            br#"(module
                (table 1 funcref)
                (func (export "size") (result i32) (table.size 0))
                (func (export "one") (result i32) (i32.const 1)))"#,
        )
        .unwrap();
        let result = decompiler.decompile();
        assert!(result.failed());
        assert!(matches!(
            result.errors()[0],
            DecompileError::Unsupported { func: Some(0), .. }
        ));
        assert!(result.code().contains("int32_t one(void) {\n  return 1;\n}\n"));
    }

    #[test]
    fn dumps_without_decompiling() {
        let decompiler = Decompiler::new(
            config(),
            br#"(module (memory 2) (table 3 funcref)
                (data (i32.const 1) "\2a"))"#,
        )
        .unwrap();
        let memory = decompiler.dump_memory();
        assert_eq!(memory.len(), 2 * 65536);
        assert_eq!(memory[1], 0x2a);
        assert_eq!(decompiler.dump_table().len(), 3 * 4);

        let empty = Decompiler::new(config(), b"(module)").unwrap();
        assert!(empty.dump_memory().is_empty());
        assert!(empty.dump_table().is_empty());
    }
}

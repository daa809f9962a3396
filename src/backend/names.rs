//! C identifiers for module-level entities.

use crate::entity::{EntityRef, EntityVec};
use crate::ir::{ExportKind, Func, FuncDecl, Global, GlobalInit, ImportKind, Module};
use fxhash::{FxHashMap, FxHashSet};
use lazy_static::lazy_static;

lazy_static! {
    /// Keywords, and names the emitted code gets from the C headers it
    /// includes.
    static ref RESERVED: FxHashSet<&'static str> = [
        "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
        "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
        "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch",
        "typedef", "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex",
        "_Imaginary", "_Alignas", "_Alignof", "_Atomic", "_Generic", "_Noreturn",
        "_Static_assert", "_Thread_local", "bool", "true", "false", "NULL", "main",
        "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t",
        "uint64_t", "size_t", "abort", "exit", "calloc", "malloc", "realloc", "free",
        "memcpy", "memmove", "memset", "memcmp", "strlen", "abs", "labs", "fabs", "fabsf",
        "ceil", "ceilf", "floor", "floorf", "trunc", "truncf", "nearbyint", "nearbyintf",
        "sqrt", "sqrtf", "fmin", "fminf", "fmax", "fmaxf", "copysign", "copysignf", "sin",
        "cos", "tan", "exp", "log", "pow", "fmod", "errno",
    ]
    .iter()
    .copied()
    .collect();
}

fn is_reserved(ident: &str) -> bool {
    if RESERVED.contains(ident) || ident.starts_with("wasm_") {
        return true;
    }
    // Function-local names: a global with one of these names would be
    // shadowed inside function bodies.
    ["arg", "local", "tmp"].iter().any(|prefix| {
        ident.strip_prefix(prefix).map_or(false, |rest| {
            !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
        })
    })
}

/// Turn an arbitrary string into a valid C identifier that does not
/// clash with keywords, library names, or function-local names.
pub fn sanitize(name: &str) -> String {
    let mut ident = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_reserved(&ident) {
        ident.push('_');
    }
    ident
}

#[derive(Default)]
struct Allocator {
    used: FxHashSet<String>,
}

impl Allocator {
    fn claim(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Every module-level C symbol one module's output defines or refers
/// to.
///
/// Exported entities are named after their export, imports after
/// `<module>_<field>`; both are left unprefixed since they are the
/// module's external interface. Everything else carries the module
/// prefix so several modules can share one translation unit.
#[derive(Clone, Debug)]
pub struct Names {
    pub funcs: EntityVec<Func, String>,
    pub globals: EntityVec<Global, String>,
    pub memory: String,
    pub memory_pages: String,
    pub memory_grow: String,
    pub table: String,
    pub init: String,
    /// One array per data segment of memory 0, in segment order.
    pub data_segments: Vec<String>,
    /// Memory 0 is imported and another module defines it under the
    /// `memory*` symbols.
    pub external_memory: bool,
    /// Table 0 is imported and another module defines it as `table`.
    pub external_table: bool,
}

impl Names {
    pub fn compute(module: &Module, prefix: &str) -> Names {
        let mut alloc = Allocator::default();
        let internal = |base: &str| sanitize(&format!("{}{}", prefix, base));

        let memory = alloc.claim(internal("memory"));
        let memory_pages = alloc.claim(internal("memory_pages"));
        let memory_grow = alloc.claim(internal("memory_grow"));
        let table = alloc.claim(internal("table"));
        let init = alloc.claim(internal("init"));
        let segment_count = module
            .memories
            .values()
            .next()
            .map_or(0, |memory| memory.segments.len());
        let data_segments = (0..segment_count)
            .map(|i| alloc.claim(internal(&format!("data_segment_{}", i))))
            .collect();

        let mut func_names: FxHashMap<Func, String> = FxHashMap::default();
        let mut global_names: FxHashMap<Global, String> = FxHashMap::default();

        for import in &module.imports {
            let name = sanitize(&format!("{}_{}", import.module, import.name));
            match import.kind {
                ImportKind::Func(func) if !func_names.contains_key(&func) => {
                    func_names.insert(func, alloc.claim(name));
                }
                ImportKind::Global(global) if !global_names.contains_key(&global) => {
                    global_names.insert(global, alloc.claim(name));
                }
                _ => {}
            }
        }
        for export in &module.exports {
            match export.kind {
                ExportKind::Func(func) if !func_names.contains_key(&func) => {
                    func_names.insert(func, alloc.claim(sanitize(&export.name)));
                }
                ExportKind::Global(global) if !global_names.contains_key(&global) => {
                    global_names.insert(global, alloc.claim(sanitize(&export.name)));
                }
                _ => {}
            }
        }

        let mut funcs = EntityVec::default();
        for (func, decl) in module.funcs.entries() {
            let name = match func_names.remove(&func) {
                Some(name) => name,
                None => match decl {
                    FuncDecl::Body(_, name, _) if !name.is_empty() => alloc.claim(internal(name)),
                    _ => alloc.claim(internal(&format!("fn_{}", func.index()))),
                },
            };
            funcs.push(name);
        }

        let mut globals = EntityVec::default();
        for (global, data) in module.globals.entries() {
            let name = match global_names.remove(&global) {
                Some(name) => name,
                None => {
                    debug_assert!(data.init != GlobalInit::Import);
                    alloc.claim(internal(&format!("global_{}", global.index())))
                }
            };
            globals.push(name);
        }

        Names {
            funcs,
            globals,
            memory,
            memory_pages,
            memory_grow,
            table,
            init,
            data_segments,
            external_memory: false,
            external_table: false,
        }
    }

    pub fn func(&self, func: Func) -> Option<&str> {
        self.funcs.get(func).map(|name| &name[..])
    }

    pub fn global(&self, global: Global) -> Option<&str> {
        self.globals.get(global).map(|name| &name[..])
    }

    /// Point an imported function at the symbol another module
    /// defines for it.
    pub fn resolve_func(&mut self, func: Func, symbol: String) {
        if let Some(name) = self.funcs.get_mut(func) {
            *name = symbol;
        }
    }

    /// Point an imported global at the symbol another module defines
    /// for it.
    pub fn resolve_global(&mut self, global: Global, symbol: String) {
        if let Some(name) = self.globals.get_mut(global) {
            *name = symbol;
        }
    }

    /// Use another module's memory state in place of this module's
    /// own.
    pub fn resolve_memory(&mut self, memory: String, pages: String, grow: String) {
        self.memory = memory;
        self.memory_pages = pages;
        self.memory_grow = grow;
        self.external_memory = true;
    }

    /// Use another module's table in place of this module's own.
    pub fn resolve_table(&mut self, table: String) {
        self.table = table;
        self.external_table = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DisasmMode;

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize("foo.bar-baz"), "foo_bar_baz");
        assert_eq!(sanitize("1up"), "_1up");
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("while"), "while_");
        assert_eq!(sanitize("wasm_clz32"), "wasm_clz32_");
        assert_eq!(sanitize("local12"), "local12_");
        assert_eq!(sanitize("locals"), "locals");
    }

    #[test]
    fn naming_priority_and_dedup() {
        let module = Module::from_wasm_bytes(
            br#"(module
                (import "env" "log" (func (param i32)))
                (global $g (mut i32) (i32.const 0))
                (func $helper)
                (func)
                (func (export "init"))
                (func (export "run") (export "also_run"))
                (export "counter" (global $g)))"#,
            DisasmMode::Wast,
        )
        .unwrap();

        let names = Names::compute(&module, "");
        assert_eq!(names.funcs.as_slice(), &["env_log", "helper", "fn_2", "init_1", "run"]);
        assert_eq!(names.global(Global::from(0)), Some("counter"));
        assert_eq!(names.init, "init");

        let prefixed = Names::compute(&module, "m1_");
        assert_eq!(
            prefixed.funcs.as_slice(),
            &["env_log", "m1_helper", "m1_fn_2", "init", "run"]
        );
        assert_eq!(prefixed.memory, "m1_memory");
        assert!(!prefixed.external_memory);
    }

    #[test]
    fn resolved_state_points_elsewhere() {
        let module = Module::from_wasm_bytes(
            br#"(module (import "a" "mem" (memory 1)) (import "a" "tbl" (table 1 funcref)))"#,
            DisasmMode::Wast,
        )
        .unwrap();
        let mut names = Names::compute(&module, "m1_");
        assert_eq!(names.table, "m1_table");
        names.resolve_memory(
            "m0_memory".to_owned(),
            "m0_memory_pages".to_owned(),
            "m0_memory_grow".to_owned(),
        );
        names.resolve_table("m0_table".to_owned());
        assert!(names.external_memory && names.external_table);
        assert_eq!(names.memory_grow, "m0_memory_grow");
        assert_eq!(names.table, "m0_table");
        // The module's own names stay claimed.
        assert_eq!(names.init, "m1_init");
    }
}

//! Backend: IR to C.

use crate::entity::EntityRef;
use crate::errors::DecompileError;
use crate::ir::{
    FuncDecl, GlobalInit, ImportKind, Literal, Memory, Module, Table, WASM_PAGE_SIZE,
};
use log::{debug, warn};
use rayon::prelude::*;
use std::fmt::Write;

pub mod function;
use function::{prototype, render_function, RenderedFunction};
pub mod localify;
pub mod lower;
use lower::{is_constant_expression, literal};
pub mod names;
pub use names::Names;
pub mod prelude;

/// Largest memory, in pages, that `memory_grow` will allow.
const MAX_PAGES: usize = 65536;

/// The C translation of one module.
#[derive(Clone, Debug, Default)]
pub struct CompiledModule {
    pub code: String,
    pub errors: Vec<DecompileError>,
}

struct ModuleWriter<'a> {
    module: &'a Module,
    names: &'a Names,
    out: String,
    errors: Vec<DecompileError>,
    /// Statements for the module's `init` function.
    init: Vec<String>,
}

/// Translate `module` to C, using `names` for every module-level
/// symbol. Problems are collected in the result rather than stopping
/// translation.
pub fn compile(module: &Module, names: &Names, extra_info: bool) -> CompiledModule {
    let mut writer = ModuleWriter {
        module,
        names,
        out: String::new(),
        errors: vec![],
        init: vec![],
    };
    writer.out.push_str(prelude::PRELUDE);
    writer.out.push('\n');

    writer.memory();
    writer.table();
    writer.globals();
    writer.prototypes();

    let bodies = module
        .funcs
        .entries()
        .filter_map(|(func, decl)| decl.body().map(|body| (func, decl, body)))
        .collect::<Vec<_>>()
        .par_iter()
        .map(|&(func, decl, body)| {
            debug!("Decompiling {} \"{}\"", func, decl.name());
            render_function(module, names, func, body, extra_info)
        })
        .collect::<Vec<RenderedFunction>>();
    for body in bodies {
        writer.out.push('\n');
        writer.out.push_str(&body.code);
        writer.errors.extend(body.errors);
    }

    writer.init_function();
    CompiledModule {
        code: writer.out,
        errors: writer.errors,
    }
}

/// Exported state is visible to other modules; everything else stays
/// private to the module.
fn linkage(exported: bool) -> &'static str {
    if exported {
        ""
    } else {
        "static "
    }
}

impl<'a> ModuleWriter<'a> {
    fn unsupported(&mut self, what: String) {
        warn!("unsupported: {}", what);
        let _ = writeln!(self.out, "/* unsupported: {} */", what);
        self.errors.push(DecompileError::Unsupported { func: None, what });
    }

    fn memory(&mut self) {
        let module = self.module;
        let names = self.names;
        if module.memories.len() > 1 {
            self.unsupported(format!("{} memories", module.memories.len()));
        }
        let memory = match module.memories.values().next() {
            Some(memory) => memory,
            None => return,
        };
        let size = memory.initial_pages * WASM_PAGE_SIZE;
        if names.external_memory {
            let _ = writeln!(self.out, "extern uint8_t *{};", names.memory);
            let _ = writeln!(self.out, "extern uint32_t {};", names.memory_pages);
            let _ = writeln!(self.out, "extern int32_t {}(int32_t);", names.memory_grow);
        } else {
            if module
                .imports
                .iter()
                .any(|import| matches!(import.kind, ImportKind::Memory(mem) if mem.index() == 0))
            {
                warn!("imported memory is backed by a buffer local to the module");
            }
            let linkage = linkage(module.memory_exports(Memory::new(0)).next().is_some());
            let _ = writeln!(self.out, "{}uint8_t *{};", linkage, names.memory);
            let _ = writeln!(self.out, "{}uint32_t {};", linkage, names.memory_pages);
            self.init.push(format!(
                "{} = (uint8_t *)calloc((size_t){}u * {}u + 1, 1);",
                names.memory, memory.initial_pages, WASM_PAGE_SIZE
            ));
            self.init.push(format!(
                "{} = {}u;",
                names.memory_pages, memory.initial_pages
            ));
        }

        for (segment, name) in memory.segments.iter().zip(names.data_segments.iter()) {
            if segment.data.is_empty() {
                continue;
            }
            if segment.offset >= size {
                warn!("data segment at {} lies outside the initial memory", segment.offset);
                continue;
            }
            let len = std::cmp::min(segment.data.len(), size - segment.offset);
            let _ = writeln!(self.out, "static const uint8_t {}[{}] = {{", name, len);
            for chunk in segment.data[..len].chunks(16) {
                let bytes = chunk
                    .iter()
                    .map(|b| format!("0x{:02x}", b))
                    .collect::<Vec<_>>();
                let _ = writeln!(self.out, "  {},", bytes.join(", "));
            }
            let _ = writeln!(self.out, "}};");
            self.init.push(format!(
                "memcpy({} + {}u, {}, {}u);",
                names.memory, segment.offset, name, len
            ));
        }

        if names.external_memory {
            self.out.push('\n');
            return;
        }
        let max_pages = memory
            .maximum_pages
            .map_or(MAX_PAGES, |max| max.min(MAX_PAGES));
        let _ = write!(
            self.out,
            r#"
{linkage}int32_t {grow}(int32_t delta) {{
  uint32_t old_pages = {pages};
  uint64_t new_pages = (uint64_t)old_pages + (uint32_t)delta;
  uint8_t *grown;
  if (delta == 0) {{
    return (int32_t)old_pages;
  }}
  if (new_pages > {max}u) {{
    return -1;
  }}
  grown = (uint8_t *)realloc({memory}, (size_t)new_pages * {page}u);
  if (grown == NULL) {{
    return -1;
  }}
  memset(grown + (size_t)old_pages * {page}u, 0, (size_t)(new_pages - old_pages) * {page}u);
  {memory} = grown;
  {pages} = (uint32_t)new_pages;
  return (int32_t)old_pages;
}}

"#,
            linkage = linkage(module.memory_exports(Memory::new(0)).next().is_some()),
            grow = names.memory_grow,
            pages = names.memory_pages,
            memory = names.memory,
            max = max_pages,
            page = WASM_PAGE_SIZE,
        );
    }

    fn table(&mut self) {
        let module = self.module;
        let names = self.names;
        if module.tables.len() > 1 {
            self.unsupported(format!("{} tables", module.tables.len()));
        }
        let table = match module.tables.values().next() {
            Some(table) => table,
            None => return,
        };
        let size = std::cmp::max(table.initial, 1);
        if names.external_table {
            let _ = writeln!(self.out, "extern wasm_funcref {}[];", names.table);
        } else {
            let linkage = linkage(module.table_exports(Table::new(0)).next().is_some());
            let _ = writeln!(self.out, "{}wasm_funcref {}[{}];", linkage, names.table, size);
        }
        for (i, &func) in table.func_elements.iter().enumerate() {
            if func.is_invalid() || i as u64 >= size {
                continue;
            }
            let renderable = module
                .func_signature(func)
                .and_then(|sig| prototype(sig, ""))
                .is_some();
            match names.func(func) {
                Some(name) if renderable => self
                    .init
                    .push(format!("{}[{}] = (wasm_funcref){};", names.table, i, name)),
                Some(_) => {}
                None => {
                    warn!("table element {} refers to missing {}", i, func);
                    self.errors.push(DecompileError::MalformedIndex {
                        func: None,
                        what: format!("table element {} refers to {}", i, func),
                    });
                }
            }
        }
        self.out.push('\n');
    }

    fn globals(&mut self) {
        let module = self.module;
        let names = self.names;
        for (global, data) in module.globals.entries() {
            let name = match names.global(global) {
                Some(name) => name,
                None => continue,
            };
            let c_ty = match localify::c_type(data.ty) {
                Some(c_ty) => c_ty,
                None => {
                    self.unsupported(format!("{} of type {}", global, data.ty));
                    continue;
                }
            };
            let linkage = linkage(module.global_exports(global).next().is_some());
            match data.init {
                GlobalInit::Import => {
                    let _ = writeln!(self.out, "extern {} {};", c_ty, name);
                }
                GlobalInit::Const(bits) => {
                    let value = Literal::from_bits(data.ty, bits);
                    match value {
                        Some(value) if is_constant_expression(value) => {
                            let _ = writeln!(
                                self.out,
                                "{}{} {} = {};",
                                linkage,
                                c_ty,
                                name,
                                literal(value)
                            );
                        }
                        Some(value) => {
                            let _ = writeln!(self.out, "{}{} {};", linkage, c_ty, name);
                            self.init.push(format!("{} = {};", name, literal(value)));
                        }
                        None => {}
                    }
                }
                GlobalInit::Global(from) => {
                    let _ = writeln!(self.out, "{}{} {};", linkage, c_ty, name);
                    match names.global(from) {
                        Some(from_name) => self.init.push(format!("{} = {};", name, from_name)),
                        None => self.errors.push(DecompileError::MalformedIndex {
                            func: None,
                            what: format!("initializer of {} reads {}", global, from),
                        }),
                    }
                }
            }
        }
        if !module.globals.is_empty() {
            self.out.push('\n');
        }
    }

    fn prototypes(&mut self) {
        let module = self.module;
        let names = self.names;
        for (func, decl) in module.funcs.entries() {
            let (sig, name) = match (module.func_signature(func), names.func(func)) {
                (Some(sig), Some(name)) => (sig, name),
                _ => continue,
            };
            let proto = match prototype(sig, name) {
                Some(proto) => proto,
                None => continue,
            };
            let linkage = match decl {
                FuncDecl::Import(..) => "extern ",
                FuncDecl::Body(..) if module.func_exports(func).next().is_some() => "",
                FuncDecl::Body(..) => "static ",
            };
            let _ = writeln!(self.out, "{}{};", linkage, proto);
        }
    }

    /// `init` sets up memory, table and globals, then runs the start
    /// function. It must run before anything else in the module.
    fn init_function(&mut self) {
        let module = self.module;
        let names = self.names;
        if let Some(start) = module.start_func {
            match names.func(start) {
                Some(name) => self.init.push(format!("{}();", name)),
                None => self.errors.push(DecompileError::MalformedIndex {
                    func: None,
                    what: format!("start function {}", start),
                }),
            }
        }
        let _ = writeln!(self.out, "\nvoid {}(void) {{", names.init);
        for statement in &self.init {
            let _ = writeln!(self.out, "  {}", statement);
        }
        let _ = writeln!(self.out, "}}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DisasmMode;

    fn compile_wat(wat: &str) -> CompiledModule {
        let module = Module::from_wasm_bytes(wat.as_bytes(), DisasmMode::Wast).unwrap();
        let names = Names::compute(&module, "");
        compile(&module, &names, false)
    }

    #[test]
    fn module_state_and_init() {
        let compiled = compile_wat(
            r#"(module
                (import "env" "tick" (func $tick))
                (memory 1 2)
                (table 2 funcref)
                (global $g (mut i32) (i32.const -4))
                (global (export "limit") f64 (f64.const 2.5))
                (data (i32.const 8) "abc")
                (elem (i32.const 1) $run)
                (func $run (call $tick))
                (start $run))"#,
        );
        assert!(compiled.errors.is_empty());
        let code = &compiled.code;
        assert!(code.starts_with("#ifndef WASMDEC_RUNTIME"));
        assert!(code.contains("static uint8_t *memory;\n"));
        assert!(code.contains("static const uint8_t data_segment_0[3] = {\n  0x61, 0x62, 0x63,\n};\n"));
        assert!(code.contains("if (new_pages > 2u) {"));
        assert!(code.contains("static wasm_funcref table[2];\n"));
        assert!(code.contains("static int32_t global_0 = -4;\n"));
        assert!(code.contains("double limit = 2.5;\n"));
        assert!(code.contains("extern void env_tick(void);\n"));
        assert!(code.contains("static void run(void);\n"));
        assert!(code.contains("static void run(void) {\n  env_tick();\n}\n"));
        assert!(code.contains(
            "void init(void) {\n  memory = (uint8_t *)calloc((size_t)1u * 65536u + 1, 1);\n  memory_pages = 1u;\n  memcpy(memory + 8u, data_segment_0, 3u);\n  table[1] = (wasm_funcref)run;\n  run();\n}\n"
        ));
    }

    #[test]
    fn exported_state_is_not_static() {
        let compiled = compile_wat(
            r#"(module
                (memory (export "mem") 1)
                (table (export "tbl") 1 funcref))"#,
        );
        assert!(compiled.errors.is_empty());
        let code = &compiled.code;
        assert!(code.contains("\nuint8_t *memory;\nuint32_t memory_pages;\n"));
        assert!(code.contains("\nint32_t memory_grow(int32_t delta) {\n"));
        assert!(code.contains("\nwasm_funcref table[1];\n"));
    }

    #[test]
    fn resolved_imports_use_external_state() {
        let module = Module::from_wasm_bytes(
            br#"(module
                (import "a" "mem" (memory 1))
                (import "a" "tbl" (table 2 funcref))
                (data (i32.const 4) "hi")
                (elem (i32.const 1) $f)
                (func $f))"#,
            DisasmMode::Wast,
        )
        .unwrap();
        let mut names = Names::compute(&module, "m1_");
        names.resolve_memory(
            "m0_memory".to_owned(),
            "m0_memory_pages".to_owned(),
            "m0_memory_grow".to_owned(),
        );
        names.resolve_table("m0_table".to_owned());
        let compiled = compile(&module, &names, false);
        assert!(compiled.errors.is_empty());
        let code = &compiled.code;
        assert!(code.contains(
            "extern uint8_t *m0_memory;\nextern uint32_t m0_memory_pages;\nextern int32_t m0_memory_grow(int32_t);\n"
        ));
        assert!(code.contains("extern wasm_funcref m0_table[];\n"));
        assert!(!code.contains("calloc"));
        assert!(!code.contains("int32_t m0_memory_grow(int32_t delta)"));
        assert!(code.contains(
            "void m1_init(void) {\n  memcpy(m0_memory + 4u, m1_data_segment_0, 2u);\n  m0_table[1] = (wasm_funcref)m1_f;\n}\n"
        ));
    }

    #[test]
    fn unrenderable_functions_fail_the_module() {
        let compiled = compile_wat(
            r#"(module
                (func (result i32)
                    (i32x4.extract_lane 0 (v128.const i64x2 1 2)))
                (func (export "ok") (result i32) (i32.const 1)))"#,
        );
        assert_eq!(compiled.errors.len(), 1);
        assert!(compiled.code.contains("int32_t ok(void) {\n  return 1;\n}\n"));
    }
}

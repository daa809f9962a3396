//! Rendering of whole C functions.

use super::localify::{c_type, LocalSlots};
use super::lower::lower_body;
use super::names::Names;
use crate::entity::EntityRef;
use crate::errors::DecompileError;
use crate::ir::{Func, FunctionBody, Module, SignatureData, Type};
use log::{debug, warn};

/// The C return type for a signature, if it has one.
fn return_type(sig: &SignatureData) -> Option<&'static str> {
    match sig.result()? {
        Type::None => Some("void"),
        ty => c_type(ty),
    }
}

/// `ret name(params)` for a prototype: parameter types only.
pub fn prototype(sig: &SignatureData, name: &str) -> Option<String> {
    let ret = return_type(sig)?;
    let params = sig
        .params
        .iter()
        .map(|&ty| c_type(ty))
        .collect::<Option<Vec<_>>>()?;
    let params = if params.is_empty() {
        "void".to_owned()
    } else {
        params.join(", ")
    };
    Some(format!("{} {}({})", ret, name, params))
}

#[derive(Clone, Debug, Default)]
pub struct RenderedFunction {
    pub code: String,
    pub errors: Vec<DecompileError>,
}

fn unsupported_function(func: Func, what: String) -> RenderedFunction {
    warn!("{}: unsupported: {}", func, what);
    RenderedFunction {
        code: format!("/* {}: unsupported: {} */\n", func, what),
        errors: vec![DecompileError::Unsupported {
            func: Some(func.index() as u32),
            what,
        }],
    }
}

/// Render the definition of `func`.
///
/// In `extra_info` mode the declarations are preceded by a count of
/// the locals, and every local is zero-initialized and tagged with its
/// Wasm index. Nothing else in the output depends on the mode.
pub fn render_function(
    module: &Module,
    names: &Names,
    func: Func,
    body: &FunctionBody,
    extra_info: bool,
) -> RenderedFunction {
    let (sig, name) = match (module.func_signature(func), names.func(func)) {
        (Some(sig), Some(name)) => (sig, name),
        _ => {
            return RenderedFunction {
                code: String::new(),
                errors: vec![DecompileError::MalformedIndex {
                    func: Some(func.index() as u32),
                    what: format!("signature of {}", func),
                }],
            }
        }
    };
    debug!("Rendering {} as \"{}\"", func, name);

    let ret = match return_type(sig) {
        Some(ret) => ret,
        None => return unsupported_function(func, format!("results {:?}", sig.returns)),
    };
    let slots = match LocalSlots::compute(body.n_params, body.locals.as_slice()) {
        Ok(slots) => slots,
        Err(ty) => return unsupported_function(func, format!("{} local", ty)),
    };

    let linkage = if module.func_exports(func).next().is_some() {
        ""
    } else {
        "static "
    };
    let params = if slots.params().is_empty() {
        "void".to_owned()
    } else {
        slots
            .params()
            .iter()
            .map(|slot| format!("{} {}", slot.c_type, slot.name))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let lowered = lower_body(module, names, func, body, &slots);

    let mut code = format!("{}{} {}({}) {{\n", linkage, ret, name, params);
    if extra_info {
        code += &format!(
            "  // Parsed {} WASM function locals\n",
            body.n_declared.saturating_sub(body.n_params)
        );
    }
    for (local, slot) in slots.vars() {
        if extra_info && body.is_declared(local) {
            code += &format!(
                "  {} {} = 0; // Local with index '{}'\n",
                slot.c_type,
                slot.name,
                local.index()
            );
        } else if extra_info {
            code += &format!("  {} {} = 0; // Spilled operand\n", slot.c_type, slot.name);
        } else {
            code += &format!("  {} {};\n", slot.c_type, slot.name);
        }
    }
    for (temp, c_ty) in &lowered.temps {
        code += &format!("  {} {};\n", c_ty, temp);
    }
    code += &lowered.body;
    code += "}\n";

    RenderedFunction {
        code,
        errors: lowered.errors,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DisasmMode;

    const WAT: &str = r#"(module
        (func (export "count") (param i32) (result i32) (local i32 i64)
            (local.set 1 (i32.add (local.get 1) (local.get 0)))
            (local.get 1)))"#;

    fn render(extra_info: bool) -> String {
        let module = Module::from_wasm_bytes(WAT.as_bytes(), DisasmMode::Wast).unwrap();
        let names = Names::compute(&module, "");
        let func = Func::from(0);
        let body = module.funcs[func].body().unwrap();
        let rendered = render_function(&module, &names, func, body, extra_info);
        assert!(rendered.errors.is_empty());
        rendered.code
    }

    #[test]
    fn plain_declarations() {
        assert_eq!(
            render(false),
            "int32_t count(int32_t arg0) {\n  int32_t local1;\n  int64_t local2;\n  local1 = (int32_t)((uint32_t)(local1) + (uint32_t)(arg0));\n  return local1;\n}\n"
        );
    }

    #[test]
    fn extra_info_only_touches_declarations() {
        let plain = render(false);
        let extra = render(true);
        assert!(extra.contains("  // Parsed 2 WASM function locals\n"));
        assert!(extra.contains("  int32_t local1 = 0; // Local with index '1'\n"));
        assert!(extra.contains("  int64_t local2 = 0; // Local with index '2'\n"));

        let statements = |code: &str| {
            code.lines()
                .filter(|line| !line.contains("//") && !line.trim_start().starts_with("int"))
                .map(|line| line.to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(statements(&plain), statements(&extra));
    }

    #[test]
    fn spilled_operands_are_not_counted_as_locals() {
        let module = Module::from_wasm_bytes(
            br#"(module
                (global $g (mut i32) (i32.const 0))
                (func (export "f") (param i32) (result i32) (local f64)
                    local.get 0
                    i32.const 1
                    global.set $g
                    i32.const 2
                    i32.add))"#,
            DisasmMode::Wast,
        )
        .unwrap();
        let names = Names::compute(&module, "");
        let func = Func::from(0);
        let body = module.funcs[func].body().unwrap();
        assert_eq!(body.locals.len(), 3);

        let rendered = render_function(&module, &names, func, body, true);
        assert!(rendered.errors.is_empty());
        let code = rendered.code;
        assert!(code.contains("  // Parsed 1 WASM function locals\n"));
        assert!(code.contains("  double local1 = 0; // Local with index '1'\n"));
        assert!(code.contains("  int32_t local2 = 0; // Spilled operand\n"));
        assert!(!code.contains("index '2'"));
    }

    #[test]
    fn prototypes() {
        let sig = SignatureData {
            params: vec![Type::I32, Type::F64],
            returns: vec![],
        };
        assert_eq!(
            prototype(&sig, "f").as_deref(),
            Some("void f(int32_t, double)")
        );
        let vector = SignatureData {
            params: vec![Type::V128],
            returns: vec![],
        };
        assert_eq!(prototype(&vector, "g"), None);
    }
}

//! Intermediate representation: a parsed module whose function bodies
//! are expression trees.

use crate::declare_entity;
use std::fmt::{Display, Formatter, Result as FmtResult};

mod display;
pub use display::*;
mod expr;
pub use expr::*;
mod func;
pub use func::*;
mod module;
pub use module::*;

declare_entity!(Signature, "sig");
declare_entity!(Func, "func");
declare_entity!(Global, "global");
declare_entity!(Table, "table");
declare_entity!(Memory, "memory");
declare_entity!(Local, "local");

/// A Wasm value type, or `None` for expressions that produce no
/// value. `V128` and `Ref` are carried so that signatures mentioning
/// them can be parsed; they have no C rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    None,
    I32,
    I64,
    F32,
    F64,
    V128,
    Ref,
}

impl Type {
    /// Does an expression of this type leave a value behind?
    pub fn is_value(self) -> bool {
        self != Type::None
    }

    /// Is this one of the four numeric types the decompiler renders?
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::I32 | Type::I64 | Type::F32 | Type::F64)
    }
}

impl From<wasmparser::ValType> for Type {
    fn from(ty: wasmparser::ValType) -> Self {
        match ty {
            wasmparser::ValType::I32 => Type::I32,
            wasmparser::ValType::I64 => Type::I64,
            wasmparser::ValType::F32 => Type::F32,
            wasmparser::ValType::F64 => Type::F64,
            wasmparser::ValType::V128 => Type::V128,
            wasmparser::ValType::Ref(_) => Type::Ref,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let name = match self {
            Type::None => "none",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "f32",
            Type::F64 => "f64",
            Type::V128 => "v128",
            Type::Ref => "ref",
        };
        f.write_str(name)
    }
}

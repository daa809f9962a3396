//! Numeric operators.
//!
//! Variant names match `wasmparser::Operator` so that the frontend can
//! map operators one-to-one.

use crate::ir::Type;

macro_rules! unary_ops {
    ($($name:ident: $arg:ident -> $res:ident = $text:literal;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum UnaryOp {
            $($name,)*
        }

        impl UnaryOp {
            pub fn from_wasm(op: &wasmparser::Operator<'_>) -> Option<UnaryOp> {
                match op {
                    $(wasmparser::Operator::$name => Some(UnaryOp::$name),)*
                    _ => None,
                }
            }

            pub fn operand_ty(self) -> Type {
                match self {
                    $(UnaryOp::$name => Type::$arg,)*
                }
            }

            pub fn result_ty(self) -> Type {
                match self {
                    $(UnaryOp::$name => Type::$res,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(UnaryOp::$name => $text,)*
                }
            }
        }
    };
}

macro_rules! binary_ops {
    ($($name:ident: $arg:ident -> $res:ident = $text:literal;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum BinaryOp {
            $($name,)*
        }

        impl BinaryOp {
            pub fn from_wasm(op: &wasmparser::Operator<'_>) -> Option<BinaryOp> {
                match op {
                    $(wasmparser::Operator::$name => Some(BinaryOp::$name),)*
                    _ => None,
                }
            }

            /// Type of both operands.
            pub fn operand_ty(self) -> Type {
                match self {
                    $(BinaryOp::$name => Type::$arg,)*
                }
            }

            pub fn result_ty(self) -> Type {
                match self {
                    $(BinaryOp::$name => Type::$res,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(BinaryOp::$name => $text,)*
                }
            }
        }
    };
}

unary_ops! {
    I32Eqz: I32 -> I32 = "i32.eqz";
    I64Eqz: I64 -> I32 = "i64.eqz";
    I32Clz: I32 -> I32 = "i32.clz";
    I32Ctz: I32 -> I32 = "i32.ctz";
    I32Popcnt: I32 -> I32 = "i32.popcnt";
    I64Clz: I64 -> I64 = "i64.clz";
    I64Ctz: I64 -> I64 = "i64.ctz";
    I64Popcnt: I64 -> I64 = "i64.popcnt";

    F32Abs: F32 -> F32 = "f32.abs";
    F32Neg: F32 -> F32 = "f32.neg";
    F32Ceil: F32 -> F32 = "f32.ceil";
    F32Floor: F32 -> F32 = "f32.floor";
    F32Trunc: F32 -> F32 = "f32.trunc";
    F32Nearest: F32 -> F32 = "f32.nearest";
    F32Sqrt: F32 -> F32 = "f32.sqrt";
    F64Abs: F64 -> F64 = "f64.abs";
    F64Neg: F64 -> F64 = "f64.neg";
    F64Ceil: F64 -> F64 = "f64.ceil";
    F64Floor: F64 -> F64 = "f64.floor";
    F64Trunc: F64 -> F64 = "f64.trunc";
    F64Nearest: F64 -> F64 = "f64.nearest";
    F64Sqrt: F64 -> F64 = "f64.sqrt";

    I32WrapI64: I64 -> I32 = "i32.wrap_i64";
    I64ExtendI32S: I32 -> I64 = "i64.extend_i32_s";
    I64ExtendI32U: I32 -> I64 = "i64.extend_i32_u";
    I32TruncF32S: F32 -> I32 = "i32.trunc_f32_s";
    I32TruncF32U: F32 -> I32 = "i32.trunc_f32_u";
    I32TruncF64S: F64 -> I32 = "i32.trunc_f64_s";
    I32TruncF64U: F64 -> I32 = "i32.trunc_f64_u";
    I64TruncF32S: F32 -> I64 = "i64.trunc_f32_s";
    I64TruncF32U: F32 -> I64 = "i64.trunc_f32_u";
    I64TruncF64S: F64 -> I64 = "i64.trunc_f64_s";
    I64TruncF64U: F64 -> I64 = "i64.trunc_f64_u";
    I32TruncSatF32S: F32 -> I32 = "i32.trunc_sat_f32_s";
    I32TruncSatF32U: F32 -> I32 = "i32.trunc_sat_f32_u";
    I32TruncSatF64S: F64 -> I32 = "i32.trunc_sat_f64_s";
    I32TruncSatF64U: F64 -> I32 = "i32.trunc_sat_f64_u";
    I64TruncSatF32S: F32 -> I64 = "i64.trunc_sat_f32_s";
    I64TruncSatF32U: F32 -> I64 = "i64.trunc_sat_f32_u";
    I64TruncSatF64S: F64 -> I64 = "i64.trunc_sat_f64_s";
    I64TruncSatF64U: F64 -> I64 = "i64.trunc_sat_f64_u";
    F32ConvertI32S: I32 -> F32 = "f32.convert_i32_s";
    F32ConvertI32U: I32 -> F32 = "f32.convert_i32_u";
    F32ConvertI64S: I64 -> F32 = "f32.convert_i64_s";
    F32ConvertI64U: I64 -> F32 = "f32.convert_i64_u";
    F32DemoteF64: F64 -> F32 = "f32.demote_f64";
    F64ConvertI32S: I32 -> F64 = "f64.convert_i32_s";
    F64ConvertI32U: I32 -> F64 = "f64.convert_i32_u";
    F64ConvertI64S: I64 -> F64 = "f64.convert_i64_s";
    F64ConvertI64U: I64 -> F64 = "f64.convert_i64_u";
    F64PromoteF32: F32 -> F64 = "f64.promote_f32";
    I32ReinterpretF32: F32 -> I32 = "i32.reinterpret_f32";
    I64ReinterpretF64: F64 -> I64 = "i64.reinterpret_f64";
    F32ReinterpretI32: I32 -> F32 = "f32.reinterpret_i32";
    F64ReinterpretI64: I64 -> F64 = "f64.reinterpret_i64";
    I32Extend8S: I32 -> I32 = "i32.extend8_s";
    I32Extend16S: I32 -> I32 = "i32.extend16_s";
    I64Extend8S: I64 -> I64 = "i64.extend8_s";
    I64Extend16S: I64 -> I64 = "i64.extend16_s";
    I64Extend32S: I64 -> I64 = "i64.extend32_s";
}

binary_ops! {
    I32Eq: I32 -> I32 = "i32.eq";
    I32Ne: I32 -> I32 = "i32.ne";
    I32LtS: I32 -> I32 = "i32.lt_s";
    I32LtU: I32 -> I32 = "i32.lt_u";
    I32GtS: I32 -> I32 = "i32.gt_s";
    I32GtU: I32 -> I32 = "i32.gt_u";
    I32LeS: I32 -> I32 = "i32.le_s";
    I32LeU: I32 -> I32 = "i32.le_u";
    I32GeS: I32 -> I32 = "i32.ge_s";
    I32GeU: I32 -> I32 = "i32.ge_u";
    I64Eq: I64 -> I32 = "i64.eq";
    I64Ne: I64 -> I32 = "i64.ne";
    I64LtS: I64 -> I32 = "i64.lt_s";
    I64LtU: I64 -> I32 = "i64.lt_u";
    I64GtS: I64 -> I32 = "i64.gt_s";
    I64GtU: I64 -> I32 = "i64.gt_u";
    I64LeS: I64 -> I32 = "i64.le_s";
    I64LeU: I64 -> I32 = "i64.le_u";
    I64GeS: I64 -> I32 = "i64.ge_s";
    I64GeU: I64 -> I32 = "i64.ge_u";
    F32Eq: F32 -> I32 = "f32.eq";
    F32Ne: F32 -> I32 = "f32.ne";
    F32Lt: F32 -> I32 = "f32.lt";
    F32Gt: F32 -> I32 = "f32.gt";
    F32Le: F32 -> I32 = "f32.le";
    F32Ge: F32 -> I32 = "f32.ge";
    F64Eq: F64 -> I32 = "f64.eq";
    F64Ne: F64 -> I32 = "f64.ne";
    F64Lt: F64 -> I32 = "f64.lt";
    F64Gt: F64 -> I32 = "f64.gt";
    F64Le: F64 -> I32 = "f64.le";
    F64Ge: F64 -> I32 = "f64.ge";

    I32Add: I32 -> I32 = "i32.add";
    I32Sub: I32 -> I32 = "i32.sub";
    I32Mul: I32 -> I32 = "i32.mul";
    I32DivS: I32 -> I32 = "i32.div_s";
    I32DivU: I32 -> I32 = "i32.div_u";
    I32RemS: I32 -> I32 = "i32.rem_s";
    I32RemU: I32 -> I32 = "i32.rem_u";
    I32And: I32 -> I32 = "i32.and";
    I32Or: I32 -> I32 = "i32.or";
    I32Xor: I32 -> I32 = "i32.xor";
    I32Shl: I32 -> I32 = "i32.shl";
    I32ShrS: I32 -> I32 = "i32.shr_s";
    I32ShrU: I32 -> I32 = "i32.shr_u";
    I32Rotl: I32 -> I32 = "i32.rotl";
    I32Rotr: I32 -> I32 = "i32.rotr";
    I64Add: I64 -> I64 = "i64.add";
    I64Sub: I64 -> I64 = "i64.sub";
    I64Mul: I64 -> I64 = "i64.mul";
    I64DivS: I64 -> I64 = "i64.div_s";
    I64DivU: I64 -> I64 = "i64.div_u";
    I64RemS: I64 -> I64 = "i64.rem_s";
    I64RemU: I64 -> I64 = "i64.rem_u";
    I64And: I64 -> I64 = "i64.and";
    I64Or: I64 -> I64 = "i64.or";
    I64Xor: I64 -> I64 = "i64.xor";
    I64Shl: I64 -> I64 = "i64.shl";
    I64ShrS: I64 -> I64 = "i64.shr_s";
    I64ShrU: I64 -> I64 = "i64.shr_u";
    I64Rotl: I64 -> I64 = "i64.rotl";
    I64Rotr: I64 -> I64 = "i64.rotr";

    F32Add: F32 -> F32 = "f32.add";
    F32Sub: F32 -> F32 = "f32.sub";
    F32Mul: F32 -> F32 = "f32.mul";
    F32Div: F32 -> F32 = "f32.div";
    F32Min: F32 -> F32 = "f32.min";
    F32Max: F32 -> F32 = "f32.max";
    F32Copysign: F32 -> F32 = "f32.copysign";
    F64Add: F64 -> F64 = "f64.add";
    F64Sub: F64 -> F64 = "f64.sub";
    F64Mul: F64 -> F64 = "f64.mul";
    F64Div: F64 -> F64 = "f64.div";
    F64Min: F64 -> F64 = "f64.min";
    F64Max: F64 -> F64 = "f64.max";
    F64Copysign: F64 -> F64 = "f64.copysign";
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[test]
fn op_types() {
    assert_eq!(BinaryOp::I64LtU.operand_ty(), Type::I64);
    assert_eq!(BinaryOp::I64LtU.result_ty(), Type::I32);
    assert_eq!(UnaryOp::F64PromoteF32.operand_ty(), Type::F32);
    assert_eq!(
        UnaryOp::from_wasm(&wasmparser::Operator::I32Popcnt),
        Some(UnaryOp::I32Popcnt)
    );
    assert_eq!(BinaryOp::from_wasm(&wasmparser::Operator::Nop), None);
}

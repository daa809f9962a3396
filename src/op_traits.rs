//! Metadata on operators.

use crate::ir::{MemAccess, Memory, Type};
use wasmparser::{MemArg, Operator};

/// A memory access operator, decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemOp {
    Load(MemAccess),
    Store(MemAccess),
}

fn access(memarg: &MemArg, bytes: u8, signed: bool, ty: Type) -> MemAccess {
    MemAccess {
        mem: Memory::from(memarg.memory),
        bytes,
        signed,
        offset: memarg.offset,
        ty,
    }
}

/// Decode a load or store operator into its access width, extension
/// and value type.
pub fn mem_op(op: &Operator<'_>) -> Option<MemOp> {
    use MemOp::{Load, Store};
    Some(match op {
        Operator::I32Load { memarg } => Load(access(memarg, 4, false, Type::I32)),
        Operator::I64Load { memarg } => Load(access(memarg, 8, false, Type::I64)),
        Operator::F32Load { memarg } => Load(access(memarg, 4, false, Type::F32)),
        Operator::F64Load { memarg } => Load(access(memarg, 8, false, Type::F64)),
        Operator::I32Load8S { memarg } => Load(access(memarg, 1, true, Type::I32)),
        Operator::I32Load8U { memarg } => Load(access(memarg, 1, false, Type::I32)),
        Operator::I32Load16S { memarg } => Load(access(memarg, 2, true, Type::I32)),
        Operator::I32Load16U { memarg } => Load(access(memarg, 2, false, Type::I32)),
        Operator::I64Load8S { memarg } => Load(access(memarg, 1, true, Type::I64)),
        Operator::I64Load8U { memarg } => Load(access(memarg, 1, false, Type::I64)),
        Operator::I64Load16S { memarg } => Load(access(memarg, 2, true, Type::I64)),
        Operator::I64Load16U { memarg } => Load(access(memarg, 2, false, Type::I64)),
        Operator::I64Load32S { memarg } => Load(access(memarg, 4, true, Type::I64)),
        Operator::I64Load32U { memarg } => Load(access(memarg, 4, false, Type::I64)),

        Operator::I32Store { memarg } => Store(access(memarg, 4, false, Type::I32)),
        Operator::I64Store { memarg } => Store(access(memarg, 8, false, Type::I64)),
        Operator::F32Store { memarg } => Store(access(memarg, 4, false, Type::F32)),
        Operator::F64Store { memarg } => Store(access(memarg, 8, false, Type::F64)),
        Operator::I32Store8 { memarg } => Store(access(memarg, 1, false, Type::I32)),
        Operator::I32Store16 { memarg } => Store(access(memarg, 2, false, Type::I32)),
        Operator::I64Store8 { memarg } => Store(access(memarg, 1, false, Type::I64)),
        Operator::I64Store16 { memarg } => Store(access(memarg, 2, false, Type::I64)),
        Operator::I64Store32 { memarg } => Store(access(memarg, 4, false, Type::I64)),
        _ => return None,
    })
}

/// Stack effect (operand types, result type) of operators that are
/// understood well enough to keep the operand stack consistent but
/// have no C rendering. They become `Unsupported` nodes holding their
/// operands.
pub fn opaque_op_effect(op: &Operator<'_>) -> Option<(&'static str, Vec<Type>, Type)> {
    Some(match op {
        Operator::RefNull { .. } => ("ref.null", vec![], Type::Ref),
        Operator::RefIsNull => ("ref.is_null", vec![Type::Ref], Type::I32),
        Operator::RefFunc { .. } => ("ref.func", vec![], Type::Ref),
        Operator::TableGet { .. } => ("table.get", vec![Type::I32], Type::Ref),
        Operator::TableSet { .. } => ("table.set", vec![Type::I32, Type::Ref], Type::None),
        Operator::TableSize { .. } => ("table.size", vec![], Type::I32),
        Operator::TableGrow { .. } => ("table.grow", vec![Type::Ref, Type::I32], Type::I32),
        Operator::TableFill { .. } => (
            "table.fill",
            vec![Type::I32, Type::Ref, Type::I32],
            Type::None,
        ),
        Operator::TableCopy { .. } => (
            "table.copy",
            vec![Type::I32, Type::I32, Type::I32],
            Type::None,
        ),
        Operator::TableInit { .. } => (
            "table.init",
            vec![Type::I32, Type::I32, Type::I32],
            Type::None,
        ),
        Operator::ElemDrop { .. } => ("elem.drop", vec![], Type::None),
        Operator::MemoryInit { .. } => (
            "memory.init",
            vec![Type::I32, Type::I32, Type::I32],
            Type::None,
        ),
        Operator::DataDrop { .. } => ("data.drop", vec![], Type::None),
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn narrow_loads_extend() {
        let memarg = MemArg {
            align: 0,
            max_align: 0,
            offset: 12,
            memory: 0,
        };
        match mem_op(&Operator::I64Load16S { memarg }) {
            Some(MemOp::Load(access)) => {
                assert_eq!(access.bytes, 2);
                assert!(access.signed);
                assert_eq!(access.offset, 12);
                assert_eq!(access.ty, Type::I64);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(mem_op(&Operator::Nop).is_none());
    }
}

//! Expression trees for function bodies.

use super::{Func, Global, Local, Memory, Signature, Table, Type};
use crate::ops::{BinaryOp, UnaryOp};

/// One node of a function body. Every node owns its children; there
/// is no sharing between subtrees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    /// The value type this node produces, `Type::None` if it produces
    /// nothing (statements, and nodes that never fall through).
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Nop,
    /// A labeled sequence; branches to it jump to its end.
    Block { body: Vec<Expr> },
    /// A labeled sequence; branches to it jump to its start.
    Loop { body: Vec<Expr> },
    /// A labeled conditional; branches to it jump to its end.
    If {
        cond: Box<Expr>,
        if_true: Vec<Expr>,
        if_false: Vec<Expr>,
    },
    /// Unconditional branch to the label `depth` levels out.
    Br {
        depth: u32,
        value: Option<Box<Expr>>,
    },
    /// Conditional branch. When a value is carried and the branch is
    /// not taken, the value flows through as this node's result.
    BrIf {
        depth: u32,
        cond: Box<Expr>,
        value: Option<Box<Expr>>,
    },
    /// Indexed branch over a list of depths.
    BrTable {
        targets: Vec<u32>,
        default: u32,
        index: Box<Expr>,
        value: Option<Box<Expr>>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
    Unreachable,
    Call {
        func: Func,
        args: Vec<Expr>,
    },
    CallIndirect {
        sig: Signature,
        table: Table,
        args: Vec<Expr>,
        target: Box<Expr>,
    },
    Load {
        access: MemAccess,
        ptr: Box<Expr>,
    },
    Store {
        access: MemAccess,
        ptr: Box<Expr>,
        value: Box<Expr>,
    },
    MemorySize {
        mem: Memory,
    },
    MemoryGrow {
        mem: Memory,
        delta: Box<Expr>,
    },
    MemoryCopy {
        dst: Box<Expr>,
        src: Box<Expr>,
        len: Box<Expr>,
    },
    MemoryFill {
        dst: Box<Expr>,
        value: Box<Expr>,
        len: Box<Expr>,
    },
    LocalGet {
        local: Local,
    },
    /// `local.set`, or `local.tee` when `tee` is set (then the node
    /// also yields the stored value).
    LocalSet {
        local: Local,
        value: Box<Expr>,
        tee: bool,
    },
    GlobalGet {
        global: Global,
    },
    GlobalSet {
        global: Global,
        value: Box<Expr>,
    },
    Const(Literal),
    Unary {
        op: UnaryOp,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Select {
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        cond: Box<Expr>,
    },
    Drop {
        value: Box<Expr>,
    },
    /// An operation the decompiler cannot render. Its operands are
    /// kept so that their side effects are still visible.
    Unsupported {
        what: String,
        operands: Vec<Expr>,
    },
}

/// A constant. Floats are kept as raw bits so that NaN payloads
/// survive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
}

impl Literal {
    pub fn ty(self) -> Type {
        match self {
            Literal::I32(_) => Type::I32,
            Literal::I64(_) => Type::I64,
            Literal::F32(_) => Type::F32,
            Literal::F64(_) => Type::F64,
        }
    }

    pub fn zero(ty: Type) -> Option<Literal> {
        match ty {
            Type::I32 => Some(Literal::I32(0)),
            Type::I64 => Some(Literal::I64(0)),
            Type::F32 => Some(Literal::F32(0)),
            Type::F64 => Some(Literal::F64(0)),
            _ => None,
        }
    }

    /// Rebuild a literal from the 64-bit bundle used for global
    /// initializers.
    pub fn from_bits(ty: Type, bits: u64) -> Option<Literal> {
        match ty {
            Type::I32 => Some(Literal::I32(bits as u32 as i32)),
            Type::I64 => Some(Literal::I64(bits as i64)),
            Type::F32 => Some(Literal::F32(bits as u32)),
            Type::F64 => Some(Literal::F64(bits)),
            _ => None,
        }
    }
}

/// A load or store: access width, extension, and static offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemAccess {
    pub mem: Memory,
    /// Bytes accessed in memory: 1, 2, 4 or 8.
    pub bytes: u8,
    /// For narrow loads, whether the value is sign-extended.
    pub signed: bool,
    pub offset: u64,
    /// The value type on the Wasm side (result of a load, operand of
    /// a store).
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Expr {
        Expr { kind, ty }
    }

    pub fn nop() -> Expr {
        Expr::new(ExprKind::Nop, Type::None)
    }

    pub fn unreachable() -> Expr {
        Expr::new(ExprKind::Unreachable, Type::None)
    }

    pub fn block(body: Vec<Expr>, ty: Type) -> Expr {
        Expr::new(ExprKind::Block { body }, ty)
    }

    pub fn constant(value: Literal) -> Expr {
        Expr::new(ExprKind::Const(value), value.ty())
    }

    pub fn local_get(local: Local, ty: Type) -> Expr {
        Expr::new(ExprKind::LocalGet { local }, ty)
    }

    pub fn local_set(local: Local, value: Expr) -> Expr {
        Expr::new(
            ExprKind::LocalSet {
                local,
                value: Box::new(value),
                tee: false,
            },
            Type::None,
        )
    }

    pub fn unsupported(what: String, operands: Vec<Expr>, ty: Type) -> Expr {
        Expr::new(ExprKind::Unsupported { what, operands }, ty)
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ExprKind::Const(_))
    }

    /// Does control never fall through this node?
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Br { .. }
                | ExprKind::BrTable { .. }
                | ExprKind::Return { .. }
                | ExprKind::Unreachable
        )
    }

    /// Visit the direct children of this node in evaluation order.
    pub fn visit_children<'a, F: FnMut(&'a Expr)>(&'a self, mut f: F) {
        match &self.kind {
            ExprKind::Nop
            | ExprKind::Unreachable
            | ExprKind::MemorySize { .. }
            | ExprKind::LocalGet { .. }
            | ExprKind::GlobalGet { .. }
            | ExprKind::Const(_) => {}
            ExprKind::Block { body } | ExprKind::Loop { body } => body.iter().for_each(f),
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                f(cond);
                if_true.iter().for_each(&mut f);
                if_false.iter().for_each(f);
            }
            ExprKind::Br { value, .. } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    f(value);
                }
            }
            ExprKind::BrIf { cond, value, .. } => {
                if let Some(value) = value {
                    f(value);
                }
                f(cond);
            }
            ExprKind::BrTable { index, value, .. } => {
                if let Some(value) = value {
                    f(value);
                }
                f(index);
            }
            ExprKind::Call { args, .. } => args.iter().for_each(f),
            ExprKind::CallIndirect { args, target, .. } => {
                args.iter().for_each(&mut f);
                f(target);
            }
            ExprKind::Load { ptr, .. } => f(ptr),
            ExprKind::Store { ptr, value, .. } => {
                f(ptr);
                f(value);
            }
            ExprKind::MemoryGrow { delta, .. } => f(delta),
            ExprKind::MemoryCopy { dst, src, len } => {
                f(dst);
                f(src);
                f(len);
            }
            ExprKind::MemoryFill { dst, value, len } => {
                f(dst);
                f(value);
                f(len);
            }
            ExprKind::LocalSet { value, .. }
            | ExprKind::GlobalSet { value, .. }
            | ExprKind::Unary { value, .. }
            | ExprKind::Drop { value } => f(value),
            ExprKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            ExprKind::Select {
                if_true,
                if_false,
                cond,
            } => {
                f(if_true);
                f(if_false);
                f(cond);
            }
            ExprKind::Unsupported { operands, .. } => operands.iter().for_each(f),
        }
    }

    /// Can evaluating this node change state, transfer control, or
    /// otherwise need to stay ordered relative to its neighbors?
    /// Reads of locals, globals and memory are not side effects.
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            ExprKind::Nop
            | ExprKind::Const(_)
            | ExprKind::LocalGet { .. }
            | ExprKind::GlobalGet { .. }
            | ExprKind::MemorySize { .. } => false,
            ExprKind::Load { .. }
            | ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Select { .. } => {
                let mut effects = false;
                self.visit_children(|child| effects |= child.has_side_effects());
                effects
            }
            _ => true,
        }
    }

    /// Total number of nodes in this tree.
    pub fn size(&self) -> usize {
        let mut size = 1;
        self.visit_children(|child| size += child.size());
        size
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn side_effects_propagate_through_pure_nodes() {
        let pure = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::I32Add,
                lhs: Box::new(Expr::local_get(Local::from(0), Type::I32)),
                rhs: Box::new(Expr::constant(Literal::I32(1))),
            },
            Type::I32,
        );
        assert!(!pure.has_side_effects());

        let effectful = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::I32Add,
                lhs: Box::new(Expr::constant(Literal::I32(1))),
                rhs: Box::new(Expr::new(
                    ExprKind::Call {
                        func: Func::from(0),
                        args: vec![],
                    },
                    Type::I32,
                )),
            },
            Type::I32,
        );
        assert!(effectful.has_side_effects());
        assert_eq!(effectful.size(), 3);
    }
}

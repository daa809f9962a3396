//! Lowering: render expression trees as C statements.
//!
//! `Lowerer::expr` renders one node. Anything that has to happen
//! before the node's value is available is appended to the output as
//! statements, in evaluation order; the value itself (if any) comes
//! back as a C expression for the parent to place.

use super::localify::{c_type, LocalSlots};
use super::names::Names;
use crate::entity::EntityRef;
use crate::errors::DecompileError;
use crate::ir::*;
use crate::ops::{BinaryOp, UnaryOp};
use log::{trace, warn};
use smallvec::{smallvec, SmallVec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LabelKind {
    /// The function's root: branching here returns.
    Return,
    /// Block or if: branching here jumps past the construct.
    Forward,
    /// Branching here restarts the loop.
    Loop,
}

#[derive(Clone, Debug)]
struct LabelTarget {
    kind: LabelKind,
    name: String,
    /// Type of the value a branch here carries.
    ty: Type,
    /// Temporary receiving the construct's result.
    result: Option<String>,
    used: bool,
}

/// A lowered function body.
#[derive(Clone, Debug, Default)]
pub struct Lowered {
    /// Statements, indented one level.
    pub body: String,
    /// Temporaries the body uses, as `(name, C type)`.
    pub temps: Vec<(String, &'static str)>,
    pub errors: Vec<DecompileError>,
}

pub fn lower_body(
    module: &Module,
    names: &Names,
    func: Func,
    body: &FunctionBody,
    slots: &LocalSlots,
) -> Lowered {
    let ret_ty = body.rets.first().copied().unwrap_or(Type::None);
    let mut lowerer = Lowerer {
        module,
        names,
        func,
        slots,
        ret_ty,
        out: String::new(),
        indent: 1,
        labels: vec![],
        label_counts: smallvec![],
        temps: vec![],
        errors: vec![],
    };
    lowerer.root(&body.body);

    Lowered {
        body: lowerer.out,
        temps: lowerer
            .temps
            .iter()
            .enumerate()
            .filter_map(|(i, &ty)| c_type(ty).map(|c_ty| (format!("tmp{}", i), c_ty)))
            .collect(),
        errors: lowerer.errors,
    }
}

struct Lowerer<'a> {
    module: &'a Module,
    names: &'a Names,
    func: Func,
    slots: &'a LocalSlots,
    ret_ty: Type,
    out: String,
    indent: usize,
    /// Enclosing constructs, innermost last. Index 0 is the function
    /// root.
    labels: Vec<LabelTarget>,
    /// Labels handed out so far at each depth.
    label_counts: SmallVec<[usize; 8]>,
    temps: Vec<Type>,
    errors: Vec<DecompileError>,
}

/// Is `value` a temporary or a literal, so that copying it again would
/// only add noise?
fn is_stable(value: &str) -> bool {
    let temp = value
        .strip_prefix("tmp")
        .map_or(false, |rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
    temp || value.parse::<i64>().is_ok()
}

fn is_ident(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

pub fn literal(value: Literal) -> String {
    match value {
        Literal::I32(i32::MIN) => "INT32_MIN".to_owned(),
        Literal::I32(v) => format!("{}", v),
        Literal::I64(i64::MIN) => "INT64_MIN".to_owned(),
        Literal::I64(v) => format!("INT64_C({})", v),
        Literal::F32(bits) => {
            let v = f32::from_bits(bits);
            if v.is_finite() {
                format!("{:?}f", v)
            } else {
                format!("wasm_f32_from_bits(0x{:08x}u)", bits)
            }
        }
        Literal::F64(bits) => {
            let v = f64::from_bits(bits);
            if v.is_finite() {
                format!("{:?}", v)
            } else {
                format!("wasm_f64_from_bits(UINT64_C(0x{:016x}))", bits)
            }
        }
    }
}

/// Is the literal usable in a static initializer?
pub fn is_constant_expression(value: Literal) -> bool {
    match value {
        Literal::F32(bits) => f32::from_bits(bits).is_finite(),
        Literal::F64(bits) => f64::from_bits(bits).is_finite(),
        _ => true,
    }
}

fn zero(ty: Type) -> String {
    Literal::zero(ty).map_or_else(|| "0".to_owned(), literal)
}

fn unary(op: UnaryOp, x: &str) -> String {
    use UnaryOp::*;
    match op {
        I32Eqz | I64Eqz => format!("({} == 0)", x),
        I32Clz => format!("(int32_t)wasm_clz32((uint32_t)({}))", x),
        I32Ctz => format!("(int32_t)wasm_ctz32((uint32_t)({}))", x),
        I32Popcnt => format!("(int32_t)wasm_popcnt32((uint32_t)({}))", x),
        I64Clz => format!("(int64_t)wasm_clz64((uint64_t)({}))", x),
        I64Ctz => format!("(int64_t)wasm_ctz64((uint64_t)({}))", x),
        I64Popcnt => format!("(int64_t)wasm_popcnt64((uint64_t)({}))", x),

        F32Abs => format!("fabsf({})", x),
        F32Neg | F64Neg => format!("(-({}))", x),
        F32Ceil => format!("ceilf({})", x),
        F32Floor => format!("floorf({})", x),
        F32Trunc => format!("truncf({})", x),
        F32Nearest => format!("nearbyintf({})", x),
        F32Sqrt => format!("sqrtf({})", x),
        F64Abs => format!("fabs({})", x),
        F64Ceil => format!("ceil({})", x),
        F64Floor => format!("floor({})", x),
        F64Trunc => format!("trunc({})", x),
        F64Nearest => format!("nearbyint({})", x),
        F64Sqrt => format!("sqrt({})", x),

        I32WrapI64 => format!("(int32_t)({})", x),
        I64ExtendI32S => format!("(int64_t)({})", x),
        I64ExtendI32U => format!("(int64_t)(uint32_t)({})", x),
        I32TruncF32S | I32TruncF64S => format!("(int32_t)({})", x),
        I32TruncF32U | I32TruncF64U => format!("(int32_t)(uint32_t)({})", x),
        I64TruncF32S | I64TruncF64S => format!("(int64_t)({})", x),
        I64TruncF32U | I64TruncF64U => format!("(int64_t)(uint64_t)({})", x),
        I32TruncSatF32S | I32TruncSatF64S => format!("wasm_trunc_sat_i32_s((double)({}))", x),
        I32TruncSatF32U | I32TruncSatF64U => format!("wasm_trunc_sat_i32_u((double)({}))", x),
        I64TruncSatF32S | I64TruncSatF64S => format!("wasm_trunc_sat_i64_s((double)({}))", x),
        I64TruncSatF32U | I64TruncSatF64U => format!("wasm_trunc_sat_i64_u((double)({}))", x),
        F32ConvertI32S | F32ConvertI64S | F32DemoteF64 => format!("(float)({})", x),
        F32ConvertI32U => format!("(float)(uint32_t)({})", x),
        F32ConvertI64U => format!("(float)(uint64_t)({})", x),
        F64ConvertI32S | F64ConvertI64S | F64PromoteF32 => format!("(double)({})", x),
        F64ConvertI32U => format!("(double)(uint32_t)({})", x),
        F64ConvertI64U => format!("(double)(uint64_t)({})", x),
        I32ReinterpretF32 => format!("(int32_t)wasm_f32_to_bits({})", x),
        I64ReinterpretF64 => format!("(int64_t)wasm_f64_to_bits({})", x),
        F32ReinterpretI32 => format!("wasm_f32_from_bits((uint32_t)({}))", x),
        F64ReinterpretI64 => format!("wasm_f64_from_bits((uint64_t)({}))", x),
        I32Extend8S => format!("(int32_t)(int8_t)({})", x),
        I32Extend16S => format!("(int32_t)(int16_t)({})", x),
        I64Extend8S => format!("(int64_t)(int8_t)({})", x),
        I64Extend16S => format!("(int64_t)(int16_t)({})", x),
        I64Extend32S => format!("(int64_t)(int32_t)({})", x),
    }
}

fn binary(op: BinaryOp, a: &str, b: &str) -> String {
    use BinaryOp::*;
    let infix = |sym: &str| format!("({} {} {})", a, sym, b);
    let unsigned32 = |sym: &str| format!("((uint32_t)({}) {} (uint32_t)({}))", a, sym, b);
    let unsigned64 = |sym: &str| format!("((uint64_t)({}) {} (uint64_t)({}))", a, sym, b);
    match op {
        I32Eq | I64Eq | F32Eq | F64Eq => infix("=="),
        I32Ne | I64Ne | F32Ne | F64Ne => infix("!="),
        I32LtS | I64LtS | F32Lt | F64Lt => infix("<"),
        I32GtS | I64GtS | F32Gt | F64Gt => infix(">"),
        I32LeS | I64LeS | F32Le | F64Le => infix("<="),
        I32GeS | I64GeS | F32Ge | F64Ge => infix(">="),
        I32LtU => unsigned32("<"),
        I32GtU => unsigned32(">"),
        I32LeU => unsigned32("<="),
        I32GeU => unsigned32(">="),
        I64LtU => unsigned64("<"),
        I64GtU => unsigned64(">"),
        I64LeU => unsigned64("<="),
        I64GeU => unsigned64(">="),

        // Wrapping arithmetic goes through unsigned types.
        I32Add => format!("(int32_t){}", unsigned32("+")),
        I32Sub => format!("(int32_t){}", unsigned32("-")),
        I32Mul => format!("(int32_t){}", unsigned32("*")),
        I32DivS | I64DivS | F32Div | F64Div => infix("/"),
        I32DivU => format!("(int32_t){}", unsigned32("/")),
        I32RemS | I64RemS => infix("%"),
        I32RemU => format!("(int32_t){}", unsigned32("%")),
        I32And | I64And => infix("&"),
        I32Or | I64Or => infix("|"),
        I32Xor | I64Xor => infix("^"),
        I32Shl => format!("(int32_t)((uint32_t)({}) << (({}) & 31))", a, b),
        I32ShrS => format!("(({}) >> (({}) & 31))", a, b),
        I32ShrU => format!("(int32_t)((uint32_t)({}) >> (({}) & 31))", a, b),
        I32Rotl => format!("(int32_t)wasm_rotl32((uint32_t)({}), (uint32_t)({}))", a, b),
        I32Rotr => format!("(int32_t)wasm_rotr32((uint32_t)({}), (uint32_t)({}))", a, b),
        I64Add => format!("(int64_t){}", unsigned64("+")),
        I64Sub => format!("(int64_t){}", unsigned64("-")),
        I64Mul => format!("(int64_t){}", unsigned64("*")),
        I64DivU => format!("(int64_t){}", unsigned64("/")),
        I64RemU => format!("(int64_t){}", unsigned64("%")),
        I64Shl => format!("(int64_t)((uint64_t)({}) << (({}) & 63))", a, b),
        I64ShrS => format!("(({}) >> (({}) & 63))", a, b),
        I64ShrU => format!("(int64_t)((uint64_t)({}) >> (({}) & 63))", a, b),
        I64Rotl => format!("(int64_t)wasm_rotl64((uint64_t)({}), (uint64_t)({}))", a, b),
        I64Rotr => format!("(int64_t)wasm_rotr64((uint64_t)({}), (uint64_t)({}))", a, b),

        F32Add | F64Add => infix("+"),
        F32Sub | F64Sub => infix("-"),
        F32Mul | F64Mul => infix("*"),
        F32Min => format!("wasm_fmin32({}, {})", a, b),
        F32Max => format!("wasm_fmax32({}, {})", a, b),
        F32Copysign => format!("copysignf({}, {})", a, b),
        F64Min => format!("wasm_fmin64({}, {})", a, b),
        F64Max => format!("wasm_fmax64({}, {})", a, b),
        F64Copysign => format!("copysign({}, {})", a, b),
    }
}

/// The memory cell a load reads, as the suffix of its prelude accessor
/// and its C type.
fn load_cell(access: &MemAccess) -> (&'static str, &'static str) {
    match (access.ty, access.bytes, access.signed) {
        (Type::F32, _, _) => ("f32", "float"),
        (Type::F64, _, _) => ("f64", "double"),
        (_, 1, true) => ("i8", "int8_t"),
        (_, 1, false) => ("u8", "uint8_t"),
        (_, 2, true) => ("i16", "int16_t"),
        (_, 2, false) => ("u16", "uint16_t"),
        (Type::I64, 4, true) => ("i32", "int32_t"),
        (Type::I64, 4, false) => ("u32", "uint32_t"),
        (Type::I32, _, _) => ("i32", "int32_t"),
        _ => ("i64", "int64_t"),
    }
}

/// The memory cell a store writes. Narrow stores keep the low bits of
/// the value.
fn store_cell(access: &MemAccess) -> (&'static str, &'static str) {
    match (access.ty, access.bytes) {
        (Type::F32, _) => ("f32", "float"),
        (Type::F64, _) => ("f64", "double"),
        (_, 1) => ("u8", "uint8_t"),
        (_, 2) => ("u16", "uint16_t"),
        (Type::I64, 4) => ("u32", "uint32_t"),
        (Type::I32, _) => ("i32", "int32_t"),
        _ => ("i64", "int64_t"),
    }
}

impl<'a> Lowerer<'a> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn func_index(&self) -> Option<u32> {
        Some(self.func.index() as u32)
    }

    fn unsupported(&mut self, what: String) {
        warn!("{}: unsupported: {}", self.func, what);
        self.line(&format!("/* unsupported: {} */", what.replace("*/", "* /")));
        self.errors.push(DecompileError::Unsupported {
            func: self.func_index(),
            what,
        });
    }

    fn malformed(&mut self, what: String) {
        warn!("{}: malformed index: {}", self.func, what);
        self.line(&format!("/* malformed: {} */", what));
        self.errors.push(DecompileError::MalformedIndex {
            func: self.func_index(),
            what,
        });
    }

    fn new_temp(&mut self, ty: Type) -> Option<String> {
        c_type(ty)?;
        self.temps.push(ty);
        Some(format!("tmp{}", self.temps.len() - 1))
    }

    /// Evaluate `value` now, into a fresh temporary.
    fn spill(&mut self, value: String, ty: Type) -> String {
        match self.new_temp(ty) {
            Some(temp) => {
                self.line(&format!("{} = {};", temp, value));
                temp
            }
            None => value,
        }
    }

    /// Render `expr` for its value; a node without one (dead code)
    /// reads as zero of the expected type.
    fn value(&mut self, expr: &Expr, ty: Type) -> String {
        self.expr(expr).unwrap_or_else(|| zero(ty))
    }

    /// Render a list of operands, preserving left-to-right evaluation:
    /// an operand is moved into a temporary when a later one could
    /// observe or disturb it.
    fn operands(&mut self, operands: &[(&Expr, Type)]) -> Vec<String> {
        let mut values = Vec::with_capacity(operands.len());
        for (i, &(expr, ty)) in operands.iter().enumerate() {
            let later = &operands[i + 1..];
            let later_effects = later.iter().any(|(e, _)| e.has_side_effects());
            let later_reads = later.iter().any(|(e, _)| !e.is_const());
            let value = self.value(expr, ty);
            let spill = !expr.is_const()
                && !is_stable(&value)
                && (later_effects || (expr.has_side_effects() && later_reads));
            values.push(if spill { self.spill(value, ty) } else { value });
        }
        values
    }

    /// Render `expr` where its value, if any, is not needed.
    fn statement(&mut self, expr: &Expr) {
        if let Some(value) = self.expr(expr) {
            if expr.has_side_effects() && !is_ident(&value) {
                self.line(&format!("(void)({});", value));
            }
        }
    }

    /// Render a construct body; the last entry's value, if any, goes
    /// into `result`.
    fn sequence(&mut self, body: &[Expr], result: Option<&(String, Type)>) {
        for (i, child) in body.iter().enumerate() {
            match result {
                Some((temp, ty)) if i + 1 == body.len() && child.ty.is_value() => {
                    let value = self.value(child, *ty);
                    if value != *temp {
                        self.line(&format!("{} = {};", temp, value));
                    }
                }
                _ => self.statement(child),
            }
        }
    }

    fn root(&mut self, root: &Expr) {
        self.labels.push(LabelTarget {
            kind: LabelKind::Return,
            name: String::new(),
            ty: self.ret_ty,
            result: None,
            used: false,
        });
        self.label_counts.push(1);

        let body = match &root.kind {
            ExprKind::Block { body } => &body[..],
            _ => std::slice::from_ref(root),
        };
        for (i, child) in body.iter().enumerate() {
            if i + 1 == body.len() && self.ret_ty.is_value() && child.ty.is_value() {
                let value = self.value(child, self.ret_ty);
                self.line(&format!("return {};", value));
            } else {
                self.statement(child);
            }
        }
        self.labels.pop();
    }

    fn push_label(&mut self, kind: LabelKind, ty: Type, result: Option<String>) {
        let depth = self.labels.len();
        if self.label_counts.len() <= depth {
            self.label_counts.resize(depth + 1, 0);
        }
        let count = self.label_counts[depth];
        self.label_counts[depth] += 1;
        let name = if count == 0 {
            format!("label_{}", depth)
        } else {
            format!("label_{}_{}", depth, count)
        };
        trace!("{}: entering {:?} construct at depth {}", self.func, kind, depth);
        self.labels.push(LabelTarget {
            kind,
            name,
            ty,
            result,
            used: false,
        });
    }

    /// Pop a block or if label, placing it after the construct if any
    /// branch targets it.
    fn pop_forward_label(&mut self) {
        if let Some(label) = self.labels.pop() {
            if label.used {
                self.line(&format!("{}:;", label.name));
            }
        }
    }

    /// Index into `labels` of the target `depth` levels out.
    fn target(&mut self, depth: u32) -> Option<usize> {
        let index = self.labels.len().checked_sub(1 + depth as usize);
        if index.is_none() {
            self.malformed(format!("branch depth {}", depth));
        }
        index
    }

    /// Emit an unconditional transfer to `labels[index]`.
    fn jump(&mut self, index: usize, value: Option<String>) {
        let label = &mut self.labels[index];
        if label.kind == LabelKind::Return {
            match value {
                Some(value) => self.line(&format!("return {};", value)),
                None => self.line("return;"),
            }
            return;
        }
        label.used = true;
        let name = label.name.clone();
        if let (Some(result), Some(value)) = (label.result.clone(), value) {
            self.line(&format!("{} = {};", result, value));
        }
        self.line(&format!("goto {};", name));
    }

    /// Render the value a branch to `labels[index]` carries, ahead of
    /// `rest`. The value is made safe to use more than once.
    fn branch_operands(
        &mut self,
        index: usize,
        value: &Option<Box<Expr>>,
        rest: &Expr,
    ) -> (Option<String>, String) {
        let ty = self.labels[index].ty;
        match value {
            Some(value) => {
                let mut values = self.operands(&[(&**value, ty), (rest, Type::I32)]);
                let rest = values.pop().unwrap_or_default();
                let value = values.pop().unwrap_or_default();
                let value = if value.is_empty() || is_stable(&value) {
                    value
                } else {
                    self.spill(value, ty)
                };
                (Some(value), rest)
            }
            None => (None, self.value(rest, Type::I32)),
        }
    }

    fn block(&mut self, body: &[Expr], ty: Type) -> Option<String> {
        let result = self.new_temp(ty);
        self.push_label(LabelKind::Forward, ty, result.clone());
        let pair = result.clone().map(|temp| (temp, ty));
        self.sequence(body, pair.as_ref());
        self.pop_forward_label();
        result
    }

    fn loop_(&mut self, body: &[Expr], ty: Type) -> Option<String> {
        let result = self.new_temp(ty);
        let header = self.out.len();
        let indent = self.indent;
        self.push_label(LabelKind::Loop, Type::None, None);
        self.line("while (1) {");
        self.indent += 1;
        let pair = result.clone().map(|temp| (temp, ty));
        self.sequence(body, pair.as_ref());
        self.line("break;");
        self.indent -= 1;
        self.line("}");
        if let Some(label) = self.labels.pop() {
            if label.used {
                let text = format!("{}{}:\n", "  ".repeat(indent), label.name);
                self.out.insert_str(header, &text);
            }
        }
        result
    }

    fn if_(&mut self, cond: &Expr, if_true: &[Expr], if_false: &[Expr], ty: Type) -> Option<String> {
        let cond = self.value(cond, Type::I32);
        let result = self.new_temp(ty);
        self.push_label(LabelKind::Forward, ty, result.clone());
        let pair = result.clone().map(|temp| (temp, ty));
        self.line(&format!("if ({}) {{", cond));
        self.indent += 1;
        self.sequence(if_true, pair.as_ref());
        self.indent -= 1;
        if !if_false.is_empty() {
            self.line("} else {");
            self.indent += 1;
            self.sequence(if_false, pair.as_ref());
            self.indent -= 1;
        }
        self.line("}");
        self.pop_forward_label();
        result
    }

    /// Address of a memory access, as a `uint8_t *` expression.
    fn address(&mut self, access: &MemAccess, ptr: &str) -> Option<String> {
        if access.mem.index() != 0 {
            self.unsupported(format!("access to {}", access.mem));
            return None;
        }
        if self.module.memories.is_empty() {
            self.malformed(format!("access to {} without a memory", access.mem));
            return None;
        }
        let offset = match access.offset {
            0 => String::new(),
            off if off <= u64::from(u32::MAX) => format!(" + {}u", off),
            off => format!(" + UINT64_C({})", off),
        };
        Some(format!(
            "{} + (uint32_t)({}){}",
            self.names.memory, ptr, offset
        ))
    }

    fn memory_name(&mut self, mem: Memory) -> Option<String> {
        if mem.index() != 0 {
            self.unsupported(format!("access to {}", mem));
            None
        } else if self.module.memories.is_empty() {
            self.malformed(format!("access to {} without a memory", mem));
            None
        } else {
            Some(self.names.memory.clone())
        }
    }

    /// Render the operands of a node that could not be rendered, so
    /// their side effects are kept.
    fn discard(&mut self, operands: &[&Expr]) {
        for operand in operands {
            self.statement(operand);
        }
    }

    fn call(&mut self, func: Func, args: &[Expr], ty: Type) -> Option<String> {
        let (module, names) = (self.module, self.names);
        let (sig, name) = match (module.func_signature(func), names.func(func)) {
            (Some(sig), Some(name)) => (sig, name.to_owned()),
            _ => {
                self.discard(&args.iter().collect::<Vec<_>>());
                self.malformed(format!("call to {}", func));
                return ty.is_value().then(|| zero(ty));
            }
        };
        if sig.params.len() != args.len() {
            self.discard(&args.iter().collect::<Vec<_>>());
            self.malformed(format!("call to {} with {} arguments", func, args.len()));
            return ty.is_value().then(|| zero(ty));
        }
        let operands = args
            .iter()
            .zip(sig.params.iter().copied())
            .collect::<Vec<_>>();
        let values = self.operands(&operands);
        let call = format!("{}({})", name, values.join(", "));
        if ty.is_value() {
            Some(call)
        } else {
            self.line(&format!("{};", call));
            None
        }
    }

    fn call_indirect(
        &mut self,
        sig: Signature,
        table: Table,
        args: &[Expr],
        target: &Expr,
        ty: Type,
    ) -> Option<String> {
        let module = self.module;
        let mut operands = args.iter().collect::<Vec<_>>();
        operands.push(target);

        let sig_data = match module.signature(sig) {
            Some(sig_data) if sig_data.params.len() == args.len() => sig_data,
            _ => {
                self.discard(&operands);
                self.malformed(format!("call_indirect through {}", sig));
                return ty.is_value().then(|| zero(ty));
            }
        };
        if module.tables.get(table).is_none() {
            self.discard(&operands);
            self.malformed(format!("call_indirect through {}", table));
            return ty.is_value().then(|| zero(ty));
        }
        if table.index() != 0 {
            self.discard(&operands);
            self.unsupported(format!("call_indirect through {}", table));
            return ty.is_value().then(|| zero(ty));
        }
        let fn_ptr = match function_pointer_type(sig_data) {
            Some(fn_ptr) => fn_ptr,
            None => {
                self.discard(&operands);
                self.unsupported(format!("call_indirect with signature {:?}", sig_data));
                return ty.is_value().then(|| zero(ty));
            }
        };

        let typed = args
            .iter()
            .zip(sig_data.params.iter().copied())
            .chain(std::iter::once((target, Type::I32)))
            .collect::<Vec<_>>();
        let mut values = self.operands(&typed);
        let index = values.pop().unwrap_or_default();
        let call = format!(
            "(({}){}[(uint32_t)({})])({})",
            fn_ptr,
            self.names.table,
            index,
            values.join(", ")
        );
        if ty.is_value() {
            Some(call)
        } else {
            self.line(&format!("{};", call));
            None
        }
    }

    fn expr(&mut self, e: &Expr) -> Option<String> {
        match &e.kind {
            ExprKind::Nop => None,
            ExprKind::Block { body } => self.block(body, e.ty),
            ExprKind::Loop { body } => self.loop_(body, e.ty),
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => self.if_(cond, if_true, if_false, e.ty),

            ExprKind::Br { depth, value } => {
                let index = self.target(*depth)?;
                let ty = self.labels[index].ty;
                let value = match value {
                    Some(value) => Some(self.value(value, ty)),
                    None => None,
                };
                self.jump(index, value);
                None
            }
            ExprKind::BrIf { depth, cond, value } => {
                let index = match self.target(*depth) {
                    Some(index) => index,
                    None => return e.ty.is_value().then(|| zero(e.ty)),
                };
                let (value, cond) = self.branch_operands(index, value, cond);
                self.line(&format!("if ({}) {{", cond));
                self.indent += 1;
                self.jump(index, value.clone());
                self.indent -= 1;
                self.line("}");
                value.filter(|_| e.ty.is_value())
            }
            ExprKind::BrTable {
                targets,
                default,
                index,
                value,
            } => {
                let mut indices: SmallVec<[usize; 8]> = SmallVec::new();
                for &depth in targets.iter().chain(std::iter::once(default)) {
                    indices.push(self.target(depth)?);
                }
                let default_index = indices.pop()?;
                let (value, index) = self.branch_operands(default_index, value, index);
                self.line(&format!("switch ((uint32_t)({})) {{", index));
                let mut case = 0;
                while case < indices.len() {
                    let target = indices[case];
                    while case < indices.len() && indices[case] == target {
                        self.line(&format!("case {}u:", case));
                        case += 1;
                    }
                    self.indent += 1;
                    self.jump(target, value.clone());
                    self.indent -= 1;
                }
                self.line("default:");
                self.indent += 1;
                self.jump(default_index, value);
                self.indent -= 1;
                self.line("}");
                None
            }
            ExprKind::Return { value } => {
                match value {
                    Some(value) => {
                        let value = self.value(value, self.ret_ty);
                        self.line(&format!("return {};", value));
                    }
                    None => self.line("return;"),
                }
                None
            }
            ExprKind::Unreachable => {
                self.line("abort();");
                None
            }

            ExprKind::Call { func, args } => self.call(*func, args, e.ty),
            ExprKind::CallIndirect {
                sig,
                table,
                args,
                target,
            } => self.call_indirect(*sig, *table, args, target, e.ty),

            ExprKind::Load { access, ptr } => {
                let ptr = self.value(ptr, Type::I32);
                let addr = match self.address(access, &ptr) {
                    Some(addr) => addr,
                    None => return Some(zero(e.ty)),
                };
                let (suffix, cell) = load_cell(access);
                let value_ty = c_type(access.ty).unwrap_or("int32_t");
                if cell == value_ty {
                    Some(format!("wasm_load_{}({})", suffix, addr))
                } else {
                    Some(format!("(({})wasm_load_{}({}))", value_ty, suffix, addr))
                }
            }
            ExprKind::Store { access, ptr, value } => {
                let values = self.operands(&[(&**ptr, Type::I32), (&**value, access.ty)]);
                if let Some(addr) = self.address(access, &values[0]) {
                    let (suffix, cell) = store_cell(access);
                    if Some(cell) == c_type(access.ty) {
                        self.line(&format!("wasm_store_{}({}, {});", suffix, addr, values[1]));
                    } else {
                        self.line(&format!(
                            "wasm_store_{}({}, ({})({}));",
                            suffix, addr, cell, values[1]
                        ));
                    }
                }
                None
            }
            ExprKind::MemorySize { mem } => {
                let _ = self.memory_name(*mem)?;
                Some(format!("(int32_t){}", self.names.memory_pages))
            }
            ExprKind::MemoryGrow { mem, delta } => {
                let delta = self.value(delta, Type::I32);
                match self.memory_name(*mem) {
                    Some(_) => Some(format!("{}({})", self.names.memory_grow, delta)),
                    None => Some(zero(Type::I32)),
                }
            }
            ExprKind::MemoryCopy { dst, src, len } => {
                let values =
                    self.operands(&[(&**dst, Type::I32), (&**src, Type::I32), (&**len, Type::I32)]);
                if let Some(memory) = self.memory_name(Memory::from(0)) {
                    self.line(&format!(
                        "memmove({} + (uint32_t)({}), {} + (uint32_t)({}), (uint32_t)({}));",
                        memory, values[0], memory, values[1], values[2]
                    ));
                }
                None
            }
            ExprKind::MemoryFill { dst, value, len } => {
                let values =
                    self.operands(&[(&**dst, Type::I32), (&**value, Type::I32), (&**len, Type::I32)]);
                if let Some(memory) = self.memory_name(Memory::from(0)) {
                    self.line(&format!(
                        "memset({} + (uint32_t)({}), (uint8_t)({}), (uint32_t)({}));",
                        memory, values[0], values[1], values[2]
                    ));
                }
                None
            }

            ExprKind::LocalGet { local } => match self.slots.get(*local).map(|slot| slot.name.clone()) {
                Some(name) => Some(name),
                None => {
                    self.malformed(format!("read of {}", local));
                    Some(zero(e.ty))
                }
            },
            ExprKind::LocalSet { local, value, tee } => {
                let slots = self.slots;
                let (name, ty) = match slots.get(*local) {
                    Some(slot) => (slot.name.clone(), slot.ty),
                    None => {
                        self.statement(value);
                        self.malformed(format!("write of {}", local));
                        return tee.then(|| zero(e.ty));
                    }
                };
                let value = self.value(value, ty);
                self.line(&format!("{} = {};", name, value));
                tee.then(|| name)
            }
            ExprKind::GlobalGet { global } => {
                let (module, names) = (self.module, self.names);
                match (module.globals.get(*global), names.global(*global)) {
                    (Some(data), Some(name)) if data.ty.is_numeric() => Some(name.to_owned()),
                    (Some(data), Some(_)) => {
                        self.unsupported(format!("{} global", data.ty));
                        Some(zero(e.ty))
                    }
                    _ => {
                        self.malformed(format!("read of {}", global));
                        Some(zero(e.ty))
                    }
                }
            }
            ExprKind::GlobalSet { global, value } => {
                let (module, names) = (self.module, self.names);
                match (module.globals.get(*global), names.global(*global)) {
                    (Some(data), Some(name)) if data.ty.is_numeric() => {
                        let name = name.to_owned();
                        let value = self.value(value, data.ty);
                        self.line(&format!("{} = {};", name, value));
                    }
                    (Some(data), Some(_)) => {
                        self.statement(value);
                        self.unsupported(format!("{} global", data.ty));
                    }
                    _ => {
                        self.statement(value);
                        self.malformed(format!("write of {}", global));
                    }
                }
                None
            }

            ExprKind::Const(value) => Some(literal(*value)),
            ExprKind::Unary { op, value } => {
                let value = self.value(value, op.operand_ty());
                Some(unary(*op, &value))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let ty = op.operand_ty();
                let values = self.operands(&[(&**lhs, ty), (&**rhs, ty)]);
                Some(binary(*op, &values[0], &values[1]))
            }
            ExprKind::Select {
                if_true,
                if_false,
                cond,
            } => {
                let ty = e.ty;
                let mut values =
                    self.operands(&[(&**if_true, ty), (&**if_false, ty), (&**cond, Type::I32)]);
                // Only one arm of `?:` is evaluated; both of Wasm's are.
                for (i, arm) in [if_true, if_false].iter().enumerate() {
                    if arm.has_side_effects() && !is_stable(&values[i]) {
                        values[i] = self.spill(values[i].clone(), ty);
                    }
                }
                Some(format!("({} ? {} : {})", values[2], values[0], values[1]))
            }
            ExprKind::Drop { value } => {
                self.statement(value);
                None
            }
            ExprKind::Unsupported { what, operands } => {
                self.discard(&operands.iter().collect::<Vec<_>>());
                self.unsupported(what.clone());
                e.ty.is_value().then(|| zero(e.ty))
            }
        }
    }
}

/// `ret (*)(params)` for a signature, if it has a C rendering.
pub fn function_pointer_type(sig: &SignatureData) -> Option<String> {
    let ret = match sig.result()? {
        Type::None => "void",
        ty => c_type(ty)?,
    };
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
    Some(format!("{} (*)({})", ret, params))
}

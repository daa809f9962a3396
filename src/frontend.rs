//! Frontend: convert Wasm to IR.

use crate::entity::EntityRef;
use crate::errors::FrontendError;
use crate::ir::*;
use crate::op_traits::{mem_op, opaque_op_effect, MemOp};
use crate::ops::{BinaryOp, UnaryOp};
use crate::DisasmMode;
use anyhow::{bail, Context, Result};
use fxhash::FxHashMap;
use log::{debug, trace};
use std::borrow::Cow;
use wasmparser::{
    BlockType, ConstExpr, DataKind, ElementItems, ElementKind, ExternalKind, KnownCustom, Name,
    Operator, Parser, Payload, TypeRef, Validator,
};

/// Largest table we are willing to materialize.
const MAX_TABLE_ELEMENTS: u64 = 1 << 24;
/// Largest initial memory (in pages) we are willing to materialize.
const MAX_MEMORY_PAGES: u64 = 1 << 16;

/// Turn the raw input into Wasm binary bytes according to the
/// disassembly mode.
fn input_to_binary(bytes: &[u8], mode: DisasmMode) -> Result<Cow<'_, [u8]>> {
    match mode {
        DisasmMode::Wasm => Ok(Cow::Borrowed(bytes)),
        DisasmMode::Wast => Ok(wat::parse_bytes(bytes).context("failed to parse text module")?),
        DisasmMode::AsmJs => bail!(FrontendError::UnsupportedFeature(
            "asm.js input".to_owned()
        )),
        DisasmMode::None => {
            if bytes.starts_with(b"\0asm") {
                Ok(Cow::Borrowed(bytes))
            } else {
                Ok(wat::parse_bytes(bytes).context("input is neither binary nor text Wasm")?)
            }
        }
    }
}

pub fn wasm_to_ir(bytes: &[u8], mode: DisasmMode) -> Result<Module> {
    let bytes = input_to_binary(bytes, mode)?;
    Validator::new()
        .validate_all(&bytes)
        .context("invalid WebAssembly module")?;

    let mut module = Module::empty();
    let mut next_func = 0;
    let mut func_names = FxHashMap::default();
    for payload in Parser::new(0).parse_all(&bytes) {
        let payload = payload?;
        handle_payload(&mut module, payload, &mut next_func, &mut func_names)?;
    }

    for (index, name) in func_names {
        if let Some(FuncDecl::Body(_, func_name, _)) = module.funcs.get_mut(Func::from(index)) {
            *func_name = name;
        }
    }

    debug!(
        "Parsed module: {} funcs, {} globals, {} tables, {} memories",
        module.funcs.len(),
        module.globals.len(),
        module.tables.len(),
        module.memories.len()
    );
    Ok(module)
}

fn internal(msg: &str) -> anyhow::Error {
    FrontendError::Internal(msg.to_owned()).into()
}

/// The value of a constant expression.
#[derive(Clone, Copy, Debug)]
enum ConstValue {
    Bits(u64),
    Global(Global),
    Func(Func),
    Null,
}

fn const_expr(expr: &ConstExpr<'_>) -> Result<ConstValue> {
    let mut reader = expr.get_operators_reader();
    let value = match reader.read()? {
        Operator::I32Const { value } => ConstValue::Bits(value as u32 as u64),
        Operator::I64Const { value } => ConstValue::Bits(value as u64),
        Operator::F32Const { value } => ConstValue::Bits(value.bits() as u64),
        Operator::F64Const { value } => ConstValue::Bits(value.bits()),
        Operator::GlobalGet { global_index } => ConstValue::Global(Global::from(global_index)),
        Operator::RefFunc { function_index } => ConstValue::Func(Func::from(function_index)),
        Operator::RefNull { .. } => ConstValue::Null,
        op => bail!(FrontendError::UnsupportedFeature(format!(
            "constant expression {:?}",
            op
        ))),
    };
    match reader.read()? {
        Operator::End => Ok(value),
        op => bail!(FrontendError::UnsupportedFeature(format!(
            "extended constant expression with {:?}",
            op
        ))),
    }
}

fn const_offset(expr: &ConstExpr<'_>) -> Result<usize> {
    match const_expr(expr)? {
        ConstValue::Bits(bits) => Ok(bits as u32 as usize),
        other => bail!(FrontendError::UnsupportedFeature(format!(
            "segment offset {:?}",
            other
        ))),
    }
}

fn table_data(initial: u64, max: Option<u64>) -> Result<TableData> {
    if initial > MAX_TABLE_ELEMENTS {
        bail!(FrontendError::TooLarge(format!(
            "table of {} elements",
            initial
        )));
    }
    Ok(TableData {
        initial,
        max,
        func_elements: vec![],
    })
}

fn memory_data(ty: &wasmparser::MemoryType) -> Result<MemoryData> {
    if ty.memory64 {
        bail!(FrontendError::UnsupportedFeature("64-bit memory".to_owned()));
    }
    if ty.initial > MAX_MEMORY_PAGES {
        bail!(FrontendError::TooLarge(format!(
            "memory of {} pages",
            ty.initial
        )));
    }
    Ok(MemoryData {
        initial_pages: ty.initial as usize,
        maximum_pages: ty.maximum.map(|max| max as usize),
        segments: vec![],
    })
}

fn handle_payload<'a>(
    module: &mut Module,
    payload: Payload<'a>,
    next_func: &mut usize,
    func_names: &mut FxHashMap<u32, String>,
) -> Result<()> {
    trace!("Wasm parser item: {:?}", payload);
    match payload {
        Payload::TypeSection(reader) => {
            for ty in reader.into_iter_err_on_gc_types() {
                let ty = ty?;
                module.signatures.push(SignatureData::from(&ty));
            }
        }
        Payload::ImportSection(reader) => {
            for import in reader {
                let import = import?;
                let kind = match import.ty {
                    TypeRef::Func(sig_idx) => {
                        let name = format!("{}.{}", import.module, import.name);
                        let func = module
                            .funcs
                            .push(FuncDecl::Import(Signature::from(sig_idx), name));
                        *next_func += 1;
                        ImportKind::Func(func)
                    }
                    TypeRef::Global(ty) => ImportKind::Global(module.globals.push(GlobalData {
                        ty: ty.content_type.into(),
                        init: GlobalInit::Import,
                        mutable: ty.mutable,
                    })),
                    TypeRef::Table(ty) => ImportKind::Table(module.tables.push(table_data(
                        u64::from(ty.initial),
                        ty.maximum.map(u64::from),
                    )?)),
                    TypeRef::Memory(ty) => ImportKind::Memory(module.memories.push(memory_data(&ty)?)),
                    other => bail!(FrontendError::UnsupportedFeature(format!(
                        "import of {:?}",
                        other
                    ))),
                };
                module.imports.push(Import {
                    module: import.module.to_owned(),
                    name: import.name.to_owned(),
                    kind,
                });
            }
        }
        Payload::FunctionSection(reader) => {
            for sig_idx in reader {
                let sig = Signature::from(sig_idx?);
                let sig_data = module
                    .signature(sig)
                    .ok_or_else(|| internal("function signature out of range"))?;
                let body = FunctionBody::new(&sig_data.params, &sig_data.returns);
                module.funcs.push(FuncDecl::Body(sig, String::new(), body));
            }
        }
        Payload::TableSection(reader) => {
            for table in reader {
                let table = table?;
                module.tables.push(table_data(
                    u64::from(table.ty.initial),
                    table.ty.maximum.map(u64::from),
                )?);
            }
        }
        Payload::MemorySection(reader) => {
            for memory in reader {
                let memory = memory?;
                module.memories.push(memory_data(&memory)?);
            }
        }
        Payload::GlobalSection(reader) => {
            for global in reader {
                let global = global?;
                let init = match const_expr(&global.init_expr)? {
                    ConstValue::Bits(bits) => GlobalInit::Const(bits),
                    ConstValue::Global(from) => GlobalInit::Global(from),
                    // Reference-typed globals have no C rendering; the
                    // backend reports them by type.
                    ConstValue::Func(_) | ConstValue::Null => GlobalInit::Const(0),
                };
                module.globals.push(GlobalData {
                    ty: global.ty.content_type.into(),
                    init,
                    mutable: global.ty.mutable,
                });
            }
        }
        Payload::ExportSection(reader) => {
            for export in reader {
                let export = export?;
                let kind = match export.kind {
                    ExternalKind::Func => ExportKind::Func(Func::from(export.index)),
                    ExternalKind::Table => ExportKind::Table(Table::from(export.index)),
                    ExternalKind::Memory => ExportKind::Memory(Memory::from(export.index)),
                    ExternalKind::Global => ExportKind::Global(Global::from(export.index)),
                    _ => continue,
                };
                module.exports.push(Export {
                    name: export.name.to_owned(),
                    kind,
                });
            }
        }
        Payload::StartSection { func, .. } => {
            module.start_func = Some(Func::from(func));
        }
        Payload::ElementSection(reader) => {
            for element in reader {
                let element = element?;
                let (table, offset) = match element.kind {
                    ElementKind::Active {
                        table_index,
                        offset_expr,
                    } => (
                        Table::from(table_index.unwrap_or(0)),
                        const_offset(&offset_expr)?,
                    ),
                    _ => continue,
                };
                let mut funcs = vec![];
                match element.items {
                    ElementItems::Functions(items) => {
                        for func in items {
                            funcs.push(Func::from(func?));
                        }
                    }
                    ElementItems::Expressions(_, items) => {
                        for expr in items {
                            funcs.push(match const_expr(&expr?)? {
                                ConstValue::Func(func) => func,
                                _ => Func::invalid(),
                            });
                        }
                    }
                }
                let elements = &mut module
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| internal("element segment table out of range"))?
                    .func_elements;
                let end = offset + funcs.len();
                if end as u64 > MAX_TABLE_ELEMENTS {
                    bail!(FrontendError::TooLarge(format!(
                        "element segment ending at {}",
                        end
                    )));
                }
                if elements.len() < end {
                    elements.resize(end, Func::invalid());
                }
                elements[offset..end].copy_from_slice(&funcs[..]);
            }
        }
        Payload::DataSection(reader) => {
            for data in reader {
                let data = data?;
                if let DataKind::Active {
                    memory_index,
                    offset_expr,
                } = data.kind
                {
                    let offset = const_offset(&offset_expr)?;
                    let memory = module
                        .memories
                        .get_mut(Memory::from(memory_index))
                        .ok_or_else(|| internal("data segment memory out of range"))?;
                    memory.segments.push(MemorySegment {
                        offset,
                        data: data.data.to_vec(),
                    });
                }
            }
        }
        Payload::CodeSectionEntry(body) => {
            let func = Func::new(*next_func);
            *next_func += 1;

            let body = parse_body_or_placeholder(module, func, body)?;
            match module.funcs.get_mut(func) {
                Some(FuncDecl::Body(_, _, existing_body)) => *existing_body = body,
                _ => bail!(internal("code entry without a function declaration")),
            }
        }
        Payload::CustomSection(reader) => {
            // Debug names are best-effort: a malformed name section
            // only costs us readable names.
            if let KnownCustom::Name(names) = reader.as_known() {
                for name in names {
                    if let Ok(Name::Function(map)) = name {
                        for naming in map.into_iter().flatten() {
                            func_names.insert(naming.index, naming.name.to_owned());
                        }
                    }
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// Parse a function body. A body using features that have no tree
/// form (SIMD, multi-value, exceptions, ...) becomes a single
/// `Unsupported` node so the rest of the module still decompiles.
fn parse_body_or_placeholder(
    module: &Module,
    func: Func,
    body: wasmparser::FunctionBody<'_>,
) -> Result<FunctionBody> {
    match parse_body(module, func, body) {
        Ok(body) => Ok(body),
        Err(e) => match e.downcast::<FrontendError>() {
            Ok(FrontendError::UnsupportedFeature(what)) => {
                debug!("{}: body not representable: {}", func, what);
                let sig = module
                    .func_signature(func)
                    .ok_or_else(|| internal("function signature out of range"))?;
                let mut placeholder = FunctionBody::new(&sig.params, &sig.returns);
                placeholder.body = Expr::block(
                    vec![Expr::unsupported(what, vec![], Type::None)],
                    Type::None,
                );
                Ok(placeholder)
            }
            Ok(other) => Err(other.into()),
            Err(e) => Err(e),
        },
    }
}

fn parse_body(
    module: &Module,
    func: Func,
    body: wasmparser::FunctionBody<'_>,
) -> Result<FunctionBody> {
    let sig = module
        .func_signature(func)
        .ok_or_else(|| internal("function signature out of range"))?;
    let ret_ty = match sig.result() {
        Some(ty) => ty,
        None => bail!(FrontendError::UnsupportedFeature(
            "multiple return values".to_owned()
        )),
    };
    let mut ret = FunctionBody::new(&sig.params, &sig.returns);
    for local in body.get_locals_reader()? {
        let (count, ty) = local?;
        let ty = Type::from(ty);
        if !ty.is_numeric() {
            bail!(FrontendError::UnsupportedFeature(format!("{} local", ty)));
        }
        for _ in 0..count {
            ret.add_local(ty);
        }
    }
    ret.n_declared = ret.locals.len();

    let mut builder = FunctionBodyBuilder::new(module, &mut ret, ret_ty);
    let mut reader = body.get_operators_reader()?;
    while !reader.eof() {
        builder.handle_op(reader.read()?)?;
    }
    if !builder.ctrl_stack.is_empty() {
        bail!(internal("function body ended inside a block"));
    }
    trace!("{}: parsed body:\n{}", func, ret.display("  "));

    Ok(ret)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
    Else,
}

/// An open structured-control construct: everything pushed since it
/// began, and what it needs to become a node at its `end`.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Result type of the construct.
    ty: Type,
    /// Expressions and statements pushed inside this construct, in
    /// order. Void entries are statements; the rest are pending
    /// operands.
    stack: Vec<Expr>,
    /// Set after an unconditional control transfer: the operand
    /// stack is polymorphic until the construct ends (or `else`).
    unreachable: bool,
    cond: Option<Expr>,
    if_true: Vec<Expr>,
}

impl Frame {
    fn new(kind: FrameKind, ty: Type) -> Frame {
        Frame {
            kind,
            ty,
            stack: vec![],
            unreachable: false,
            cond: None,
            if_true: vec![],
        }
    }

    /// Type of the value a branch to this frame carries.
    fn label_ty(&self) -> Type {
        match self.kind {
            FrameKind::Loop => Type::None,
            _ => self.ty,
        }
    }
}

#[derive(Debug)]
struct FunctionBodyBuilder<'a, 'b> {
    module: &'a Module,
    body: &'b mut FunctionBody,
    ret_ty: Type,
    ctrl_stack: Vec<Frame>,
}

impl<'a, 'b> FunctionBodyBuilder<'a, 'b> {
    fn new(module: &'a Module, body: &'b mut FunctionBody, ret_ty: Type) -> Self {
        Self {
            module,
            body,
            ret_ty,
            ctrl_stack: vec![Frame::new(FrameKind::Function, ret_ty)],
        }
    }

    fn frame(&mut self) -> Result<&mut Frame> {
        self.ctrl_stack
            .last_mut()
            .ok_or_else(|| internal("operator after the end of the function"))
    }

    fn push(&mut self, expr: Expr) -> Result<()> {
        self.frame()?.stack.push(expr);
        Ok(())
    }

    fn set_unreachable(&mut self) -> Result<()> {
        self.frame()?.unreachable = true;
        Ok(())
    }

    /// Pop the topmost pending operand of the current frame.
    ///
    /// If statements were pushed after the operand, it is moved into
    /// a fresh local so that it is still evaluated before them. In
    /// dead code (no operand, or a branch after it) an `unreachable`
    /// placeholder is returned.
    fn pop(&mut self) -> Result<Expr> {
        let frame = self
            .ctrl_stack
            .last_mut()
            .ok_or_else(|| internal("operator after the end of the function"))?;
        let pos = match frame.stack.iter().rposition(|e| e.ty.is_value()) {
            Some(pos) => pos,
            None if frame.unreachable => return Ok(Expr::unreachable()),
            None => bail!(internal("operand stack underflow")),
        };
        if frame.stack[pos + 1..].iter().any(|e| e.is_terminator()) {
            return Ok(Expr::unreachable());
        }
        if pos + 1 == frame.stack.len() || frame.stack[pos].is_const() {
            return Ok(frame.stack.remove(pos));
        }

        let ty = frame.stack[pos].ty;
        let local = self.body.add_local(ty);
        trace!("spilling operand beneath statements into {}", local);
        let value = std::mem::replace(&mut frame.stack[pos], Expr::nop());
        frame.stack[pos] = Expr::local_set(local, value);
        Ok(Expr::local_get(local, ty))
    }

    fn pop_opt(&mut self, ty: Type) -> Result<Option<Box<Expr>>> {
        if ty.is_value() {
            Ok(Some(Box::new(self.pop()?)))
        } else {
            Ok(None)
        }
    }

    fn pop_args(&mut self, count: usize) -> Result<Vec<Expr>> {
        let mut args = (0..count)
            .map(|_| self.pop())
            .collect::<Result<Vec<_>>>()?;
        args.reverse();
        Ok(args)
    }

    /// Make sure a construct with a result ends with its value on
    /// top of its own stack.
    fn finish_result(&mut self) -> Result<()> {
        let frame = self.frame()?;
        let needs_value = frame.ty.is_value()
            && !frame.unreachable
            && frame.stack.last().map_or(true, |e| !e.ty.is_value());
        if needs_value {
            let value = self.pop()?;
            self.push(value)?;
        }
        Ok(())
    }

    fn label_ty(&self, depth: u32) -> Result<Type> {
        let index = self
            .ctrl_stack
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or_else(|| internal("branch depth out of range"))?;
        Ok(self.ctrl_stack[index].label_ty())
    }

    fn block_type(&self, ty: BlockType) -> Result<Type> {
        match ty {
            BlockType::Empty => Ok(Type::None),
            BlockType::Type(ty) => Ok(ty.into()),
            BlockType::FuncType(sig) => {
                let sig = self
                    .module
                    .signature(Signature::from(sig))
                    .ok_or_else(|| internal("block signature out of range"))?;
                if !sig.params.is_empty() || sig.returns.len() > 1 {
                    bail!(FrontendError::UnsupportedFeature(
                        "multi-value block".to_owned()
                    ));
                }
                Ok(sig.returns.first().copied().unwrap_or(Type::None))
            }
        }
    }

    fn open(&mut self, kind: FrameKind, ty: BlockType) -> Result<Frame> {
        let ty = self.block_type(ty)?;
        if !(ty == Type::None || ty.is_numeric()) {
            bail!(FrontendError::UnsupportedFeature(format!("{} block", ty)));
        }
        Ok(Frame::new(kind, ty))
    }

    fn call_result(sig: &SignatureData) -> Result<Type> {
        match sig.result() {
            Some(ty) => Ok(ty),
            None => bail!(FrontendError::UnsupportedFeature(
                "call with multiple return values".to_owned()
            )),
        }
    }

    fn end(&mut self) -> Result<()> {
        self.finish_result()?;
        let frame = self
            .ctrl_stack
            .pop()
            .ok_or_else(|| internal("unbalanced end"))?;
        let expr = match frame.kind {
            FrameKind::Function => {
                self.body.body = Expr::block(frame.stack, frame.ty);
                return Ok(());
            }
            FrameKind::Block => Expr::block(frame.stack, frame.ty),
            FrameKind::Loop => Expr::new(ExprKind::Loop { body: frame.stack }, frame.ty),
            FrameKind::If | FrameKind::Else => {
                let cond = frame.cond.ok_or_else(|| internal("if without condition"))?;
                let (if_true, if_false) = if frame.kind == FrameKind::If {
                    (frame.stack, vec![])
                } else {
                    (frame.if_true, frame.stack)
                };
                Expr::new(
                    ExprKind::If {
                        cond: Box::new(cond),
                        if_true,
                        if_false,
                    },
                    frame.ty,
                )
            }
        };
        self.push(expr)
    }

    fn handle_op(&mut self, op: Operator<'_>) -> Result<()> {
        trace!("handle_op: {:?}", op);
        match &op {
            Operator::Nop => {}
            Operator::Unreachable => {
                self.push(Expr::unreachable())?;
                self.set_unreachable()?;
            }

            Operator::Block { blockty } => {
                let frame = self.open(FrameKind::Block, *blockty)?;
                self.ctrl_stack.push(frame);
            }
            Operator::Loop { blockty } => {
                let frame = self.open(FrameKind::Loop, *blockty)?;
                self.ctrl_stack.push(frame);
            }
            Operator::If { blockty } => {
                let mut frame = self.open(FrameKind::If, *blockty)?;
                frame.cond = Some(self.pop()?);
                self.ctrl_stack.push(frame);
            }
            Operator::Else => {
                self.finish_result()?;
                let frame = self.frame()?;
                frame.if_true = std::mem::take(&mut frame.stack);
                frame.kind = FrameKind::Else;
                frame.unreachable = false;
            }
            Operator::End => self.end()?,

            Operator::Br { relative_depth } => {
                let value = self.pop_opt(self.label_ty(*relative_depth)?)?;
                self.push(Expr::new(
                    ExprKind::Br {
                        depth: *relative_depth,
                        value,
                    },
                    Type::None,
                ))?;
                self.set_unreachable()?;
            }
            Operator::BrIf { relative_depth } => {
                let ty = self.label_ty(*relative_depth)?;
                let cond = Box::new(self.pop()?);
                let value = self.pop_opt(ty)?;
                self.push(Expr::new(
                    ExprKind::BrIf {
                        depth: *relative_depth,
                        cond,
                        value,
                    },
                    ty,
                ))?;
            }
            Operator::BrTable { targets } => {
                let default = targets.default();
                let depths = targets.targets().collect::<Result<Vec<u32>, _>>()?;
                let ty = self.label_ty(default)?;
                let index = Box::new(self.pop()?);
                let value = self.pop_opt(ty)?;
                self.push(Expr::new(
                    ExprKind::BrTable {
                        targets: depths,
                        default,
                        index,
                        value,
                    },
                    Type::None,
                ))?;
                self.set_unreachable()?;
            }
            Operator::Return => {
                let value = self.pop_opt(self.ret_ty)?;
                self.push(Expr::new(ExprKind::Return { value }, Type::None))?;
                self.set_unreachable()?;
            }

            Operator::Call { function_index } => {
                let module = self.module;
                let func = Func::from(*function_index);
                let sig = module
                    .func_signature(func)
                    .ok_or_else(|| internal("call target out of range"))?;
                let ty = Self::call_result(sig)?;
                let args = self.pop_args(sig.params.len())?;
                self.push(Expr::new(ExprKind::Call { func, args }, ty))?;
            }
            Operator::CallIndirect {
                type_index,
                table_index,
            } => {
                let module = self.module;
                let sig = Signature::from(*type_index);
                let sig_data = module
                    .signature(sig)
                    .ok_or_else(|| internal("call_indirect signature out of range"))?;
                let ty = Self::call_result(sig_data)?;
                let target = Box::new(self.pop()?);
                let args = self.pop_args(sig_data.params.len())?;
                self.push(Expr::new(
                    ExprKind::CallIndirect {
                        sig,
                        table: Table::from(*table_index),
                        args,
                        target,
                    },
                    ty,
                ))?;
            }

            Operator::Drop => {
                let value = Box::new(self.pop()?);
                self.push(Expr::new(ExprKind::Drop { value }, Type::None))?;
            }
            Operator::Select | Operator::TypedSelect { .. } => {
                let cond = Box::new(self.pop()?);
                let if_false = Box::new(self.pop()?);
                let if_true = Box::new(self.pop()?);
                let ty = if if_true.ty.is_value() {
                    if_true.ty
                } else {
                    if_false.ty
                };
                self.push(Expr::new(
                    ExprKind::Select {
                        if_true,
                        if_false,
                        cond,
                    },
                    ty,
                ))?;
            }

            Operator::LocalGet { local_index } => {
                let local = Local::from(*local_index);
                let ty = self.local_ty(local)?;
                self.push(Expr::local_get(local, ty))?;
            }
            Operator::LocalSet { local_index } | Operator::LocalTee { local_index } => {
                let local = Local::from(*local_index);
                let tee = matches!(op, Operator::LocalTee { .. });
                let ty = if tee { self.local_ty(local)? } else { Type::None };
                let value = Box::new(self.pop()?);
                self.push(Expr::new(ExprKind::LocalSet { local, value, tee }, ty))?;
            }
            Operator::GlobalGet { global_index } => {
                let global = Global::from(*global_index);
                let ty = self.global_ty(global)?;
                self.push(Expr::new(ExprKind::GlobalGet { global }, ty))?;
            }
            Operator::GlobalSet { global_index } => {
                let global = Global::from(*global_index);
                let value = Box::new(self.pop()?);
                self.push(Expr::new(ExprKind::GlobalSet { global, value }, Type::None))?;
            }

            Operator::I32Const { value } => self.push(Expr::constant(Literal::I32(*value)))?,
            Operator::I64Const { value } => self.push(Expr::constant(Literal::I64(*value)))?,
            Operator::F32Const { value } => {
                self.push(Expr::constant(Literal::F32(value.bits())))?
            }
            Operator::F64Const { value } => {
                self.push(Expr::constant(Literal::F64(value.bits())))?
            }

            Operator::MemorySize { mem } => {
                let mem = Memory::from(*mem);
                self.push(Expr::new(ExprKind::MemorySize { mem }, Type::I32))?;
            }
            Operator::MemoryGrow { mem } => {
                let mem = Memory::from(*mem);
                let delta = Box::new(self.pop()?);
                self.push(Expr::new(ExprKind::MemoryGrow { mem, delta }, Type::I32))?;
            }
            Operator::MemoryCopy { .. } => {
                let len = Box::new(self.pop()?);
                let src = Box::new(self.pop()?);
                let dst = Box::new(self.pop()?);
                self.push(Expr::new(
                    ExprKind::MemoryCopy { dst, src, len },
                    Type::None,
                ))?;
            }
            Operator::MemoryFill { .. } => {
                let len = Box::new(self.pop()?);
                let value = Box::new(self.pop()?);
                let dst = Box::new(self.pop()?);
                self.push(Expr::new(
                    ExprKind::MemoryFill { dst, value, len },
                    Type::None,
                ))?;
            }

            _ => self.handle_simple_op(&op)?,
        }

        Ok(())
    }

    /// Memory accesses, numeric operators, and opaque operators with a
    /// known stack effect.
    fn handle_simple_op(&mut self, op: &Operator<'_>) -> Result<()> {
        if let Some(mem) = mem_op(op) {
            match mem {
                MemOp::Load(access) => {
                    let ptr = Box::new(self.pop()?);
                    self.push(Expr::new(ExprKind::Load { access, ptr }, access.ty))
                }
                MemOp::Store(access) => {
                    let value = Box::new(self.pop()?);
                    let ptr = Box::new(self.pop()?);
                    self.push(Expr::new(
                        ExprKind::Store { access, ptr, value },
                        Type::None,
                    ))
                }
            }
        } else if let Some(op) = UnaryOp::from_wasm(op) {
            let value = Box::new(self.pop()?);
            self.push(Expr::new(ExprKind::Unary { op, value }, op.result_ty()))
        } else if let Some(op) = BinaryOp::from_wasm(op) {
            let rhs = Box::new(self.pop()?);
            let lhs = Box::new(self.pop()?);
            self.push(Expr::new(ExprKind::Binary { op, lhs, rhs }, op.result_ty()))
        } else if let Some((what, params, result)) = opaque_op_effect(op) {
            let operands = self.pop_args(params.len())?;
            self.push(Expr::unsupported(what.to_owned(), operands, result))
        } else {
            bail!(FrontendError::UnsupportedFeature(format!(
                "operator {:?}",
                op
            )))
        }
    }

    fn local_ty(&self, local: Local) -> Result<Type> {
        self.body
            .locals
            .get(local)
            .copied()
            .ok_or_else(|| internal("local index out of range"))
    }

    fn global_ty(&self, global: Global) -> Result<Type> {
        self.module
            .globals
            .get(global)
            .map(|global| global.ty)
            .ok_or_else(|| internal("global index out of range"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(wat: &str) -> Module {
        wasm_to_ir(wat.as_bytes(), DisasmMode::Wast).unwrap()
    }

    fn body(module: &Module, index: u32) -> &FunctionBody {
        module.funcs[Func::from(index)].body().unwrap()
    }

    #[test]
    fn builds_tree_from_stack_code() {
        let module = parse(
            r#"(module
                (func (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add))"#,
        );
        let body = body(&module, 0);
        assert_eq!(body.body.ty, Type::I32);
        match &body.body.kind {
            ExprKind::Block { body } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(
                    body[0].kind,
                    ExprKind::Binary {
                        op: BinaryOp::I32Add,
                        ..
                    }
                ));
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn operand_beneath_statement_is_spilled() {
        let module = parse(
            r#"(module
                (global $g (mut i32) (i32.const 0))
                (func (param i32) (result i32)
                    local.get 0
                    i32.const 1
                    global.set $g
                    i32.const 2
                    i32.add))"#,
        );
        let body = body(&module, 0);
        // A fresh local was added for the spilled operand.
        assert_eq!(body.vars(), &[Type::I32]);
        assert_eq!(body.n_declared, 1);
        assert!(!body.is_declared(Local::from(1)));
        match &body.body.kind {
            ExprKind::Block { body } => {
                assert_eq!(body.len(), 3);
                assert!(matches!(body[0].kind, ExprKind::LocalSet { .. }));
                assert!(matches!(body[1].kind, ExprKind::GlobalSet { .. }));
                assert!(matches!(body[2].kind, ExprKind::Binary { .. }));
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn dead_code_operands_become_unreachable() {
        let module = parse(
            r#"(module
                (func (result i32)
                    return (i32.const 3)
                    i32.add))"#,
        );
        let body = body(&module, 0);
        match &body.body.kind {
            ExprKind::Block { body } => {
                assert!(matches!(body[0].kind, ExprKind::Return { .. }));
                match &body[1].kind {
                    ExprKind::Binary { lhs, rhs, .. } => {
                        assert_eq!(lhs.kind, ExprKind::Unreachable);
                        assert_eq!(rhs.kind, ExprKind::Unreachable);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn segments_and_exports() {
        let module = parse(
            r#"(module
                (memory 1)
                (table 4 funcref)
                (data (i32.const 16) "hi")
                (elem (i32.const 1) $f)
                (func $f (export "f"))
                (export "mem" (memory 0)))"#,
        );
        assert_eq!(module.memories[Memory::from(0)].segments[0].offset, 16);
        assert_eq!(
            module.tables[Table::from(0)].func_elements,
            vec![Func::invalid(), Func::from(0)]
        );
        assert_eq!(module.func_exports(Func::from(0)).collect::<Vec<_>>(), vec!["f"]);
        assert_eq!(module.funcs[Func::from(0)].name(), "f");
    }

    #[test]
    fn simd_body_becomes_placeholder() {
        let module = parse(
            r#"(module
                (func (result i32)
                    v128.const i32x4 1 2 3 4
                    i32x4.extract_lane 0))"#,
        );
        let body = body(&module, 0);
        match &body.body.kind {
            ExprKind::Block { body } => {
                assert!(matches!(body[0].kind, ExprKind::Unsupported { .. }))
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn asm_js_is_rejected() {
        assert!(wasm_to_ir(b"function f() {}", DisasmMode::AsmJs).is_err());
    }
}

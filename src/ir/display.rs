//! Displaying IR.

use super::{Expr, ExprKind, FuncDecl, FunctionBody, Literal, Module};
use std::fmt::{Display, Formatter, Result as FmtResult};

pub struct FunctionBodyDisplay<'a>(pub(crate) &'a FunctionBody, pub(crate) &'a str);

impl<'a> Display for FunctionBodyDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let arg_tys = self
            .0
            .params()
            .iter()
            .map(|&ty| format!("{}", ty))
            .collect::<Vec<_>>();
        let ret_tys = self
            .0
            .rets
            .iter()
            .map(|&ty| format!("{}", ty))
            .collect::<Vec<_>>();
        writeln!(
            f,
            "{}function({}) -> {} {{",
            self.1,
            arg_tys.join(", "),
            ret_tys.join(", ")
        )?;
        for (i, ty) in self.0.vars().iter().enumerate() {
            writeln!(f, "{}  local{}: {}", self.1, self.0.n_params + i, ty)?;
        }
        let indent = format!("{}  ", self.1);
        write_expr(f, &self.0.body, &indent)?;
        writeln!(f, "{}}}", self.1)
    }
}

fn write_list(f: &mut Formatter, list: &[Expr], indent: &str) -> FmtResult {
    let inner = format!("{}  ", indent);
    for expr in list {
        write_expr(f, expr, &inner)?;
    }
    Ok(())
}

fn write_expr(f: &mut Formatter, expr: &Expr, indent: &str) -> FmtResult {
    let head = match &expr.kind {
        ExprKind::Nop => "nop".to_owned(),
        ExprKind::Block { body } => {
            writeln!(f, "{}block -> {}", indent, expr.ty)?;
            return write_list(f, body, indent);
        }
        ExprKind::Loop { body } => {
            writeln!(f, "{}loop -> {}", indent, expr.ty)?;
            return write_list(f, body, indent);
        }
        ExprKind::If {
            cond,
            if_true,
            if_false,
        } => {
            writeln!(f, "{}if -> {}", indent, expr.ty)?;
            write_expr(f, cond, &format!("{}  ", indent))?;
            writeln!(f, "{}then", indent)?;
            write_list(f, if_true, indent)?;
            if !if_false.is_empty() {
                writeln!(f, "{}else", indent)?;
                write_list(f, if_false, indent)?;
            }
            return Ok(());
        }
        ExprKind::Br { depth, .. } => format!("br {}", depth),
        ExprKind::BrIf { depth, .. } => format!("br_if {}", depth),
        ExprKind::BrTable {
            targets, default, ..
        } => format!("br_table {:?} {}", targets, default),
        ExprKind::Return { .. } => "return".to_owned(),
        ExprKind::Unreachable => "unreachable".to_owned(),
        ExprKind::Call { func, .. } => format!("call {}", func),
        ExprKind::CallIndirect { sig, table, .. } => format!("call_indirect {} {}", sig, table),
        ExprKind::Load { access, .. } => format!(
            "load{} {}{} offset={}",
            access.bytes * 8,
            access.ty,
            if access.signed { "_s" } else { "" },
            access.offset
        ),
        ExprKind::Store { access, .. } => format!(
            "store{} {} offset={}",
            access.bytes * 8,
            access.ty,
            access.offset
        ),
        ExprKind::MemorySize { mem } => format!("memory.size {}", mem),
        ExprKind::MemoryGrow { mem, .. } => format!("memory.grow {}", mem),
        ExprKind::MemoryCopy { .. } => "memory.copy".to_owned(),
        ExprKind::MemoryFill { .. } => "memory.fill".to_owned(),
        ExprKind::LocalGet { local } => format!("local.get {}", local),
        ExprKind::LocalSet { local, tee, .. } => {
            format!("{} {}", if *tee { "local.tee" } else { "local.set" }, local)
        }
        ExprKind::GlobalGet { global } => format!("global.get {}", global),
        ExprKind::GlobalSet { global, .. } => format!("global.set {}", global),
        ExprKind::Const(value) => match value {
            Literal::I32(v) => format!("i32.const {}", v),
            Literal::I64(v) => format!("i64.const {}", v),
            Literal::F32(bits) => format!("f32.const {}", f32::from_bits(*bits)),
            Literal::F64(bits) => format!("f64.const {}", f64::from_bits(*bits)),
        },
        ExprKind::Unary { op, .. } => format!("{}", op),
        ExprKind::Binary { op, .. } => format!("{}", op),
        ExprKind::Select { .. } => "select".to_owned(),
        ExprKind::Drop { .. } => "drop".to_owned(),
        ExprKind::Unsupported { what, .. } => format!("unsupported({})", what),
    };
    writeln!(f, "{}{} # {}", indent, head, expr.ty)?;
    let inner = format!("{}  ", indent);
    let mut result = Ok(());
    expr.visit_children(|child| {
        if result.is_ok() {
            result = write_expr(f, child, &inner);
        }
    });
    result
}

pub struct ModuleDisplay<'a>(pub(crate) &'a Module);

impl<'a> Display for ModuleDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        writeln!(f, "module {{")?;
        for (sig, sig_data) in self.0.signatures.entries() {
            writeln!(
                f,
                "  {}: {:?} -> {:?}",
                sig, sig_data.params, sig_data.returns
            )?;
        }
        for (global, global_data) in self.0.globals.entries() {
            writeln!(
                f,
                "  {}: {} # {:?}{}",
                global,
                global_data.ty,
                global_data.init,
                if global_data.mutable { " mut" } else { "" }
            )?;
        }
        for (table, table_data) in self.0.tables.entries() {
            writeln!(
                f,
                "  {}: {} elements: {:?}",
                table, table_data.initial, table_data.func_elements
            )?;
        }
        for (memory, memory_data) in self.0.memories.entries() {
            writeln!(
                f,
                "  {}: {} pages, {} segments",
                memory,
                memory_data.initial_pages,
                memory_data.segments.len()
            )?;
        }
        for import in &self.0.imports {
            writeln!(
                f,
                "  import \"{}\".\"{}\": {}",
                import.module, import.name, import.kind
            )?;
        }
        for export in &self.0.exports {
            writeln!(f, "  export \"{}\": {}", export.name, export.kind)?;
        }
        for (func, func_decl) in self.0.funcs.entries() {
            match func_decl {
                FuncDecl::Body(sig, name, body) => {
                    writeln!(f, "  {} \"{}\": {} =", func, name, sig)?;
                    write!(f, "{}", body.display("    "))?;
                }
                FuncDecl::Import(sig, name) => {
                    writeln!(f, "  {} \"{}\": {}", func, name, sig)?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

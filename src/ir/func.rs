use super::{Expr, FunctionBodyDisplay, Local, Signature, Type};
use crate::entity::{EntityRef, EntityVec};

#[derive(Clone, Debug)]
pub enum FuncDecl {
    /// An imported function, with the `module.field` name it was
    /// imported under.
    Import(Signature, String),
    /// A function defined in this module, with its debug name (empty
    /// if the module carries none).
    Body(Signature, String, FunctionBody),
}

impl FuncDecl {
    pub fn sig(&self) -> Signature {
        match self {
            FuncDecl::Import(sig, ..) => *sig,
            FuncDecl::Body(sig, ..) => *sig,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FuncDecl::Import(_, name) => &name[..],
            FuncDecl::Body(_, name, _) => &name[..],
        }
    }

    pub fn body(&self) -> Option<&FunctionBody> {
        match self {
            FuncDecl::Body(_, _, body) => Some(body),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionBody {
    /// How many parameters the function has. (Their types are the
    /// first `n_params` values in `locals`.)
    pub n_params: usize,
    /// Return types of the function.
    pub rets: Vec<Type>,
    /// Local types, *including* args.
    pub locals: EntityVec<Local, Type>,
    /// How many of `locals` the Wasm code declares (args included).
    /// The rest were added while building the tree.
    pub n_declared: usize,
    /// The function's root block.
    pub body: Expr,
}

impl FunctionBody {
    pub fn new(params: &[Type], rets: &[Type]) -> FunctionBody {
        FunctionBody {
            n_params: params.len(),
            rets: rets.to_vec(),
            locals: EntityVec::from(params.to_vec()),
            n_declared: params.len(),
            body: Expr::block(vec![], Type::None),
        }
    }

    /// Parameter types.
    pub fn params(&self) -> &[Type] {
        &self.locals.as_slice()[..self.n_params]
    }

    /// Declared (non-parameter) local types, in index order.
    pub fn vars(&self) -> &[Type] {
        &self.locals.as_slice()[self.n_params..]
    }

    /// Was `local` declared by the Wasm code, rather than added to hold
    /// a spilled operand?
    pub fn is_declared(&self, local: Local) -> bool {
        local.index() < self.n_declared
    }

    pub fn add_local(&mut self, ty: Type) -> Local {
        self.locals.push(ty)
    }

    pub fn display<'a>(&'a self, indent: &'a str) -> FunctionBodyDisplay<'a> {
        FunctionBodyDisplay(self, indent)
    }
}

//! Error types.

/// An error that occurs when translating Wasm to IR.
#[derive(Clone, Debug)]
pub enum FrontendError {
    /// The given WebAssembly feature is not supported.
    UnsupportedFeature(String),
    /// Some dimension of the WebAssembly module is too large to be
    /// supported by this library.
    TooLarge(String),
    /// An internal error occurred.
    Internal(String),
}

impl std::fmt::Display for FrontendError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for FrontendError {}

/// A problem found while translating a module to C. None of these
/// stop translation: a placeholder is emitted and the result is
/// marked as failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecompileError {
    /// An operation or type with no C rendering.
    Unsupported { func: Option<u32>, what: String },
    /// A local, function, global, table, signature or branch-depth
    /// index outside its declared bounds.
    MalformedIndex { func: Option<u32>, what: String },
    /// An import no loaded module exports, an export claimed by
    /// several modules, or an import whose type differs from the
    /// export it resolves to.
    UnresolvedSymbol { module: String, name: String, reason: String },
}

impl std::fmt::Display for DecompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecompileError::Unsupported { func: Some(func), what } => {
                write!(f, "unsupported in function {}: {}", func, what)
            }
            DecompileError::Unsupported { func: None, what } => write!(f, "unsupported: {}", what),
            DecompileError::MalformedIndex {
                func: Some(func),
                what,
            } => write!(f, "malformed index in function {}: {}", func, what),
            DecompileError::MalformedIndex { func: None, what } => {
                write!(f, "malformed index: {}", what)
            }
            DecompileError::UnresolvedSymbol {
                module,
                name,
                reason,
            } => write!(f, "unresolved symbol '{}' in {}: {}", name, module, reason),
        }
    }
}

impl std::error::Error for DecompileError {}

//! wasmdec: a WebAssembly to C decompiler.

// Re-export wasmparser for easier use of the right version by our embedders.
pub use wasmparser;

mod backend;
mod config;
mod decompiler;
pub mod entity;
mod errors;
mod frontend;
mod ir;
mod link;
mod op_traits;
mod ops;

pub use backend::{CompiledModule, Names};
pub use config::{DisasmConfig, DisasmMode};
pub use decompiler::{Decompiled, Decompiler};
pub use errors::*;
pub use ir::*;
pub use link::MultiDecompiler;
pub use ops::{BinaryOp, UnaryOp};

#[cfg(feature = "fuzzing")]
pub mod fuzzing;

use super::{Func, FuncDecl, Global, Memory, ModuleDisplay, Signature, Table, Type};
use crate::entity::{EntityRef, EntityVec};
use crate::frontend;
use crate::DisasmMode;
use anyhow::Result;

/// Size of one Wasm linear-memory page in bytes.
pub const WASM_PAGE_SIZE: usize = 65536;

/// A Wasm module, represented as a collection of IR entities.
///
/// A module is produced once by the frontend and is never mutated
/// afterward: the decompiler only reads it.
#[derive(Clone, Debug)]
pub struct Module {
    /// The functions in this module: imports first, then bodies.
    pub funcs: EntityVec<Func, FuncDecl>,
    /// Type signatures, referred to by `funcs` and indirect calls.
    pub signatures: EntityVec<Signature, SignatureData>,
    /// Global variables in this module, imported ones included.
    pub globals: EntityVec<Global, GlobalData>,
    /// Tables in this module, imported ones included.
    pub tables: EntityVec<Table, TableData>,
    /// Linear memories in this module, imported ones included.
    pub memories: EntityVec<Memory, MemoryData>,
    /// Imports into this module. Function and global imports also
    /// have an entry at the appropriate index in `funcs`/`globals`.
    pub imports: Vec<Import>,
    /// Exports from this module.
    pub exports: Vec<Export>,
    /// The "start function" invoked at instantiation, if any.
    pub start_func: Option<Func>,
}

/// A function signature definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureData {
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
}

impl SignatureData {
    /// The single result type, `Type::None` for no results, or
    /// `None` when the signature uses multiple results.
    pub fn result(&self) -> Option<Type> {
        match self.returns.len() {
            0 => Some(Type::None),
            1 => Some(self.returns[0]),
            _ => None,
        }
    }
}

impl From<&wasmparser::FuncType> for SignatureData {
    fn from(fty: &wasmparser::FuncType) -> Self {
        Self {
            params: fty.params().iter().map(|&ty| ty.into()).collect(),
            returns: fty.results().iter().map(|&ty| ty.into()).collect(),
        }
    }
}

/// A memory definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryData {
    /// How many Wasm pages (64KiB size) in the initial memory size?
    pub initial_pages: usize,
    /// How many Wasm pages (64KiB size) in the maximum memory size?
    pub maximum_pages: Option<usize>,
    /// Initialization data (initial image) for this memory.
    pub segments: Vec<MemorySegment>,
}

impl MemoryData {
    /// The initial contents of this memory: `initial_pages` pages of
    /// zeroes with every active data segment copied in. Segment bytes
    /// beyond the initial size are dropped.
    pub fn image(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.initial_pages * WASM_PAGE_SIZE];
        for segment in &self.segments {
            if segment.offset >= bytes.len() {
                continue;
            }
            let end = std::cmp::min(bytes.len(), segment.offset + segment.data.len());
            let len = end - segment.offset;
            bytes[segment.offset..end].copy_from_slice(&segment.data[..len]);
        }
        bytes
    }
}

/// A segment of data in a memory's initial state.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemorySegment {
    /// The offset of this data.
    pub offset: usize,
    /// The data, overlaid on previously-existing data at this offset.
    pub data: Vec<u8>,
}

/// A table definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableData {
    /// The initial size (in elements) of this table.
    pub initial: u64,
    /// The maximum size (in elements), if any, of this table.
    pub max: Option<u64>,
    /// The initial contents of the table, from active element
    /// segments. `null` entries are represented by `Func::invalid()`.
    pub func_elements: Vec<Func>,
}

impl TableData {
    /// The initial contents as one little-endian `u32` function index
    /// per declared element; null entries are `u32::MAX`.
    pub fn image(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.initial as usize * 4);
        for i in 0..self.initial as usize {
            let func = self
                .func_elements
                .get(i)
                .copied()
                .unwrap_or_else(Func::invalid);
            let index = if func.is_valid() {
                func.index() as u32
            } else {
                u32::MAX
            };
            bytes.extend_from_slice(&index.to_le_bytes());
        }
        bytes
    }
}

/// How a global variable gets its initial value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlobalInit {
    /// Imported: the value comes from outside the module.
    Import,
    /// A constant, as a bundle of 64 bits (all numeric types can be
    /// represented in this way).
    Const(u64),
    /// The value of another (imported) global.
    Global(Global),
}

/// A global-variable definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalData {
    /// The type of this global variable.
    pub ty: Type,
    /// The initial value of this global variable.
    pub init: GlobalInit,
    /// Whether this global variable is mutable.
    pub mutable: bool,
}

/// A module import definition.
#[derive(Clone, Debug)]
pub struct Import {
    /// The name of the module the import comes from.
    pub module: String,
    /// The name of the export within that module that this import
    /// comes from.
    pub name: String,
    /// The kind of import and its specific entity index.
    pub kind: ImportKind,
}

/// The kind of of a Wasm import, including the specific entity index
/// that the import corresponds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
    Table(Table),
    Func(Func),
    Global(Global),
    Memory(Memory),
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ImportKind::Table(table) => write!(f, "{}", table),
            ImportKind::Func(func) => write!(f, "{}", func),
            ImportKind::Global(global) => write!(f, "{}", global),
            ImportKind::Memory(mem) => write!(f, "{}", mem),
        }
    }
}

/// A module export definition.
#[derive(Clone, Debug)]
pub struct Export {
    /// The name of this export.
    pub name: String,
    /// The kind of export and its specific entity index.
    pub kind: ExportKind,
}

/// The kind of a Wasm export, including the specific entity index
/// that this export directive exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Table(Table),
    Func(Func),
    Global(Global),
    Memory(Memory),
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ExportKind::Table(table) => write!(f, "{}", table),
            ExportKind::Func(func) => write!(f, "{}", func),
            ExportKind::Global(global) => write!(f, "{}", global),
            ExportKind::Memory(memory) => write!(f, "{}", memory),
        }
    }
}

impl Module {
    /// Create a new empty Wasm module, ready for entities to be added.
    pub fn empty() -> Module {
        Module {
            funcs: EntityVec::default(),
            signatures: EntityVec::default(),
            globals: EntityVec::default(),
            tables: EntityVec::default(),
            memories: EntityVec::default(),
            imports: vec![],
            exports: vec![],
            start_func: None,
        }
    }

    /// Parse a WebAssembly module, binary or text depending on
    /// `mode`, into IR.
    pub fn from_wasm_bytes(bytes: &[u8], mode: DisasmMode) -> Result<Self> {
        frontend::wasm_to_ir(bytes, mode)
    }

    pub fn signature(&self, sig: Signature) -> Option<&SignatureData> {
        self.signatures.get(sig)
    }

    /// The signature of a function, if both the function and its
    /// signature index are in range.
    pub fn func_signature(&self, func: Func) -> Option<&SignatureData> {
        self.funcs
            .get(func)
            .and_then(|decl| self.signatures.get(decl.sig()))
    }

    /// All export names that refer to the given function.
    pub fn func_exports<'b>(&'b self, func: Func) -> impl Iterator<Item = &'b str> + 'b {
        self.exports
            .iter()
            .filter(move |export| export.kind == ExportKind::Func(func))
            .map(|export| &export.name[..])
    }

    /// All export names that refer to the given global.
    pub fn global_exports<'b>(&'b self, global: Global) -> impl Iterator<Item = &'b str> + 'b {
        self.exports
            .iter()
            .filter(move |export| export.kind == ExportKind::Global(global))
            .map(|export| &export.name[..])
    }

    /// All export names that refer to the given memory.
    pub fn memory_exports<'b>(&'b self, memory: Memory) -> impl Iterator<Item = &'b str> + 'b {
        self.exports
            .iter()
            .filter(move |export| export.kind == ExportKind::Memory(memory))
            .map(|export| &export.name[..])
    }

    /// All export names that refer to the given table.
    pub fn table_exports<'b>(&'b self, table: Table) -> impl Iterator<Item = &'b str> + 'b {
        self.exports
            .iter()
            .filter(move |export| export.kind == ExportKind::Table(table))
            .map(|export| &export.name[..])
    }

    /// Return a wrapper that implements Display on this module,
    /// pretty-printing it as textual IR.
    pub fn display(&self) -> ModuleDisplay<'_> {
        ModuleDisplay(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_image_applies_segments() {
        let memory = MemoryData {
            initial_pages: 1,
            maximum_pages: None,
            segments: vec![
                MemorySegment {
                    offset: 8,
                    data: vec![1, 2, 3],
                },
                MemorySegment {
                    offset: WASM_PAGE_SIZE - 1,
                    data: vec![9, 9],
                },
            ],
        };
        let image = memory.image();
        assert_eq!(image.len(), WASM_PAGE_SIZE);
        assert_eq!(&image[7..12], &[0, 1, 2, 3, 0]);
        assert_eq!(image[WASM_PAGE_SIZE - 1], 9);
    }

    #[test]
    fn display_lists_state_and_bodies() {
        let module = Module::from_wasm_bytes(
            br#"(module
                (import "env" "mem" (memory 1))
                (table (export "tbl") 2 funcref)
                (func $answer (export "answer") (result i32) (i32.const 42)))"#,
            crate::DisasmMode::Wast,
        )
        .unwrap();
        assert_eq!(module.memory_exports(Memory::from(0)).count(), 0);
        assert_eq!(module.table_exports(Table::from(0)).collect::<Vec<_>>(), &["tbl"]);

        let text = module.display().to_string();
        assert!(text.starts_with("module {\n"));
        assert!(text.contains("  memory0: 1 pages, 0 segments\n"));
        assert!(text.contains("  import \"env\".\"mem\": memory0\n"));
        assert!(text.contains("  export \"tbl\": table0\n"));
        assert!(text.contains("  func0 \"answer\": sig0 =\n"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn table_image_has_one_word_per_element() {
        let table = TableData {
            initial: 3,
            max: None,
            func_elements: vec![Func::from(4), Func::invalid()],
        };
        let image = table.image();
        assert_eq!(image.len(), 12);
        assert_eq!(&image[0..4], &4u32.to_le_bytes());
        assert_eq!(&image[4..8], &u32::MAX.to_le_bytes());
        assert_eq!(&image[8..12], &u32::MAX.to_le_bytes());
    }
}

//! Decompiler configuration.

use std::path::Path;

/// How the input bytes are to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisasmMode {
    /// Guess: binary if the input starts with the Wasm magic number,
    /// text otherwise.
    None,
    Wasm,
    Wast,
    AsmJs,
}

impl Default for DisasmMode {
    fn default() -> Self {
        DisasmMode::None
    }
}

impl DisasmMode {
    pub fn from_extension(ext: &str) -> DisasmMode {
        match ext {
            "wasm" => DisasmMode::Wasm,
            "wast" | "wat" => DisasmMode::Wast,
            "js" => DisasmMode::AsmJs,
            _ => DisasmMode::None,
        }
    }

    pub fn from_path(path: &Path) -> DisasmMode {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(DisasmMode::None, DisasmMode::from_extension)
    }
}

/// Options for one decompilation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisasmConfig {
    /// Log the parsed IR of every function at debug level.
    pub debug: bool,
    /// Annotate local declarations with their Wasm indices and
    /// zero-initialize them.
    pub extra_info: bool,
    pub mode: DisasmMode,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modes_from_paths() {
        assert_eq!(DisasmMode::from_path(Path::new("a/b.wasm")), DisasmMode::Wasm);
        assert_eq!(DisasmMode::from_path(Path::new("b.wat")), DisasmMode::Wast);
        assert_eq!(DisasmMode::from_path(Path::new("b.wast")), DisasmMode::Wast);
        assert_eq!(DisasmMode::from_path(Path::new("b.js")), DisasmMode::AsmJs);
        assert_eq!(DisasmMode::from_path(Path::new("b")), DisasmMode::None);
        assert_eq!(DisasmConfig::default().mode, DisasmMode::None);
    }
}

//! Fuzzing-specific utilities.

use crate::ir::Module;
use libfuzzer_sys::arbitrary;

/// Largest initial memory, in pages, a fuzzer should materialize.
const MAX_FUZZ_PAGES: usize = 16;

/// Should this module be skipped by fuzzers because dumping its state
/// would be too expensive?
///
/// Public/exported only for access by fuzzers.
pub fn reject(module: &Module) -> bool {
    module
        .memories
        .values()
        .any(|memory| memory.initial_pages > MAX_FUZZ_PAGES)
        || module.tables.values().any(|table| table.initial > 1 << 16)
}

/// Get the configuration that we expect fuzzing targets to use to
/// generate modules with `wasm_smith`.
fn fuzzing_config() -> wasm_smith::Config {
    wasm_smith::Config {
        min_funcs: 1,
        max_funcs: 8,
        max_memories: 1,
        max_tables: 1,
        allow_start_export: true,
        canonicalize_nans: true,
        simd_enabled: false,
        ..Default::default()
    }
}

/// A wrapper around `Module` that uses `arbitrary` to generate new
/// modules.
#[derive(Debug)]
pub struct ArbitraryModule(pub wasm_smith::Module);

impl<'a> arbitrary::Arbitrary<'a> for ArbitraryModule {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        Ok(Self(wasm_smith::Module::new(fuzzing_config(), u)?))
    }
}

#![no_main]
use libfuzzer_sys::fuzz_target;

use wasmdec::fuzzing::{reject, ArbitraryModule};
use wasmdec::{Decompiler, DisasmConfig, DisasmMode, FrontendError};

fuzz_target!(|module: ArbitraryModule| {
    let _ = env_logger::try_init();
    let bytes = module.0.to_bytes();
    let config = DisasmConfig {
        mode: DisasmMode::Wasm,
        ..Default::default()
    };
    let decompiler = match Decompiler::new(config, &bytes[..]) {
        Ok(decompiler) => decompiler,
        Err(e) if e.downcast_ref::<FrontendError>().is_some() => return,
        Err(e) => panic!("failed to load generated module: {:?}", e),
    };
    if reject(decompiler.module()) {
        return;
    }
    let memory = decompiler.dump_memory();
    let table = decompiler.dump_table();
    log::debug!("memory: {} bytes, table: {} bytes", memory.len(), table.len());
    let result = decompiler.decompile();
    log::debug!("failed: {}, errors: {:?}", result.failed(), result.errors());
});

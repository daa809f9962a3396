//! wasmdec command-line tool.

use anyhow::{bail, Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use wasmdec::{Decompiled, Decompiler, DisasmConfig, DisasmMode, MultiDecompiler};

#[derive(Debug, StructOpt)]
#[structopt(name = "wasmdec", about = "WebAssembly to C decompiler")]
struct Options {
    #[structopt(short, long, help = "Enable debug output")]
    debug: bool,

    #[structopt(short, long, help = "Dump memory and table instead of decompiling")]
    memdump: bool,

    #[structopt(short, long, help = "Output extra information to decompiled code")]
    extra: bool,

    #[structopt(
        short,
        long,
        default_value = "out.c",
        parse(from_os_str),
        help = "Output C file"
    )]
    output: PathBuf,

    #[structopt(required = true, parse(from_os_str), help = "Input files")]
    inputs: Vec<PathBuf>,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn write(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

fn load(opts: &Options, input: &Path) -> Result<Decompiler> {
    let config = DisasmConfig {
        debug: opts.debug,
        extra_info: opts.extra,
        mode: DisasmMode::from_path(input),
    };
    let bytes =
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    debug!("Loaded {} bytes from {}", bytes.len(), input.display());
    Decompiler::new(config, &bytes).with_context(|| format!("failed to load {}", input.display()))
}

fn main() -> Result<()> {
    let opts = Options::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if opts.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    if opts.memdump {
        let decompiler = load(&opts, &opts.inputs[0])?;
        write(&with_suffix(&opts.output, ".mem"), &decompiler.dump_memory())?;
        write(
            &with_suffix(&opts.output, ".table.bin"),
            &decompiler.dump_table(),
        )?;
        return Ok(());
    }

    let result: Decompiled = if opts.inputs.len() > 1 {
        let config = DisasmConfig {
            debug: opts.debug,
            extra_info: opts.extra,
            mode: DisasmMode::None,
        };
        MultiDecompiler::from_paths(config, &opts.inputs)?.decompile()
    } else {
        load(&opts, &opts.inputs[0])?.decompile()
    };

    if result.failed() {
        for error in result.errors() {
            eprintln!("error: {}", error);
        }
        bail!("failed to decompile the input");
    }
    write(&opts.output, result.code().as_bytes())?;
    debug!("Wrote {}", opts.output.display());
    Ok(())
}

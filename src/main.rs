use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use cachesim::commons::{Protocol, SystemSpec};
use cachesim::error::SimError;
use cachesim::{simulate, utils};

#[derive(Parser, Debug)]
#[command(name = "cachesim", version, about = "MESI and Dragon cache coherence simulator")]
struct Cli {
    /// Coherence protocol (MESI or Dragon)
    protocol: String,

    /// Benchmark name; traces are read from <DATA_DIR>/<INPUT_FILE>_<core>.data
    input_file: String,

    /// Cache size in bytes
    #[arg(default_value_t = 4096)]
    cache_size: u32,

    /// Cache associativity
    #[arg(default_value_t = 2)]
    associativity: u32,

    /// Block size in bytes
    #[arg(default_value_t = 32)]
    block_size: u32,

    /// Number of processors
    #[arg(long, default_value_t = 4)]
    cores: usize,

    /// Directory holding the trace files
    #[arg(long, default_value = "datasets")]
    data_dir: PathBuf,
}

fn run(cli: Cli) -> Result<(), SimError> {
    let specs = SystemSpec {
        protocol: cli.protocol.parse::<Protocol>()?,
        cache_size: cli.cache_size,
        cache_assoc: cli.associativity,
        block_size: cli.block_size,
        num_procs: cli.cores,
        ..Default::default()
    };
    // reject bad geometry before spending time on the traces
    specs.layout()?;

    let insts = utils::read_testfiles(&cli.data_dir, &cli.input_file, specs.num_procs)?;

    let t0 = Instant::now();
    let report = simulate(specs, insts)?;
    info!("execution time {:?}", t0.elapsed());

    println!("{report}");
    Ok(())
}

fn main() {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    if let Err(e) = run(Cli::parse()) {
        let mut msg = e.to_string();
        let mut source = e.source();
        while let Some(s) = source {
            msg.push_str(&format!(": {s}"));
            source = s.source();
        }
        error!("{msg}");
        process::exit(1);
    }
}

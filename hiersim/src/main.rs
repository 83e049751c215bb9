use std::time::Instant;
use clap::{ArgAction, Parser};
use hierlib::config::{HierarchyConfig, LevelConfig};
use hierlib::io::read_trace;
use hierlib::report::Report;
use hierlib::simulator::Simulator;
use hierlib::util::read_config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Two-level cache hierarchy timing simulator"))]
struct Args {
    /// Trace file, one `<hex address> <I|D>` per line
    trace: String,

    /// JSON hierarchy configuration. Flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// I-cache as sets:associativity:hit_time, 0 sets disables it
    #[arg(long, value_name = "SETS:ASSOC:HIT")]
    icache: Option<LevelConfig>,

    /// D-cache as sets:associativity:hit_time, 0 sets disables it
    #[arg(long, value_name = "SETS:ASSOC:HIT")]
    dcache: Option<LevelConfig>,

    /// L2 as sets:associativity:hit_time, 0 sets disables it
    #[arg(long, value_name = "SETS:ASSOC:HIT")]
    l2cache: Option<LevelConfig>,

    /// Block size in bytes, shared by every level
    #[arg(long)]
    blocksize: Option<u32>,

    /// Main memory latency in cycles
    #[arg(long)]
    memspeed: Option<u32>,

    /// Invalidate blocks evicted from the L2 in both L1 caches
    #[arg(long)]
    inclusive: bool,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Log more, repeat for more detail. RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Builds the configuration from the config file, if any, with the flags applied on top
    fn hierarchy_config(&self) -> Result<HierarchyConfig, String> {
        let mut config = match &self.config {
            Some(path) => read_config(path).map_err(|e| format!("Couldn't read the config file at path {path}: {e}"))?,
            None => HierarchyConfig::default(),
        };
        if let Some(icache) = self.icache {
            config.icache = icache;
        }
        if let Some(dcache) = self.dcache {
            config.dcache = dcache;
        }
        if let Some(l2) = self.l2cache {
            config.l2 = l2;
        }
        if let Some(block_size) = self.blocksize {
            config.block_size = block_size;
        }
        if let Some(memory_latency) = self.memspeed {
            config.memory_latency = memory_latency;
        }
        config.inclusive |= self.inclusive;
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    init_logging(args.verbose);
    let config = args.hierarchy_config()?;
    debug!(?config, trace = %args.trace, "starting simulation");
    let mut simulator = Simulator::new(&config).map_err(|e| format!("Invalid configuration: {e}"))?;
    let trace = read_trace(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    simulator.simulate(&trace).map_err(|e| format!("Couldn't replay the trace at path {}: {e}", args.trace))?;
    let result = simulator.result();
    if args.json {
        println!("{}", serde_json::to_string_pretty(result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    } else {
        println!("{}", Report::new(result, simulator.hierarchy()));
    }
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Debug output is on by default in debug builds, pass --release to cargo for timings worth comparing");
        println!("Parsed input configuration: {config:?}");
        let free_ways = simulator.hierarchy().free_ways();
        let formatted = free_ways
            .iter()
            .map(|(level, count)| format!("{level}: {count}"))
            .reduce(|a, b| format!("{a}, {b}"))
            .unwrap_or_else(|| String::from("no caches enabled"));
        println!("Free ways by level: ({formatted})");
        println!("Total free ways: {}", free_ways.iter().map(|(_, count)| count).sum::<u64>());
    }
    Ok(())
}

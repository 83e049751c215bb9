use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::debug;
use crate::config::HierarchyConfig;

/// Sample cases bundled with the crate, used by the tests and benchmarks
pub const SAMPLES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/samples");

/// The files making up one sample case
#[derive(Debug, Clone)]
pub struct TestCasePaths {
    pub config: PathBuf,
    pub trace: PathBuf,
    pub output: PathBuf,
}

/// Finds every sample case, in file name order
///
/// A case is named by its expected output, `outputs/output-<trace>-<config>.json`, which is the
/// result of replaying `traces/<trace>.trace` against `configs/<config>.json`
pub fn get_configs() -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    get_configs_in(SAMPLES_PATH)
}

/// Same as [`get_configs`], for a samples directory somewhere else
pub fn get_configs_in(samples: impl AsRef<Path>) -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    let samples = samples.as_ref();
    let output_pattern =
        Regex::new(r"^output-(?P<trace>[0-9a-zA-Z_]+)-(?P<config>[0-9a-zA-Z_]+)\.json$")?;
    let mut names = fs::read_dir(samples.join("outputs"))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|name| name.into_string().ok())
        .filter(|name| output_pattern.is_match(name))
        .collect::<Vec<_>>();
    names.sort();
    let mut out = Vec::with_capacity(names.len());
    for file_name in names {
        let tokens = output_pattern.captures(&file_name).ok_or("Couldn't parse the file name")?;
        let trace = tokens
            .name("trace")
            .ok_or("Couldn't get the trace from the output file name")?
            .as_str();
        let config = tokens
            .name("config")
            .ok_or("Couldn't get the config from the output file name")?
            .as_str();
        debug!(case = %file_name, "found sample case");
        out.push(TestCasePaths {
            config: samples.join("configs").join(format!("{config}.json")),
            trace: samples.join("traces").join(format!("{trace}.trace")),
            output: samples.join("outputs").join(&file_name),
        });
    }
    Ok(out)
}

/// Reads and parses a JSON hierarchy configuration
pub fn read_config(path: impl AsRef<Path>) -> Result<HierarchyConfig, Box<dyn Error>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Generates a trace with a mix of looping instruction fetches and scattered data accesses
///
/// Deterministic for a given seed, so benchmarks compare like with like
///
/// # Arguments
///
/// * `accesses`: The number of lines to generate
/// * `seed`: Seed for the address generator
///
/// returns: Vec<u8>, the trace text
pub fn synthetic_trace(accesses: usize, seed: u64) -> Vec<u8> {
    // Numerical Recipes LCG, plenty for spreading addresses around
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    let mut pc: u32 = 0x0040_0000;
    let mut out = Vec::with_capacity(accesses * 12);
    for _ in 0..accesses {
        let r = next();
        if r % 3 != 0 {
            // Mostly sequential fetches with the odd jump back, like a loop body
            pc = if r % 17 == 0 { 0x0040_0000 + (r % 0x400) * 4 } else { pc.wrapping_add(4) };
            out.extend_from_slice(format!("{pc:#010x} I\n").as_bytes());
        } else {
            let address = 0x1000_0000 + (next() % 0x4000) * 4;
            out.extend_from_slice(format!("{address:#010x} D\n").as_bytes());
        }
    }
    out
}

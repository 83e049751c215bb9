use std::time::{Duration, Instant};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::config::{ConfigError, HierarchyConfig};
use crate::hierarchy::{AccessKind, Hierarchy, HierarchyStatistics};
use crate::io::TraceError;

lazy_static! {
    static ref TRACE_LINE: Regex = Regex::new(r"^(?:0[xX])?([0-9a-fA-F]{1,8})\s+([IiDd])$")
        .expect("trace line pattern is a valid regex");
}

/// The simulator replays traces against a hierarchy and collects results.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
#[derive(Debug)]
pub struct Simulator {
    hierarchy: Hierarchy,
    result: SimulationResult,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised as JSON, and compared against expected outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub instruction_accesses: u64,
    pub data_accesses: u64,
    /// Cycles taken by every access, summed
    pub total_cycles: u64,
    #[serde(flatten)]
    pub statistics: HierarchyStatistics,
}

impl SimulationResult {
    pub fn accesses(&self) -> u64 {
        self.instruction_accesses + self.data_accesses
    }
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A hierarchy configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, ConfigError>
    pub fn new(config: &HierarchyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            hierarchy: Hierarchy::new(config)?,
            result: SimulationResult::default(),
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Performs a single access, returning the cycles it took
    pub fn access(&mut self, kind: AccessKind, address: u32) -> u32 {
        match kind {
            AccessKind::Instruction => self.result.instruction_accesses += 1,
            AccessKind::Data => self.result.data_accesses += 1,
        }
        let cycles = self.hierarchy.access(kind, address);
        self.result.total_cycles += cycles as u64;
        cycles
    }

    /// Replays a trace, one access per line
    ///
    /// Lines hold a hexadecimal address, with or without `0x`, and `I` or `D` for an instruction
    /// or data access. Blank lines and lines starting with `#` are skipped. Reads from the byte
    /// array are sequential, so a memory mapped file works well here
    ///
    /// Accesses are applied as they are parsed. If a line is malformed the error is returned, and
    /// the accesses before it stay counted
    ///
    /// # Arguments
    ///
    /// * `bytes`: The trace
    ///
    /// returns: Result<&SimulationResult, TraceError>
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<&SimulationResult, TraceError> {
        let start = Instant::now();
        let replayed = self.replay(bytes);
        self.simulation_time += start.elapsed();
        self.sync_statistics();
        replayed?;
        info!(
            accesses = self.result.accesses(),
            cycles = self.result.total_cycles,
            time = ?self.simulation_time,
            "trace replayed"
        );
        Ok(&self.result)
    }

    fn replay(&mut self, bytes: &[u8]) -> Result<(), TraceError> {
        for (x, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = x + 1;
            let text = std::str::from_utf8(raw)
                .map_err(|_| TraceError::Encoding { line })?
                .trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let (kind, address) = parse_trace_line(text).ok_or_else(|| TraceError::Malformed {
                line,
                text: text.to_string(),
            })?;
            self.access(kind, address);
        }
        Ok(())
    }

    fn sync_statistics(&mut self) {
        self.result.statistics = self.hierarchy.statistics();
    }

    /// Gets the results so far
    pub fn result(&self) -> &SimulationResult {
        &self.result
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }
}

/// Parses a single trace line, without surrounding whitespace
///
/// # Examples
///
/// ```
/// use hierlib::hierarchy::AccessKind;
/// use hierlib::simulator::parse_trace_line;
/// assert_eq!(parse_trace_line("0x7fff0010 D"), Some((AccessKind::Data, 0x7fff0010)));
/// assert_eq!(parse_trace_line("400a4c i"), Some((AccessKind::Instruction, 0x400a4c)));
/// assert_eq!(parse_trace_line("0x1234 W"), None);
/// ```
pub fn parse_trace_line(line: &str) -> Option<(AccessKind, u32)> {
    let captures = TRACE_LINE.captures(line)?;
    let address = u32::from_str_radix(captures.get(1)?.as_str(), 16).ok()?;
    let kind = match captures.get(2)?.as_str() {
        "I" | "i" => AccessKind::Instruction,
        _ => AccessKind::Data,
    };
    Some((kind, address))
}

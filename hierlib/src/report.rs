use std::fmt;
use crate::cache::LevelStatistics;
use crate::config::Level;
use crate::hierarchy::Hierarchy;
use crate::simulator::SimulationResult;

/// Derived figures for one enabled level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub level: Level,
    pub statistics: LevelStatistics,
    pub hit_time: u32,
}

impl LevelReport {
    /// Misses per reference, 0 when the level was never referenced
    pub fn miss_rate(&self) -> f64 {
        ratio(self.statistics.misses, self.statistics.references)
    }

    /// The hit time plus the average miss penalty per reference
    pub fn average_access_time(&self) -> f64 {
        if self.statistics.references == 0 {
            return 0.0;
        }
        self.hit_time as f64 + ratio(self.statistics.penalties, self.statistics.references)
    }
}

/// A summary of a simulation, printed as the text report
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub levels: Vec<LevelReport>,
    pub accesses: u64,
    pub total_cycles: u64,
    pub memory_accesses: u64,
}

impl Report {
    /// Summarises a result, with a row for each level enabled in the hierarchy that produced it
    pub fn new(result: &SimulationResult, hierarchy: &Hierarchy) -> Self {
        let levels = Level::ALL
            .iter()
            .filter_map(|l| {
                hierarchy.level(*l).map(|cache| LevelReport {
                    level: *l,
                    statistics: *result.statistics.level(*l),
                    hit_time: cache.hit_time(),
                })
            })
            .collect();
        Self {
            levels,
            accesses: result.accesses(),
            total_cycles: result.total_cycles,
            memory_accesses: result.statistics.memory_accesses,
        }
    }

    /// Cycles per access over the whole trace
    pub fn average_memory_access_time(&self) -> f64 {
        ratio(self.total_cycles, self.accesses)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache Statistics")?;
        writeln!(f, "------------------------------------")?;
        for level in &self.levels {
            let name = level.level.name();
            writeln!(f, "  {name:<4} References:      {:>12}", level.statistics.references)?;
            writeln!(f, "  {name:<4} Misses:          {:>12}", level.statistics.misses)?;
            writeln!(f, "  {name:<4} Penalties:       {:>12}", level.statistics.penalties)?;
            writeln!(f, "  {name:<4} Miss rate:       {:>11.2}%", level.miss_rate() * 100.0)?;
            writeln!(f, "  {name:<4} Avg access time: {:>12.2}", level.average_access_time())?;
            writeln!(f)?;
        }
        writeln!(f, "  Memory accesses:        {:>12}", self.memory_accesses)?;
        writeln!(f, "  Total accesses:         {:>12}", self.accesses)?;
        writeln!(f, "  Total cycles:           {:>12}", self.total_cycles)?;
        write!(f, "  Average access time:    {:>12.2}", self.average_memory_access_time())
    }
}

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three cache levels of a hierarchy
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Level {
    Instruction,
    Data,
    Unified,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Instruction, Level::Data, Level::Unified];

    /// Short name used when reporting
    pub fn name(&self) -> &'static str {
        match self {
            Level::Instruction => "I$",
            Level::Data => "D$",
            Level::Unified => "L2$",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configuration for a single cache level
///
/// A level with 0 sets is disabled, accesses pass straight through it to the next level. This is
/// the default, so levels left out of a configuration file are disabled
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
    #[serde(default)]
    pub sets: u32,
    #[serde(default)]
    pub associativity: u32,
    #[serde(default)]
    pub hit_time: u32,
}

impl LevelConfig {
    pub fn new(sets: u32, associativity: u32, hit_time: u32) -> Self {
        Self { sets, associativity, hit_time }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sets != 0
    }

    fn validate(&self, level: Level, block_size: u32) -> Result<(), ConfigError> {
        if !self.is_enabled() {
            return Ok(());
        }
        if !self.sets.is_power_of_two() {
            return Err(ConfigError::Sets { level, sets: self.sets });
        }
        if self.associativity == 0 {
            return Err(ConfigError::Associativity { level, sets: self.sets });
        }
        if self.hit_time == 0 {
            return Err(ConfigError::HitTime { level });
        }
        let bits = self.sets.trailing_zeros() + block_size.trailing_zeros();
        if bits >= u32::BITS {
            return Err(ConfigError::AddressWidth { level, bits });
        }
        Ok(())
    }
}

/// Parses the `sets:associativity:hit_time` form used on the command line
///
/// # Examples
///
/// ```
/// use hierlib::config::LevelConfig;
/// let level: LevelConfig = "512:2:1".parse().unwrap();
/// assert_eq!(level, LevelConfig::new(512, 2, 1));
/// ```
impl FromStr for LevelConfig {
    type Err = SpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s.trim().split(':').collect::<Vec<_>>();
        let [sets, associativity, hit_time] = fields.as_slice() else {
            return Err(SpecifierError::Shape(s.to_string()));
        };
        let parse = |field: &str| {
            field.trim().parse::<u32>().map_err(|source| SpecifierError::Field {
                field: field.to_string(),
                source,
            })
        };
        Ok(Self::new(parse(*sets)?, parse(*associativity)?, parse(*hit_time)?))
    }
}

/// A complete hierarchy configuration: split L1 caches, a shared L2, and main memory
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyConfig {
    #[serde(default)]
    pub icache: LevelConfig,
    #[serde(default)]
    pub dcache: LevelConfig,
    #[serde(default)]
    pub l2: LevelConfig,
    /// When set, blocks evicted from the L2 are invalidated in both L1 caches
    #[serde(default)]
    pub inclusive: bool,
    /// Block size in bytes, shared by every level
    #[serde(default = "HierarchyConfig::default_block_size")]
    pub block_size: u32,
    /// Latency of main memory in cycles
    #[serde(default = "HierarchyConfig::default_memory_latency")]
    pub memory_latency: u32,
}

impl HierarchyConfig {
    fn default_block_size() -> u32 {
        64
    }

    fn default_memory_latency() -> u32 {
        100
    }

    pub fn level(&self, level: Level) -> &LevelConfig {
        match level {
            Level::Instruction => &self.icache,
            Level::Data => &self.dcache,
            Level::Unified => &self.l2,
        }
    }

    pub fn level_mut(&mut self, level: Level) -> &mut LevelConfig {
        match level {
            Level::Instruction => &mut self.icache,
            Level::Data => &mut self.dcache,
            Level::Unified => &mut self.l2,
        }
    }

    /// Checks the configuration describes a hierarchy that can be built
    ///
    /// Sizes which are decoded as bit counts must be powers of two, enabled levels need at least
    /// one way and a nonzero hit time, and memory needs a nonzero latency. An access missing every
    /// level has to take a number of cycles that fits in a `u32`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        if self.memory_latency == 0 {
            return Err(ConfigError::MemoryLatency);
        }
        Level::ALL
            .iter()
            .try_for_each(|level| self.level(*level).validate(*level, self.block_size))?;
        let hit_time = |level: &LevelConfig| if level.is_enabled() { level.hit_time } else { 0 };
        hit_time(&self.icache)
            .max(hit_time(&self.dcache))
            .checked_add(hit_time(&self.l2))
            .and_then(|cycles| cycles.checked_add(self.memory_latency))
            .map(|_| ())
            .ok_or(ConfigError::Latency)
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            icache: LevelConfig::disabled(),
            dcache: LevelConfig::disabled(),
            l2: LevelConfig::disabled(),
            inclusive: false,
            block_size: Self::default_block_size(),
            memory_latency: Self::default_memory_latency(),
        }
    }
}

/// Reasons a configuration is rejected
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("block size must be a power of two, got {0}")]
    BlockSize(u32),
    #[error("{level} set count must be a power of two, or 0 to disable it, got {sets}")]
    Sets { level: Level, sets: u32 },
    #[error("{level} has {sets} sets but an associativity of 0")]
    Associativity { level: Level, sets: u32 },
    #[error("{level} hit time must be at least one cycle")]
    HitTime { level: Level },
    #[error("memory latency must be at least one cycle")]
    MemoryLatency,
    #[error("an access missing every level would take more than {} cycles", u32::MAX)]
    Latency,
    #[error(
        "{level} needs {bits} set index and block offset bits, leaving no tag in a 32-bit address"
    )]
    AddressWidth { level: Level, bits: u32 },
}

/// Reasons a `sets:associativity:hit_time` string is rejected
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SpecifierError {
    #[error("expected sets:associativity:hit_time, got `{0}`")]
    Shape(String),
    #[error("`{field}` is not a valid number: {source}")]
    Field {
        field: String,
        #[source]
        source: ParseIntError,
    },
}

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use crate::cache::{CacheLevel, LevelStatistics, MainMemory, NextLevel, Probe};
use crate::config::{ConfigError, HierarchyConfig, Level, LevelConfig};

/// Which L1 cache an access goes through
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessKind {
    Instruction,
    Data,
}

/// A snapshot of every counter in a hierarchy
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HierarchyStatistics {
    pub icache: LevelStatistics,
    pub dcache: LevelStatistics,
    pub l2: LevelStatistics,
    /// Accesses which missed every enabled level
    pub memory_accesses: u64,
}

impl HierarchyStatistics {
    pub fn level(&self, level: Level) -> &LevelStatistics {
        match level {
            Level::Instruction => &self.icache,
            Level::Data => &self.dcache,
            Level::Unified => &self.l2,
        }
    }
}

/// Split instruction and data L1 caches in front of a shared L2 and main memory
///
/// Every level is optional. An access to a missing L1 goes straight to the L2, and an access to a
/// missing L2 goes straight to memory, so a hierarchy without a level behaves exactly like one
/// where that level was never there
///
/// When the L2 is inclusive, every block the L2 replaces is invalidated in both L1 caches, so any
/// block resident in an L1 is also resident in the L2
#[derive(Debug, Clone)]
pub struct Hierarchy {
    icache: Option<CacheLevel>,
    dcache: Option<CacheLevel>,
    l2: Option<CacheLevel>,
    memory: MainMemory,
    inclusive: bool,
}

impl Hierarchy {
    /// Builds an empty hierarchy, after checking the configuration
    ///
    /// # Arguments
    ///
    /// * `config`: The hierarchy configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Hierarchy, ConfigError>
    pub fn new(config: &HierarchyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let build = |level: &LevelConfig| {
            level.is_enabled().then(|| CacheLevel::new(level, config.block_size))
        };
        let hierarchy = Self {
            icache: build(&config.icache),
            dcache: build(&config.dcache),
            l2: build(&config.l2),
            memory: MainMemory::new(config.memory_latency),
            inclusive: config.inclusive,
        };
        debug!(
            icache = ?config.icache,
            dcache = ?config.dcache,
            l2 = ?config.l2,
            inclusive = config.inclusive,
            block_size = config.block_size,
            memory_latency = config.memory_latency,
            "built cache hierarchy"
        );
        Ok(hierarchy)
    }

    /// Performs an instruction fetch, returning the cycles it took
    pub fn access_instruction(&mut self, address: u32) -> u32 {
        self.access(AccessKind::Instruction, address)
    }

    /// Performs a data access, returning the cycles it took
    pub fn access_data(&mut self, address: u32) -> u32 {
        self.access(AccessKind::Data, address)
    }

    /// Performs an access through the L1 cache for `kind`, returning the cycles it took
    pub fn access(&mut self, kind: AccessKind, address: u32) -> u32 {
        let probe = match self.l1_mut(kind) {
            Some(l1) => l1.probe(address),
            None => return self.access_l2(address),
        };
        match probe {
            Probe::Hit(latency) => latency,
            Probe::Miss(slot) => {
                // The L2 may invalidate blocks in this very L1, so the fill has to wait for it
                let penalty = self.access_l2(address);
                let Some(l1) = self.l1_mut(kind) else {
                    unreachable!("{kind:?} cache disappeared during an access");
                };
                l1.fill(slot, penalty).latency
            }
        }
    }

    fn access_l2(&mut self, address: u32) -> u32 {
        let Some(l2) = self.l2.as_mut() else {
            return self.memory.access(address);
        };
        let access = l2.access(address, &mut self.memory);
        if let (true, Some(evicted)) = (self.inclusive, access.evicted) {
            let block = l2.evicted_block(&evicted);
            self.back_invalidate(block);
        }
        access.latency
    }

    /// Removes a block the L2 evicted from both L1 caches. Absent blocks are ignored, an L1 may
    /// have replaced the block already or never fetched it at all
    fn back_invalidate(&mut self, block: u32) {
        let l1s = [
            (AccessKind::Instruction, &mut self.icache),
            (AccessKind::Data, &mut self.dcache),
        ];
        for (kind, l1) in l1s {
            if let Some(l1) = l1 {
                if l1.invalidate_block(block) {
                    trace!(?kind, block, "invalidated block evicted from L2");
                }
            }
        }
    }

    fn l1_mut(&mut self, kind: AccessKind) -> Option<&mut CacheLevel> {
        match kind {
            AccessKind::Instruction => self.icache.as_mut(),
            AccessKind::Data => self.dcache.as_mut(),
        }
    }

    /// Gets a level, if it is enabled
    pub fn level(&self, level: Level) -> Option<&CacheLevel> {
        match level {
            Level::Instruction => self.icache.as_ref(),
            Level::Data => self.dcache.as_ref(),
            Level::Unified => self.l2.as_ref(),
        }
    }

    /// Gets a snapshot of the counters of every level
    pub fn statistics(&self) -> HierarchyStatistics {
        let counters = |level: &Option<CacheLevel>| {
            level.as_ref().map(CacheLevel::statistics).unwrap_or_default()
        };
        HierarchyStatistics {
            icache: counters(&self.icache),
            dcache: counters(&self.dcache),
            l2: counters(&self.l2),
            memory_accesses: self.memory.accesses(),
        }
    }

    /// Gets the number of free ways in each enabled level. Useful for analysing cache performance
    /// or debugging
    pub fn free_ways(&self) -> Vec<(Level, u64)> {
        Level::ALL
            .iter()
            .filter_map(|l| self.level(*l).map(|c| (*l, c.store().total_free_ways())))
            .collect()
    }

    /// Checks the LRU invariants of every level, and inclusion when the L2 is inclusive
    pub fn verify(&self) -> Result<(), String> {
        for level in Level::ALL {
            if let Some(cache) = self.level(level) {
                cache.store().verify().map_err(|e| format!("{level}: {e}"))?;
            }
        }
        if !self.inclusive {
            return Ok(());
        }
        let Some(l2) = self.l2.as_ref() else {
            return Ok(());
        };
        for level in [Level::Instruction, Level::Data] {
            if let Some(l1) = self.level(level) {
                if let Some(block) = l1.resident_blocks().find(|b| !l2.contains_block(*b)) {
                    return Err(format!(
                        "{level} holds block {block:#x} which the inclusive L2 does not"
                    ));
                }
            }
        }
        Ok(())
    }
}

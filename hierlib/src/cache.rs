use serde::{Deserialize, Serialize};
use tracing::trace;
use crate::address::Geometry;
use crate::config::LevelConfig;
use crate::set_store::{Evicted, SetStore};

/// Anything a cache level can miss into
///
/// Cache levels are generic over this rather than holding a `dyn` reference, so the call chain
/// down to memory is resolved statically
pub trait NextLevel {
    /// Performs an access for an address, returning the cycles it took
    fn access(&mut self, address: u32) -> u32;
}

/// Main memory. Every access takes the same number of cycles and nothing is cached
#[derive(Debug, Clone)]
pub struct MainMemory {
    latency: u32,
    accesses: u64,
}

impl MainMemory {
    pub fn new(latency: u32) -> Self {
        Self { latency, accesses: 0 }
    }

    /// The number of accesses which reached memory
    pub fn accesses(&self) -> u64 {
        self.accesses
    }
}

impl NextLevel for MainMemory {
    fn access(&mut self, _address: u32) -> u32 {
        self.accesses += 1;
        self.latency
    }
}

/// Counters for a single level. Disabled levels keep the default, all zeros
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LevelStatistics {
    pub references: u64,
    pub misses: u64,
    /// Cycles spent in the next level on behalf of this one's misses
    pub penalties: u64,
}

impl LevelStatistics {
    pub fn hits(&self) -> u64 {
        self.references - self.misses
    }
}

/// Where a block which missed will be placed. Only produced by [`CacheLevel::probe`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Slot {
    set_index: u32,
    tag: u32,
}

/// The outcome of looking an address up in a level
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Probe {
    /// The block is resident, the value is the hit time
    Hit(u32),
    /// The block has to be fetched from the next level, then placed with [`CacheLevel::fill`]
    Miss(Slot),
}

/// The result of an access which went all the way through a level
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Access {
    pub latency: u32,
    /// The block pushed out to make room, if a full set was replaced into
    pub evicted: Option<Evicted>,
}

/// A single set associative, LRU cache level
///
/// The same type is used for the instruction, data, and unified levels, only the configuration
/// differs. A level only knows its own geometry and counters; what it misses into is passed in
/// per access, which lets a hierarchy share one L2 between both L1 caches
#[derive(Debug, Clone)]
pub struct CacheLevel {
    geometry: Geometry,
    store: SetStore,
    hit_time: u32,
    statistics: LevelStatistics,
}

impl CacheLevel {
    /// Creates an empty level
    ///
    /// The configuration must be enabled and already validated, disabled levels are represented by
    /// their absence
    ///
    /// # Arguments
    ///
    /// * `config`: The level's sets, associativity and hit time
    /// * `block_size`: The block size shared by the hierarchy
    ///
    /// returns: CacheLevel
    pub fn new(config: &LevelConfig, block_size: u32) -> Self {
        Self {
            geometry: Geometry::new(block_size, config.sets),
            store: SetStore::new(config.sets, config.associativity),
            hit_time: config.hit_time,
            statistics: LevelStatistics::default(),
        }
    }

    /// Looks an address up, counting a reference, and a miss if it isn't resident
    ///
    /// A hit makes the block the most recently used of its set. A miss changes nothing else; the
    /// caller is expected to fetch the block from the next level and hand the slot to
    /// [`CacheLevel::fill`]. Anything the next level does to this one in between, such as an
    /// inclusive invalidation, is seen by the fill
    pub fn probe(&mut self, address: u32) -> Probe {
        self.statistics.references += 1;
        let (set_index, tag) = self.geometry.decode(address);
        match self.store.lookup(set_index, tag) {
            Some(way) => {
                self.store.touch(set_index, way);
                Probe::Hit(self.hit_time)
            }
            None => {
                self.statistics.misses += 1;
                Probe::Miss(Slot { set_index, tag })
            }
        }
    }

    /// Places a block which missed, once the next level has supplied it
    ///
    /// # Arguments
    ///
    /// * `slot`: From the [`Probe::Miss`] for the access
    /// * `penalty`: The cycles the next level took
    ///
    /// returns: Access, with the total latency of the access and any block evicted for it
    pub fn fill(&mut self, slot: Slot, penalty: u32) -> Access {
        self.statistics.penalties += penalty as u64;
        let evicted = self.store.insert(slot.set_index, slot.tag);
        if let Some(e) = evicted {
            trace!(set = e.set_index, tag = e.tag, "replaced least recently used block");
        }
        Access {
            latency: self.hit_time + penalty,
            evicted,
        }
    }

    /// Performs a complete access, missing into `next` when the block isn't resident
    pub fn access<N: NextLevel>(&mut self, address: u32, next: &mut N) -> Access {
        match self.probe(address) {
            Probe::Hit(latency) => Access { latency, evicted: None },
            Probe::Miss(slot) => {
                let penalty = next.access(address);
                self.fill(slot, penalty)
            }
        }
    }

    /// Rebuilds the block bits of a block this level evicted, so it can be found in other levels
    pub fn evicted_block(&self, evicted: &Evicted) -> u32 {
        self.geometry.block_of(evicted.set_index, evicted.tag)
    }

    /// Invalidates a block given by its block bits, see [`Geometry::decode_block`]
    ///
    /// Neither counters nor the recency of other sets are touched
    ///
    /// returns: bool, whether the block was resident
    pub fn invalidate_block(&mut self, block: u32) -> bool {
        let (set_index, tag) = self.geometry.decode_block(block);
        self.store.invalidate(set_index, tag)
    }

    /// Checks whether an address is resident, without counting a reference or updating recency
    pub fn contains(&self, address: u32) -> bool {
        let (set_index, tag) = self.geometry.decode(address);
        self.store.lookup(set_index, tag).is_some()
    }

    /// Checks whether a block, given by its block bits, is resident
    pub fn contains_block(&self, block: u32) -> bool {
        let (set_index, tag) = self.geometry.decode_block(block);
        self.store.lookup(set_index, tag).is_some()
    }

    /// The block bits of every resident block
    pub fn resident_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.store
            .resident()
            .map(|(set_index, tag)| self.geometry.block_of(set_index, tag))
    }

    pub fn statistics(&self) -> LevelStatistics {
        self.statistics
    }

    pub fn hit_time(&self) -> u32 {
        self.hit_time
    }

    pub fn store(&self) -> &SetStore {
        &self.store
    }
}

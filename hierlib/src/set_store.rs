use std::ops::Range;

/// A single way within a set
///
/// `rank` is the recency of the way, 0 is the most recently used. Among the valid ways of a set
/// the ranks are always exactly `0..k` where `k` is the number of valid ways. Invalid ways keep
/// whatever rank they had last, which is never read
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Way {
    pub valid: bool,
    pub tag: u32,
    pub rank: u32,
}

/// A block pushed out of a full set to make room for a new one
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Evicted {
    pub set_index: u32,
    pub tag: u32,
}

/// Storage for every way of a single cache level, with LRU bookkeeping
///
/// All ways live in one flat vector, set `s` occupying
/// `s * associativity..(s + 1) * associativity`. Alongside it a count of free ways per set is kept
/// up to date, so deciding between allocation and replacement never needs a scan
///
/// LRU is tracked with per-way ranks rather than timestamps or ordered lists. Every operation is
/// O(associativity) and touches only the set in question
#[derive(Debug, Clone)]
pub struct SetStore {
    ways: Vec<Way>,
    free: Vec<u32>,
    associativity: u32,
}

impl SetStore {
    pub fn new(sets: u32, associativity: u32) -> Self {
        Self {
            ways: vec![Way::default(); sets as usize * associativity as usize],
            free: vec![associativity; sets as usize],
            associativity,
        }
    }

    pub fn sets(&self) -> u32 {
        self.free.len() as u32
    }

    #[inline]
    fn bounds(&self, set_index: u32) -> Range<usize> {
        let lower = set_index as usize * self.associativity as usize;
        lower..lower + self.associativity as usize
    }

    /// The ways of a set, in way order
    pub fn set(&self, set_index: u32) -> &[Way] {
        &self.ways[self.bounds(set_index)]
    }

    #[inline]
    fn set_mut(&mut self, set_index: u32) -> &mut [Way] {
        let bounds = self.bounds(set_index);
        &mut self.ways[bounds]
    }

    /// Finds the way holding a tag, if it is resident
    ///
    /// # Arguments
    ///
    /// * `set_index`: The set to search, the rest of the store is never looked at
    /// * `tag`: The tag to look for. Only valid ways can match
    ///
    /// returns: Option<usize>, the way index within the set
    pub fn lookup(&self, set_index: u32, tag: u32) -> Option<usize> {
        let ways = self.set(set_index);
        let mut x = 0;
        while x < ways.len() {
            if ways[x].valid && ways[x].tag == tag {
                debug_assert!(
                    !ways[x + 1..].iter().any(|w| w.valid && w.tag == tag),
                    "tag {tag:#x} is resident twice in set {set_index}"
                );
                return Some(x);
            }
            x += 1;
        }
        None
    }

    /// Makes a way the most recently used of its set
    ///
    /// Ways which were more recent than it age by one, older ways keep their rank
    pub fn touch(&mut self, set_index: u32, way: usize) {
        let ways = self.set_mut(set_index);
        let rank = ways[way].rank;
        for (x, w) in ways.iter_mut().enumerate() {
            if x == way {
                w.rank = 0;
            } else if w.valid && w.rank < rank {
                w.rank += 1;
            }
        }
        self.check(set_index);
    }

    /// Places a tag which missed into its set as the most recently used block
    ///
    /// If the set has a free way the lowest indexed one is used. Otherwise the least recently
    /// used way is replaced, and the tag it held is returned so the caller can act on the eviction
    ///
    /// The tag must not already be resident in the set
    pub fn insert(&mut self, set_index: u32, tag: u32) -> Option<Evicted> {
        debug_assert!(self.lookup(set_index, tag).is_none());
        let lru = self.associativity - 1;
        let has_free_way = self.free[set_index as usize] > 0;
        let ways = self.set_mut(set_index);
        let evicted = if has_free_way {
            let Some(slot) = ways.iter().position(|w| !w.valid) else {
                panic!("set {set_index} counts a free way but every way is valid");
            };
            ways.iter_mut().filter(|w| w.valid).for_each(|w| w.rank += 1);
            ways[slot] = Way { valid: true, tag, rank: 0 };
            None
        } else {
            let Some(victim) = ways.iter().position(|w| w.valid && w.rank == lru) else {
                panic!("full set {set_index} has no way at rank {lru}");
            };
            let old_tag = ways[victim].tag;
            ways.iter_mut().for_each(|w| w.rank += 1);
            ways[victim] = Way { valid: true, tag, rank: 0 };
            Some(Evicted { set_index, tag: old_tag })
        };
        if evicted.is_none() {
            self.free[set_index as usize] -= 1;
        }
        self.check(set_index);
        evicted
    }

    /// Drops a tag from its set, if resident
    ///
    /// Ways older than the dropped one move up a rank so the remaining ranks stay contiguous
    ///
    /// returns: bool, whether the tag was resident
    pub fn invalidate(&mut self, set_index: u32, tag: u32) -> bool {
        let Some(way) = self.lookup(set_index, tag) else {
            return false;
        };
        let ways = self.set_mut(set_index);
        let rank = ways[way].rank;
        ways[way].valid = false;
        ways.iter_mut()
            .filter(|w| w.valid && w.rank > rank)
            .for_each(|w| w.rank -= 1);
        self.free[set_index as usize] += 1;
        self.check(set_index);
        true
    }

    /// The number of free ways in a set
    pub fn free_ways(&self, set_index: u32) -> u32 {
        self.free[set_index as usize]
    }

    /// The number of free ways across every set. Useful for analysing how much of a level a trace
    /// actually used
    pub fn total_free_ways(&self) -> u64 {
        self.free.iter().map(|f| *f as u64).sum()
    }

    /// Every resident block, as (set index, tag)
    pub fn resident(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let associativity = self.associativity as usize;
        self.ways
            .iter()
            .enumerate()
            .filter(|(_, w)| w.valid)
            .map(move |(x, w)| ((x / associativity) as u32, w.tag))
    }

    /// Checks the LRU and tag invariants of a set
    ///
    /// Ranks of the valid ways must be exactly `0..k`, no tag may be resident twice, and the free
    /// count must match the number of invalid ways
    pub fn verify_set(&self, set_index: u32) -> Result<(), String> {
        let ways = self.set(set_index);
        let mut ranks = ways.iter().filter(|w| w.valid).map(|w| w.rank).collect::<Vec<_>>();
        ranks.sort_unstable();
        if ranks.iter().enumerate().any(|(x, rank)| *rank != x as u32) {
            return Err(format!("set {set_index} has non-contiguous ranks {ranks:?}"));
        }
        let mut tags = ways.iter().filter(|w| w.valid).map(|w| w.tag).collect::<Vec<_>>();
        tags.sort_unstable();
        if tags.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(format!("set {set_index} holds a tag twice: {tags:?}"));
        }
        let invalid = ways.len() - ranks.len();
        if invalid as u32 != self.free[set_index as usize] {
            return Err(format!(
                "set {set_index} counts {} free ways but has {invalid}",
                self.free[set_index as usize]
            ));
        }
        Ok(())
    }

    /// Checks every set, see [`SetStore::verify_set`]
    pub fn verify(&self) -> Result<(), String> {
        (0..self.sets()).try_for_each(|s| self.verify_set(s))
    }

    // Broken invariants are bugs in this module, never something to recover from
    #[inline]
    fn check(&self, set_index: u32) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.verify_set(set_index) {
                panic!("{e}");
            }
        }
    }
}

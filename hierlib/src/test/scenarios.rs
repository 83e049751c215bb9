use crate::address::Geometry;
use crate::cache::{CacheLevel, LevelStatistics, MainMemory};
use crate::config::{ConfigError, HierarchyConfig, Level, LevelConfig, SpecifierError};
use crate::hierarchy::Hierarchy;
use crate::report::Report;
use crate::set_store::{Evicted, SetStore, Way};
use crate::simulator::Simulator;

fn build(icache: LevelConfig, dcache: LevelConfig, l2: LevelConfig, inclusive: bool, block_size: u32) -> Hierarchy {
    let config = HierarchyConfig {
        icache,
        dcache,
        l2,
        inclusive,
        block_size,
        memory_latency: 100,
    };
    Hierarchy::new(&config).unwrap()
}

fn resident(hierarchy: &Hierarchy, level: Level, address: u32) -> bool {
    hierarchy.level(level).unwrap().contains(address)
}

#[test]
fn geometry_splits_and_rebuilds_addresses() {
    let l1 = Geometry::new(16, 4);
    let l2 = Geometry::new(16, 64);
    let address = 0xdead_beef;
    let (set, tag) = l2.decode(address);
    assert_eq!(set, (address >> 4) & 63);
    assert_eq!(tag, address >> 10);
    let block = l2.block_of(set, tag);
    assert_eq!(block, address >> 4);
    assert_eq!(l1.decode_block(block), l1.decode(address));
    assert_eq!(l2.sets(), 64);
    // A single set has no index bits
    let full = Geometry::new(4, 1);
    assert_eq!(full.decode(0x1234), (0, 0x1234 >> 2));
}

#[test]
fn set_store_tracks_recency() {
    let mut store = SetStore::new(1, 4);
    for tag in [10, 11, 12] {
        assert_eq!(store.insert(0, tag), None);
    }
    let rank = |store: &SetStore, tag| store.set(0)[store.lookup(0, tag).unwrap()].rank;
    assert_eq!([rank(&store, 12), rank(&store, 11), rank(&store, 10)], [0, 1, 2]);
    assert_eq!(store.free_ways(0), 1);

    let way = store.lookup(0, 11).unwrap();
    assert_eq!(way, 1);
    store.touch(0, way);
    assert_eq!([rank(&store, 11), rank(&store, 12), rank(&store, 10)], [0, 1, 2]);

    assert_eq!(store.insert(0, 13), None);
    assert_eq!(store.free_ways(0), 0);
    // Full, so the least recently used block goes
    assert_eq!(store.insert(0, 14), Some(Evicted { set_index: 0, tag: 10 }));
    assert_eq!([rank(&store, 14), rank(&store, 13), rank(&store, 11), rank(&store, 12)], [0, 1, 2, 3]);

    assert!(store.invalidate(0, 11));
    assert!(!store.invalidate(0, 11));
    assert_eq!(store.free_ways(0), 1);
    assert_eq!([rank(&store, 14), rank(&store, 13), rank(&store, 12)], [0, 1, 2]);

    // The freed way is reused
    assert_eq!(store.insert(0, 15), None);
    assert_eq!(store.set(0), &[
        Way { valid: true, tag: 14, rank: 1 },
        Way { valid: true, tag: 15, rank: 0 },
        Way { valid: true, tag: 12, rank: 3 },
        Way { valid: true, tag: 13, rank: 2 },
    ]);
    store.verify().unwrap();
}

#[test]
fn sets_are_independent() {
    let mut store = SetStore::new(4, 1);
    assert_eq!(store.insert(1, 7), None);
    assert_eq!(store.insert(2, 7), None);
    assert_eq!(store.insert(1, 8), Some(Evicted { set_index: 1, tag: 7 }));
    assert!(store.lookup(2, 7).is_some());
    assert_eq!(store.total_free_ways(), 2);
    let mut resident = store.resident().collect::<Vec<_>>();
    resident.sort();
    assert_eq!(resident, vec![(1, 8), (2, 7)]);
}

#[test]
fn hits_after_filling_a_set() {
    // One set, two ways, 4 byte blocks, no L2
    let mut hierarchy = build(
        LevelConfig::new(1, 2, 1),
        LevelConfig::new(1, 2, 1),
        LevelConfig::disabled(),
        false,
        4,
    );
    assert_eq!(hierarchy.access_instruction(0x00), 101);
    assert_eq!(hierarchy.access_instruction(0x04), 101);
    assert_eq!(hierarchy.access_instruction(0x00), 1);
    let statistics = hierarchy.statistics();
    assert_eq!(statistics.icache, LevelStatistics { references: 3, misses: 2, penalties: 200 });
    assert_eq!(statistics.dcache, LevelStatistics::default());
    assert_eq!(statistics.l2, LevelStatistics::default());
    assert_eq!(statistics.memory_accesses, 2);
}

#[test]
fn inclusive_l2_eviction_invalidates_l1() {
    let mut hierarchy = build(
        LevelConfig::new(1, 1, 1),
        LevelConfig::disabled(),
        LevelConfig::new(1, 1, 10),
        true,
        4,
    );
    assert_eq!(hierarchy.access_instruction(0x00), 111);
    assert!(resident(&hierarchy, Level::Instruction, 0x00));
    assert_eq!(hierarchy.access_instruction(0x10), 111);
    assert!(!resident(&hierarchy, Level::Instruction, 0x00));
    assert!(resident(&hierarchy, Level::Instruction, 0x10));
    assert!(!resident(&hierarchy, Level::Unified, 0x00));
    hierarchy.verify().unwrap();
}

#[test]
fn inclusion_only_applies_when_enabled() {
    for inclusive in [false, true] {
        let mut hierarchy = build(
            LevelConfig::new(1, 2, 1),
            LevelConfig::new(1, 2, 1),
            LevelConfig::new(1, 1, 10),
            inclusive,
            4,
        );
        hierarchy.access_instruction(0x00);
        // L2 hit, so both L1 caches now hold the block
        assert_eq!(hierarchy.access_data(0x00), 11);
        hierarchy.access_instruction(0x10);
        assert_eq!(resident(&hierarchy, Level::Instruction, 0x00), !inclusive);
        assert_eq!(resident(&hierarchy, Level::Data, 0x00), !inclusive);
        let expected = if inclusive { 111 } else { 1 };
        assert_eq!(hierarchy.access_instruction(0x00), expected);
        hierarchy.verify().unwrap();
    }
}

#[test]
fn back_invalidation_crosses_geometries() {
    // L1 with more sets than the L2
    let mut hierarchy = build(
        LevelConfig::new(4, 1, 1),
        LevelConfig::disabled(),
        LevelConfig::new(1, 1, 10),
        true,
        16,
    );
    hierarchy.access_instruction(0x30);
    hierarchy.access_instruction(0x40);
    assert!(!resident(&hierarchy, Level::Instruction, 0x30));
    assert!(resident(&hierarchy, Level::Instruction, 0x40));
    assert_eq!(hierarchy.free_ways(), vec![(Level::Instruction, 3), (Level::Unified, 0)]);

    // L2 with more sets than the L1
    let mut hierarchy = build(
        LevelConfig::new(1, 2, 1),
        LevelConfig::disabled(),
        LevelConfig::new(4, 1, 10),
        true,
        16,
    );
    hierarchy.access_instruction(0x10);
    hierarchy.access_instruction(0x00);
    // Shares an L2 set with 0x00. The invalidation frees a way in the I$ before the fill, so 0x10
    // survives even though it is the least recently used
    hierarchy.access_instruction(0x40);
    assert!(resident(&hierarchy, Level::Instruction, 0x10));
    assert!(resident(&hierarchy, Level::Instruction, 0x40));
    assert!(!resident(&hierarchy, Level::Instruction, 0x00));
    hierarchy.verify().unwrap();
}

#[test]
fn cyclic_pattern_one_larger_than_a_set_always_misses() {
    let associativity = 4;
    let config = LevelConfig::new(4, associativity, 1);
    let mut level = CacheLevel::new(&config, 4);
    let mut memory = MainMemory::new(100);
    // Every address maps to set 2
    let addresses = (0..=associativity).map(|tag| ((tag << 2) | 2) << 2).collect::<Vec<_>>();
    for _ in 0..5 {
        for address in &addresses {
            let access = level.access(*address, &mut memory);
            assert_eq!(access.latency, 101);
        }
    }
    let statistics = level.statistics();
    assert_eq!(statistics.references, 25);
    assert_eq!(statistics.misses, 25);
    assert_eq!(statistics.hits(), 0);
    assert_eq!(memory.accesses(), 25);

    // One fewer, and everything after the first round hits
    let mut level = CacheLevel::new(&config, 4);
    for _ in 0..5 {
        for address in &addresses[..associativity as usize] {
            level.access(*address, &mut memory);
        }
    }
    assert_eq!(level.statistics().misses, associativity as u64);
}

#[test]
fn repeated_access_hits() {
    let mut hierarchy = build(
        LevelConfig::new(2, 2, 2),
        LevelConfig::new(2, 2, 3),
        LevelConfig::new(4, 2, 10),
        true,
        32,
    );
    for address in [0x1000, 0x2000, 0x1004, 0x3000] {
        hierarchy.access_data(address);
        let misses = hierarchy.statistics().dcache.misses;
        assert_eq!(hierarchy.access_data(address), 3);
        assert_eq!(hierarchy.statistics().dcache.misses, misses);
    }
}

#[test]
fn disabled_l1_passes_through_to_l2() {
    let l2_config = LevelConfig::new(4, 2, 10);
    let mut hierarchy = build(LevelConfig::disabled(), LevelConfig::new(2, 1, 1), l2_config, false, 16);
    let mut l2 = CacheLevel::new(&l2_config, 16);
    let mut memory = MainMemory::new(100);
    for address in [0x00, 0x40, 0x80, 0x00, 0xc0, 0x100, 0x40, 0x00] {
        assert_eq!(hierarchy.access_instruction(address), l2.access(address, &mut memory).latency);
    }
    let statistics = hierarchy.statistics();
    assert_eq!(statistics.icache, LevelStatistics::default());
    assert_eq!(statistics.l2, l2.statistics());
    assert_eq!(statistics.memory_accesses, memory.accesses());
    assert!(hierarchy.level(Level::Instruction).is_none());
}

#[test]
fn configuration_errors_are_reported() {
    let valid = HierarchyConfig {
        icache: LevelConfig::new(64, 2, 1),
        dcache: LevelConfig::new(64, 4, 1),
        l2: LevelConfig::new(512, 8, 10),
        inclusive: true,
        block_size: 64,
        memory_latency: 100,
    };
    assert_eq!(valid.validate(), Ok(()));

    let check = |edit: &dyn Fn(&mut HierarchyConfig), expected: ConfigError| {
        let mut config = valid.clone();
        edit(&mut config);
        assert_eq!(Hierarchy::new(&config).unwrap_err(), expected);
    };
    check(&|c| c.block_size = 24, ConfigError::BlockSize(24));
    check(&|c| c.block_size = 0, ConfigError::BlockSize(0));
    check(&|c| c.memory_latency = 0, ConfigError::MemoryLatency);
    check(&|c| c.icache.sets = 3, ConfigError::Sets { level: Level::Instruction, sets: 3 });
    check(&|c| c.dcache.associativity = 0, ConfigError::Associativity { level: Level::Data, sets: 64 });
    check(&|c| c.l2.hit_time = 0, ConfigError::HitTime { level: Level::Unified });
    check(
        &|c| {
            c.block_size = 1 << 12;
            c.l2.sets = 1 << 20;
        },
        ConfigError::AddressWidth { level: Level::Unified, bits: 32 },
    );
    // The slowest access has to fit in a u32, counting only the slower L1
    check(&|c| c.icache.hit_time = u32::MAX - 109, ConfigError::Latency);
    check(&|c| c.memory_latency = u32::MAX, ConfigError::Latency);
    let mut config = valid.clone();
    config.icache.hit_time = u32::MAX - 110;
    config.dcache.hit_time = 5;
    assert_eq!(config.validate(), Ok(()));
    config.l2 = LevelConfig::disabled();
    config.icache.hit_time = u32::MAX - 100;
    let mut hierarchy = Hierarchy::new(&config).unwrap();
    assert_eq!(hierarchy.access_instruction(0), u32::MAX);
    assert_eq!(hierarchy.access_instruction(0), u32::MAX - 100);

    // Nothing about a disabled level is checked
    let mut config = valid.clone();
    *config.level_mut(Level::Data) = LevelConfig::new(0, 0, 0);
    assert!(Hierarchy::new(&config).is_ok());
}

#[test]
fn configuration_files_use_defaults() {
    let config: HierarchyConfig = serde_json::from_str(r#"{"icache": {"sets": 4, "associativity": 1, "hit_time": 1}}"#).unwrap();
    assert_eq!(config.icache, LevelConfig::new(4, 1, 1));
    assert!(!config.dcache.is_enabled());
    assert!(!config.l2.is_enabled());
    assert!(!config.inclusive);
    assert_eq!(config.block_size, 64);
    assert_eq!(config.memory_latency, 100);

    assert!(serde_json::from_str::<HierarchyConfig>(r#"{"l3": {"sets": 4}}"#).is_err());
    assert!(serde_json::from_str::<HierarchyConfig>(r#"{"memory_latency": -1}"#).is_err());
}

#[test]
fn level_specifiers_are_parsed() {
    assert_eq!("256:4:2".parse::<LevelConfig>(), Ok(LevelConfig::new(256, 4, 2)));
    assert_eq!(" 0:0:0 ".parse::<LevelConfig>(), Ok(LevelConfig::disabled()));
    assert_eq!("256:4".parse::<LevelConfig>(), Err(SpecifierError::Shape("256:4".to_string())));
    assert!(matches!("256:four:2".parse::<LevelConfig>(), Err(SpecifierError::Field { field, .. }) if field == "four"));
}

#[test]
fn report_derives_rates() {
    let config = HierarchyConfig {
        icache: LevelConfig::new(1, 2, 1),
        dcache: LevelConfig::new(1, 2, 1),
        ..HierarchyConfig::default()
    };
    let mut simulator = Simulator::new(&config).unwrap();
    simulator.simulate(b"0x00 I\n0x40 I\n0x00 I\n").unwrap();
    let report = Report::new(simulator.result(), simulator.hierarchy());
    assert_eq!(report.levels.len(), 2);
    let icache = &report.levels[0];
    assert_eq!(icache.level, Level::Instruction);
    assert!((icache.miss_rate() - 2.0 / 3.0).abs() < 1e-9);
    assert!((icache.average_access_time() - (1.0 + 200.0 / 3.0)).abs() < 1e-9);
    // Never referenced
    assert_eq!(report.levels[1].miss_rate(), 0.0);
    assert_eq!(report.levels[1].average_access_time(), 0.0);
    assert!((report.average_memory_access_time() - 203.0 / 3.0).abs() < 1e-9);

    let text = report.to_string();
    assert!(text.contains("I$"));
    assert!(text.contains("D$"));
    assert!(!text.contains("L2$"));
}

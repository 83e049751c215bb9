//! # HierLib
//!
//! HierLib is a library for simulating the timing of a two-level cache hierarchy
//!
//! It provides a set associative LRU cache level which is instantiated for split instruction and
//! data L1 caches and a shared, optionally inclusive, L2, and a simulator to replay address traces
//! through them, counting references, misses, and the cycles each access takes
//!
//! Each access is a plain call chain from an L1 through the L2 to main memory, with nothing shared
//! or global; a hierarchy owns every level and every counter

/// Splits addresses into set indices and tags for a level's geometry
pub mod address;

/// Contains the cache level, the main memory model, and the per-level statistics
pub mod cache;

/// Contains definitions for the JSON configuration format, and its validation
pub mod config;

/// Contains the hierarchy wiring the levels together, including inclusive back-invalidation
pub mod hierarchy;

/// Reading trace files
pub mod io;

/// Derived figures and the text summary of a simulation
pub mod report;

/// Contains the way storage of a single level, with its LRU bookkeeping
pub mod set_store;

/// Contains the simulator used to replay a trace against a given hierarchy configuration
pub mod simulator;
#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;

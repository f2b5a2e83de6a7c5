//! Shared type definitions for the Enclave segregation simulator.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries in the workspace: the [`House`] record and its wire encoding,
//! the partition/run identifiers, and the payloads exchanged between
//! workers and the coordinator at each round barrier.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers (partition slots, run ids)
//! - [`enums`] -- Closed enumerations (partition strategies)
//! - [`structs`] -- Record structs (houses, reports, checkpoints)

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::PartitionStrategy;
pub use ids::{PartitionId, RunId};
pub use structs::{CheckpointRecord, House, Race, WorkerReport};

//! Domain layer - Core types and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles, plus the volume roles and
//! run modes the workload is composed from.

pub mod ports;
pub mod roles;

#[cfg(test)]
pub(crate) mod fakes;

pub use ports::*;
pub use roles::*;

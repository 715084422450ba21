//! Cluster connection

pub mod handle;

pub use handle::*;

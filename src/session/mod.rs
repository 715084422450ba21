//! Cloud CLI session handling
//!
//! The login is the one non-declarative side effect that must happen before
//! anything else; it is guarded by a marker in the persisted state.

pub mod bootstrapper;
pub mod state;

pub use bootstrapper::*;
pub use state::*;

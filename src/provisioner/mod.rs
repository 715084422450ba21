//! Provisioning entry point
//!
//! Ties the session, cluster handle and resource declarators together into
//! one ordered run.

pub mod orchestrator;

pub use orchestrator::*;

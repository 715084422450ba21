//! Cluster resource declarations
//!
//! Each declarator builds a `k8s-openapi` object and submits it through a
//! [`ClusterApi`](crate::domain::ports::ClusterApi), returning the identity
//! the API reports back.

pub mod config;
pub mod namespace;
pub mod storage;
pub mod workload;

pub use config::{from_local_file, from_remote_extraction, RemoteExtraction};
pub use namespace::declare_namespace;
pub use storage::{declare_claim, declare_claims};
pub use workload::{declare_deployment, ConfigObjects, WorkloadSpec};

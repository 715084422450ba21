//! Corda Node Provisioner
//!
//! Provisions a Corda node onto an AKS cluster in a single ordered run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         Provisioning Orchestrator                            │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │    Session      │  │  Cluster Handle │  │    Resource Declarators     │  │
//! │  │  Bootstrapper   │─▶│     Factory     │─▶│ ns → cm → pvc → deployment  │  │
//! │  └────────┬────────┘  └─────────────────┘  └─────────────┬───────────────┘  │
//! │           │                                              │                   │
//! │  ┌────────┴────────┐                        ┌────────────┴────────────────┐  │
//! │  │  State File     │                        │  Workload Composer          │  │
//! │  │  (markers)      │                        │  (role → volume bindings)   │  │
//! │  └─────────────────┘                        └─────────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                        Platform Adapters                                     │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────────────┐   │
//! │  │          az CLI             │  │              kubectl                │   │
//! │  │  (subscription, AKS creds)  │  │  (signer pod lookup, file copy)     │   │
//! │  └─────────────────────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`provisioner`]: Orchestrator, run configuration and outputs
//! - [`session`]: Idempotent CLI login and the persisted state file
//! - [`cluster`]: Cluster handle built from a kubeconfig blob
//! - [`resources`]: Namespace, ConfigMap, claim and Deployment declarators
//! - [`platform`]: `az` and `kubectl` adapters
//! - [`domain`]: Ports, volume roles and modes
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod domain;
pub mod error;
pub mod platform;
pub mod provisioner;
pub mod resources;
pub mod session;

// Re-export commonly used types
pub use provisioner::{Orchestrator, ProvisionConfig, ProvisionOutputs};

pub use cluster::{ClusterHandle, KubeConnector};

pub use domain::ports::{
    CloudCli, ClusterApi, ClusterCli, ClusterConnector, CredentialsBlob, ResourceId,
    SessionMarker, StateStore,
};
pub use domain::roles::{Mode, ModeKind, RoleBindings, VolumeRole};

pub use error::{Error, ErrorCategory, Result};

pub use platform::{AzureCliConfig, KubectlConfig, PlatformConfig, PlatformFactory};

pub use resources::{ConfigObjects, RemoteExtraction, WorkloadSpec};

pub use session::{FileStateStore, SessionBootstrapper, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

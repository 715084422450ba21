//! Platform Adapters
//!
//! Provides command-line adapters for:
//! - Azure CLI (subscription selection, AKS credentials)
//! - kubectl (pod lookup, copying files out of pods)

pub mod azure;
pub mod kubectl;

pub use azure::*;
pub use kubectl::*;

use crate::domain::ports::{CloudCliRef, ClusterCliRef};
use std::sync::Arc;

/// Factory for the command-line adapters
pub struct PlatformFactory;

impl PlatformFactory {
    pub fn cloud(config: &PlatformConfig) -> CloudCliRef {
        Arc::new(AzureCli::new(config.azure.clone()))
    }

    pub fn cluster(config: &PlatformConfig) -> ClusterCliRef {
        Arc::new(Kubectl::new(config.kubectl.clone()))
    }
}

/// Combined platform configuration
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub azure: AzureCliConfig,
    pub kubectl: KubectlConfig,
}

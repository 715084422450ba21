//! Azure CLI Adapter
//!
//! Selects the subscription and merges AKS credentials into a kubeconfig by
//! shelling out to `az`.

use crate::domain::ports::CloudCli;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Azure CLI adapter
#[derive(Debug, Clone)]
pub struct AzureCliConfig {
    /// Path or name of the `az` binary
    pub binary: String,
}

impl Default for AzureCliConfig {
    fn default() -> Self {
        Self {
            binary: "az".to_string(),
        }
    }
}

// =============================================================================
// Azure CLI
// =============================================================================

pub struct AzureCli {
    config: AzureCliConfig,
}

impl AzureCli {
    pub fn new(config: AzureCliConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        let command = format!("{} {}", self.config.binary, args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&self.config.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Authentication {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Authentication {
                command,
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `az account set --subscription <id>`
pub fn login_args(subscription_id: &str) -> Vec<String> {
    vec![
        "account".into(),
        "set".into(),
        "--subscription".into(),
        subscription_id.into(),
    ]
}

/// `az aks get-credentials ... --overwrite-existing --file <path>`
pub fn credentials_args(resource_group: &str, cluster_name: &str, kubeconfig: &Path) -> Vec<String> {
    vec![
        "aks".into(),
        "get-credentials".into(),
        "--resource-group".into(),
        resource_group.into(),
        "--name".into(),
        cluster_name.into(),
        "--overwrite-existing".into(),
        "--file".into(),
        kubeconfig.display().to_string(),
    ]
}

#[async_trait]
impl CloudCli for AzureCli {
    async fn authenticate(&self, subscription_id: &str) -> Result<String> {
        self.run(login_args(subscription_id)).await
    }

    async fn fetch_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
        kubeconfig_path: &Path,
    ) -> Result<String> {
        self.run(credentials_args(resource_group, cluster_name, kubeconfig_path))
            .await
    }
}

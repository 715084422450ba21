//! kubectl Adapter
//!
//! Lists pods and copies files out of them. Used only for the network
//! truststore, which lives inside the signer pod of an externally managed
//! namespace.

use crate::domain::ports::ClusterCli;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Configuration for the kubectl adapter
#[derive(Debug, Clone)]
pub struct KubectlConfig {
    /// Path or name of the `kubectl` binary
    pub binary: String,
    /// Kubeconfig passed with `--kubeconfig`, if any
    pub kubeconfig: Option<PathBuf>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            binary: "kubectl".to_string(),
            kubeconfig: None,
        }
    }
}

pub struct Kubectl {
    config: KubectlConfig,
}

impl Kubectl {
    pub fn new(config: KubectlConfig) -> Self {
        Self { config }
    }

    fn command(&self, args: &[String]) -> (Command, String) {
        let mut cmd = Command::new(&self.config.binary);
        let mut full: Vec<String> = Vec::new();
        if let Some(kubeconfig) = &self.config.kubeconfig {
            full.push("--kubeconfig".into());
            full.push(kubeconfig.display().to_string());
        }
        full.extend(args.iter().cloned());
        cmd.args(&full);
        let command_line = format!("{} {}", self.config.binary, full.join(" "));
        (cmd, command_line)
    }
}

/// `kubectl get pods` printing bare pod names
pub fn list_pods_args(namespace: &str) -> Vec<String> {
    vec![
        "get".into(),
        "pods".into(),
        "--namespace".into(),
        namespace.into(),
        "--no-headers".into(),
        "-o".into(),
        "custom-columns=:metadata.name".into(),
    ]
}

/// `kubectl cp <ns>/<pod>:<remote> <local>`
pub fn copy_args(namespace: &str, pod: &str, remote_path: &str, local_path: &Path) -> Vec<String> {
    vec![
        "cp".into(),
        format!("{}/{}:{}", namespace, pod, remote_path),
        local_path.display().to_string(),
    ]
}

/// One pod name per non-empty line
pub fn parse_pod_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl ClusterCli for Kubectl {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        let (mut cmd, command_line) = self.command(&list_pods_args(namespace));
        debug!("Running {}", command_line);

        let output = cmd.output().await.map_err(|e| Error::RemoteLookup {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RemoteLookup {
                command: command_line,
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(parse_pod_names(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn copy_from_pod(
        &self,
        namespace: &str,
        pod: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()> {
        let (mut cmd, command_line) = self.command(&copy_args(namespace, pod, remote_path, local_path));
        debug!("Running {}", command_line);

        let output = cmd.output().await.map_err(|e| Error::RemoteCopy {
            pod: pod.to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RemoteCopy {
                pod: pod.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

//! Configuration Materializer
//!
//! Turns external inputs into ConfigMaps: the node configuration from a
//! local file, and the network root truststore pulled out of the signer pod.

use crate::domain::ports::{ClusterApi, ClusterCli, ResourceId};
use crate::domain::roles::NETWORK_TRUSTSTORE_FILE;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key the node configuration is stored under
pub const NODE_CONF_KEY: &str = "node.conf";

/// Default name of the node configuration ConfigMap
pub const NODE_CONF_CONFIG_MAP: &str = "nodeconf-configmap";

/// Default name of the network certificate ConfigMap
pub const NETWORK_CONFIG_MAP: &str = "networkcertificate-configmap";

pub fn config_map(namespace: &str, name: &str, data: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    }
}

/// Read a whole file, rejecting empty content
async fn read_source(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
    if bytes.is_empty() {
        return Err(Error::EmptySource {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

// =============================================================================
// Local File
// =============================================================================

/// Declare a ConfigMap holding `path`'s content verbatim under [`NODE_CONF_KEY`]
pub async fn from_local_file(
    api: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    path: &Path,
) -> Result<ResourceId> {
    let bytes = read_source(path).await?;
    let content = String::from_utf8(bytes).map_err(|e| {
        Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;

    info!(
        "Declaring ConfigMap {}/{} from {} ({} bytes)",
        namespace,
        name,
        path.display(),
        content.len()
    );

    let mut data = BTreeMap::new();
    data.insert(NODE_CONF_KEY.to_string(), content);
    api.create_config_map(namespace, config_map(namespace, name, data))
        .await
}

// =============================================================================
// Remote Extraction
// =============================================================================

/// Where the network truststore is pulled from and how it is stored
#[derive(Debug, Clone)]
pub struct RemoteExtraction {
    /// Externally managed namespace the signer runs in
    pub source_namespace: String,
    /// Name prefix identifying the signer pod
    pub pod_prefix: String,
    /// Path of the truststore inside the pod
    pub remote_path: String,
    /// Intermediate local copy
    pub local_path: PathBuf,
    /// Name of the ConfigMap to declare
    pub config_map_name: String,
    /// Delete the local copy once the ConfigMap is declared
    pub remove_artifact: bool,
}

impl Default for RemoteExtraction {
    fn default() -> Self {
        Self {
            source_namespace: "cenm".to_string(),
            pod_prefix: "cenm-signer".to_string(),
            remote_path: format!("DATA/trust-stores/{}", NETWORK_TRUSTSTORE_FILE),
            local_path: PathBuf::from(NETWORK_TRUSTSTORE_FILE),
            config_map_name: NETWORK_CONFIG_MAP.to_string(),
            remove_artifact: false,
        }
    }
}

impl RemoteExtraction {
    /// ConfigMap key: the truststore's file name
    pub fn key(&self) -> String {
        Path::new(&self.remote_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| NETWORK_TRUSTSTORE_FILE.to_string())
    }
}

/// Copy the truststore out of the signer pod and declare it, base64-encoded,
/// as a ConfigMap in `namespace`
pub async fn from_remote_extraction(
    api: &dyn ClusterApi,
    cli: &dyn ClusterCli,
    namespace: &str,
    extraction: &RemoteExtraction,
) -> Result<ResourceId> {
    let pod = cli
        .find_pod(&extraction.source_namespace, &extraction.pod_prefix)
        .await?;
    info!(
        "Copying {} from {}/{}",
        extraction.remote_path, extraction.source_namespace, pod
    );

    cli.copy_from_pod(
        &extraction.source_namespace,
        &pod,
        &extraction.remote_path,
        &extraction.local_path,
    )
    .await?;

    let declared = declare_extracted(api, namespace, extraction).await;

    if extraction.remove_artifact {
        match (&declared, remove_artifact(&extraction.local_path).await) {
            (Ok(_), Err(e)) => return Err(e),
            (Err(_), Err(e)) => warn!("Leaving truststore copy behind: {}", e),
            _ => {}
        }
    }

    declared
}

async fn declare_extracted(
    api: &dyn ClusterApi,
    namespace: &str,
    extraction: &RemoteExtraction,
) -> Result<ResourceId> {
    let bytes = read_source(&extraction.local_path).await?;

    let mut data = BTreeMap::new();
    data.insert(extraction.key(), STANDARD.encode(&bytes));

    info!(
        "Declaring ConfigMap {}/{} ({} bytes before encoding)",
        namespace,
        extraction.config_map_name,
        bytes.len()
    );
    api.create_config_map(
        namespace,
        config_map(namespace, &extraction.config_map_name, data),
    )
    .await
}

async fn remove_artifact(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

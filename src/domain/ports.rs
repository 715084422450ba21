//! Domain Ports - Core trait definitions for the provisioner
//!
//! These traits define the boundaries between the provisioning sequence and
//! the external systems it drives: the cloud CLI, the cluster CLI, the
//! cluster API and the persisted provisioning state.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Resource Identity
// =============================================================================

/// Identity of a declared cluster resource, as reported back by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource kind (Namespace, ConfigMap, ...)
    pub kind: String,
    /// Namespace, for namespaced kinds
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
    /// Server-assigned uid, when the API returned one
    pub uid: Option<String>,
}

impl ResourceId {
    /// `<namespace>/<name>`, or just the name for cluster-scoped kinds
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.qualified_name())
    }
}

// =============================================================================
// Session Marker
// =============================================================================

/// Persisted record that an idempotent external command already ran
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarker {
    /// Logical name of the action (e.g. `loginIntoAzCli`)
    pub name: String,
    /// Captured stdout, keyed by output name
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// When the action was performed
    pub created_at: DateTime<Utc>,
}

impl SessionMarker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Raw kubeconfig bytes along with where they were read from
#[derive(Clone)]
pub struct CredentialsBlob {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for CredentialsBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsBlob")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// =============================================================================
// Cloud CLI Port
// =============================================================================

/// Port for the cloud provider CLI session
#[async_trait]
pub trait CloudCli: Send + Sync {
    /// Select the subscription for the CLI session, returning stdout
    async fn authenticate(&self, subscription_id: &str) -> Result<String>;

    /// Fetch and merge cluster credentials into `kubeconfig_path`, returning stdout
    async fn fetch_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
        kubeconfig_path: &Path,
    ) -> Result<String>;
}

// =============================================================================
// Cluster CLI Port
// =============================================================================

/// Port for out-of-band operations against running pods
#[async_trait]
pub trait ClusterCli: Send + Sync {
    /// List pod names in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>>;

    /// Copy a file out of a running pod onto the local filesystem
    async fn copy_from_pod(
        &self,
        namespace: &str,
        pod: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()>;

    /// Find the single pod whose name starts with `name_prefix`
    async fn find_pod(&self, namespace: &str, name_prefix: &str) -> Result<String> {
        let mut matches: Vec<String> = self
            .list_pods(namespace)
            .await?
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| name.starts_with(name_prefix))
            .collect();

        match matches.len() {
            0 => Err(Error::PodNotFound {
                namespace: namespace.to_string(),
                prefix: name_prefix.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::AmbiguousPod {
                namespace: namespace.to_string(),
                prefix: name_prefix.to_string(),
                pods: matches,
            }),
        }
    }
}

// =============================================================================
// Cluster API Port
// =============================================================================

/// Port for declaring resources against the cluster API.
///
/// Each call is a single create attempt. Rejections (name collisions,
/// missing references, quota) surface as errors.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Identity of the connection this API talks through
    fn connection_id(&self) -> String;

    async fn create_namespace(&self, namespace: Namespace) -> Result<ResourceId>;

    async fn create_config_map(&self, namespace: &str, config_map: ConfigMap)
        -> Result<ResourceId>;

    async fn create_claim(
        &self,
        namespace: &str,
        claim: PersistentVolumeClaim,
    ) -> Result<ResourceId>;

    async fn create_deployment(&self, namespace: &str, deployment: Deployment)
        -> Result<ResourceId>;
}

/// Port for turning a credentials blob into a cluster API handle
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, credentials: &CredentialsBlob) -> Result<ClusterApiRef>;
}

// =============================================================================
// State Store Port
// =============================================================================

/// Port for the persisted provisioning state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Look up a session marker by logical name
    async fn get_marker(&self, name: &str) -> Result<Option<SessionMarker>>;

    /// Record a session marker
    async fn put_marker(&self, marker: SessionMarker) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type CloudCliRef = Arc<dyn CloudCli>;
pub type ClusterCliRef = Arc<dyn ClusterCli>;
pub type ClusterApiRef = Arc<dyn ClusterApi>;
pub type StateStoreRef = Arc<dyn StateStore>;
pub type ClusterConnectorRef = Arc<dyn ClusterConnector>;

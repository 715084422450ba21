//! In-memory implementations of the domain ports for tests

use crate::domain::ports::{
    CloudCli, ClusterApi, ClusterApiRef, ClusterCli, ClusterConnector, CredentialsBlob,
    ResourceId, SessionMarker, StateStore,
};
use crate::error::{Error, Result};
use crate::resources::workload::deployment_references;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Cloud CLI
// =============================================================================

#[derive(Default)]
pub struct FakeCloudCli {
    pub fail_login: bool,
    pub fail_credentials: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCloudCli {
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CloudCli for FakeCloudCli {
    async fn authenticate(&self, subscription_id: &str) -> Result<String> {
        self.calls.lock().push(format!("login {}", subscription_id));
        if self.fail_login {
            return Err(Error::Authentication {
                command: "az account set".into(),
                reason: "subscription not found".into(),
            });
        }
        Ok(String::new())
    }

    async fn fetch_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
        kubeconfig_path: &Path,
    ) -> Result<String> {
        self.calls
            .lock()
            .push(format!("credentials {} {}", resource_group, cluster_name));
        if self.fail_credentials {
            return Err(Error::Authentication {
                command: "az aks get-credentials".into(),
                reason: "forbidden".into(),
            });
        }
        std::fs::write(kubeconfig_path, "apiVersion: v1\nkind: Config\n")
            .map_err(|e| Error::io(kubeconfig_path, e))?;
        Ok(format!(
            "Merged \"{}\" as current context in {}",
            cluster_name,
            kubeconfig_path.display()
        ))
    }
}

// =============================================================================
// Cluster CLI
// =============================================================================

#[derive(Default)]
pub struct FakeClusterCli {
    pub pods: Vec<String>,
    pub fail_listing: bool,
    pub fail_copy: bool,
    pub file_content: Vec<u8>,
    pub copies: Mutex<Vec<String>>,
}

impl FakeClusterCli {
    pub fn with_pods(pods: &[&str]) -> Self {
        Self {
            pods: pods.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClusterCli for FakeClusterCli {
    async fn list_pods(&self, _namespace: &str) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(Error::RemoteLookup {
                command: "kubectl get pods".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(self.pods.clone())
    }

    async fn copy_from_pod(
        &self,
        namespace: &str,
        pod: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()> {
        self.copies
            .lock()
            .push(format!("{}/{}:{}", namespace, pod, remote_path));
        if self.fail_copy {
            return Err(Error::RemoteCopy {
                pod: pod.to_string(),
                reason: "error: file not found".into(),
            });
        }
        std::fs::write(local_path, &self.file_content).map_err(|e| Error::io(local_path, e))
    }
}

// =============================================================================
// Cluster API
// =============================================================================

/// Cluster API that keeps declared objects in memory and rejects
/// dangling references the way a live cluster run would
#[derive(Default)]
pub struct MemoryCluster {
    pub namespaces: Mutex<BTreeSet<String>>,
    pub config_maps: Mutex<BTreeMap<(String, String), ConfigMap>>,
    pub claims: Mutex<BTreeMap<(String, String), PersistentVolumeClaim>>,
    pub deployments: Mutex<BTreeMap<(String, String), Deployment>>,
    /// Kinds in declaration order
    pub log: Mutex<Vec<String>>,
}

impl MemoryCluster {
    fn require_namespace(&self, kind: &str, name: &str, namespace: &str) -> Result<()> {
        if !self.namespaces.lock().contains(namespace) {
            return Err(Error::declaration(
                kind,
                name,
                format!("namespace {} not found", namespace),
            ));
        }
        Ok(())
    }

    fn id(kind: &str, namespace: Option<&str>, name: &str) -> ResourceId {
        ResourceId {
            kind: kind.into(),
            namespace: namespace.map(String::from),
            name: name.into(),
            uid: Some(format!("uid-{}", name)),
        }
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.config_maps
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    fn connection_id(&self) -> String {
        "memory".into()
    }

    async fn create_namespace(&self, namespace: Namespace) -> Result<ResourceId> {
        let name = namespace.metadata.name.unwrap_or_default();
        if !self.namespaces.lock().insert(name.clone()) {
            return Err(Error::declaration("Namespace", &name, "already exists"));
        }
        self.log.lock().push("Namespace".into());
        Ok(Self::id("Namespace", None, &name))
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: ConfigMap,
    ) -> Result<ResourceId> {
        let name = config_map.metadata.name.clone().unwrap_or_default();
        self.require_namespace("ConfigMap", &name, namespace)?;
        let key = (namespace.to_string(), name.clone());
        let mut maps = self.config_maps.lock();
        if maps.contains_key(&key) {
            return Err(Error::declaration("ConfigMap", &name, "already exists"));
        }
        maps.insert(key, config_map);
        self.log.lock().push("ConfigMap".into());
        Ok(Self::id("ConfigMap", Some(namespace), &name))
    }

    async fn create_claim(
        &self,
        namespace: &str,
        claim: PersistentVolumeClaim,
    ) -> Result<ResourceId> {
        let name = claim.metadata.name.clone().unwrap_or_default();
        self.require_namespace("PersistentVolumeClaim", &name, namespace)?;
        let key = (namespace.to_string(), name.clone());
        let mut claims = self.claims.lock();
        if claims.contains_key(&key) {
            return Err(Error::declaration(
                "PersistentVolumeClaim",
                &name,
                "already exists",
            ));
        }
        claims.insert(key, claim);
        self.log.lock().push("PersistentVolumeClaim".into());
        Ok(Self::id("PersistentVolumeClaim", Some(namespace), &name))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: Deployment,
    ) -> Result<ResourceId> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.require_namespace("Deployment", &name, namespace)?;

        let refs = deployment_references(&deployment);
        for claim in &refs.claims {
            let key = (namespace.to_string(), claim.clone());
            if !self.claims.lock().contains_key(&key) {
                return Err(Error::declaration(
                    "Deployment",
                    &name,
                    format!("claim {} not found", claim),
                ));
            }
        }
        for config_map in &refs.config_maps {
            let key = (namespace.to_string(), config_map.clone());
            if !self.config_maps.lock().contains_key(&key) {
                return Err(Error::declaration(
                    "Deployment",
                    &name,
                    format!("configmap {} not found", config_map),
                ));
            }
        }

        self.deployments
            .lock()
            .insert((namespace.to_string(), name.clone()), deployment);
        self.log.lock().push("Deployment".into());
        Ok(Self::id("Deployment", Some(namespace), &name))
    }
}

/// Hands out the same in-memory cluster for any credentials
pub struct FakeConnector {
    pub cluster: Arc<MemoryCluster>,
    pub fail: bool,
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(&self, credentials: &CredentialsBlob) -> Result<ClusterApiRef> {
        if self.fail {
            return Err(Error::Kubeconfig(format!(
                "Failed to parse {}",
                credentials.path.display()
            )));
        }
        Ok(self.cluster.clone())
    }
}

// =============================================================================
// State Store
// =============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    pub markers: Mutex<BTreeMap<String, SessionMarker>>,
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_marker(&self, name: &str) -> Result<Option<SessionMarker>> {
        Ok(self.markers.lock().get(name).cloned())
    }

    async fn put_marker(&self, marker: SessionMarker) -> Result<()> {
        self.markers.lock().insert(marker.name.clone(), marker);
        Ok(())
    }
}

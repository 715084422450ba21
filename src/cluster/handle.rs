//! Cluster Handle Factory
//!
//! Turns a kubeconfig blob into the single [`ClusterHandle`] every
//! declaration of a run goes through.

use crate::domain::ports::{
    ClusterApi, ClusterApiRef, ClusterConnector, CredentialsBlob, ResourceId,
};
use crate::error::{Error, Result};
use crate::resources::workload::deployment_references;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim};
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Authenticated connection to one cluster
#[derive(Clone)]
pub struct ClusterHandle {
    client: Client,
    id: String,
}

impl ClusterHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn create<K>(&self, api: Api<K>, kind: &str, object: &K) -> Result<ResourceId>
    where
        K: Resource + Clone + DeserializeOwned + Serialize + Debug,
    {
        let name = object.name_any();
        debug!("Creating {} {}", kind, name);

        let created = api
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| Error::declaration(kind, &name, e))?;

        Ok(ResourceId {
            kind: kind.to_string(),
            namespace: created.namespace(),
            name: created.name_any(),
            uid: created.uid(),
        })
    }
}

impl Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle").field("id", &self.id).finish()
    }
}

/// Build a cluster handle from a kubeconfig blob, optionally pinning a context
pub async fn connect(credentials: &CredentialsBlob, context: Option<&str>) -> Result<ClusterHandle> {
    let yaml = std::str::from_utf8(&credentials.bytes).map_err(|e| {
        Error::Kubeconfig(format!(
            "{} is not valid UTF-8: {}",
            credentials.path.display(),
            e
        ))
    })?;

    let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|e| {
        Error::Kubeconfig(format!(
            "Failed to parse {}: {}",
            credentials.path.display(),
            e
        ))
    })?;

    let id = connection_id(&kubeconfig, context)?;

    let config = Config::from_custom_kubeconfig(
        kubeconfig,
        &KubeConfigOptions {
            context: context.map(String::from),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| Error::Kubeconfig(format!("Failed to create config: {}", e)))?;

    let client = Client::try_from(config)
        .map_err(|e| Error::Kubeconfig(format!("Failed to create client: {}", e)))?;

    info!("Connected cluster handle {}", id);
    Ok(ClusterHandle { client, id })
}

/// Connector building a [`ClusterHandle`] per blob
#[derive(Debug, Clone, Default)]
pub struct KubeConnector {
    /// Kubeconfig context to use instead of current-context
    pub context: Option<String>,
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, credentials: &CredentialsBlob) -> Result<ClusterApiRef> {
        let handle = connect(credentials, self.context.as_deref()).await?;
        Ok(Arc::new(handle))
    }
}

/// `<context>@<server>` for the context that will be used
fn connection_id(kubeconfig: &Kubeconfig, context: Option<&str>) -> Result<String> {
    let context_name = context
        .map(String::from)
        .or_else(|| kubeconfig.current_context.clone())
        .ok_or_else(|| {
            Error::Kubeconfig("No context specified and no current-context".into())
        })?;

    let cluster_name = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .and_then(|c| c.context.as_ref())
        .map(|c| c.cluster.clone())
        .ok_or_else(|| Error::Kubeconfig(format!("Context '{}' not found", context_name)))?;

    let server = kubeconfig
        .clusters
        .iter()
        .find(|c| c.name == cluster_name)
        .and_then(|c| c.cluster.as_ref())
        .and_then(|c| c.server.clone())
        .ok_or_else(|| {
            Error::Kubeconfig(format!("Cluster '{}' has no server URL", cluster_name))
        })?;

    Ok(format!("{}@{}", context_name, server))
}

/// A failed reference lookup fails the Deployment it was probed for
fn probe_error(deployment: &str, kind: &str, reference: &str, err: kube::Error) -> Error {
    Error::declaration(
        "Deployment",
        deployment,
        format!("probing {} {}: {}", kind, reference, err),
    )
}

#[async_trait]
impl ClusterApi for ClusterHandle {
    fn connection_id(&self) -> String {
        self.id.clone()
    }

    async fn create_namespace(&self, namespace: Namespace) -> Result<ResourceId> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.create(api, "Namespace", &namespace).await
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: ConfigMap,
    ) -> Result<ResourceId> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        self.create(api, "ConfigMap", &config_map).await
    }

    async fn create_claim(
        &self,
        namespace: &str,
        claim: PersistentVolumeClaim,
    ) -> Result<ResourceId> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        self.create(api, "PersistentVolumeClaim", &claim).await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: Deployment,
    ) -> Result<ResourceId> {
        let name = deployment.name_any();

        // The API server accepts dangling volume references and only fails
        // at pod scheduling, so probe them here.
        let refs = deployment_references(&deployment);
        let claims: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        for claim in &refs.claims {
            let found = claims
                .get_opt(claim)
                .await
                .map_err(|e| probe_error(&name, "PersistentVolumeClaim", claim, e))?;
            if found.is_none() {
                return Err(Error::declaration(
                    "Deployment",
                    &name,
                    format!("PersistentVolumeClaim {}/{} not found", namespace, claim),
                ));
            }
        }
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        for config_map in &refs.config_maps {
            let found = config_maps
                .get_opt(config_map)
                .await
                .map_err(|e| probe_error(&name, "ConfigMap", config_map, e))?;
            if found.is_none() {
                return Err(Error::declaration(
                    "Deployment",
                    &name,
                    format!("ConfigMap {}/{} not found", namespace, config_map),
                ));
            }
        }

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        self.create(api, "Deployment", &deployment).await
    }
}

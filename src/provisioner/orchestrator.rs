//! Provisioning Orchestrator
//!
//! Runs the whole sequence against one cluster:
//! - session (login + credentials, at most once per state file)
//! - cluster handle from the credentials blob
//! - namespace, node-config ConfigMap, network ConfigMap (networked only)
//! - storage claims, then the node Deployment
//!
//! Every step is awaited in order and the first failure aborts the run.
//! Nothing already declared is rolled back.

use crate::cluster::KubeConnector;
use crate::domain::ports::{
    CloudCliRef, ClusterCliRef, ClusterConnectorRef, StateStoreRef,
};
use crate::domain::roles::{Mode, RoleBindings};
use crate::error::{Error, Result};
use crate::platform::{PlatformConfig, PlatformFactory};
use crate::resources::config::{from_local_file, from_remote_extraction, RemoteExtraction};
use crate::resources::config::NODE_CONF_CONFIG_MAP;
use crate::resources::namespace::declare_namespace;
use crate::resources::storage::declare_claims;
use crate::resources::workload::{declare_deployment, ConfigObjects, WorkloadSpec};
use crate::session::{
    FileStateStore, SessionBootstrapper, SessionRequest, CREDENTIALS_OUTPUT, LOGIN_OUTPUT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Everything a provisioning run needs
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub subscription_id: String,
    pub resource_group: String,
    /// AKS cluster name; the resource group name when unset
    pub cluster_name: Option<String>,
    /// Kubeconfig the credentials are merged into
    pub kubeconfig_path: PathBuf,
    /// Context to use instead of the kubeconfig's current-context
    pub kube_context: Option<String>,
    /// Namespace the node is provisioned into
    pub namespace: String,
    pub workload: WorkloadSpec,
    pub mode: Mode,
    /// Local node.conf published as the node-config ConfigMap
    pub node_conf_path: PathBuf,
    pub node_conf_config_map: String,
    /// Explicit claim names in role order; derived from the deployment name when unset
    pub claim_names: Option<Vec<String>>,
    /// Truststore source, used in networked mode only
    pub extraction: RemoteExtraction,
    /// Persisted provisioning state (session markers)
    pub state_file: PathBuf,
    pub platform: PlatformConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            resource_group: String::new(),
            cluster_name: None,
            kubeconfig_path: PathBuf::new(),
            kube_context: None,
            namespace: "corda".to_string(),
            workload: WorkloadSpec::new("corda-node"),
            mode: Mode::Standalone {
                init_command: "run-migration-scripts --core-schemas --app-schemas".to_string(),
            },
            node_conf_path: PathBuf::from("config/node.conf"),
            node_conf_config_map: NODE_CONF_CONFIG_MAP.to_string(),
            claim_names: None,
            extraction: RemoteExtraction::default(),
            state_file: PathBuf::from(".provision-state.json"),
            platform: PlatformConfig::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn cluster_name(&self) -> &str {
        self.cluster_name
            .as_deref()
            .unwrap_or(&self.resource_group)
    }

    /// Claim names bound to their roles for the configured mode
    pub fn role_bindings(&self) -> Result<RoleBindings> {
        match &self.claim_names {
            Some(names) => RoleBindings::from_ordered(names, &self.mode),
            None => Ok(RoleBindings::for_deployment(&self.workload.name, &self.mode)),
        }
    }

    /// Reject configurations that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("subscription id", self.subscription_id.as_str()),
            ("resource group", self.resource_group.as_str()),
            ("namespace", self.namespace.as_str()),
            ("deployment name", self.workload.name.as_str()),
            ("image", self.workload.image.as_str()),
            ("node-config ConfigMap name", self.node_conf_config_map.as_str()),
        ];
        for (what, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("{} must not be empty", what)));
            }
        }

        if self.kubeconfig_path.as_os_str().is_empty() {
            return Err(Error::Configuration("kubeconfig path must not be empty".into()));
        }

        if let Mode::Networked { truststore_password } = &self.mode {
            if truststore_password.is_empty() {
                return Err(Error::Configuration(
                    "networked mode requires a truststore password".into(),
                ));
            }
        }

        self.role_bindings().map(|_| ())
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// What a run declared, printed by the binary as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutputs {
    /// Subscription selection stdout, when the login ran in this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_output: Option<String>,
    /// Credential retrieval stdout, when the login ran in this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_kube_config: Option<String>,
    pub provider_id: String,
    pub namespace_id: String,
    pub config_maps: Vec<String>,
    pub claims: Vec<String>,
    pub deployment_id: String,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    config: ProvisionConfig,
    cloud: CloudCliRef,
    cluster_cli: ClusterCliRef,
    state: StateStoreRef,
    connector: ClusterConnectorRef,
}

impl Orchestrator {
    pub fn new(
        config: ProvisionConfig,
        cloud: CloudCliRef,
        cluster_cli: ClusterCliRef,
        state: StateStoreRef,
        connector: ClusterConnectorRef,
    ) -> Self {
        Self {
            config,
            cloud,
            cluster_cli,
            state,
            connector,
        }
    }

    /// Wire the real adapters: `az`, `kubectl`, the JSON state file and kube
    pub fn from_config(mut config: ProvisionConfig) -> Self {
        if config.platform.kubectl.kubeconfig.is_none() {
            config.platform.kubectl.kubeconfig = Some(config.kubeconfig_path.clone());
        }

        let cloud = PlatformFactory::cloud(&config.platform);
        let cluster_cli = PlatformFactory::cluster(&config.platform);
        let state = Arc::new(FileStateStore::new(config.state_file.clone()));
        let connector = Arc::new(KubeConnector {
            context: config.kube_context.clone(),
        });

        Self::new(config, cloud, cluster_cli, state, connector)
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Run the provisioning sequence once
    pub async fn run(&self) -> Result<ProvisionOutputs> {
        let config = &self.config;
        config.validate()?;
        let claim_names = config.role_bindings()?.names();
        let namespace = config.namespace.as_str();

        info!(
            "Provisioning {} node {}/{} on cluster {}",
            config.mode.kind(),
            namespace,
            config.workload.name,
            config.cluster_name()
        );

        let mut outputs = ProvisionOutputs::default();

        // Session
        let mut bootstrapper = SessionBootstrapper::new(self.cloud.clone(), self.state.clone());
        let session = bootstrapper
            .ensure_session(&SessionRequest {
                subscription_id: config.subscription_id.clone(),
                resource_group: config.resource_group.clone(),
                cluster_name: config.cluster_name().to_string(),
                kubeconfig_path: config.kubeconfig_path.clone(),
            })
            .await?;
        outputs.command_output = session.outputs.get(LOGIN_OUTPUT).cloned();
        outputs.get_kube_config = session.outputs.get(CREDENTIALS_OUTPUT).cloned();

        // Cluster handle
        let api = self.connector.connect(&session.credentials).await?;
        outputs.provider_id = api.connection_id();
        debug!("Using cluster handle {}", outputs.provider_id);

        // Namespace
        outputs.namespace_id = declare_namespace(api.as_ref(), namespace).await?.name;

        // ConfigMaps
        let node_config = from_local_file(
            api.as_ref(),
            namespace,
            &config.node_conf_config_map,
            &config.node_conf_path,
        )
        .await?;
        outputs.config_maps.push(node_config.qualified_name());

        let mut config_objects = ConfigObjects {
            node_config: node_config.name,
            network_certificate: None,
        };

        if let Mode::Networked { .. } = config.mode {
            let network = from_remote_extraction(
                api.as_ref(),
                self.cluster_cli.as_ref(),
                namespace,
                &config.extraction,
            )
            .await?;
            outputs.config_maps.push(network.qualified_name());
            config_objects.network_certificate = Some(network.name);
        }

        // Claims
        let claims = declare_claims(api.as_ref(), namespace, &claim_names).await?;
        outputs.claims = claims.iter().map(|c| c.qualified_name()).collect();

        // Deployment
        let deployment = declare_deployment(
            api.as_ref(),
            namespace,
            &config.workload,
            &claim_names,
            &config_objects,
            &config.mode,
        )
        .await?;
        outputs.deployment_id = deployment.qualified_name();

        info!(
            "Provisioned {} ({} ConfigMaps, {} claims)",
            outputs.deployment_id,
            outputs.config_maps.len(),
            outputs.claims.len()
        );
        Ok(outputs)
    }
}

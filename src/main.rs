//! Corda Node Provisioner
//!
//! Logs into the subscription, fetches AKS credentials and declares the
//! namespace, ConfigMaps, claims and Deployment for one Corda node, then
//! prints what it declared as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use corda_node_provisioner::{
    Error, Mode, ModeKind, Orchestrator, ProvisionConfig, RemoteExtraction, Result, WorkloadSpec,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Corda Node Provisioner - declares a Corda node workload on AKS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kubeconfig the AKS credentials are merged into and read from
    #[arg(long, env = "KUBECONFIGPATH")]
    kubeconfig_path: PathBuf,

    /// Azure subscription id
    #[arg(long, env = "AZ_SUBSCRIPTION_ID")]
    subscription_id: String,

    /// Azure resource group holding the cluster
    #[arg(long, env = "AZ_RESOURCE_GROUP")]
    resource_group: String,

    /// AKS cluster name (defaults to the resource group)
    #[arg(long, env = "AKS_CLUSTER_NAME")]
    cluster_name: Option<String>,

    /// Kubeconfig context to use instead of current-context
    #[arg(long, env = "KUBE_CONTEXT")]
    kube_context: Option<String>,

    /// Namespace the node is provisioned into
    #[arg(long, env = "NODE_NAMESPACE", default_value = "corda")]
    namespace: String,

    /// Deployment name; claim names are derived from it
    #[arg(long, env = "NODE_NAME", default_value = "corda-node")]
    deployment_name: String,

    /// Node container image
    #[arg(long, env = "NODE_IMAGE")]
    image: Option<String>,

    /// Run mode (networked, standalone)
    #[arg(long, env = "NODE_MODE", default_value = "standalone")]
    mode: String,

    /// Initialization command appended to CORDA_ARGS in standalone mode
    #[arg(
        long,
        env = "NODE_INIT_COMMAND",
        default_value = "run-migration-scripts --core-schemas --app-schemas"
    )]
    init_command: String,

    /// Network root truststore password (networked mode)
    #[arg(long, env = "TRUSTSTORE_PASSWORD", hide_env_values = true)]
    truststore_password: Option<String>,

    /// Local node.conf published as a ConfigMap
    #[arg(long, env = "NODE_CONF_PATH", default_value = "config/node.conf")]
    node_conf: PathBuf,

    /// Provisioning state file
    #[arg(long, env = "PROVISION_STATE_FILE", default_value = ".provision-state.json")]
    state_file: PathBuf,

    /// Explicit claim names in role order, comma separated
    #[arg(long, env = "NODE_CLAIM_NAMES", value_delimiter = ',')]
    claim_names: Option<Vec<String>>,

    /// Namespace of the signer holding the network truststore
    #[arg(long, env = "SIGNER_NAMESPACE", default_value = "cenm")]
    signer_namespace: String,

    /// Name prefix of the signer pod
    #[arg(long, env = "SIGNER_PREFIX", default_value = "cenm-signer")]
    signer_prefix: String,

    /// Also mount the Artemis directory from the persistence claim
    #[arg(long, env = "ARTEMIS_MOUNT")]
    artemis_mount: bool,

    /// Delete the local truststore copy once its ConfigMap is declared
    #[arg(long, env = "REMOVE_TRUSTSTORE_ARTIFACT")]
    remove_truststore_artifact: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> Result<ProvisionConfig> {
        let mode = match self.mode.parse::<ModeKind>()? {
            ModeKind::Networked => Mode::Networked {
                truststore_password: self.truststore_password.ok_or_else(|| {
                    Error::Configuration(
                        "networked mode requires --truststore-password".into(),
                    )
                })?,
            },
            ModeKind::Standalone => Mode::Standalone {
                init_command: self.init_command,
            },
        };

        let mut workload = WorkloadSpec::new(self.deployment_name);
        if let Some(image) = self.image {
            workload.image = image;
        }
        workload.artemis_mount = self.artemis_mount;

        Ok(ProvisionConfig {
            subscription_id: self.subscription_id,
            resource_group: self.resource_group,
            cluster_name: self.cluster_name,
            kubeconfig_path: self.kubeconfig_path,
            kube_context: self.kube_context,
            namespace: self.namespace,
            workload,
            mode,
            node_conf_path: self.node_conf,
            claim_names: self.claim_names,
            extraction: RemoteExtraction {
                source_namespace: self.signer_namespace,
                pod_prefix: self.signer_prefix,
                remove_artifact: self.remove_truststore_artifact,
                ..RemoteExtraction::default()
            },
            state_file: self.state_file,
            ..ProvisionConfig::default()
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting Corda Node Provisioner");
    info!("  Version: {}", corda_node_provisioner::VERSION);
    info!("  Namespace: {}", args.namespace);
    info!("  Deployment: {}", args.deployment_name);
    info!("  Mode: {}", args.mode);

    if let Err(e) = run(args).await {
        error!(category = %e.category(), "Provisioning failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let orchestrator = Orchestrator::from_config(config);

    let outputs = orchestrator.run().await?;

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    info!("Provisioning complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

//! Workload Composer
//!
//! Assembles the node Deployment: one container with fixed ports and
//! resources, one volume and mount per [`VolumeRole`], and an environment
//! that depends on the run [`Mode`].

use crate::domain::ports::{ClusterApi, ResourceId};
use crate::domain::roles::{Mode, RoleBindings, VolumeRole, VolumeSourceKind};
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, PersistentVolumeClaimVolumeSource,
    PodSecurityContext, PodSpec, PodTemplateSpec, ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_IMAGE: &str = "corda/corda-enterprise:4.12-zulu-openjdk-alpine";
pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";

pub const P2P_PORT: i32 = 10005;
pub const RPC_PORT: i32 = 10006;
pub const ADMIN_RPC_PORT: i32 = 10046;

/// Group that owns mounted volumes, matching the image's runtime user
pub const FS_GROUP: i64 = 1000;

/// Artemis shares the persistence claim under its own sub-path
pub const ARTEMIS_MOUNT_PATH: &str = "/opt/corda/artemis";
pub const ARTEMIS_SUB_PATH: &str = "artemis";

pub const ENV_CORDA_ARGS: &str = "CORDA_ARGS";
pub const ENV_ACCEPT_LICENSE: &str = "ACCEPT_LICENSE";
pub const ENV_CONFIG_FOLDER: &str = "CONFIG_FOLDER";
pub const ENV_CERTIFICATES_FOLDER: &str = "CERTIFICATES_FOLDER";

const BASE_ARGS: &str = "--log-to-console";

// =============================================================================
// Inputs
// =============================================================================

/// Deployment-level settings that do not depend on the mode
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub name: String,
    pub image: String,
    pub pull_policy: String,
    /// Also mount the Artemis directory from the persistence claim
    pub artemis_mount: bool,
}

impl WorkloadSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: DEFAULT_IMAGE.to_string(),
            pull_policy: DEFAULT_PULL_POLICY.to_string(),
            artemis_mount: false,
        }
    }
}

/// Names of the ConfigMaps the ConfigMap-backed roles read from
#[derive(Debug, Clone, Default)]
pub struct ConfigObjects {
    pub node_config: String,
    pub network_certificate: Option<String>,
}

// =============================================================================
// Pod Parts
// =============================================================================

pub fn volumes(bindings: &RoleBindings, config_objects: &ConfigObjects) -> Result<Vec<Volume>> {
    bindings
        .iter()
        .map(|(role, name)| -> Result<Volume> {
            let mut volume = Volume {
                name: name.to_string(),
                ..Volume::default()
            };
            match role.source_kind() {
                VolumeSourceKind::Claim => {
                    volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                        claim_name: name.to_string(),
                        ..PersistentVolumeClaimVolumeSource::default()
                    });
                }
                VolumeSourceKind::NodeConfigMap => {
                    volume.config_map = Some(config_map_source(&config_objects.node_config));
                }
                VolumeSourceKind::NetworkConfigMap => {
                    let source = config_objects.network_certificate.as_deref().ok_or_else(|| {
                        Error::Configuration(format!(
                            "Role {} is bound but no network certificate ConfigMap was declared",
                            role
                        ))
                    })?;
                    volume.config_map = Some(config_map_source(source));
                }
            }
            Ok(volume)
        })
        .collect()
}

fn config_map_source(name: &str) -> ConfigMapVolumeSource {
    ConfigMapVolumeSource {
        name: Some(name.to_string()),
        ..ConfigMapVolumeSource::default()
    }
}

pub fn volume_mounts(bindings: &RoleBindings, artemis_mount: bool) -> Vec<VolumeMount> {
    let mut mounts = Vec::with_capacity(bindings.len() + 1);
    for (role, name) in bindings.iter() {
        mounts.push(VolumeMount {
            name: name.to_string(),
            mount_path: role.mount_path().to_string(),
            sub_path: role.sub_path().map(String::from),
            ..VolumeMount::default()
        });

        if role == VolumeRole::Persistence && artemis_mount {
            mounts.push(VolumeMount {
                name: name.to_string(),
                mount_path: ARTEMIS_MOUNT_PATH.to_string(),
                sub_path: Some(ARTEMIS_SUB_PATH.to_string()),
                ..VolumeMount::default()
            });
        }
    }
    mounts
}

pub fn ports() -> Vec<ContainerPort> {
    [
        (P2P_PORT, "p2pport"),
        (RPC_PORT, "rpcport"),
        (ADMIN_RPC_PORT, "adminrpcport"),
    ]
    .into_iter()
    .map(|(port, name)| ContainerPort {
        container_port: port,
        name: Some(name.to_string()),
        ..ContainerPort::default()
    })
    .collect()
}

pub fn resources() -> ResourceRequirements {
    let quantities = |memory: &str, cpu: &str| {
        let mut map = BTreeMap::new();
        map.insert("memory".to_string(), Quantity(memory.to_string()));
        map.insert("cpu".to_string(), Quantity(cpu.to_string()));
        map
    };

    ResourceRequirements {
        limits: Some(quantities("8Gi", "1")),
        requests: Some(quantities("4Gi", "100m")),
        ..ResourceRequirements::default()
    }
}

/// Value of `CORDA_ARGS` for a mode
pub fn corda_args(mode: &Mode) -> String {
    match mode {
        Mode::Networked {
            truststore_password,
        } => format!(
            "{} --initial-registration --network-root-truststore {} \
             --network-root-truststore-password {}",
            BASE_ARGS,
            VolumeRole::NetworkTruststore.mount_path(),
            truststore_password
        ),
        Mode::Standalone { init_command } if init_command.trim().is_empty() => {
            BASE_ARGS.to_string()
        }
        Mode::Standalone { init_command } => format!("{} {}", BASE_ARGS, init_command.trim()),
    }
}

pub fn environment(mode: &Mode) -> Vec<EnvVar> {
    let var = |name: &str, value: String| EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..EnvVar::default()
    };

    let mut env = vec![
        var(ENV_CORDA_ARGS, corda_args(mode)),
        var(ENV_ACCEPT_LICENSE, "Y".to_string()),
        var(
            ENV_CONFIG_FOLDER,
            VolumeRole::ConfigMirror.mount_path().to_string(),
        ),
    ];

    if let Mode::Networked { .. } = mode {
        env.push(var(
            ENV_CERTIFICATES_FOLDER,
            VolumeRole::NetworkTruststore.mount_path().to_string(),
        ));
    }

    env
}

pub fn container(spec: &WorkloadSpec, bindings: &RoleBindings, mode: &Mode) -> Container {
    Container {
        name: spec.name.clone(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.pull_policy.clone()),
        ports: Some(ports()),
        resources: Some(resources()),
        volume_mounts: Some(volume_mounts(bindings, spec.artemis_mount)),
        env: Some(environment(mode)),
        ..Container::default()
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// Build the Deployment for an already validated set of bindings
pub fn compose_deployment(
    namespace: &str,
    spec: &WorkloadSpec,
    bindings: &RoleBindings,
    config_objects: &ConfigObjects,
    mode: &Mode,
) -> Result<Deployment> {
    if bindings.mode() != mode.kind() || bindings.len() != mode.roles().len() {
        return Err(Error::InvalidRoleBindings {
            mode: mode.kind().to_string(),
            expected: mode.roles().len(),
            actual: bindings.len(),
        });
    }

    let mut labels = BTreeMap::new();
    labels.insert("run".to_string(), spec.name.clone());

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..DeploymentStrategy::default()
            }),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container(spec, bindings, mode)],
                    security_context: Some(PodSecurityContext {
                        fs_group: Some(FS_GROUP),
                        ..PodSecurityContext::default()
                    }),
                    volumes: Some(volumes(bindings, config_objects)?),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

/// Bind the ordered claim names to roles, compose the Deployment and declare it
pub async fn declare_deployment<S: AsRef<str>>(
    api: &dyn ClusterApi,
    namespace: &str,
    spec: &WorkloadSpec,
    claim_names_ordered: &[S],
    config_objects: &ConfigObjects,
    mode: &Mode,
) -> Result<ResourceId> {
    let bindings = RoleBindings::from_ordered(claim_names_ordered, mode)?;
    let deployment = compose_deployment(namespace, spec, &bindings, config_objects, mode)?;

    info!(
        "Declaring deployment {}/{} ({} mode, image {})",
        namespace,
        spec.name,
        mode.kind(),
        spec.image
    );
    api.create_deployment(namespace, deployment).await
}

// =============================================================================
// References
// =============================================================================

/// Objects a Deployment's volumes point at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReferences {
    pub claims: Vec<String>,
    pub config_maps: Vec<String>,
}

pub fn deployment_references(deployment: &Deployment) -> DeploymentReferences {
    let mut refs = DeploymentReferences::default();

    let volumes = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.volumes.as_ref());

    for volume in volumes.into_iter().flatten() {
        if let Some(pvc) = &volume.persistent_volume_claim {
            refs.claims.push(pvc.claim_name.clone());
        }
        if let Some(name) = volume.config_map.as_ref().and_then(|cm| cm.name.clone()) {
            refs.config_maps.push(name);
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fakes::MemoryCluster;
    use crate::domain::roles::NETWORK_TRUSTSTORE_FILE;
    use crate::resources::config::{config_map, NETWORK_CONFIG_MAP, NODE_CONF_CONFIG_MAP};
    use crate::resources::namespace::declare_namespace;
    use crate::resources::storage::declare_claims;
    use assert_matches::assert_matches;

    const STANDALONE_CLAIMS: [&str; 5] = ["certs", "config", "persistence", "logs", "configmap"];
    const NETWORKED_CLAIMS: [&str; 6] = [
        "certs",
        "config",
        "persistence",
        "logs",
        "configmap",
        "networkcertificate",
    ];

    fn standalone() -> Mode {
        Mode::Standalone {
            init_command: "--initial-registration".into(),
        }
    }

    fn networked() -> Mode {
        Mode::Networked {
            truststore_password: "trust-store-password".into(),
        }
    }

    fn config_objects(network: bool) -> ConfigObjects {
        ConfigObjects {
            node_config: NODE_CONF_CONFIG_MAP.into(),
            network_certificate: network.then(|| NETWORK_CONFIG_MAP.to_string()),
        }
    }

    fn pod_container(deployment: &Deployment) -> &Container {
        &deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
    }

    fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
        container
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn test_standalone_container_shape() {
        let mode = standalone();
        let bindings = RoleBindings::from_ordered(&STANDALONE_CLAIMS, &mode).unwrap();
        let deployment = compose_deployment(
            "corda",
            &WorkloadSpec::new("corda-node"),
            &bindings,
            &config_objects(false),
            &mode,
        )
        .unwrap();
        let container = pod_container(&deployment);

        assert_eq!(container.volume_mounts.as_ref().unwrap().len(), 5);
        assert_eq!(container.env.as_ref().unwrap().len(), 3);

        let ports: Vec<(i32, &str)> = container
            .ports
            .as_ref()
            .unwrap()
            .iter()
            .map(|p| (p.container_port, p.name.as_deref().unwrap()))
            .collect();
        assert_eq!(
            ports,
            vec![(10005, "p2pport"), (10006, "rpcport"), (10046, "adminrpcport")]
        );

        assert_eq!(
            env_value(container, ENV_CORDA_ARGS),
            Some("--log-to-console --initial-registration")
        );
        assert_eq!(env_value(container, ENV_CERTIFICATES_FOLDER), None);
        assert!(!env_value(container, ENV_CORDA_ARGS)
            .unwrap()
            .contains("--network-root-truststore-password"));
    }

    #[test]
    fn test_networked_environment() {
        let env = environment(&networked());
        let lookup = |name: &str| {
            env.iter()
                .find(|e| e.name == name)
                .and_then(|e| e.value.clone())
        };

        assert_eq!(env.len(), 4);
        assert!(lookup(ENV_CORDA_ARGS)
            .unwrap()
            .contains("--network-root-truststore-password trust-store-password"));
        assert_eq!(
            lookup(ENV_CERTIFICATES_FOLDER).as_deref(),
            Some(VolumeRole::NetworkTruststore.mount_path())
        );
        assert_eq!(lookup(ENV_ACCEPT_LICENSE).as_deref(), Some("Y"));
        assert_eq!(lookup(ENV_CONFIG_FOLDER).as_deref(), Some("/opt/corda/config"));
    }

    #[test]
    fn test_networked_corda_args_point_at_truststore_mount() {
        // sub-path mount: the truststore file sits at the mount path itself
        assert_eq!(
            corda_args(&networked()),
            "--log-to-console --initial-registration \
             --network-root-truststore /opt/corda/certificates/network \
             --network-root-truststore-password trust-store-password"
        );
        assert_eq!(
            VolumeRole::NetworkTruststore.sub_path(),
            Some(NETWORK_TRUSTSTORE_FILE)
        );
    }

    #[test]
    fn test_mounts_bind_roles_not_positions() {
        let mode = networked();
        let bindings = RoleBindings::from_ordered(&NETWORKED_CLAIMS, &mode).unwrap();
        let mounts = volume_mounts(&bindings, false);

        let find = |path: &str| mounts.iter().find(|m| m.mount_path == path).unwrap();
        assert_eq!(find("/etc/corda").name, "config");
        assert_eq!(find("/opt/corda/certificates").name, "certs");
        assert_eq!(find("/opt/corda/persistence").sub_path.as_deref(), Some("persistence"));
        let network = find("/opt/corda/certificates/network");
        assert_eq!(network.name, "networkcertificate");
        assert_eq!(network.sub_path.as_deref(), Some("network-root-truststore.jks"));
    }

    #[test]
    fn test_artemis_shares_persistence_claim() {
        let mode = standalone();
        let bindings = RoleBindings::from_ordered(&STANDALONE_CLAIMS, &mode).unwrap();
        let mounts = volume_mounts(&bindings, true);

        assert_eq!(mounts.len(), 6);
        let shared: Vec<_> = mounts.iter().filter(|m| m.name == "persistence").collect();
        assert_eq!(shared.len(), 2);
        assert_eq!(shared[1].mount_path, ARTEMIS_MOUNT_PATH);
        assert_eq!(shared[1].sub_path.as_deref(), Some(ARTEMIS_SUB_PATH));
    }

    #[test]
    fn test_volume_sources() {
        let mode = networked();
        let bindings = RoleBindings::from_ordered(&NETWORKED_CLAIMS, &mode).unwrap();
        let volumes = volumes(&bindings, &config_objects(true)).unwrap();

        assert_eq!(volumes.len(), 6);
        let configmap = volumes.iter().find(|v| v.name == "configmap").unwrap();
        assert_eq!(
            configmap.config_map.as_ref().unwrap().name.as_deref(),
            Some(NODE_CONF_CONFIG_MAP)
        );
        let logs = volumes.iter().find(|v| v.name == "logs").unwrap();
        assert_eq!(logs.persistent_volume_claim.as_ref().unwrap().claim_name, "logs");

        assert_matches!(
            super::volumes(&bindings, &config_objects(false)),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_pod_level_settings() {
        let mode = standalone();
        let bindings = RoleBindings::from_ordered(&STANDALONE_CLAIMS, &mode).unwrap();
        let deployment = compose_deployment(
            "corda",
            &WorkloadSpec::new("corda-node"),
            &bindings,
            &config_objects(false),
            &mode,
        )
        .unwrap();
        let spec = deployment.spec.unwrap();

        assert_eq!(spec.strategy.unwrap().type_.as_deref(), Some("Recreate"));
        assert_eq!(
            spec.selector.match_labels.unwrap().get("run").map(String::as_str),
            Some("corda-node")
        );
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.security_context.unwrap().fs_group, Some(1000));
        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some(DEFAULT_IMAGE));
        assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));
        let limits = container.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits.get("memory"), Some(&Quantity("8Gi".into())));
    }

    #[test]
    fn test_bindings_for_other_mode_rejected() {
        let bindings = RoleBindings::from_ordered(&STANDALONE_CLAIMS, &standalone()).unwrap();
        assert_matches!(
            compose_deployment(
                "corda",
                &WorkloadSpec::new("corda-node"),
                &bindings,
                &config_objects(true),
                &networked(),
            ),
            Err(Error::InvalidRoleBindings { expected: 6, actual: 5, .. })
        );
    }

    #[tokio::test]
    async fn test_wrong_claim_count_rejected_before_declaring() {
        let cluster = MemoryCluster::default();
        declare_namespace(&cluster, "corda").await.unwrap();

        let four = ["certs", "config", "persistence", "logs"];
        let result = declare_deployment(
            &cluster,
            "corda",
            &WorkloadSpec::new("corda-node"),
            &four,
            &config_objects(false),
            &standalone(),
        )
        .await;

        assert_matches!(result, Err(Error::InvalidRoleBindings { .. }));
        assert!(cluster.deployment("corda", "corda-node").is_none());
    }

    #[tokio::test]
    async fn test_deployment_before_references_fails() {
        let cluster = MemoryCluster::default();
        let spec = WorkloadSpec::new("corda-node");

        // no namespace yet
        assert_matches!(
            declare_deployment(
                &cluster,
                "corda",
                &spec,
                &STANDALONE_CLAIMS,
                &config_objects(false),
                &standalone()
            )
            .await,
            Err(Error::Declaration { .. })
        );

        // namespace, but no claims or config maps
        declare_namespace(&cluster, "corda").await.unwrap();
        assert_matches!(
            declare_deployment(
                &cluster,
                "corda",
                &spec,
                &STANDALONE_CLAIMS,
                &config_objects(false),
                &standalone()
            )
            .await,
            Err(Error::Declaration { .. })
        );

        // claims, but the node config map is still missing
        declare_claims(&cluster, "corda", &STANDALONE_CLAIMS).await.unwrap();
        assert_matches!(
            declare_deployment(
                &cluster,
                "corda",
                &spec,
                &STANDALONE_CLAIMS,
                &config_objects(false),
                &standalone()
            )
            .await,
            Err(Error::Declaration { reason, .. }) if reason.contains(NODE_CONF_CONFIG_MAP)
        );

        let mut data = BTreeMap::new();
        data.insert("node.conf".to_string(), "foo=bar".to_string());
        cluster
            .create_config_map("corda", config_map("corda", NODE_CONF_CONFIG_MAP, data))
            .await
            .unwrap();

        let id = declare_deployment(
            &cluster,
            "corda",
            &spec,
            &STANDALONE_CLAIMS,
            &config_objects(false),
            &standalone(),
        )
        .await
        .unwrap();
        assert_eq!(id.qualified_name(), "corda/corda-node");
    }

    #[test]
    fn test_deployment_references() {
        let mode = networked();
        let bindings = RoleBindings::from_ordered(&NETWORKED_CLAIMS, &mode).unwrap();
        let deployment = compose_deployment(
            "corda",
            &WorkloadSpec::new("corda-node"),
            &bindings,
            &config_objects(true),
            &mode,
        )
        .unwrap();

        let refs = deployment_references(&deployment);
        assert_eq!(refs.claims, vec!["certs", "config", "persistence", "logs"]);
        assert_eq!(
            refs.config_maps,
            vec![NODE_CONF_CONFIG_MAP, NETWORK_CONFIG_MAP]
        );
    }
}

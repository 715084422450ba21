//! Volume roles and run modes
//!
//! The node container expects each of its volumes at a fixed path. Rather
//! than relying on the position of a claim name in a list, every volume is
//! bound to an explicit [`VolumeRole`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// File name of the network root truststore, both in the pod and as a ConfigMap key
pub const NETWORK_TRUSTSTORE_FILE: &str = "network-root-truststore.jks";

// =============================================================================
// Volume Roles
// =============================================================================

/// What a volume is used for inside the node container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeRole {
    Certificates,
    NodeConfig,
    Persistence,
    Logs,
    ConfigMirror,
    NetworkTruststore,
}

/// Where a role's volume gets its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSourceKind {
    /// A persistent volume claim named by the binding
    Claim,
    /// The node configuration ConfigMap
    NodeConfigMap,
    /// The network certificate ConfigMap
    NetworkConfigMap,
}

impl VolumeRole {
    /// Roles in the order claim lists are given
    pub const ORDERED: [VolumeRole; 6] = [
        VolumeRole::Certificates,
        VolumeRole::NodeConfig,
        VolumeRole::Persistence,
        VolumeRole::Logs,
        VolumeRole::ConfigMirror,
        VolumeRole::NetworkTruststore,
    ];

    /// Mount path inside the node container
    pub fn mount_path(&self) -> &'static str {
        match self {
            VolumeRole::Certificates => "/opt/corda/certificates",
            VolumeRole::NodeConfig => "/etc/corda",
            VolumeRole::Persistence => "/opt/corda/persistence",
            VolumeRole::Logs => "/opt/corda/logs",
            VolumeRole::ConfigMirror => "/opt/corda/config",
            VolumeRole::NetworkTruststore => "/opt/corda/certificates/network",
        }
    }

    /// Sub-path within the volume, if only part of it is mounted
    pub fn sub_path(&self) -> Option<&'static str> {
        match self {
            VolumeRole::Persistence => Some("persistence"),
            VolumeRole::NetworkTruststore => Some(NETWORK_TRUSTSTORE_FILE),
            _ => None,
        }
    }

    pub fn source_kind(&self) -> VolumeSourceKind {
        match self {
            VolumeRole::ConfigMirror => VolumeSourceKind::NodeConfigMap,
            VolumeRole::NetworkTruststore => VolumeSourceKind::NetworkConfigMap,
            _ => VolumeSourceKind::Claim,
        }
    }
}

impl std::fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeRole::Certificates => write!(f, "certificates"),
            VolumeRole::NodeConfig => write!(f, "node-config"),
            VolumeRole::Persistence => write!(f, "persistence"),
            VolumeRole::Logs => write!(f, "logs"),
            VolumeRole::ConfigMirror => write!(f, "configmap-mirror"),
            VolumeRole::NetworkTruststore => write!(f, "network-truststore"),
        }
    }
}

// =============================================================================
// Mode
// =============================================================================

/// Whether the node joins an existing network or initializes on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Networked,
    Standalone,
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKind::Networked => write!(f, "networked"),
            ModeKind::Standalone => write!(f, "standalone"),
        }
    }
}

impl FromStr for ModeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "networked" => Ok(ModeKind::Networked),
            "standalone" => Ok(ModeKind::Standalone),
            other => Err(Error::Configuration(format!(
                "Unknown mode '{}', expected 'networked' or 'standalone'",
                other
            ))),
        }
    }
}

/// Run mode with its mode-specific inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Register with an existing network using its root truststore
    Networked { truststore_password: String },
    /// Initialize independently with a caller-supplied command
    Standalone { init_command: String },
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Networked { .. } => ModeKind::Networked,
            Mode::Standalone { .. } => ModeKind::Standalone,
        }
    }

    /// Roles that must be bound in this mode
    pub fn roles(&self) -> &'static [VolumeRole] {
        match self {
            Mode::Networked { .. } => &VolumeRole::ORDERED,
            Mode::Standalone { .. } => &VolumeRole::ORDERED[..5],
        }
    }
}

// =============================================================================
// Role Bindings
// =============================================================================

/// Explicit role -> volume name mapping for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBindings {
    mode: ModeKind,
    bindings: BTreeMap<VolumeRole, String>,
}

impl RoleBindings {
    /// Bind an ordered claim list to roles.
    ///
    /// The list must hold exactly one name per role of `mode`, in
    /// [`VolumeRole::ORDERED`] order; anything else is rejected here rather
    /// than producing a short or misaligned mount list.
    pub fn from_ordered<S: AsRef<str>>(claim_names: &[S], mode: &Mode) -> Result<Self> {
        let roles = mode.roles();
        if claim_names.len() != roles.len() {
            return Err(Error::InvalidRoleBindings {
                mode: mode.kind().to_string(),
                expected: roles.len(),
                actual: claim_names.len(),
            });
        }

        let mut bindings = BTreeMap::new();
        for (role, name) in roles.iter().zip(claim_names) {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(Error::Configuration(format!(
                    "Empty volume name for role {}",
                    role
                )));
            }
            bindings.insert(*role, name.to_string());
        }

        Ok(Self {
            mode: mode.kind(),
            bindings,
        })
    }

    /// Claim names derived from a deployment name, one per role of `mode`
    pub fn for_deployment(deployment_name: &str, mode: &Mode) -> Self {
        let bindings = mode
            .roles()
            .iter()
            .map(|role| {
                let suffix = match role {
                    VolumeRole::Certificates => "certificates-pvc",
                    VolumeRole::NodeConfig => "config-pvc",
                    VolumeRole::Persistence => "persistence-pvc",
                    VolumeRole::Logs => "logs-pvc",
                    VolumeRole::ConfigMirror => "configmap-pvc",
                    VolumeRole::NetworkTruststore => "networkcertificate-configmap-pvc",
                };
                (*role, format!("{}-{}", deployment_name, suffix))
            })
            .collect();

        Self {
            mode: mode.kind(),
            bindings,
        }
    }

    pub fn mode(&self) -> ModeKind {
        self.mode
    }

    pub fn get(&self, role: VolumeRole) -> Option<&str> {
        self.bindings.get(&role).map(String::as_str)
    }

    /// Bound names in role order
    pub fn names(&self) -> Vec<String> {
        VolumeRole::ORDERED
            .iter()
            .filter_map(|role| self.bindings.get(role).cloned())
            .collect()
    }

    /// `(role, name)` pairs in role order
    pub fn iter(&self) -> impl Iterator<Item = (VolumeRole, &str)> {
        self.bindings.iter().map(|(role, name)| (*role, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

//! Namespace Declarator

use crate::domain::ports::{ClusterApi, ResourceId};
use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use tracing::info;

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

/// Declare the namespace the workload lives in. Collisions are left to the API.
pub async fn declare_namespace(api: &dyn ClusterApi, name: &str) -> Result<ResourceId> {
    info!("Declaring namespace {}", name);
    api.create_namespace(namespace(name)).await
}

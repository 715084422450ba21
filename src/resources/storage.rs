//! Storage Claim Declarator
//!
//! One claim per volume name: single-writer, 1Gi, cluster default storage class.

use crate::domain::ports::{ClusterApi, ResourceId};
use crate::error::Result;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::info;

pub const CLAIM_ACCESS_MODE: &str = "ReadWriteOnce";
pub const CLAIM_CAPACITY: &str = "1Gi";

pub fn claim(namespace: &str, name: &str) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(CLAIM_CAPACITY.to_string()));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![CLAIM_ACCESS_MODE.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..VolumeResourceRequirements::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        ..PersistentVolumeClaim::default()
    }
}

pub async fn declare_claim(api: &dyn ClusterApi, namespace: &str, name: &str) -> Result<ResourceId> {
    info!("Declaring PVC {}/{}", namespace, name);
    api.create_claim(namespace, claim(namespace, name)).await
}

/// Declare a claim per name, returning ids in the same order
pub async fn declare_claims<S: AsRef<str>>(
    api: &dyn ClusterApi,
    namespace: &str,
    names: &[S],
) -> Result<Vec<ResourceId>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(declare_claim(api, namespace, name.as_ref()).await?);
    }
    Ok(ids)
}

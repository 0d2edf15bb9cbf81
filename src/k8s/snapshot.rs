/**
 * The KubeDB `Snapshot` custom resource (kubedb.com/v1alpha1)
 *
 * Only the fields this crate reasons about are typed. The storage backend
 * description stays opaque so that any backend the operator supports
 * round-trips unchanged.
 */
use crate::k8s::informer::WatchedResource;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha1",
    kind = "Snapshot",
    plural = "snapshots",
    namespaced,
    status = "SnapshotStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSpec {
    /// Name of the database object this snapshot was taken from
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_secret_name: Option<String>,
    /// Backend description (s3, gcs, local, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WatchedResource for Snapshot {
    type Spec = SnapshotSpec;

    fn spec(&self) -> &SnapshotSpec {
        &self.spec
    }
}

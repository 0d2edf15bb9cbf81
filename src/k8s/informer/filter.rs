use super::object::WatchedResource;
use kube::ResourceExt;

/// Whether an update changed anything a mutation tracker cares about.
///
/// Labels, annotations and spec are compared independently; status and
/// resource version are ignored so resync re-deliveries come out as no-ops.
/// A missing label or annotation map equals an empty one.
#[must_use]
pub fn is_significant<K: WatchedResource>(previous: &K, current: &K) -> bool {
    previous.labels() != current.labels()
        || previous.annotations() != current.annotations()
        || previous.spec() != current.spec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::snapshot::{Snapshot, SnapshotSpec, SnapshotStatus};
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(
            "snap-1",
            SnapshotSpec {
                database_name: "pg-main".to_string(),
                ..SnapshotSpec::default()
            },
        );
        snapshot.metadata.namespace = Some("demo".to_string());
        snapshot.metadata.labels = Some(BTreeMap::from([("env".to_string(), "prod".to_string())]));
        snapshot
    }

    #[test]
    fn test_resync_copy_is_not_significant() {
        let previous = snapshot();
        let mut current = snapshot();
        current.metadata.resource_version = Some("99".to_string());
        current.status = Some(SnapshotStatus {
            phase: Some("Succeeded".to_string()),
            ..SnapshotStatus::default()
        });
        assert!(!is_significant(&previous, &current));
    }

    #[test]
    fn test_label_change_is_significant() {
        let previous = snapshot();
        let mut current = snapshot();
        current.labels_mut().insert("env".to_string(), "staging".to_string());
        assert!(is_significant(&previous, &current));
    }

    #[test]
    fn test_annotation_change_is_significant() {
        let previous = snapshot();
        let mut current = snapshot();
        current.annotations_mut().insert("note".to_string(), "x".to_string());
        assert!(is_significant(&previous, &current));
    }

    #[test]
    fn test_spec_change_is_significant() {
        let previous = snapshot();
        let mut current = snapshot();
        current.spec.storage_secret_name = Some("gcs".to_string());
        assert!(is_significant(&previous, &current));
    }

    #[test]
    fn test_empty_and_missing_maps_are_equal() {
        let previous = snapshot();
        let mut current = snapshot();
        current.metadata.annotations = Some(BTreeMap::new());
        assert!(!is_significant(&previous, &current));
    }
}

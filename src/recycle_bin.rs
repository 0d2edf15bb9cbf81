/**
 * Filesystem recycle bin
 *
 * Deleted objects are written as pretty JSON under
 * `{root}/{kind}/{namespace}/{name}.{timestamp}.json`, the kind lowercased
 * (`snapshot/`) and `_cluster` standing in for a missing namespace. Tracked
 * updates land next to them as `{name}.{timestamp}.update.json` holding both
 * versions.
 */
use crate::error::Result;
use crate::k8s::informer::{ObjectKey, RecycleBin, TypeTag, WatchedResource};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Directory used for cluster-scoped objects
const CLUSTER_SCOPE_DIR: &str = "_cluster";

#[derive(Serialize)]
struct UpdateRecord<'a, K> {
    old: &'a K,
    new: &'a K,
}

#[derive(Debug, Clone)]
pub struct FileRecycleBin {
    root: PathBuf,
}

impl FileRecycleBin {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, type_tag: &TypeTag, key: &ObjectKey) -> PathBuf {
        self.root
            .join(type_tag.kind.to_lowercase())
            .join(key.namespace.as_deref().unwrap_or(CLUSTER_SCOPE_DIR))
    }

    async fn write<T: Serialize + Sync>(
        &self,
        type_tag: &TypeTag,
        key: &ObjectKey,
        suffix: &str,
        body: &T,
    ) -> Result<PathBuf> {
        let content = serde_json::to_vec_pretty(body)?;
        let dir = self.dir_for(type_tag, key);
        tokio::fs::create_dir_all(&dir).await?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.9fZ");
        let path = dir.join(format!("{}.{stamp}{suffix}.json", key.name));
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

#[async_trait]
impl<K: WatchedResource> RecycleBin<K> for FileRecycleBin {
    async fn on_delete(&self, type_tag: &TypeTag, key: &ObjectKey, object: &K) {
        match self.write(type_tag, key, "", object).await {
            Ok(path) => info!("♻️  {} {} moved to {}", type_tag.kind, key, path.display()),
            Err(e) => error!("❌ failed to recycle {} {}: {}", type_tag.kind, key, e),
        }
    }

    async fn on_update(&self, type_tag: &TypeTag, key: &ObjectKey, previous: &K, current: &K) {
        let record = UpdateRecord {
            old: previous,
            new: current,
        };
        match self.write(type_tag, key, ".update", &record).await {
            Ok(path) => info!("♻️  {} {} update recorded in {}", type_tag.kind, key, path.display()),
            Err(e) => error!("❌ failed to record update of {} {}: {}", type_tag.kind, key, e),
        }
    }
}

use super::object::{ObjectKey, TaggedObject, TypeTag};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Keeps an externally searchable view of the watched objects
#[async_trait]
pub trait SearchIndex<K>: Send + Sync {
    async fn on_add(&self, object: &TaggedObject<K>) -> Result<()>;

    async fn on_update(&self, previous: &TaggedObject<K>, current: &TaggedObject<K>) -> Result<()>;

    async fn on_delete(&self, object: &TaggedObject<K>) -> Result<()>;
}

/// Retains deleted (and optionally mutated) objects.
///
/// Failures are the bin's own concern, so nothing is returned.
#[async_trait]
pub trait RecycleBin<K>: Send + Sync {
    async fn on_delete(&self, type_tag: &TypeTag, key: &ObjectKey, object: &K);

    async fn on_update(&self, type_tag: &TypeTag, key: &ObjectKey, previous: &K, current: &K);
}

/// Capability references the informer dispatches to.
///
/// Read-only once built; clone it to share across informers of other kinds.
pub struct Subscribers<K> {
    pub search_index: Option<Arc<dyn SearchIndex<K>>>,
    pub recycle_bin: Option<Arc<dyn RecycleBin<K>>>,
}

impl<K> Subscribers<K> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            search_index: None,
            recycle_bin: None,
        }
    }

    #[must_use]
    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex<K>>) -> Self {
        self.search_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_recycle_bin(mut self, bin: Arc<dyn RecycleBin<K>>) -> Self {
        self.recycle_bin = Some(bin);
        self
    }
}

impl<K> Default for Subscribers<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for Subscribers<K> {
    fn clone(&self) -> Self {
        Self {
            search_index: self.search_index.clone(),
            recycle_bin: self.recycle_bin.clone(),
        }
    }
}

impl<K> fmt::Debug for Subscribers<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("search_index", &self.search_index.is_some())
            .field("recycle_bin", &self.recycle_bin.is_some())
            .finish()
    }
}

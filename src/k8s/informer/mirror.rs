/**
 * Local mirror of the remote collection
 *
 * Fed by full listings and by incremental watch notices. Every change to the
 * mirror yields the raw notification that downstream layers normalize and
 * dispatch, so the mirror is the only place where "known" vs "unknown"
 * identities are decided.
 */
use super::object::ObjectKey;
use crate::error::{Error, Result};
use kube::api::DynamicObject;
use std::collections::BTreeMap;

/// Result of a full list call
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub items: Vec<DynamicObject>,
    pub resource_version: Option<String>,
}

/// One incremental change as delivered by the watch stream
#[derive(Debug, Clone)]
pub enum WatchNotice {
    Added(DynamicObject),
    Modified(DynamicObject),
    Deleted(DynamicObject),
    /// Progress marker carrying only a resource version
    Bookmark(String),
    /// Error status sent in-band by the server (410 when the version expired)
    Error { code: u16, message: String },
}

/// Un-normalized change produced by the mirror
#[derive(Debug, Clone)]
pub enum RawNotification {
    Added(DynamicObject),
    Updated {
        previous: DynamicObject,
        current: DynamicObject,
    },
    Deleted(DynamicObject),
}

#[derive(Debug, Default)]
pub struct MirrorStore {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    resource_version: Option<String>,
}

impl MirrorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile the mirror against a full listing.
    ///
    /// Unknown objects come out as `Added`, known ones as a (possibly no-op)
    /// `Updated`, and mirrored objects missing from the listing as `Deleted`.
    pub fn replace(&mut self, listing: Listing) -> Vec<RawNotification> {
        let mut vanished = std::mem::take(&mut self.objects);
        let mut notifications = Vec::with_capacity(listing.items.len());

        for object in listing.items {
            let Some(key) = ObjectKey::from_meta(&object.metadata) else {
                // Left for the normalizer to reject
                notifications.push(RawNotification::Added(object));
                continue;
            };
            match vanished.remove(&key) {
                Some(previous) => notifications.push(RawNotification::Updated {
                    previous,
                    current: object.clone(),
                }),
                None => notifications.push(RawNotification::Added(object.clone())),
            }
            self.objects.insert(key, object);
        }

        notifications.extend(vanished.into_values().map(RawNotification::Deleted));
        self.resource_version = listing.resource_version;
        notifications
    }

    /// Apply one watch notice.
    ///
    /// # Errors
    ///
    /// Returns `Error::WatchStatus` for an in-band error notice; the caller is
    /// expected to drop the stream and re-list.
    pub fn apply(&mut self, notice: WatchNotice) -> Result<Option<RawNotification>> {
        match notice {
            WatchNotice::Added(object) | WatchNotice::Modified(object) => {
                self.observe_version(&object);
                let Some(key) = ObjectKey::from_meta(&object.metadata) else {
                    return Ok(Some(RawNotification::Added(object)));
                };
                let notification = match self.objects.insert(key, object.clone()) {
                    Some(previous) => RawNotification::Updated {
                        previous,
                        current: object,
                    },
                    None => RawNotification::Added(object),
                };
                Ok(Some(notification))
            }
            WatchNotice::Deleted(object) => {
                self.observe_version(&object);
                if let Some(key) = ObjectKey::from_meta(&object.metadata) {
                    self.objects.remove(&key);
                }
                Ok(Some(RawNotification::Deleted(object)))
            }
            WatchNotice::Bookmark(version) => {
                self.resource_version = Some(version);
                Ok(None)
            }
            WatchNotice::Error { code, message } => Err(Error::WatchStatus { code, message }),
        }
    }

    fn observe_version(&mut self, object: &DynamicObject) {
        if let Some(version) = &object.metadata.resource_version {
            self.resource_version = Some(version.clone());
        }
    }

    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<&DynamicObject> {
        self.objects.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }
}

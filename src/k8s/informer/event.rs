use super::mirror::RawNotification;
use super::object::{ObjectKey, TaggedObject, TypeTag, WatchedResource};
use crate::error::{Error, Result};
use kube::api::DynamicObject;
use tracing::{debug, info};

/// A normalized lifecycle event, consumed once by the dispatcher
#[derive(Debug, Clone)]
pub enum ChangeEvent<K> {
    Added(TaggedObject<K>),
    Updated {
        previous: TaggedObject<K>,
        current: TaggedObject<K>,
    },
    Deleted(TaggedObject<K>),
}

impl<K> ChangeEvent<K> {
    /// Identity of the object the event is about (the current one for updates)
    #[must_use]
    pub const fn key(&self) -> &ObjectKey {
        match self {
            Self::Added(object) | Self::Deleted(object) => &object.key,
            Self::Updated { current, .. } => &current.key,
        }
    }

    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Added(_) => "add",
            Self::Updated { .. } => "update",
            Self::Deleted(_) => "delete",
        }
    }
}

/// Type a raw notification and tag every object it carries.
///
/// # Errors
///
/// Returns `Error::Malformed` when an object has no name, declares a different
/// kind, or does not deserialize into `K`.
pub fn normalize<K: WatchedResource>(raw: RawNotification) -> Result<ChangeEvent<K>> {
    let type_tag = TypeTag::of::<K>();
    let event = match raw {
        RawNotification::Added(object) => {
            let object = tag::<K>(&type_tag, object)?;
            info!("{} {} added", type_tag.kind, object.key);
            ChangeEvent::Added(object)
        }
        RawNotification::Updated { previous, current } => {
            let previous = tag::<K>(&type_tag, previous)?;
            let current = tag::<K>(&type_tag, current)?;
            debug!("{} {} updated", type_tag.kind, current.key);
            ChangeEvent::Updated { previous, current }
        }
        RawNotification::Deleted(object) => {
            let object = tag::<K>(&type_tag, object)?;
            info!("{} {} deleted", type_tag.kind, object.key);
            ChangeEvent::Deleted(object)
        }
    };
    Ok(event)
}

fn tag<K: WatchedResource>(type_tag: &TypeTag, object: DynamicObject) -> Result<TaggedObject<K>> {
    let key = ObjectKey::from_meta(&object.metadata)
        .ok_or_else(|| Error::Malformed(format!("invalid {} object: missing name", type_tag.kind)))?;

    if let Some(types) = &object.types {
        if types.kind != type_tag.kind {
            return Err(Error::Malformed(format!(
                "invalid {} object {key}: got kind {}",
                type_tag.kind, types.kind
            )));
        }
    }

    let value = serde_json::to_value(object)?;
    let object: K = serde_json::from_value(value)
        .map_err(|e| Error::Malformed(format!("invalid {} object {key}: {e}", type_tag.kind)))?;

    Ok(TaggedObject {
        type_tag: type_tag.clone(),
        key,
        object,
    })
}

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// A resource kind the informer can watch.
///
/// The spec accessor feeds the update significance filter; labels and
/// annotations come from the object metadata.
pub trait WatchedResource:
    Resource<DynamicType = ()>
    + Clone
    + DeserializeOwned
    + Serialize
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    type Spec: PartialEq + fmt::Debug;

    fn spec(&self) -> &Self::Spec;
}

/// `apiVersion` + `kind` of a watched object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag {
    pub api_version: String,
    pub kind: String,
}

impl TypeTag {
    #[must_use]
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Identity of an object within its kind. Immutable for the object's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Returns `None` when the metadata carries no name
    #[must_use]
    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        let name = meta.name.as_deref().filter(|name| !name.is_empty())?;
        Some(Self::new(meta.namespace.as_deref(), name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.namespace.as_deref().unwrap_or_default())
    }
}

/// An object handed to subscribers: never without its identity and type tag
#[derive(Debug, Clone)]
pub struct TaggedObject<K> {
    pub type_tag: TypeTag,
    pub key: ObjectKey,
    pub object: K,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::snapshot::Snapshot;

    #[test]
    fn test_type_tag_of_snapshot() {
        let tag = TypeTag::of::<Snapshot>();
        assert_eq!(tag.api_version, "kubedb.com/v1alpha1");
        assert_eq!(tag.kind, "Snapshot");
        assert_eq!(tag.to_string(), "kubedb.com/v1alpha1/Snapshot");
    }

    #[test]
    fn test_object_key_requires_name() {
        let mut meta = ObjectMeta {
            namespace: Some("demo".to_string()),
            ..ObjectMeta::default()
        };
        assert!(ObjectKey::from_meta(&meta).is_none());

        meta.name = Some(String::new());
        assert!(ObjectKey::from_meta(&meta).is_none());

        meta.name = Some("snap-1".to_string());
        let key = ObjectKey::from_meta(&meta).unwrap();
        assert_eq!(key, ObjectKey::new(Some("demo"), "snap-1"));
        assert_eq!(key.to_string(), "snap-1@demo");
    }
}

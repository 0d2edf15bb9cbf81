/**
 * Remote collection source
 *
 * The informer only consumes this capability: a discovery check, a full
 * list, and a watch opened from a resource version. `ApiSource` backs it with
 * the cluster API server, scoped to all namespaces.
 */
use super::config::WATCH_TIMEOUT_SECONDS;
use super::mirror::{Listing, WatchNotice};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, WatchEvent, WatchParams};
use kube::discovery::Discovery;
use kube::{Client, Resource};
use std::marker::PhantomData;
use tracing::debug;

pub type NoticeStream = BoxStream<'static, Result<WatchNotice>>;

#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Whether the remote environment serves the kind at its preferred version
    async fn is_supported(&self) -> Result<bool>;

    async fn list(&self) -> Result<Listing>;

    async fn watch(&self, resource_version: &str) -> Result<NoticeStream>;
}

/// Cluster-wide list/watch over the API server for kind `K`
pub struct ApiSource<K> {
    client: Client,
    resource: ApiResource,
    api: Api<DynamicObject>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Resource<DynamicType = ()>> ApiSource<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let resource = ApiResource::erase::<K>(&());
        let api = Api::all_with(client.clone(), &resource);
        Self {
            client,
            resource,
            api,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: Resource<DynamicType = ()> + 'static> CollectionSource for ApiSource<K> {
    async fn is_supported(&self) -> Result<bool> {
        let discovery = Discovery::new(self.client.clone())
            .filter(&[self.resource.group.as_str()])
            .run()
            .await?;

        let Some(group) = discovery.get(&self.resource.group) else {
            debug!("API group {} is not served", self.resource.group);
            return Ok(false);
        };
        let preferred = group.preferred_version_or_latest();
        if preferred != self.resource.version {
            debug!(
                "preferred version of {} is {}, not {}",
                self.resource.group, preferred, self.resource.version
            );
            return Ok(false);
        }
        Ok(group
            .versioned_resources(preferred)
            .iter()
            .any(|(resource, _)| resource.kind == self.resource.kind))
    }

    async fn list(&self) -> Result<Listing> {
        let list = self.api.list(&ListParams::default()).await?;
        Ok(Listing {
            items: list.items,
            resource_version: list.metadata.resource_version,
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<NoticeStream> {
        let wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);
        let stream = self.api.watch(&wp, resource_version).await?;
        Ok(stream
            .map_err(Error::from)
            .map_ok(WatchNotice::from)
            .boxed())
    }
}

impl From<WatchEvent<DynamicObject>> for WatchNotice {
    fn from(event: WatchEvent<DynamicObject>) -> Self {
        match event {
            WatchEvent::Added(object) => Self::Added(object),
            WatchEvent::Modified(object) => Self::Modified(object),
            WatchEvent::Deleted(object) => Self::Deleted(object),
            WatchEvent::Bookmark(bookmark) => Self::Bookmark(bookmark.metadata.resource_version),
            WatchEvent::Error(status) => Self::Error {
                code: status.code,
                message: status.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::snapshot::Snapshot;

    #[test]
    fn test_watch_event_conversion() {
        let object = DynamicObject::new("snap-1", &ApiResource::erase::<Snapshot>(&()));
        assert!(matches!(
            WatchNotice::from(WatchEvent::Modified(object.clone())),
            WatchNotice::Modified(o) if o.metadata.name.as_deref() == Some("snap-1")
        ));
        assert!(matches!(
            WatchNotice::from(WatchEvent::Deleted(object)),
            WatchNotice::Deleted(_)
        ));
    }
}

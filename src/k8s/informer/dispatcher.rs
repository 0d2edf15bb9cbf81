/**
 * Event dispatcher
 *
 * Fans one change event out to the search index and then the recycle bin.
 * Every subscriber call runs inside its own recover-and-continue boundary:
 * errors and panics are logged and reported, never propagated.
 */
use super::config::WatcherConfig;
use super::event::ChangeEvent;
use super::filter::is_significant;
use super::object::{ObjectKey, WatchedResource};
use super::subscriber::{RecycleBin, SearchIndex, Subscribers};
use crate::error::Result;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

const SEARCH_INDEX: &str = "search index";
const RECYCLE_BIN: &str = "recycle bin";

/// What happened to one subscriber for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Not applicable, disabled, absent, or filtered out
    Skipped,
    Failed(String),
}

impl Outcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub search_index: Outcome,
    pub recycle_bin: Outcome,
}

impl DispatchReport {
    #[must_use]
    pub fn failures(&self) -> u64 {
        u64::from(self.search_index.is_failed()) + u64::from(self.recycle_bin.is_failed())
    }
}

pub struct Dispatcher<K> {
    config: WatcherConfig,
    subscribers: Subscribers<K>,
}

impl<K: WatchedResource> Dispatcher<K> {
    #[must_use]
    pub const fn new(config: WatcherConfig, subscribers: Subscribers<K>) -> Self {
        Self {
            config,
            subscribers,
        }
    }

    fn search_index(&self) -> Option<&Arc<dyn SearchIndex<K>>> {
        self.subscribers
            .search_index
            .as_ref()
            .filter(|_| self.config.enable_search_index)
    }

    fn recycle_bin(&self) -> Option<&Arc<dyn RecycleBin<K>>> {
        self.subscribers.recycle_bin.as_ref()
    }

    /// Deliver one event to every applicable subscriber, search index first.
    pub async fn dispatch(&self, event: &ChangeEvent<K>) -> DispatchReport {
        let key = event.key();
        let verb = event.verb();

        let report = match event {
            ChangeEvent::Added(object) => {
                let search_index = match self.search_index() {
                    Some(index) => isolate(SEARCH_INDEX, verb, key, index.on_add(object)).await,
                    None => Outcome::Skipped,
                };
                DispatchReport {
                    search_index,
                    recycle_bin: Outcome::Skipped,
                }
            }
            ChangeEvent::Deleted(object) => {
                let search_index = match self.search_index() {
                    Some(index) => isolate(SEARCH_INDEX, verb, key, index.on_delete(object)).await,
                    None => Outcome::Skipped,
                };
                let recycle_bin = match self.recycle_bin() {
                    Some(bin) => {
                        let call = async {
                            bin.on_delete(&object.type_tag, &object.key, &object.object)
                                .await;
                            Ok(())
                        };
                        isolate(RECYCLE_BIN, verb, key, call).await
                    }
                    None => Outcome::Skipped,
                };
                DispatchReport {
                    search_index,
                    recycle_bin,
                }
            }
            ChangeEvent::Updated { previous, current } => {
                let significant = is_significant(&previous.object, &current.object);
                if !significant {
                    debug!("no significant change in {}", key);
                }

                let search_index = match self.search_index() {
                    Some(_) if self.config.index_changes_only && !significant => Outcome::Skipped,
                    Some(index) => {
                        isolate(SEARCH_INDEX, verb, key, index.on_update(previous, current)).await
                    }
                    None => Outcome::Skipped,
                };
                let recycle_bin = match self.recycle_bin() {
                    Some(bin) if self.config.recycle_bin_handle_updates && significant => {
                        let call = async {
                            bin.on_update(
                                &current.type_tag,
                                &current.key,
                                &previous.object,
                                &current.object,
                            )
                            .await;
                            Ok(())
                        };
                        isolate(RECYCLE_BIN, verb, key, call).await
                    }
                    _ => Outcome::Skipped,
                };
                DispatchReport {
                    search_index,
                    recycle_bin,
                }
            }
        };

        debug!("dispatched {} of {}: {:?}", verb, key, report);
        report
    }
}

/// Run one subscriber call, converting errors and panics into `Outcome::Failed`
async fn isolate<F>(subscriber: &str, verb: &str, key: &ObjectKey, call: F) -> Outcome
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => Outcome::Delivered,
        Ok(Err(e)) => {
            error!("❌ {} failed to handle {} of {}: {}", subscriber, verb, key, e);
            Outcome::Failed(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("❌ {} panicked handling {} of {}: {}", subscriber, verb, key, message);
            Outcome::Failed(message)
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

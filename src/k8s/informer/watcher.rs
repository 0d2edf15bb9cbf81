/**
 * Watch session for one resource kind
 *
 * Stopped -> Initializing -> Synchronizing -> Streaming, with Faulted on
 * transport errors and a full re-list on every resync tick or reconnect.
 * Notifications are processed one at a time, which is what keeps per-object
 * ordering intact.
 */
use super::config::WatcherConfig;
use super::dispatcher::{Dispatcher, panic_message};
use super::event::normalize;
use super::mirror::{MirrorStore, RawNotification, WatchNotice};
use super::object::{TypeTag, WatchedResource};
use super::source::{CollectionSource, NoticeStream};
use super::subscriber::Subscribers;
use crate::error::{Error, Result};
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Initializing,
    Synchronizing,
    Streaming,
    Faulted,
}

/// Why a watch session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The remote environment does not serve the kind; never retried
    Unsupported,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WatchStats {
    pub state: SessionState,
    pub events_dispatched: u64,
    pub events_dropped: u64,
    pub subscriber_failures: u64,
    pub reconnects: u64,
    pub resyncs: u64,
}

impl Default for WatchStats {
    fn default() -> Self {
        Self {
            state: SessionState::Stopped,
            events_dispatched: 0,
            events_dropped: 0,
            subscriber_failures: 0,
            reconnects: 0,
            resyncs: 0,
        }
    }
}

enum StreamEnd {
    Resync,
    Shutdown,
    Fault(Error),
}

enum Step {
    Shutdown,
    Resync,
    Next(Option<Result<WatchNotice>>),
}

/// Long-lived list/watch loop for kind `K`
pub struct Informer<K> {
    source: Arc<dyn CollectionSource>,
    dispatcher: Dispatcher<K>,
    config: WatcherConfig,
    type_tag: TypeTag,
    mirror: MirrorStore,
    state_tx: watch::Sender<SessionState>,
    stats: Arc<RwLock<WatchStats>>,
}

impl<K: WatchedResource> Informer<K> {
    #[must_use]
    pub fn new(
        source: Arc<dyn CollectionSource>,
        subscribers: Subscribers<K>,
        config: WatcherConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Stopped);
        Self {
            source,
            dispatcher: Dispatcher::new(config.clone(), subscribers),
            config,
            type_tag: TypeTag::of::<K>(),
            mirror: MirrorStore::new(),
            state_tx,
            stats: Arc::new(RwLock::new(WatchStats::default())),
        }
    }

    /// Observe session state transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Shared handle on the session counters
    #[must_use]
    pub fn stats_handle(&self) -> Arc<RwLock<WatchStats>> {
        self.stats.clone()
    }

    #[must_use]
    pub fn stats(&self) -> WatchStats {
        read_stats(&self.stats)
    }

    /// Spawn the session on its own task.
    ///
    /// Returns a shutdown sender and a handle. Dropping the sender without
    /// sending leaves the session running for the life of the process. A panic
    /// escaping the session is caught and logged; the task then ends without
    /// taking the process down.
    #[must_use]
    pub fn start(self) -> (mpsc::Sender<()>, InformerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state_rx = self.state();
        let stats = self.stats_handle();
        let kind = self.type_tag.kind.clone();
        let state_tx = self.state_tx.clone();
        let task_stats = self.stats_handle();

        let task = tokio::spawn(async move {
            match AssertUnwindSafe(self.run(shutdown_rx)).catch_unwind().await {
                Ok(exit) => Some(exit),
                Err(panic) => {
                    error!("💥 {} informer crashed: {}", kind, panic_message(panic.as_ref()));
                    state_tx.send_replace(SessionState::Stopped);
                    if let Ok(mut stats) = task_stats.write() {
                        stats.state = SessionState::Stopped;
                    }
                    None
                }
            }
        });

        let handle = InformerHandle {
            task,
            state_rx,
            stats,
        };
        (shutdown_tx, handle)
    }

    /// Run the session until shutdown or until the kind turns out unsupported.
    ///
    /// Blocks the caller for the lifetime of the watch.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> WatchExit {
        info!("🔍 Starting {} informer", self.type_tag);
        let mut backoff = self.config.initial_backoff;

        loop {
            self.set_state(SessionState::Initializing);
            let supported = tokio::select! {
                Some(()) = shutdown_rx.recv() => None,
                supported = self.source.is_supported() => Some(supported),
            };
            match supported {
                None => return self.stop(WatchExit::Shutdown),
                Some(Ok(true)) => break,
                Some(Ok(false)) => {
                    warn!("Skipping watching non-preferred {}", self.type_tag);
                    return self.stop(WatchExit::Unsupported);
                }
                Some(Err(e)) => {
                    error!("❌ {} discovery failed: {}", self.type_tag.kind, e);
                    if self.fault(&mut backoff, &mut shutdown_rx).await {
                        return self.stop(WatchExit::Shutdown);
                    }
                }
            }
        }

        loop {
            self.set_state(SessionState::Synchronizing);
            let listing = tokio::select! {
                Some(()) = shutdown_rx.recv() => None,
                listing = self.source.list() => Some(listing),
            };
            let listing = match listing {
                None => return self.stop(WatchExit::Shutdown),
                Some(Ok(listing)) => listing,
                Some(Err(e)) => {
                    error!("❌ {} list failed: {}", self.type_tag.kind, e);
                    if self.fault(&mut backoff, &mut shutdown_rx).await {
                        return self.stop(WatchExit::Shutdown);
                    }
                    continue;
                }
            };

            let notifications = self.mirror.replace(listing);
            debug!(
                "synchronized {} {} objects, {} notifications",
                self.mirror.len(),
                self.type_tag.kind,
                notifications.len()
            );
            for raw in notifications {
                self.handle(raw).await;
            }
            backoff = self.config.initial_backoff;

            self.set_state(SessionState::Streaming);
            match self.stream(&mut shutdown_rx).await {
                StreamEnd::Resync => {
                    debug!("🔄 resyncing {}", self.type_tag.kind);
                    self.update_stats(|stats| stats.resyncs += 1);
                }
                StreamEnd::Shutdown => return self.stop(WatchExit::Shutdown),
                StreamEnd::Fault(e) => {
                    error!("❌ {} watch failed: {}, reconnecting", self.type_tag.kind, e);
                    if self.fault(&mut backoff, &mut shutdown_rx).await {
                        return self.stop(WatchExit::Shutdown);
                    }
                }
            }
        }
    }

    /// Consume watch notices until the resync deadline, a fault, or shutdown.
    /// A stream that ends normally is re-opened from the last seen version.
    async fn stream(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> StreamEnd {
        let deadline = self
            .config
            .resync_enabled()
            .then(|| Instant::now() + self.config.resync_period);
        let mut reopening = false;

        loop {
            if reopening {
                let step = tokio::select! {
                    Some(()) = shutdown_rx.recv() => Some(StreamEnd::Shutdown),
                    () = resync_due(deadline) => Some(StreamEnd::Resync),
                    () = sleep(self.config.restart_delay) => None,
                };
                if let Some(end) = step {
                    return end;
                }
            }
            reopening = true;

            let version = self.mirror.resource_version().unwrap_or("0").to_string();
            let opened = tokio::select! {
                Some(()) = shutdown_rx.recv() => return StreamEnd::Shutdown,
                () = resync_due(deadline) => return StreamEnd::Resync,
                opened = self.source.watch(&version) => opened,
            };
            let mut stream: NoticeStream = match opened {
                Ok(stream) => stream,
                Err(e) => return StreamEnd::Fault(e),
            };
            debug!("👀 watching {} from version {}", self.type_tag.kind, version);

            loop {
                let step = tokio::select! {
                    Some(()) = shutdown_rx.recv() => Step::Shutdown,
                    () = resync_due(deadline) => Step::Resync,
                    next = stream.next() => Step::Next(next),
                };
                match step {
                    Step::Shutdown => return StreamEnd::Shutdown,
                    Step::Resync => return StreamEnd::Resync,
                    Step::Next(None) => {
                        debug!("{} watch stream ended normally, reopening", self.type_tag.kind);
                        break;
                    }
                    Step::Next(Some(Err(e))) => return StreamEnd::Fault(e),
                    Step::Next(Some(Ok(notice))) => match self.mirror.apply(notice) {
                        Ok(Some(raw)) => self.handle(raw).await,
                        Ok(None) => {}
                        Err(e) => return StreamEnd::Fault(e),
                    },
                }
            }
        }
    }

    /// Normalize and dispatch one notification.
    ///
    /// Nothing escapes: malformed notifications are dropped and a panic in
    /// here is logged, after which the loop carries on with the next one.
    async fn handle(&self, raw: RawNotification) {
        let processed = AssertUnwindSafe(async {
            match normalize::<K>(raw) {
                Ok(event) => Ok(self.dispatcher.dispatch(&event).await),
                Err(e) => Err(e),
            }
        })
        .catch_unwind()
        .await;

        match processed {
            Ok(Ok(report)) => self.update_stats(|stats| {
                stats.events_dispatched += 1;
                stats.subscriber_failures += report.failures();
            }),
            Ok(Err(e)) => {
                error!("dropping {} notification: {}", self.type_tag.kind, e);
                self.update_stats(|stats| stats.events_dropped += 1);
            }
            Err(panic) => {
                error!(
                    "💥 {} notification handling panicked: {}",
                    self.type_tag.kind,
                    panic_message(panic.as_ref())
                );
                self.update_stats(|stats| stats.events_dropped += 1);
            }
        }
    }

    /// Enter Faulted and wait out the backoff. Returns `true` on shutdown.
    async fn fault(&self, backoff: &mut Duration, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        self.set_state(SessionState::Faulted);
        self.update_stats(|stats| stats.reconnects += 1);

        let wait = *backoff;
        *backoff = next_backoff(wait, self.config.max_backoff);
        warn!("⏳ {} retrying in {:?}", self.type_tag.kind, wait);

        tokio::select! {
            Some(()) = shutdown_rx.recv() => true,
            () = sleep(wait) => false,
        }
    }

    fn stop(&self, exit: WatchExit) -> WatchExit {
        info!("🛑 {} informer stopped ({:?})", self.type_tag.kind, exit);
        self.set_state(SessionState::Stopped);
        exit
    }

    fn set_state(&self, state: SessionState) {
        debug!("{} session -> {:?}", self.type_tag.kind, state);
        self.state_tx.send_replace(state);
        self.update_stats(|stats| stats.state = state);
    }

    fn update_stats(&self, f: impl FnOnce(&mut WatchStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}

/// Resolves once the resync deadline passes, never when resync is off
async fn resync_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

fn read_stats(stats: &RwLock<WatchStats>) -> WatchStats {
    stats.read().map_or_else(|_| WatchStats::default(), |stats| stats.clone())
}

/// Handle to a spawned informer task
pub struct InformerHandle {
    task: tokio::task::JoinHandle<Option<WatchExit>>,
    state_rx: watch::Receiver<SessionState>,
    stats: Arc<RwLock<WatchStats>>,
}

impl InformerHandle {
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn stats(&self) -> WatchStats {
        read_stats(&self.stats)
    }

    /// Wait for the task to finish. `None` if it crashed or was aborted.
    ///
    /// Must not be awaited again once it has returned.
    pub async fn join(&mut self) -> Option<WatchExit> {
        (&mut self.task).await.ok().flatten()
    }

    /// Abort the task without waiting for a clean stop
    pub fn abort(self) {
        self.task.abort();
    }
}

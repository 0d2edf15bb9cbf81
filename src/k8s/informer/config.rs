/**
 * Configuration for the informer and its watch session
 */
use std::time::Duration;

/// Maximum backoff time in seconds between reconnect attempts
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Initial backoff time in seconds
pub const INITIAL_BACKOFF_SECONDS: u64 = 1;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Brief delay in seconds before re-opening a watch stream that ended normally
pub const RESTART_DELAY_SECONDS: u64 = 1;

/// Default full re-list interval in seconds
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 600; // 10 minutes

/// Immutable settings handed to the informer at construction time
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Full re-list interval; every known object is re-delivered as an update.
    /// `Duration::ZERO` turns periodic resync off: the session then only
    /// re-lists after a reconnect.
    pub resync_period: Duration,
    /// Forward events to the search index subscriber
    pub enable_search_index: bool,
    /// Forward significant updates to the recycle bin, when one is configured
    pub recycle_bin_handle_updates: bool,
    /// Apply the significance filter to the search index path as well
    pub index_changes_only: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub restart_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            resync_period: Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
            enable_search_index: true,
            recycle_bin_handle_updates: false,
            index_changes_only: false,
            initial_backoff: Duration::from_secs(INITIAL_BACKOFF_SECONDS),
            max_backoff: Duration::from_secs(MAX_BACKOFF_SECONDS),
            restart_delay: Duration::from_secs(RESTART_DELAY_SECONDS),
        }
    }
}

impl WatcherConfig {
    /// Whether a periodic full re-list is scheduled at all
    #[must_use]
    pub const fn resync_enabled(&self) -> bool {
        !self.resync_period.is_zero()
    }

    #[must_use]
    pub const fn with_resync_period(mut self, period: Duration) -> Self {
        self.resync_period = period;
        self
    }

    #[must_use]
    pub const fn with_search_index(mut self, enabled: bool) -> Self {
        self.enable_search_index = enabled;
        self
    }

    #[must_use]
    pub const fn with_recycle_bin_updates(mut self, enabled: bool) -> Self {
        self.recycle_bin_handle_updates = enabled;
        self
    }

    #[must_use]
    pub const fn with_index_changes_only(mut self, enabled: bool) -> Self {
        self.index_changes_only = enabled;
        self
    }

    #[must_use]
    pub const fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    #[must_use]
    pub const fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(MAX_BACKOFF_SECONDS > 0, "MAX_BACKOFF_SECONDS must be greater than 0");
    assert!(INITIAL_BACKOFF_SECONDS > 0, "INITIAL_BACKOFF_SECONDS must be greater than 0");
    assert!(INITIAL_BACKOFF_SECONDS <= MAX_BACKOFF_SECONDS, "initial backoff must not exceed the maximum");
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(RESTART_DELAY_SECONDS > 0, "RESTART_DELAY_SECONDS must be greater than 0");
    assert!(DEFAULT_RESYNC_PERIOD_SECS > 0, "DEFAULT_RESYNC_PERIOD_SECS must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_resync_period_disables_resync() {
        assert!(WatcherConfig::default().resync_enabled());
        let config = WatcherConfig::default().with_resync_period(Duration::ZERO);
        assert!(!config.resync_enabled());
    }
}

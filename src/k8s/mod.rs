pub mod client;
pub mod informer;
pub mod snapshot;

/// Default user agent for `snapwatch` - automatically uses the package version
///
/// Can be overridden via the `SNAPWATCH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

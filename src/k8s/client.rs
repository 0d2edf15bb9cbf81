// Client creation with custom user-agent support for kube 2.x
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Environment variable overriding the user agent sent to the API server
pub const USER_AGENT_ENV: &str = "SNAPWATCH_USER_AGENT";

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the cluster configuration cannot be inferred or the
/// client cannot be built from it
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;

    let override_agent = std::env::var(USER_AGENT_ENV).ok();
    add_user_agent_header(&mut config, override_agent.as_deref().or(custom_user_agent));

    let client = Client::try_from(config)?;
    Ok(client)
}

/// Push a `user-agent` header onto the config.
///
/// An invalid header value is logged and the kube default is kept.
pub fn add_user_agent_header(config: &mut Config, user_agent: Option<&str>) {
    let Some(user_agent) = user_agent else {
        return;
    };
    match HeaderValue::from_str(user_agent) {
        Ok(value) => config
            .headers
            .push((HeaderName::from_static("user-agent"), value)),
        Err(e) => warn!("ignoring invalid user agent {:?}: {}", user_agent, e),
    }
}

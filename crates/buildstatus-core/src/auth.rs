//! Authentication context: turning configuration into an authenticated client.

use crate::api::{ApiFactory, AuthenticatedClient};
use crate::config::{AuthConfig, PublisherConfig};
use crate::error::Result;
use tracing::debug;

/// Open a client bound to the configured server with the configured
/// credentials. Password and token flows are exclusive.
pub fn resolve_client(
    config: &PublisherConfig,
    factory: &dyn ApiFactory,
) -> Result<AuthenticatedClient> {
    debug!(
        server_url = %config.server_url,
        auth = config.auth.auth_type().name(),
        "Opening remote API client"
    );
    let client = match &config.auth {
        AuthConfig::Password { username, password } => {
            factory.open_for_user(&config.server_url, username, password)?
        }
        AuthConfig::Token { token } => factory.open_for_token(&config.server_url, token)?,
    };
    Ok(client)
}

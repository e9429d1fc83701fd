//! Opens [`GitHubClient`]s for the dispatch engine.

use std::sync::Arc;
use std::time::Duration;

use buildstatus_core::{ApiError, ApiFactory, AuthenticatedClient};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{Credentials, GitHubClient};

/// HTTP settings shared by every client a factory opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubClientConfig {
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("buildstatus/{}", buildstatus_core::VERSION),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GitHubClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

/// [`ApiFactory`] producing GitHub REST clients.
#[derive(Debug, Clone, Default)]
pub struct GitHubApiFactory {
    config: GitHubClientConfig,
}

impl GitHubApiFactory {
    pub fn new(config: GitHubClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GitHubClientConfig {
        &self.config
    }

    fn open(
        &self,
        server_url: &str,
        credentials: Credentials,
    ) -> Result<AuthenticatedClient, ApiError> {
        let client = GitHubClient::new(server_url, credentials, &self.config)?;
        debug!(api_base = client.api_base(), "Opened GitHub client");
        Ok(Arc::new(client))
    }
}

impl ApiFactory for GitHubApiFactory {
    fn open_for_user(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedClient, ApiError> {
        self.open(
            server_url,
            Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
        )
    }

    fn open_for_token(
        &self,
        server_url: &str,
        token: &str,
    ) -> Result<AuthenticatedClient, ApiError> {
        self.open(server_url, Credentials::Token(token.to_string()))
    }
}

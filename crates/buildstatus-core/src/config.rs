//! Publisher configuration.
//!
//! The build server hands us a flat string map. It is validated once into a
//! [`PublisherConfig`]; nothing downstream looks at raw keys again.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Recognized parameter keys.
pub mod keys {
    pub const SERVER_URL: &str = "server_url";
    pub const AUTH_TYPE: &str = "auth_type";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REPORT_ON: &str = "report_on";
    pub const USE_COMMENTS: &str = "use_comments";
    pub const USE_GUEST_URLS: &str = "use_guest_urls";
    pub const STATUS_CONTEXT: &str = "status_context";

    pub const ALL: &[&str] = &[
        SERVER_URL,
        AUTH_TYPE,
        USERNAME,
        PASSWORD,
        ACCESS_TOKEN,
        REPORT_ON,
        USE_COMMENTS,
        USE_GUEST_URLS,
        STATUS_CONTEXT,
    ];
}

/// Prefix for parameters supplied through the environment.
pub const ENV_PREFIX: &str = "BUILDSTATUS_";

/// Status context used when none is configured.
pub const DEFAULT_STATUS_CONTEXT: &str = "continuous-integration/buildstatus";

/// Authentication flow selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Password,
    Token,
}

impl AuthType {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "password" => Ok(AuthType::Password),
            "token" => Ok(AuthType::Token),
            other => Err(ConfigError::UnknownAuthType(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthType::Password => "password",
            AuthType::Token => "token",
        }
    }
}

/// Credentials for one of the two authentication flows.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Password { username: String, password: String },
    Token { token: String },
}

impl AuthConfig {
    pub fn auth_type(&self) -> AuthType {
        match self {
            AuthConfig::Password { .. } => AuthType::Password,
            AuthConfig::Token { .. } => AuthType::Token,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthConfig::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Which lifecycle events get reported.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportOn {
    Start,
    Finish,
    #[default]
    StartAndFinish,
}

impl ReportOn {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "start" => Ok(ReportOn::Start),
            "finish" => Ok(ReportOn::Finish),
            "start_and_finish" => Ok(ReportOn::StartAndFinish),
            _ => Err(ConfigError::UnknownReportOn(value.to_string())),
        }
    }
}

/// Reporting switches derived from the configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportingPolicy {
    pub report_on_start: bool,
    pub report_on_finish: bool,
    pub post_comments: bool,
    pub use_guest_links: bool,
}

impl ReportingPolicy {
    pub fn new(report_on: ReportOn, post_comments: bool, use_guest_links: bool) -> Self {
        Self {
            report_on_start: matches!(report_on, ReportOn::Start | ReportOn::StartAndFinish),
            report_on_finish: matches!(report_on, ReportOn::Finish | ReportOn::StartAndFinish),
            post_comments,
            use_guest_links,
        }
    }

    /// Whether an event of the given kind should be reported at all.
    pub fn allows(&self, is_starting: bool) -> bool {
        if is_starting {
            self.report_on_start
        } else {
            self.report_on_finish
        }
    }
}

/// Validated publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Base URL of the remote API.
    pub server_url: String,
    pub auth: AuthConfig,
    pub report_on: ReportOn,
    pub use_comments: bool,
    pub use_guest_urls: bool,
    pub status_context: String,
}

impl PublisherConfig {
    /// Validate a flat parameter map.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        if let Some(unknown) = params.keys().find(|k| !keys::ALL.contains(&k.as_str())) {
            return Err(ConfigError::UnknownKey(unknown.clone()));
        }

        let server_url = non_blank(params, keys::SERVER_URL)
            .ok_or(ConfigError::MissingServerUrl)?
            .trim()
            .to_string();
        Url::parse(&server_url).map_err(|e| ConfigError::InvalidServerUrl(e.to_string()))?;

        let auth_type = non_blank(params, keys::AUTH_TYPE)
            .ok_or(ConfigError::MissingAuthType)
            .and_then(AuthType::parse)?;

        let auth = match auth_type {
            AuthType::Password => AuthConfig::Password {
                username: required(params, auth_type, keys::USERNAME)?,
                password: required(params, auth_type, keys::PASSWORD)?,
            },
            AuthType::Token => AuthConfig::Token {
                token: required(params, auth_type, keys::ACCESS_TOKEN)?,
            },
        };

        let report_on = match non_blank(params, keys::REPORT_ON) {
            Some(value) => ReportOn::parse(value)?,
            None => ReportOn::default(),
        };

        let status_context = non_blank(params, keys::STATUS_CONTEXT)
            .unwrap_or(DEFAULT_STATUS_CONTEXT)
            .trim()
            .to_string();

        Ok(Self {
            server_url,
            auth,
            report_on,
            use_comments: flag(params, keys::USE_COMMENTS),
            use_guest_urls: flag(params, keys::USE_GUEST_URLS),
            status_context,
        })
    }

    pub fn policy(&self) -> ReportingPolicy {
        ReportingPolicy::new(self.report_on, self.use_comments, self.use_guest_urls)
    }
}

fn non_blank<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn required(
    params: &HashMap<String, String>,
    auth: AuthType,
    key: &'static str,
) -> Result<String, ConfigError> {
    non_blank(params, key)
        .map(str::to_string)
        .ok_or(ConfigError::MissingCredential {
            auth: auth.name(),
            key,
        })
}

/// Non-blank enables a flag, except for an explicit false/0/no.
fn flag(params: &HashMap<String, String>, key: &str) -> bool {
    match non_blank(params, key) {
        Some(value) => !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "false" | "0" | "no"
        ),
        None => false,
    }
}

/// Collect `BUILDSTATUS_<KEY>` environment variables into a parameter map.
pub fn params_from_env() -> HashMap<String, String> {
    params_from_vars(std::env::vars())
}

pub(crate) fn params_from_vars(
    vars: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(name, value)| {
            let key = name.strip_prefix(ENV_PREFIX)?.to_ascii_lowercase();
            keys::ALL.contains(&key.as_str()).then_some((key, value))
        })
        .collect()
}

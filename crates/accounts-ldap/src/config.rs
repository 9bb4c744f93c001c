//! Configuration types for the directory session.

use crate::{dn::Dn, layout::DirectoryLayout, Result};
use accounts_core::{BindCredentials, Error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Configuration for connecting to the account directory.
///
/// Deserializable from JSON; the password is accepted on input but never written back out.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Directory URL (`ldap://` or `ldaps://`)
    #[validate(url)]
    pub url: String,

    /// Account the session binds as (`Manager` or a user's `uid`)
    #[validate(length(min = 1))]
    pub username: String,

    /// Bind password
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Organizational root of the tree
    #[serde(default = "default_base_dn")]
    pub base_dn: String,

    /// Component of the users branch below the root
    #[serde(default = "default_users_rdn")]
    pub users_rdn: String,

    /// Component of the groups branch below the root
    #[serde(default = "default_groups_rdn")]
    pub groups_rdn: String,

    /// Domain used for placeholder e-mail addresses of new users
    #[validate(length(min = 1))]
    #[serde(default = "default_mail_domain")]
    pub mail_domain: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a custom CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_base_dn() -> String {
    "o=sr".to_string()
}

fn default_users_rdn() -> String {
    "ou=users".to_string()
}

fn default_groups_rdn() -> String {
    "ou=groups".to_string()
}

fn default_mail_domain() -> String {
    "localhost".to_string()
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl DirectoryConfig {
    /// Creates a configuration with default layout and timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            url: url.into(),
            username: username.into(),
            password: Some(password.into()),
            base_dn: default_base_dn(),
            users_rdn: default_users_rdn(),
            groups_rdn: default_groups_rdn(),
            mail_domain: default_mail_domain(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };

        config.validated()
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] on malformed JSON and [`Error::ValidationError`] when a
    /// field is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read, plus the errors of
    /// [`DirectoryConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read directory config {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Url::parse(&self.url)?;
        Ok(self)
    }

    /// Returns the bind credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if no password was configured.
    pub fn credentials(&self) -> Result<BindCredentials> {
        let password = self.password.as_deref().ok_or_else(|| {
            Error::ConfigError(format!("no password configured for `{}`", self.username))
        })?;
        Ok(BindCredentials::new(self.username.clone(), password))
    }

    /// Builds the subtree layout from the configured root and branches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a configured name does not parse.
    pub fn layout(&self) -> Result<DirectoryLayout> {
        let parse = |value: &str| {
            Dn::parse(value).map_err(|err| Error::ConfigError(format!("`{value}`: {err}")))
        };
        let root = parse(&self.base_dn)?;
        let users = parse(&format!("{},{}", self.users_rdn, self.base_dn))?;
        let groups = parse(&format!("{},{}", self.groups_rdn, self.base_dn))?;
        Ok(DirectoryLayout::new(root, users, groups).with_mail_domain(self.mail_domain.clone()))
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the organizational root.
    #[must_use]
    pub fn with_base_dn(mut self, base_dn: impl Into<String>) -> Self {
        self.base_dn = base_dn.into();
        self
    }

    /// Overrides the mail domain for new users.
    #[must_use]
    pub fn with_mail_domain(mut self, domain: impl Into<String>) -> Self {
        self.mail_domain = domain.into();
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}

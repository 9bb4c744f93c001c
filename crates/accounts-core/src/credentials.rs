//! Credentials used to authenticate the directory session.
//!
//! The session binds with a short account name rather than a full DN; the
//! directory crate decides which branch the name resolves to.

use secrecy::{ExposeSecret, SecretString};

/// Account name that binds outside the users branch.
pub const MANAGER_ACCOUNT: &str = "Manager";

/// Directory bind credentials.
///
/// The password is held in a [`SecretString`] so it is redacted from `Debug` output and
/// zeroized on drop.
#[derive(Debug)]
pub struct BindCredentials {
    username: String,
    password: SecretString,
}

impl BindCredentials {
    /// Create new bind credentials.
    ///
    /// # Arguments
    ///
    /// * `username` - Short account name (`Manager` or a user's `uid`)
    /// * `password` - The account password
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Get the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the bind password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns true when binding as the directory manager account.
    #[must_use]
    pub fn is_manager(&self) -> bool {
        self.username == MANAGER_ACCOUNT
    }
}

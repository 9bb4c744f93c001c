//! LDAP-backed directory session.

use crate::{
    config::DirectoryConfig,
    directory::{
        Directory, DirectoryModification, LdapEntry, LocalIdentities, SearchScope,
        SystemIdentities,
    },
    dn::Dn,
    entity::AttributeMap,
    filter::Filter,
    layout::DirectoryLayout,
    Result,
};
use accounts_core::{BindCredentials, Error};
use async_trait::async_trait;
use ldap3::{exop::PasswordModify, LdapConnAsync, LdapConnSettings, Mod, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// LDAP result codes the session distinguishes.
const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_UNWILLING_TO_PERFORM: u32 = 53;
const RC_ALREADY_EXISTS: u32 = 68;

/// Authentication state of the shared connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No bound connection; the next operation binds with the configured credentials.
    Unauthenticated,
    /// Bound as the given identity.
    Authenticated(Dn),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>>;
    async fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()>;
    async fn modify(&mut self, dn: &str, modifications: &[DirectoryModification]) -> Result<()>;
    async fn delete(&mut self, dn: &str) -> Result<()>;
    async fn password_modify(&mut self, dn: &str, old: &str, new: &str) -> Result<()>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory session with a lazily established, explicitly tracked bind.
pub struct DirectorySession {
    layout: DirectoryLayout,
    credentials: BindCredentials,
    connector: Box<dyn LdapConnector>,
    connection: Option<Box<dyn LdapSession>>,
    state: AuthState,
    identities: Box<dyn LocalIdentities>,
}

impl DirectorySession {
    /// Creates a session that uses the real LDAP connector. No connection is opened until the
    /// first operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the password is missing or the layout does not parse.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let layout = config.layout()?;
        let credentials = config.credentials()?;
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(Arc::new(config)));
        Ok(Self::with_parts(layout, credentials, connector))
    }

    fn with_parts(
        layout: DirectoryLayout,
        credentials: BindCredentials,
        connector: Box<dyn LdapConnector>,
    ) -> Self {
        Self {
            layout,
            credentials,
            connector,
            connection: None,
            state: AuthState::Unauthenticated,
            identities: Box::new(SystemIdentities),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(config: &DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        let layout = config.layout().unwrap();
        let credentials = config.credentials().unwrap();
        Self::with_parts(layout, credentials, connector)
    }

    /// Replaces the local identity database used by the group id allocator.
    #[must_use]
    pub fn with_local_identities(mut self, identities: Box<dyn LocalIdentities>) -> Self {
        self.identities = identities;
        self
    }

    /// Current authentication state.
    #[must_use]
    pub const fn auth_state(&self) -> &AuthState {
        &self.state
    }

    /// Unbinds and drops the connection. The next operation binds again.
    ///
    /// # Errors
    ///
    /// Returns the directory error if the unbind request fails; the session is reset either way.
    pub async fn release(&mut self) -> Result<()> {
        self.state = AuthState::Unauthenticated;
        match self.connection.take() {
            Some(mut connection) => connection.unbind().await,
            None => Ok(()),
        }
    }

    async fn bound(&mut self) -> Result<&mut Box<dyn LdapSession>> {
        if self.connection.is_none() || self.state == AuthState::Unauthenticated {
            let dn = self.layout.bind_dn(&self.credentials);
            let mut connection = self.connector.connect().await?;
            connection
                .simple_bind(dn.as_str(), self.credentials.password())
                .await?;
            info!(identity = %dn, "bound to directory");
            self.connection = Some(connection);
            self.state = AuthState::Authenticated(dn);
        }

        self.connection
            .as_mut()
            .ok_or_else(|| Error::InternalError("directory connection missing after bind".to_string()))
    }
}

#[async_trait]
impl Directory for DirectorySession {
    fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    async fn search(
        &mut self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let rendered = filter.to_string();
        debug!(base = %base, filter = %rendered, "directory search");
        self.bound()
            .await?
            .search(base.as_str(), scope, &rendered, attributes)
            .await
    }

    async fn add(&mut self, dn: &Dn, attributes: &AttributeMap) -> Result<()> {
        debug!(dn = %dn, attributes = ?attributes.keys().collect::<Vec<_>>(), "directory add");
        self.bound().await?.add(dn.as_str(), attributes).await
    }

    async fn modify(&mut self, dn: &Dn, modifications: &[DirectoryModification]) -> Result<()> {
        debug!(dn = %dn, count = modifications.len(), "directory modify");
        self.bound().await?.modify(dn.as_str(), modifications).await
    }

    async fn delete(&mut self, dn: &Dn) -> Result<()> {
        debug!(dn = %dn, "directory delete");
        self.bound().await?.delete(dn.as_str()).await
    }

    async fn change_password(&mut self, dn: &Dn, old: &str, new: &str) -> Result<()> {
        self.bound()
            .await?
            .password_modify(dn.as_str(), old, new)
            .await
    }

    async fn bind_as(&mut self, dn: &Dn, password: &str) -> Result<bool> {
        // An empty password is an unauthenticated bind, which servers may accept.
        if password.is_empty() {
            debug!(identity = %dn, "empty password refused");
            return Ok(false);
        }
        self.release().await?;

        let mut connection = self.connector.connect().await?;
        let verified = match connection.simple_bind(dn.as_str(), password).await {
            Ok(()) => true,
            Err(Error::InvalidCredential(reason)) => {
                debug!(identity = %dn, %reason, "credential rejected");
                false
            }
            Err(err) => return Err(err),
        };
        connection.unbind().await?;
        Ok(verified)
    }

    fn local_group_exists(&self, gid: u32) -> bool {
        self.identities.group_exists(gid)
    }
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

async fn timed<F, T>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = ldap3::result::Result<T>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(format!("directory {operation} timed out")))?
        .map_err(map_ldap_error)
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = timed(
            self.operation_timeout,
            "bind",
            self.inner.simple_bind(dn, password),
        )
        .await?;
        check_result(&result, "bind")
    }

    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let ldap3::SearchResult(entries, result) = timed(
            self.operation_timeout,
            "search",
            self.inner
                .search(base_dn, scope.into(), filter, attributes.to_vec()),
        )
        .await?;
        check_result(&result, "search")?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs.into_iter().collect(),
            })
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| {
                (
                    name.as_str(),
                    values.iter().map(String::as_str).collect::<HashSet<_>>(),
                )
            })
            .collect::<Vec<_>>();
        let result = timed(self.operation_timeout, "add", self.inner.add(dn, attrs)).await?;
        check_result(&result, "add")
    }

    async fn modify(&mut self, dn: &str, modifications: &[DirectoryModification]) -> Result<()> {
        let mods = modifications
            .iter()
            .map(|m| match m {
                DirectoryModification::Replace { attribute, values } => Mod::Replace(
                    attribute.as_str(),
                    values.iter().map(String::as_str).collect::<HashSet<_>>(),
                ),
            })
            .collect::<Vec<_>>();
        let result = timed(self.operation_timeout, "modify", self.inner.modify(dn, mods)).await?;
        check_result(&result, "modify")
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let result = timed(self.operation_timeout, "delete", self.inner.delete(dn)).await?;
        check_result(&result, "delete")
    }

    async fn password_modify(&mut self, dn: &str, old: &str, new: &str) -> Result<()> {
        let exop = PasswordModify {
            user_id: Some(dn),
            old_pass: Some(old),
            new_pass: Some(new),
        };
        let ldap3::result::ExopResult(_, result) = timed(
            self.operation_timeout,
            "password change",
            self.inner.extended(exop),
        )
        .await?;
        check_result(&result, "password change")
    }

    async fn unbind(&mut self) -> Result<()> {
        timed(self.operation_timeout, "unbind", self.inner.unbind()).await
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify {
        warn!("TLS verification disabled for directory connection");
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to construct TLS connector: {err}")))?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = &config.tls_ca_cert {
        debug!("loading directory CA certificate from {}", cert_path.display());
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read directory CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid directory CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load directory CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    match err {
        ldap3::LdapError::LdapResult { result } => {
            check_result(&result, "operation").err().unwrap_or_else(|| {
                Error::StoreUnavailable(format!("unexpected success result: {}", result.text))
            })
        }
        other => Error::StoreUnavailable(other.to_string()),
    }
}

/// Maps an LDAP result code onto the error kinds callers distinguish.
fn check_result(result: &ldap3::LdapResult, operation: &str) -> Result<()> {
    let detail = || {
        if result.text.is_empty() {
            format!("{operation} failed with code {}", result.rc)
        } else {
            format!("{operation} failed with code {}: {}", result.rc, result.text)
        }
    };

    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_NO_SUCH_OBJECT => Err(Error::NotFound(detail())),
        RC_INVALID_CREDENTIALS | RC_UNWILLING_TO_PERFORM => Err(Error::InvalidCredential(detail())),
        RC_ALREADY_EXISTS => Err(Error::AlreadyExists(detail())),
        _ => Err(Error::StoreUnavailable(detail())),
    }
}

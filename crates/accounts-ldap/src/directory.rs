//! The directory contract consumed by the entity layer.
//!
//! [`Directory`] is the seam between account records and the store. Production code uses
//! [`DirectorySession`](crate::DirectorySession); tests substitute a mock or an in-memory
//! implementation.

use async_trait::async_trait;

use crate::{dn::Dn, entity::AttributeMap, filter::Filter, layout::DirectoryLayout, Result};

/// Represents the search scope for directory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

/// Entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values in server order).
    pub attributes: AttributeMap,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute (attribute names compare case-insensitively).
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
    }
}

/// Modification applied to an existing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryModification {
    /// Replace every value of the attribute (an empty list removes it).
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

/// Operations the entity layer needs from the directory.
///
/// Every method takes `&mut self`: one logical operation at a time per session, including the
/// rebinding done by [`Directory::bind_as`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send {
    /// Subtree layout entries are created in.
    fn layout(&self) -> &DirectoryLayout;

    /// Searches below `base`. An empty attribute list returns every user attribute.
    async fn search(
        &mut self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>>;

    /// Creates an entry with the given attributes.
    async fn add(&mut self, dn: &Dn, attributes: &AttributeMap) -> Result<()>;

    /// Applies modifications to an existing entry.
    async fn modify(&mut self, dn: &Dn, modifications: &[DirectoryModification]) -> Result<()>;

    /// Deletes an entry.
    async fn delete(&mut self, dn: &Dn) -> Result<()>;

    /// Password-modify operation; the store verifies `old` itself.
    async fn change_password(&mut self, dn: &Dn, old: &str, new: &str) -> Result<()>;

    /// Verifies a credential by binding as `dn`. Returns `Ok(false)` when the directory rejects
    /// the credential.
    async fn bind_as(&mut self, dn: &Dn, password: &str) -> Result<bool>;

    /// Whether `gid` is taken in the host's local group database.
    fn local_group_exists(&self, gid: u32) -> bool;
}

/// Lookup against identities defined on the host rather than in the directory.
pub trait LocalIdentities: Send + Sync {
    /// Returns true if a local group with this gid exists.
    fn group_exists(&self, gid: u32) -> bool;
}

/// Host group database (`/etc/group` and NSS).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentities;

impl LocalIdentities for SystemIdentities {
    fn group_exists(&self, gid: u32) -> bool {
        users::get_group_by_gid(gid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_attribute_lookup_ignores_case() {
        let mut attributes = AttributeMap::new();
        attributes.insert("uidNumber".to_string(), vec!["2001".to_string()]);
        let entry = LdapEntry {
            dn: "uid=jdoe,ou=users,o=sr".to_string(),
            attributes,
        };

        assert_eq!(entry.first("uidnumber"), Some("2001"));
        assert_eq!(entry.values("UIDNUMBER").map(<[String]>::len), Some(1));
        assert!(entry.first("mail").is_none());
    }

    #[test]
    fn root_group_is_known_locally() {
        assert!(SystemIdentities.group_exists(0));
    }
}

//! Fixed subtree layout of the account directory.

use accounts_core::BindCredentials;

use crate::dn::Dn;

/// Where users and groups live in the tree.
///
/// Users are immediate children of the users branch (`uid=<name>`), groups immediate children
/// of the groups branch (`cn=<name>`), both under one organizational root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    root: Dn,
    users: Dn,
    groups: Dn,
    mail_domain: String,
}

impl DirectoryLayout {
    /// Creates a layout from explicit branch names.
    #[must_use]
    pub fn new(root: Dn, users: Dn, groups: Dn) -> Self {
        Self {
            root,
            users,
            groups,
            mail_domain: "localhost".to_string(),
        }
    }

    /// Overrides the domain used for placeholder e-mail addresses.
    #[must_use]
    pub fn with_mail_domain(mut self, domain: impl Into<String>) -> Self {
        self.mail_domain = domain.into();
        self
    }

    /// Organizational root.
    #[must_use]
    pub const fn root(&self) -> &Dn {
        &self.root
    }

    /// Users branch.
    #[must_use]
    pub const fn users(&self) -> &Dn {
        &self.users
    }

    /// Groups branch.
    #[must_use]
    pub const fn groups(&self) -> &Dn {
        &self.groups
    }

    /// Mail domain for new users.
    #[must_use]
    pub fn mail_domain(&self) -> &str {
        &self.mail_domain
    }

    /// DN of the user entry named `username`.
    #[must_use]
    pub fn user_dn(&self, username: &str) -> Dn {
        self.users.child("uid", username)
    }

    /// DN of the group entry named `name`.
    #[must_use]
    pub fn group_dn(&self, name: &str) -> Dn {
        self.groups.child("cn", name)
    }

    /// Extracts the username from a user DN (the value of its leading `uid` component).
    #[must_use]
    pub fn username_from_dn(&self, value: &str) -> Option<String> {
        let dn = Dn::parse(value).ok()?;
        dn.first()
            .filter(|rdn| rdn.attribute().eq_ignore_ascii_case("uid"))
            .map(|rdn| rdn.value().to_string())
    }

    /// DN the session binds as. The manager account sits directly under the root.
    #[must_use]
    pub fn bind_dn(&self, credentials: &BindCredentials) -> Dn {
        if credentials.is_manager() {
            self.root.child("cn", credentials.username())
        } else {
            self.user_dn(credentials.username())
        }
    }
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        let root = Dn::new("o", "sr");
        let users = root.child("ou", "users");
        let groups = root.child("ou", "groups");
        Self::new(root, users, groups)
    }
}

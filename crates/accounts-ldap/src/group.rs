//! POSIX groups stored under the groups branch.

use std::fmt;

use accounts_core::Error;
use tracing::{debug, info, warn};

use crate::{
    allocator,
    directory::{Directory, SearchScope},
    dn::Dn,
    entity::{AttributeMap, EntityRecord},
    filter::{Filter, MatchCase},
    layout::DirectoryLayout,
    user::User,
    Result,
};

/// Object class of every group entry.
pub const GROUP_OBJECT_CLASS: &str = "posixGroup";

/// Group whose `memberUid` values are full user DNs rather than bare usernames.
pub const FULL_DN_GROUP: &str = "shell-users";

/// How a group writes its `memberUid` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEncoding {
    /// `memberUid: jdoe`
    BareUsername,
    /// `memberUid: uid=jdoe,ou=users,o=sr`
    FullDistinguishedName,
}

impl MemberEncoding {
    /// Encoding used by the group called `name`.
    #[must_use]
    pub fn for_group(name: &str) -> Self {
        if name == FULL_DN_GROUP {
            Self::FullDistinguishedName
        } else {
            Self::BareUsername
        }
    }

    fn encode(self, layout: &DirectoryLayout, username: &str) -> String {
        match self {
            Self::BareUsername => username.to_string(),
            Self::FullDistinguishedName => layout.user_dn(username).into(),
        }
    }

    fn decode(self, layout: &DirectoryLayout, value: &str) -> String {
        match self {
            Self::BareUsername => value.to_string(),
            Self::FullDistinguishedName => layout.username_from_dn(value).unwrap_or_else(|| {
                warn!(value, "memberUid is not a user DN, keeping it verbatim");
                value.to_string()
            }),
        }
    }
}

/// A user given to a membership edit, either loaded or by name.
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    /// An already loaded account.
    User(&'a User),
    /// A username to resolve.
    Username(&'a str),
}

impl MemberRef<'_> {
    fn label(&self) -> &str {
        match self {
            Self::User(user) => user.username(),
            Self::Username(name) => name,
        }
    }
}

impl<'a> From<&'a User> for MemberRef<'a> {
    fn from(user: &'a User) -> Self {
        Self::User(user)
    }
}

impl<'a> From<&'a str> for MemberRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Username(name)
    }
}

/// A group of users.
///
/// Members are held as bare usernames; [`MemberEncoding`] is applied only when reading and
/// writing the entry.
#[derive(Debug, Clone)]
pub struct Group {
    record: EntityRecord,
    name: String,
    gid: u32,
    description: Option<String>,
    members: Vec<String>,
    pending_adds: Vec<String>,
    pending_removes: Vec<String>,
    encoding: MemberEncoding,
}

impl Group {
    /// Loads `name`, or prepares a new empty group with a fresh gid if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or gid allocation fails.
    pub async fn open(directory: &mut dyn Directory, name: &str) -> Result<Self> {
        if let Some(group) = Self::find(directory, name).await? {
            return Ok(group);
        }

        let gid = allocator::next_gid_number(directory).await?;
        let dn = directory.layout().group_dn(name);
        let description = format!("{name} group");

        let mut attributes = AttributeMap::new();
        attributes.insert("objectClass".to_string(), vec![GROUP_OBJECT_CLASS.to_string()]);
        attributes.insert("cn".to_string(), vec![name.to_string()]);

        debug!(%dn, gid, "prepared new group");
        Ok(Self {
            record: EntityRecord::new(dn, attributes),
            name: name.to_string(),
            gid,
            description: Some(description),
            members: Vec::new(),
            pending_adds: Vec::new(),
            pending_removes: Vec::new(),
            encoding: MemberEncoding::for_group(name),
        })
    }

    /// Loads `name` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails, more than one entry matches, or the entry has no
    /// usable `gidNumber`.
    pub async fn find(directory: &mut dyn Directory, name: &str) -> Result<Option<Self>> {
        let base = directory.layout().groups().clone();
        let Some(record) =
            EntityRecord::load(directory, &base, GROUP_OBJECT_CLASS, Filter::equals("cn", name))
                .await?
        else {
            return Ok(None);
        };

        let gid = record
            .first("gidNumber")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                Error::InternalError(format!("group `{}` has no valid gidNumber", record.dn()))
            })?;
        // The lookup ignores case, so the stored name decides the encoding.
        let stored_name = record.first("cn").unwrap_or(name).to_string();
        let encoding = MemberEncoding::for_group(&stored_name);
        let layout = directory.layout();
        let members = record
            .values("memberUid")
            .unwrap_or_default()
            .iter()
            .map(|value| encoding.decode(layout, value))
            .collect();

        Ok(Some(Self {
            name: stored_name,
            description: record.first("description").map(ToString::to_string),
            record,
            gid,
            members,
            pending_adds: Vec::new(),
            pending_removes: Vec::new(),
            encoding,
        }))
    }

    /// Names of every group, or only those named `name_filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list(
        directory: &mut dyn Directory,
        name_filter: Option<&str>,
    ) -> Result<Vec<String>> {
        let base = directory.layout().groups().clone();
        let filter = match name_filter {
            Some(name) => Filter::and([
                Filter::object_class(GROUP_OBJECT_CLASS),
                Filter::equals("cn", name),
            ]),
            None => Filter::object_class(GROUP_OBJECT_CLASS),
        };

        let entries = directory
            .search(&base, SearchScope::OneLevel, &filter, &["cn"])
            .await?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.first("cn").map(ToString::to_string))
            .collect())
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinguished name of the entry.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        self.record.dn()
    }

    /// Numeric group id.
    #[must_use]
    pub const fn gid(&self) -> u32 {
        self.gid
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Replaces the description; `None` removes it on save.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Member usernames in insertion order.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Members added since the last save.
    #[must_use]
    pub fn pending_adds(&self) -> &[String] {
        &self.pending_adds
    }

    /// Members removed since the last save.
    #[must_use]
    pub fn pending_removes(&self) -> &[String] {
        &self.pending_removes
    }

    /// How members are written to the entry.
    #[must_use]
    pub const fn encoding(&self) -> MemberEncoding {
        self.encoding
    }

    /// True once the group is in the directory.
    #[must_use]
    pub fn exists_in_directory(&self) -> bool {
        self.record.exists()
    }

    /// Adds users that exist in the directory; returns the inputs that do not.
    ///
    /// Usernames are looked up case-insensitively and stored in their canonical form. Adding a
    /// current member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup fails.
    pub async fn add_members<'a>(
        &mut self,
        directory: &mut dyn Directory,
        users: impl IntoIterator<Item = MemberRef<'a>>,
    ) -> Result<Vec<String>> {
        let mut failed = Vec::new();

        for member in users {
            let username = match member {
                MemberRef::User(user) if user.exists_in_directory() => {
                    Some(user.username().to_string())
                }
                MemberRef::User(_) => None,
                MemberRef::Username(name) => User::find(directory, name, MatchCase::Insensitive)
                    .await?
                    .map(|user| user.username().to_string()),
            };

            match username {
                None => failed.push(member.label().to_string()),
                Some(username) if !self.members.contains(&username) => {
                    self.members.push(username.clone());
                    self.pending_adds.push(username);
                }
                Some(_) => {}
            }
        }

        Ok(failed)
    }

    /// Removes the given users; returns the inputs that were not members.
    ///
    /// Inputs are de-duplicated and never looked up in the directory.
    pub fn remove_members<'a>(
        &mut self,
        users: impl IntoIterator<Item = MemberRef<'a>>,
    ) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        let mut not_members = Vec::new();

        for member in users {
            let username = member.label().to_string();
            if seen.contains(&username) {
                continue;
            }
            seen.push(username.clone());

            if let Some(position) = self.members.iter().position(|name| *name == username) {
                self.members.remove(position);
                self.pending_removes.push(username);
            } else {
                not_members.push(username);
            }
        }

        not_members
    }

    /// Writes the group's full membership, description and gid.
    ///
    /// # Errors
    ///
    /// Returns the directory error if the write fails; pending changes are kept for a retry.
    pub async fn save(&mut self, directory: &mut dyn Directory) -> Result<()> {
        let layout = directory.layout();
        let encoded = self
            .members
            .iter()
            .map(|username| self.encoding.encode(layout, username))
            .collect();

        self.record.set("memberUid", encoded);
        self.record
            .set("description", self.description.iter().cloned().collect());
        self.record.set("gidNumber", vec![self.gid.to_string()]);

        let created = !self.record.exists();
        self.record.save(directory).await?;

        if created {
            info!(group = %self.name, gid = self.gid, "created group");
        } else {
            debug!(
                group = %self.name,
                added = ?self.pending_adds,
                removed = ?self.pending_removes,
                "saved group membership"
            );
        }
        self.pending_adds.clear();
        self.pending_removes.clear();
        Ok(())
    }

    /// Removes the group from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the group was never saved.
    pub async fn delete(&mut self, directory: &mut dyn Directory) -> Result<()> {
        self.record.delete(directory).await?;
        info!(group = %self.name, "deleted group");
        Ok(())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group: {}", self.name)?;
        writeln!(f, "gid: {}", self.gid)?;
        write!(f, "{} members: {}", self.members.len(), self.members.join(", "))
    }
}

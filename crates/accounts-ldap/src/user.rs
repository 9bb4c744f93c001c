//! Person accounts stored under the users branch.

use std::{fmt, str::FromStr};

use accounts_core::Error;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::{
    allocator,
    directory::{Directory, DirectoryModification, SearchScope},
    dn::Dn,
    entity::{AttributeMap, EntityRecord},
    filter::{Filter, MatchCase},
    group::{Group, MemberRef},
    password::{generate_password, hash_password},
    Result,
};

/// Object class every user entry carries and is searched by.
pub const USER_OBJECT_CLASS: &str = "inetOrgPerson";

/// Object classes written on a new user entry.
pub const USER_OBJECT_CLASSES: [&str; 3] = [USER_OBJECT_CLASS, "uidObject", "posixAccount"];

/// Primary group of every new user.
pub const DEFAULT_GID_NUMBER: u32 = 1999;

/// Login shell of every new user.
pub const DEFAULT_LOGIN_SHELL: &str = "/bin/bash";

/// Prefix of the pseudo-groups that record a user's language.
pub const LANGUAGE_GROUP_PREFIX: &str = "lang-";

/// Attributes a user entry must carry before it can be saved.
pub const REQUIRED_ATTRIBUTES: [&str; 8] = [
    "cn",
    "sn",
    "uid",
    "uidNumber",
    "mail",
    "homeDirectory",
    "objectClass",
    "gidNumber",
];

/// Logical user field and the directory attribute behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    /// Full name (`cn`).
    CommonName,
    /// Surname (`sn`).
    Surname,
    /// Login name (`uid`).
    Username,
    /// Numeric user id (`uidNumber`).
    Id,
    /// E-mail address (`mail`).
    Email,
    /// Home directory (`homeDirectory`).
    Home,
    /// Login shell (`loginShell`).
    LoginShell,
}

impl UserField {
    /// Every mapped field.
    pub const ALL: [Self; 7] = [
        Self::CommonName,
        Self::Surname,
        Self::Username,
        Self::Id,
        Self::Email,
        Self::Home,
        Self::LoginShell,
    ];

    /// Logical name callers use.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CommonName => "cname",
            Self::Surname => "sname",
            Self::Username => "username",
            Self::Id => "id",
            Self::Email => "email",
            Self::Home => "home",
            Self::LoginShell => "loginShell",
        }
    }

    /// Backing directory attribute.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::CommonName => "cn",
            Self::Surname => "sn",
            Self::Username => "uid",
            Self::Id => "uidNumber",
            Self::Email => "mail",
            Self::Home => "homeDirectory",
            Self::LoginShell => "loginShell",
        }
    }
}

impl FromStr for UserField {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| Error::UnknownAttribute(s.to_string()))
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user account.
///
/// Opening a user that is not in the directory yields a new, unsaved account with an allocated
/// uid number and a random initial password. Changes are held in memory until [`User::save`].
#[derive(Debug)]
pub struct User {
    record: EntityRecord,
    initial_password: Option<SecretString>,
}

impl User {
    /// Loads `username`, or prepares a new account if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or uid allocation fails, or if more than one entry matches.
    pub async fn open(
        directory: &mut dyn Directory,
        username: &str,
        case: MatchCase,
    ) -> Result<Self> {
        if let Some(user) = Self::find(directory, username, case).await? {
            return Ok(user);
        }

        let uid_number = allocator::next_uid_number(directory).await?;
        let password = generate_password();
        let layout = directory.layout();
        let dn = layout.user_dn(username);
        let mail = format!("{username}@{}", layout.mail_domain());

        let mut attributes = AttributeMap::new();
        attributes.insert("uid".to_string(), vec![username.to_string()]);
        attributes.insert(
            "objectClass".to_string(),
            USER_OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
        );
        attributes.insert("uidNumber".to_string(), vec![uid_number.to_string()]);
        attributes.insert("gidNumber".to_string(), vec![DEFAULT_GID_NUMBER.to_string()]);
        attributes.insert("homeDirectory".to_string(), vec![format!("/home/{username}")]);
        attributes.insert("userPassword".to_string(), vec![hash_password(&password)]);
        attributes.insert("loginShell".to_string(), vec![DEFAULT_LOGIN_SHELL.to_string()]);
        attributes.insert("cn".to_string(), vec![username.to_string()]);
        attributes.insert("sn".to_string(), vec![username.to_string()]);
        attributes.insert("mail".to_string(), vec![mail]);

        debug!(%dn, uid_number, "prepared new user");
        Ok(Self {
            record: EntityRecord::new(dn, attributes),
            initial_password: Some(SecretString::from(password)),
        })
    }

    /// Loads `username` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails or more than one entry matches.
    pub async fn find(
        directory: &mut dyn Directory,
        username: &str,
        case: MatchCase,
    ) -> Result<Option<Self>> {
        let base = directory.layout().users().clone();
        let record = EntityRecord::load(
            directory,
            &base,
            USER_OBJECT_CLASS,
            Filter::matches("uid", case, username),
        )
        .await?;

        Ok(record.map(|record| Self {
            record,
            initial_password: None,
        }))
    }

    /// Returns true if exactly one user matches `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn exists(
        directory: &mut dyn Directory,
        username: &str,
        case: MatchCase,
    ) -> Result<bool> {
        let base = directory.layout().users().clone();
        let filter = Filter::and([
            Filter::object_class(USER_OBJECT_CLASS),
            Filter::matches("uid", case, username),
        ]);
        let entries = directory
            .search(&base, SearchScope::OneLevel, &filter, &["uid"])
            .await?;
        Ok(entries.len() == 1)
    }

    /// Usernames of every account.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list(directory: &mut dyn Directory) -> Result<Vec<String>> {
        usernames(directory, Filter::object_class(USER_OBJECT_CLASS)).await
    }

    /// Usernames of accounts whose fields equal every given criterion.
    ///
    /// No criteria yields no results and no directory traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(
        directory: &mut dyn Directory,
        criteria: &[(UserField, &str)],
    ) -> Result<Vec<String>> {
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::and(
            std::iter::once(Filter::object_class(USER_OBJECT_CLASS)).chain(
                criteria
                    .iter()
                    .map(|(field, value)| Filter::equals(field.attribute(), *value)),
            ),
        );
        usernames(directory, filter).await
    }

    /// Distinguished name of the entry.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        self.record.dn()
    }

    /// True once the account is in the directory.
    #[must_use]
    pub fn exists_in_directory(&self) -> bool {
        self.record.exists()
    }

    /// Login name, falling back to the DN when `uid` has been cleared.
    #[must_use]
    pub fn username(&self) -> &str {
        self.record
            .first("uid")
            .or_else(|| self.record.dn().get("uid"))
            .unwrap_or_default()
    }

    /// Numeric user id.
    #[must_use]
    pub fn uid_number(&self) -> Option<u32> {
        self.get(UserField::Id).and_then(|value| value.parse().ok())
    }

    /// E-mail address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get(UserField::Email)
    }

    /// Plaintext initial password; only present on an account created by this handle.
    #[must_use]
    pub fn initial_password(&self) -> Option<&SecretString> {
        self.initial_password.as_ref()
    }

    /// Attributes changed since the last save.
    pub fn dirty_attributes(&self) -> impl Iterator<Item = &str> + '_ {
        self.record.dirty_attributes()
    }

    /// First value of a logical field.
    #[must_use]
    pub fn get(&self, field: UserField) -> Option<&str> {
        self.record.first(field.attribute())
    }

    /// First value of a field given by logical name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for names outside the field table.
    pub fn get_by_name(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.get(name.parse()?))
    }

    /// Sets a logical field.
    pub fn set(&mut self, field: UserField, value: impl Into<String>) {
        self.record.set(field.attribute(), vec![value.into()]);
    }

    /// Sets a field given by logical name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for names outside the field table.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.set(name.parse()?, value);
        Ok(())
    }

    /// Clears a logical field; the attribute is removed from the entry on save.
    pub fn clear(&mut self, field: UserField) {
        self.record.set(field.attribute(), Vec::new());
    }

    /// Required attributes with no value, in declaration order.
    #[must_use]
    pub fn missing_attributes(&self) -> Vec<String> {
        REQUIRED_ATTRIBUTES
            .iter()
            .filter(|attribute| !self.record.has_value(attribute))
            .map(ToString::to_string)
            .collect()
    }

    /// Writes the account: a full insert when new, changed attributes otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRequiredAttribute`] without touching the directory if a required
    /// attribute is empty, or the directory error if the write fails.
    pub async fn save(&mut self, directory: &mut dyn Directory) -> Result<()> {
        let missing = self.missing_attributes();
        if !missing.is_empty() {
            return Err(Error::MissingRequiredAttribute {
                entry: self.username().to_string(),
                missing,
            });
        }

        let created = !self.record.exists();
        self.record.save(directory).await?;
        if created {
            info!(username = %self.username(), uid_number = ?self.uid_number(), "created user");
        }
        Ok(())
    }

    /// Removes the account from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the account was never saved.
    pub async fn delete(&mut self, directory: &mut dyn Directory) -> Result<()> {
        self.record.delete(directory).await?;
        info!(username = %self.username(), "deleted user");
        Ok(())
    }

    /// Names of the groups listing this user, by username or by full DN.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn groups(&self, directory: &mut dyn Directory) -> Result<Vec<String>> {
        let base = directory.layout().groups().clone();
        let filter = Filter::and([
            Filter::object_class(crate::group::GROUP_OBJECT_CLASS),
            Filter::or([
                Filter::equals("memberUid", self.username()),
                Filter::equals("memberUid", self.dn().as_str()),
            ]),
        ]);

        let entries = directory
            .search(&base, SearchScope::OneLevel, &filter, &["cn"])
            .await?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.first("cn").map(ToString::to_string))
            .collect())
    }

    /// Checks `password` by binding as this account.
    ///
    /// The session drops its own authentication first and re-binds on its next operation.
    /// Rejected credentials, empty passwords and unsaved accounts yield `false` without a bind.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    pub async fn bind_as(&self, directory: &mut dyn Directory, password: &str) -> Result<bool> {
        if !self.record.exists() || password.is_empty() {
            return Ok(false);
        }
        directory.bind_as(self.dn(), password).await
    }

    /// Changes the password. Without `old`, the hash is replaced directly (requires a privileged
    /// session); with `old`, the directory's password-modify operation verifies it.
    ///
    /// Returns `false` for an unsaved account.
    ///
    /// # Errors
    ///
    /// Returns the directory error if the change is rejected.
    pub async fn set_password(
        &mut self,
        directory: &mut dyn Directory,
        old: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        if !self.record.exists() {
            return Ok(false);
        }

        match old {
            None => {
                let hashed = vec![hash_password(new)];
                directory
                    .modify(
                        self.dn(),
                        &[DirectoryModification::Replace {
                            attribute: "userPassword".to_string(),
                            values: hashed.clone(),
                        }],
                    )
                    .await?;
                self.record.refresh("userPassword", hashed);
            }
            Some(old) => directory.change_password(self.dn(), old, new).await?,
        }

        info!(username = %self.username(), "changed password");
        Ok(true)
    }

    /// Language code from the user's first `lang-*` group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the account was never saved.
    pub async fn language(&self, directory: &mut dyn Directory) -> Result<Option<String>> {
        if !self.record.exists() {
            return Err(Error::NotFound(format!(
                "cannot read the language of `{}`: not in the directory",
                self.username()
            )));
        }

        Ok(self
            .groups(directory)
            .await?
            .into_iter()
            .find_map(|group| language_code(&group).map(ToString::to_string)))
    }

    /// Moves the user into `lang-<code>` and out of every other language group.
    ///
    /// The target group must already exist. If a step fails after some groups were left, the
    /// user is re-added to them before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the account or the target group does not exist, or the
    /// directory error of the failing step.
    pub async fn set_language(&self, directory: &mut dyn Directory, code: &str) -> Result<()> {
        if !self.record.exists() {
            return Err(Error::NotFound(format!(
                "cannot set the language of `{}`: not in the directory",
                self.username()
            )));
        }

        let target_name = format!("{LANGUAGE_GROUP_PREFIX}{code}");
        let mut target = Group::find(directory, &target_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("language group `{target_name}`")))?;

        let current = self
            .groups(directory)
            .await?
            .into_iter()
            .filter(|name| language_code(name).is_some() && *name != target_name)
            .collect::<Vec<_>>();

        let mut left = Vec::with_capacity(current.len());
        for name in current {
            if let Err(err) = self.leave_group(directory, &name).await {
                self.rejoin(directory, &left).await;
                return Err(err);
            }
            left.push(name);
        }

        if let Err(err) = self.join_group(directory, &mut target).await {
            self.rejoin(directory, &left).await;
            return Err(err);
        }

        info!(username = %self.username(), language = code, "changed language");
        Ok(())
    }

    async fn leave_group(&self, directory: &mut dyn Directory, name: &str) -> Result<()> {
        if let Some(mut group) = Group::find(directory, name).await? {
            group.remove_members([MemberRef::User(self)]);
            group.save(directory).await?;
        }
        Ok(())
    }

    async fn join_group(&self, directory: &mut dyn Directory, group: &mut Group) -> Result<()> {
        group.add_members(directory, [MemberRef::User(self)]).await?;
        group.save(directory).await
    }

    async fn rejoin(&self, directory: &mut dyn Directory, names: &[String]) {
        for name in names {
            let restored = match Group::find(directory, name).await {
                Ok(Some(mut group)) => self.join_group(directory, &mut group).await,
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
            match restored {
                Ok(()) => {
                    warn!(username = %self.username(), group = %name, "restored language group membership");
                }
                Err(err) if err.should_log() => {
                    error!(username = %self.username(), group = %name, code = err.error_code(), error = %err, "failed to restore language group membership");
                }
                Err(err) => {
                    warn!(username = %self.username(), group = %name, code = err.error_code(), error = %err, "failed to restore language group membership");
                }
            }
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Full name", "cn"),
            ("Surname", "sn"),
            ("Username", "uid"),
            ("ID", "uidNumber"),
            ("E-mail", "mail"),
            ("Home directory", "homeDirectory"),
        ];
        for (idx, (label, attribute)) in rows.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{label}: {}", self.record.first(attribute).unwrap_or("None"))?;
        }
        Ok(())
    }
}

fn language_code(group: &str) -> Option<&str> {
    group
        .strip_prefix(LANGUAGE_GROUP_PREFIX)
        .filter(|code| !code.is_empty())
}

async fn usernames(directory: &mut dyn Directory, filter: Filter) -> Result<Vec<String>> {
    let base = directory.layout().users().clone();
    let entries = directory
        .search(&base, SearchScope::OneLevel, &filter, &["uid"])
        .await?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry.first("uid").map(ToString::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{LdapEntry, MockDirectory};
    use crate::layout::DirectoryLayout;

    fn user_entry(username: &str, uid_number: u32) -> LdapEntry {
        let mut attributes = AttributeMap::new();
        for (name, value) in [
            ("uid", username.to_string()),
            ("cn", "Jane Doe".to_string()),
            ("sn", "Doe".to_string()),
            ("uidNumber", uid_number.to_string()),
            ("gidNumber", "1999".to_string()),
            ("mail", format!("{username}@example.com")),
            ("homeDirectory", format!("/home/{username}")),
        ] {
            attributes.insert(name.to_string(), vec![value]);
        }
        attributes.insert(
            "objectClass".to_string(),
            USER_OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
        );
        LdapEntry {
            dn: format!("uid={username},ou=users,o=sr"),
            attributes,
        }
    }

    fn mock_with_layout() -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory
            .expect_layout()
            .return_const(DirectoryLayout::default().with_mail_domain("example.com"));
        directory
    }

    #[test]
    fn field_table() {
        assert_eq!("cname".parse::<UserField>().unwrap().attribute(), "cn");
        assert_eq!("home".parse::<UserField>().unwrap(), UserField::Home);
        assert_eq!(
            "shoe_size".parse::<UserField>(),
            Err(Error::UnknownAttribute("shoe_size".to_string()))
        );
    }

    #[tokio::test]
    async fn open_missing_user_prepares_defaults() {
        let mut directory = mock_with_layout();
        let mut seq = mockall::Sequence::new();
        directory
            .expect_search()
            .withf(|_, _, filter, _| {
                filter.to_string() == "(&(objectClass=inetOrgPerson)(uid:caseIgnoreMatch:=jdoe))"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(Vec::new()));
        directory
            .expect_search()
            .withf(|_, _, _, attributes| attributes == ["uidNumber"])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(vec![user_entry("other", 2000)]));

        let user = User::open(&mut directory, "jdoe", MatchCase::Insensitive)
            .await
            .unwrap();

        assert!(!user.exists_in_directory());
        assert_eq!(user.uid_number(), Some(2001));
        assert_eq!(user.get(UserField::Home), Some("/home/jdoe"));
        assert_eq!(user.get(UserField::LoginShell), Some(DEFAULT_LOGIN_SHELL));
        assert_eq!(user.email(), Some("jdoe@example.com"));
        assert_eq!(user.dn().as_str(), "uid=jdoe,ou=users,o=sr");
        assert!(user.missing_attributes().is_empty());
        assert!(user.initial_password().is_some());
        assert_eq!(user.dirty_attributes().count(), 10);
    }

    #[tokio::test]
    async fn save_refuses_missing_attributes_before_any_write() {
        let mut directory = mock_with_layout();
        directory
            .expect_search()
            .returning(|_, _, _, _| Ok(vec![user_entry("jdoe", 2001)]));
        directory.expect_modify().never();

        let mut user = User::open(&mut directory, "jdoe", MatchCase::Exact)
            .await
            .unwrap();
        user.clear(UserField::Email);

        let err = user.save(&mut directory).await.unwrap_err();
        assert_eq!(
            err,
            Error::MissingRequiredAttribute {
                entry: "jdoe".to_string(),
                missing: vec!["mail".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn search_without_criteria_skips_the_directory() {
        let mut directory = MockDirectory::new();
        directory.expect_search().never();
        assert!(User::search(&mut directory, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_combines_criteria() {
        let mut directory = mock_with_layout();
        directory
            .expect_search()
            .withf(|_, _, filter, _| {
                filter.to_string() == "(&(objectClass=inetOrgPerson)(sn=Doe)(loginShell=/bin/zsh))"
            })
            .returning(|_, _, _, _| Ok(vec![user_entry("jdoe", 2001)]));

        let found = User::search(
            &mut directory,
            &[(UserField::Surname, "Doe"), (UserField::LoginShell, "/bin/zsh")],
        )
        .await
        .unwrap();
        assert_eq!(found, ["jdoe"]);
    }

    #[tokio::test]
    async fn unsaved_users_cannot_authenticate_or_change_password() {
        let mut directory = mock_with_layout();
        directory.expect_search().returning(|_, _, _, _| Ok(Vec::new()));
        directory.expect_bind_as().never();
        directory.expect_modify().never();

        let mut user = User::open(&mut directory, "jdoe", MatchCase::Exact)
            .await
            .unwrap();
        assert!(!user.bind_as(&mut directory, "secret").await.unwrap());
        assert!(!user.set_password(&mut directory, None, "new").await.unwrap());
        assert!(matches!(
            user.language(&mut directory).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_password_is_refused_before_binding() {
        let mut directory = mock_with_layout();
        directory
            .expect_search()
            .returning(|_, _, _, _| Ok(vec![user_entry("jdoe", 2001)]));
        directory.expect_bind_as().never().returning(|_, _| Ok(true));

        let user = User::open(&mut directory, "jdoe", MatchCase::Exact)
            .await
            .unwrap();
        assert!(user.exists_in_directory());
        assert!(!user.bind_as(&mut directory, "").await.unwrap());
    }

    #[tokio::test]
    async fn privileged_password_reset_writes_hash() {
        let mut directory = mock_with_layout();
        directory
            .expect_search()
            .returning(|_, _, _, _| Ok(vec![user_entry("jdoe", 2001)]));
        directory
            .expect_modify()
            .withf(|dn, modifications| {
                dn.as_str() == "uid=jdoe,ou=users,o=sr"
                    && modifications
                        == [DirectoryModification::Replace {
                            attribute: "userPassword".to_string(),
                            values: vec![hash_password("hunter2")],
                        }]
            })
            .times(1)
            .returning(|_, _| Ok(()));
        directory
            .expect_change_password()
            .withf(|_, old, new| old == "hunter2" && new == "correct horse")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut user = User::open(&mut directory, "jdoe", MatchCase::Exact)
            .await
            .unwrap();
        assert!(user.set_password(&mut directory, None, "hunter2").await.unwrap());
        assert!(user
            .set_password(&mut directory, Some("hunter2"), "correct horse")
            .await
            .unwrap());
        assert_eq!(user.dirty_attributes().count(), 0);
    }

    #[tokio::test]
    async fn groups_match_username_or_dn() {
        let mut directory = mock_with_layout();
        let mut seq = mockall::Sequence::new();
        directory
            .expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(vec![user_entry("jdoe", 2001)]));
        directory
            .expect_search()
            .withf(|base, _, filter, _| {
                base.as_str() == "ou=groups,o=sr"
                    && filter.to_string()
                        == "(&(objectClass=posixGroup)(|(memberUid=jdoe)(memberUid=uid=jdoe,ou=users,o=sr)))"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| {
                let mut attributes = AttributeMap::new();
                attributes.insert("cn".to_string(), vec!["lang-en".to_string()]);
                Ok(vec![LdapEntry {
                    dn: "cn=lang-en,ou=groups,o=sr".to_string(),
                    attributes,
                }])
            });

        let user = User::open(&mut directory, "jdoe", MatchCase::Exact)
            .await
            .unwrap();
        assert_eq!(user.language(&mut directory).await.unwrap().as_deref(), Some("en"));
    }

    #[test]
    fn display_lists_profile() {
        let record = EntityRecord::from_entry(user_entry("jdoe", 2001)).unwrap();
        let user = User {
            record,
            initial_password: None,
        };
        let rendered = user.to_string();
        assert!(rendered.starts_with("Full name: Jane Doe\nSurname: Doe\nUsername: jdoe"));
        assert!(rendered.ends_with("Home directory: /home/jdoe"));
    }

    #[test]
    fn language_codes() {
        assert_eq!(language_code("lang-fr"), Some("fr"));
        assert_eq!(language_code("lang-"), None);
        assert_eq!(language_code("robots"), None);
    }
}

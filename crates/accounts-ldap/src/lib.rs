//! User and group accounts on top of an LDAP directory.
//!
//! Accounts live one level below fixed branches of the tree (`ou=users` and `ou=groups` under an
//! organizational root). [`User`] and [`Group`] load themselves through a [`Directory`] handle,
//! hold edits in memory and write only what changed on `save`. New records receive a uid or gid
//! number that no existing entry uses.
//!
//! [`DirectorySession`] is the production [`Directory`]: one lazily bound `ldap3` connection per
//! session, with its authentication state tracked in [`AuthState`].

#![deny(missing_docs)]

mod allocator;
mod config;
mod directory;
mod dn;
mod entity;
mod filter;
mod group;
mod layout;
mod password;
mod session;
mod user;
mod username;

pub use allocator::{allocate, next_gid_number, next_uid_number, GID_FLOOR, UID_FLOOR};
pub use config::{DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS};
pub use directory::{
    Directory, DirectoryModification, LdapEntry, LocalIdentities, SearchScope, SystemIdentities,
};
pub use dn::{Dn, DnError, Rdn};
pub use entity::{AttributeMap, EntityRecord};
pub use filter::{Filter, MatchCase};
pub use group::{Group, MemberEncoding, MemberRef, FULL_DN_GROUP, GROUP_OBJECT_CLASS};
pub use layout::DirectoryLayout;
pub use password::{generate_password, hash_password, INITIAL_PASSWORD_LENGTH};
pub use session::{AuthState, DirectorySession};
pub use user::{
    User, UserField, DEFAULT_GID_NUMBER, DEFAULT_LOGIN_SHELL, LANGUAGE_GROUP_PREFIX,
    REQUIRED_ATTRIBUTES, USER_OBJECT_CLASS, USER_OBJECT_CLASSES,
};
pub use username::{new_username, COLLEGE_PREFIX};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = accounts_core::Result<T>;

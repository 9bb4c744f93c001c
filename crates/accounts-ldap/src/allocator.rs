//! Numeric identifier allocation for new users and groups.
//!
//! Allocation is read-then-compute with no lock: two writers can pick the same number. The
//! second insert then fails in the store and surfaces as [`Error::AlreadyExists`].

use std::collections::HashSet;

use accounts_core::Error;
use tracing::warn;

use crate::{
    directory::{Directory, SearchScope},
    filter::Filter,
    Result,
};

/// Highest uid number never handed out; the first user gets 2000.
pub const UID_FLOOR: u32 = 1999;

/// Highest gid number never handed out; the first group gets 3000.
pub const GID_FLOOR: u32 = 2999;

/// Smallest integer above `floor` that is absent from `used` and not rejected by `excluded`.
///
/// `excluded` is only consulted for candidates the store does not already use.
///
/// # Errors
///
/// Returns [`Error::InternalError`] if every value up to `u32::MAX` is taken.
pub fn allocate(floor: u32, used: &HashSet<u32>, excluded: impl Fn(u32) -> bool) -> Result<u32> {
    let mut candidate = floor;
    loop {
        candidate = candidate.checked_add(1).ok_or_else(|| {
            Error::InternalError(format!("no free identifier above {floor}"))
        })?;
        if !used.contains(&candidate) && !excluded(candidate) {
            return Ok(candidate);
        }
    }
}

/// Next free `uidNumber` in the users branch.
///
/// # Errors
///
/// Returns an error if the search fails or the identifier space is exhausted.
pub async fn next_uid_number(directory: &mut dyn Directory) -> Result<u32> {
    let base = directory.layout().users().clone();
    let used = used_numbers(directory, base, "inetOrgPerson", "uidNumber").await?;
    allocate(UID_FLOOR, &used, |_| false)
}

/// Next free `gidNumber` in the groups branch that is also unused by a local group.
///
/// # Errors
///
/// Returns an error if the search fails or the identifier space is exhausted.
pub async fn next_gid_number(directory: &mut dyn Directory) -> Result<u32> {
    let base = directory.layout().groups().clone();
    let used = used_numbers(directory, base, "posixGroup", "gidNumber").await?;
    allocate(GID_FLOOR, &used, |gid| directory.local_group_exists(gid))
}

async fn used_numbers(
    directory: &mut dyn Directory,
    base: crate::dn::Dn,
    object_class: &str,
    attribute: &'static str,
) -> Result<HashSet<u32>> {
    let entries = directory
        .search(
            &base,
            SearchScope::OneLevel,
            &Filter::object_class(object_class),
            &[attribute],
        )
        .await?;

    let mut used = HashSet::with_capacity(entries.len());
    for entry in &entries {
        for value in entry.values(attribute).unwrap_or_default() {
            match value.trim().parse::<u32>() {
                Ok(number) => {
                    used.insert(number);
                }
                Err(_) => warn!(dn = %entry.dn, attribute, value = %value, "skipping non-numeric identifier"),
            }
        }
    }
    Ok(used)
}

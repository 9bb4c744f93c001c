//! Username generation for new accounts.

use std::collections::HashSet;

use accounts_core::Error;
use deunicode::deunicode;
use tracing::debug;

use crate::{directory::Directory, filter::MatchCase, user::User, Result};

/// Prefix of organization group names; the remainder is the organization's tag.
pub const COLLEGE_PREFIX: &str = "college-";

/// Proposes an unused username of the form `<tag>_<initials><n>`.
///
/// `organization` may be a group name (`college-soc`) or the bare tag (`soc` or `soc_`). Both
/// names are transliterated to ASCII before their initials are taken. Candidates are numbered
/// from 1 and skipped while they exist in the directory (case-insensitively) or appear in
/// `reserved`. Nothing is written.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if a name is blank, or the directory error
/// if a lookup fails.
pub async fn new_username(
    directory: &mut dyn Directory,
    organization: &str,
    first_name: &str,
    last_name: &str,
    reserved: &HashSet<String>,
) -> Result<String> {
    let tag = organization
        .strip_prefix(COLLEGE_PREFIX)
        .unwrap_or(organization);
    let tag = tag.strip_suffix('_').unwrap_or(tag);
    let prefix = format!("{tag}_{}{}", initial(first_name)?, initial(last_name)?).to_lowercase();

    for n in 1..=u32::MAX {
        let candidate = format!("{prefix}{n}");
        if reserved.contains(&candidate)
            || User::exists(directory, &candidate, MatchCase::Insensitive).await?
        {
            debug!(candidate, "username taken");
            continue;
        }
        return Ok(candidate);
    }

    Err(Error::InternalError(format!("no free username for prefix `{prefix}`")))
}

/// First character of the transliterated name, punctuation included.
fn initial(name: &str) -> Result<char> {
    deunicode(name.trim())
        .chars()
        .next()
        .ok_or_else(|| Error::InvalidRequest(format!("name `{name}` has no usable initial")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{LdapEntry, MockDirectory};
    use crate::entity::AttributeMap;
    use crate::layout::DirectoryLayout;

    fn directory_with(existing: &'static [&'static str]) -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory
            .expect_layout()
            .return_const(DirectoryLayout::default());
        directory.expect_search().returning(move |_, _, filter, _| {
            let rendered = filter.to_string();
            Ok(existing
                .iter()
                .filter(|name| rendered.contains(&format!(":={name})")))
                .map(|name| {
                    let mut attributes = AttributeMap::new();
                    attributes.insert("uid".to_string(), vec![(*name).to_string()]);
                    LdapEntry {
                        dn: format!("uid={name},ou=users,o=sr"),
                        attributes,
                    }
                })
                .collect())
        });
        directory
    }

    #[tokio::test]
    async fn first_candidate_is_numbered_one() {
        let mut directory = directory_with(&[]);
        let name = new_username(&mut directory, "soc_", "Jane", "Doe", &HashSet::new())
            .await
            .unwrap();
        assert_eq!(name, "soc_jd1");
    }

    #[tokio::test]
    async fn skips_existing_and_reserved_names() {
        let mut directory = directory_with(&["soc_jd1"]);
        let name = new_username(&mut directory, "college-soc", "Jane", "Doe", &HashSet::new())
            .await
            .unwrap();
        assert_eq!(name, "soc_jd2");

        let mut directory = directory_with(&[]);
        let reserved = HashSet::from(["soc_jd1".to_string()]);
        let name = new_username(&mut directory, "soc", "Jane", "Doe", &reserved)
            .await
            .unwrap();
        assert_eq!(name, "soc_jd2");
    }

    #[tokio::test]
    async fn transliterates_initials() {
        let mut directory = directory_with(&[]);
        let name = new_username(&mut directory, "ABC", "Émile", "Øster", &HashSet::new())
            .await
            .unwrap();
        assert_eq!(name, "abc_eo1");
    }

    #[tokio::test]
    async fn initials_are_leading_characters_verbatim() {
        let mut directory = directory_with(&[]);
        let name = new_username(&mut directory, "soc", "  Jane", "'Brien", &HashSet::new())
            .await
            .unwrap();
        assert_eq!(name, "soc_j'1");
    }

    #[tokio::test]
    async fn rejects_names_without_initials() {
        let mut directory = MockDirectory::new();
        directory.expect_search().never();
        let result = new_username(&mut directory, "soc", "", "Doe", &HashSet::new()).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        let result = new_username(&mut directory, "soc", "Jane", "   ", &HashSet::new()).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}

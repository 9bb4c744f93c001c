//! In-memory directory used by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};

use accounts_core::Error;
use accounts_ldap::{
    hash_password, AttributeMap, Directory, DirectoryLayout, DirectoryModification, Dn, Filter,
    LdapEntry, Result, SearchScope,
};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    local_gids: HashSet<u32>,
    entries: Vec<FixtureEntry>,
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    dn: String,
    attributes: AttributeMap,
}

/// Directory backed by a map from DN to attributes.
pub struct MemoryDirectory {
    layout: DirectoryLayout,
    entries: BTreeMap<String, LdapEntry>,
    local_gids: HashSet<u32>,
    failing_modify: Option<String>,
    modify_budget: Option<usize>,
    /// Number of add, modify and delete calls that reached the store.
    pub writes: usize,
}

impl MemoryDirectory {
    /// Seeds the directory from `tests/fixtures/directory.json`.
    pub fn seeded() -> Self {
        let fixture: Fixture =
            serde_json::from_str(include_str!("../fixtures/directory.json")).unwrap();
        let mut directory = Self {
            layout: DirectoryLayout::default().with_mail_domain("example.com"),
            entries: BTreeMap::new(),
            local_gids: fixture.local_gids,
            failing_modify: None,
            modify_budget: None,
            writes: 0,
        };
        for entry in fixture.entries {
            directory.entries.insert(
                key(&entry.dn),
                LdapEntry {
                    dn: entry.dn,
                    attributes: entry.attributes,
                },
            );
        }
        directory
    }

    /// Makes every modify of `dn` fail as if the server had gone away.
    pub fn fail_modify_of(&mut self, dn: &str) {
        self.failing_modify = Some(key(dn));
    }

    /// Lets `successes` more modifies through, then fails every one after them.
    pub fn fail_modifies_after(&mut self, successes: usize) {
        self.modify_budget = Some(successes);
    }

    /// Raw entry, for assertions.
    pub fn entry(&self, dn: &str) -> Option<&LdapEntry> {
        self.entries.get(&key(dn))
    }
}

fn key(dn: &str) -> String {
    Dn::parse(dn).unwrap().as_str().to_lowercase()
}

fn in_scope(dn: &Dn, base: &Dn, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn.as_str().eq_ignore_ascii_case(base.as_str()),
        SearchScope::OneLevel => dn.is_child_of(base),
        SearchScope::Subtree => dn
            .as_str()
            .to_lowercase()
            .ends_with(&base.as_str().to_lowercase()),
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    async fn search(
        &mut self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        _attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        Ok(self
            .entries
            .values()
            .filter(|entry| {
                let dn = Dn::parse(&entry.dn).unwrap();
                in_scope(&dn, base, scope) && filter.evaluate(&entry.attributes)
            })
            .cloned()
            .collect())
    }

    async fn add(&mut self, dn: &Dn, attributes: &AttributeMap) -> Result<()> {
        self.writes += 1;
        let key = key(dn.as_str());
        if self.entries.contains_key(&key) {
            return Err(Error::AlreadyExists(dn.to_string()));
        }
        self.entries.insert(
            key,
            LdapEntry {
                dn: dn.to_string(),
                attributes: attributes.clone(),
            },
        );
        Ok(())
    }

    async fn modify(&mut self, dn: &Dn, modifications: &[DirectoryModification]) -> Result<()> {
        self.writes += 1;
        let key = key(dn.as_str());
        if self.failing_modify.as_ref() == Some(&key) {
            return Err(Error::StoreUnavailable("connection reset".to_string()));
        }
        if let Some(budget) = self.modify_budget.as_mut() {
            if *budget == 0 {
                return Err(Error::StoreUnavailable("connection reset".to_string()));
            }
            *budget -= 1;
        }
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(dn.to_string()))?;
        for modification in modifications {
            let DirectoryModification::Replace { attribute, values } = modification;
            if values.is_empty() {
                entry.attributes.remove(attribute);
            } else {
                entry.attributes.insert(attribute.clone(), values.clone());
            }
        }
        Ok(())
    }

    async fn delete(&mut self, dn: &Dn) -> Result<()> {
        self.writes += 1;
        self.entries
            .remove(&key(dn.as_str()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(dn.to_string()))
    }

    async fn change_password(&mut self, dn: &Dn, old: &str, new: &str) -> Result<()> {
        self.writes += 1;
        let entry = self
            .entries
            .get_mut(&key(dn.as_str()))
            .ok_or_else(|| Error::NotFound(dn.to_string()))?;
        if entry.first("userPassword") != Some(hash_password(old).as_str()) {
            return Err(Error::InvalidCredential(dn.to_string()));
        }
        entry
            .attributes
            .insert("userPassword".to_string(), vec![hash_password(new)]);
        Ok(())
    }

    async fn bind_as(&mut self, dn: &Dn, password: &str) -> Result<bool> {
        // Like a server that allows unauthenticated binds.
        if password.is_empty() {
            return Ok(true);
        }
        Ok(self
            .entries
            .get(&key(dn.as_str()))
            .and_then(|entry| entry.first("userPassword"))
            .is_some_and(|stored| stored == hash_password(password)))
    }

    fn local_group_exists(&self, gid: u32) -> bool {
        self.local_gids.contains(&gid)
    }
}

//! Shared lifecycle of a directory-backed record.
//!
//! An [`EntityRecord`] is the persisted half of a user or group: its DN, whether it exists in
//! the store, its attributes and the set of attributes changed since the last save. Saving a
//! new record inserts every attribute; saving an existing one replaces only what is dirty.

use std::collections::{BTreeMap, BTreeSet};

use accounts_core::Error;
use tracing::debug;

use crate::{
    directory::{Directory, DirectoryModification, LdapEntry, SearchScope},
    dn::Dn,
    filter::Filter,
    Result,
};

/// Attribute name to values. Directory attributes are multi-valued.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// Persisted state shared by users and groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    dn: Dn,
    exists: bool,
    attributes: AttributeMap,
    dirty: BTreeSet<String>,
}

impl EntityRecord {
    /// A record that has never been persisted. Every attribute starts dirty.
    pub(crate) fn new(dn: Dn, attributes: AttributeMap) -> Self {
        let dirty = attributes.keys().cloned().collect();
        Self {
            dn,
            exists: false,
            attributes,
            dirty,
        }
    }

    pub(crate) fn from_entry(entry: LdapEntry) -> Result<Self> {
        Ok(Self {
            dn: Dn::parse(&entry.dn)?,
            exists: true,
            attributes: entry.attributes,
            dirty: BTreeSet::new(),
        })
    }

    /// Looks up the single entry under `base` matching `object_class` and `filter`.
    ///
    /// Returns `Ok(None)` when nothing matches and [`Error::AmbiguousMatch`] when more than one
    /// entry does.
    pub(crate) async fn load(
        directory: &mut dyn Directory,
        base: &Dn,
        object_class: &str,
        filter: Filter,
    ) -> Result<Option<Self>> {
        let filter = Filter::and([Filter::object_class(object_class), filter]);
        let mut entries = directory
            .search(base, SearchScope::OneLevel, &filter, &[])
            .await?;

        match entries.len() {
            0 => Ok(None),
            1 => entries.pop().map(Self::from_entry).transpose(),
            count => Err(Error::AmbiguousMatch {
                filter: filter.to_string(),
                count,
            }),
        }
    }

    /// Distinguished name of the entry.
    #[must_use]
    pub const fn dn(&self) -> &Dn {
        &self.dn
    }

    /// True once the record is known to be present in the store.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// All attributes currently held in memory.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Attributes changed since the last successful save.
    pub fn dirty_attributes(&self) -> impl Iterator<Item = &str> + '_ {
        self.dirty.iter().map(String::as_str)
    }

    /// True if nothing changed since the last save.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }

    /// All values of `attribute`.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }

    /// First value of `attribute`.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// True if `attribute` holds at least one value.
    #[must_use]
    pub fn has_value(&self, attribute: &str) -> bool {
        self.values(attribute).is_some_and(|values| !values.is_empty())
    }

    /// Replaces the values of `attribute` and marks it dirty. An empty list clears it.
    pub fn set(&mut self, attribute: &str, values: Vec<String>) {
        self.attributes.insert(attribute.to_string(), values);
        self.dirty.insert(attribute.to_string());
    }

    /// Records a value the store already holds, without marking it dirty.
    pub(crate) fn refresh(&mut self, attribute: &str, values: Vec<String>) {
        self.attributes.insert(attribute.to_string(), values);
    }

    /// Writes the record: a full insert when new, a replace of the dirty attributes otherwise.
    ///
    /// On failure nothing in memory changes, so the same save can be retried.
    pub(crate) async fn save(&mut self, directory: &mut dyn Directory) -> Result<()> {
        if self.exists {
            if self.dirty.is_empty() {
                return Ok(());
            }
            let modifications = self
                .dirty
                .iter()
                .map(|attribute| DirectoryModification::Replace {
                    attribute: attribute.clone(),
                    values: self.attributes.get(attribute).cloned().unwrap_or_default(),
                })
                .collect::<Vec<_>>();
            debug!(dn = %self.dn, attributes = ?self.dirty, "updating entry");
            directory.modify(&self.dn, &modifications).await?;
        } else {
            let populated = self
                .attributes
                .iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect::<AttributeMap>();
            debug!(dn = %self.dn, "inserting entry");
            directory.add(&self.dn, &populated).await?;
            self.exists = true;
        }

        self.dirty.clear();
        Ok(())
    }

    /// Deletes the entry from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record was never persisted.
    pub(crate) async fn delete(&mut self, directory: &mut dyn Directory) -> Result<()> {
        if !self.exists {
            return Err(Error::NotFound(format!(
                "cannot delete `{}`: not in the directory",
                self.dn
            )));
        }

        directory.delete(&self.dn).await?;
        self.exists = false;
        Ok(())
    }
}

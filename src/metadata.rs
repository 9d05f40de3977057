//! Tag metadata registry - name, comment, key binding, color and report flag
//!
//! Keyed by the same ids as the membership store. A tag is live here iff it
//! has a name.

use crate::error::{Result, StoreError};
use crate::tag::TagId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Key binding attached to a tag by the UI. Stored and returned untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyBinding(pub Vec<u8>);

/// Display color attached to a tag by the UI. Stored and returned untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    pub(crate) names: BTreeMap<TagId, String>,
    pub(crate) comments: BTreeMap<TagId, String>,
    pub(crate) key_bindings: BTreeMap<TagId, KeyBinding>,
    pub(crate) colors: BTreeMap<TagId, Color>,
    pub(crate) in_report: BTreeSet<TagId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_live(&self, tag: TagId) -> Result<()> {
        if self.names.contains_key(&tag) {
            Ok(())
        } else {
            Err(StoreError::UnknownTag(tag))
        }
    }

    /// Register `tag` under `name` with default metadata
    pub fn insert(&mut self, tag: TagId, name: &str) {
        self.remove(tag);
        self.names.insert(tag, name.to_string());
    }

    /// Drop every attribute of `tag`
    pub fn remove(&mut self, tag: TagId) -> bool {
        self.comments.remove(&tag);
        self.key_bindings.remove(&tag);
        self.colors.remove(&tag);
        self.in_report.remove(&tag);
        self.names.remove(&tag).is_some()
    }

    /// Lowest id whose name is exactly `name`
    pub fn id_of(&self, name: &str) -> Option<TagId> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, _)| id)
    }

    pub fn name(&self, tag: TagId) -> Option<&str> {
        self.names.get(&tag).map(String::as_str)
    }

    pub fn names(&self) -> &BTreeMap<TagId, String> {
        &self.names
    }

    /// Replace the name of a live tag; absent tags are ignored
    pub fn rename(&mut self, tag: TagId, name: &str) {
        if let Some(n) = self.names.get_mut(&tag) {
            *n = name.to_string();
        }
    }

    pub fn set_comment(&mut self, tag: TagId, comment: Option<String>) -> Result<()> {
        self.check_live(tag)?;
        match comment {
            Some(c) => self.comments.insert(tag, c),
            None => self.comments.remove(&tag),
        };
        Ok(())
    }

    pub fn comment(&self, tag: TagId) -> Option<&str> {
        self.comments.get(&tag).map(String::as_str)
    }

    pub fn set_key_binding(&mut self, tag: TagId, key: KeyBinding) -> Result<()> {
        self.check_live(tag)?;
        self.key_bindings.insert(tag, key);
        Ok(())
    }

    pub fn remove_key_binding(&mut self, tag: TagId) {
        self.key_bindings.remove(&tag);
    }

    pub fn key_binding(&self, tag: TagId) -> Option<&KeyBinding> {
        self.key_bindings.get(&tag)
    }

    pub fn set_color(&mut self, tag: TagId, color: Option<Color>) -> Result<()> {
        self.check_live(tag)?;
        match color {
            Some(c) => self.colors.insert(tag, c),
            None => self.colors.remove(&tag),
        };
        Ok(())
    }

    pub fn color(&self, tag: TagId) -> Option<Color> {
        self.colors.get(&tag).copied()
    }

    /// Every color currently assigned to some tag
    pub fn used_colors(&self) -> HashSet<Color> {
        self.colors.values().copied().collect()
    }

    pub fn set_in_report(&mut self, tag: TagId, in_report: bool) -> Result<()> {
        self.check_live(tag)?;
        if in_report {
            self.in_report.insert(tag);
        } else {
            self.in_report.remove(&tag);
        }
        Ok(())
    }

    pub fn is_in_report(&self, tag: TagId) -> bool {
        self.in_report.contains(&tag)
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Tags
//!
//! Tags are applied through a separate tagging call that does not take a
//! version token, so they never participate in configuration diffs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value labels attached to a distribution
pub type Tags = BTreeMap<String, String>;

/// Minimal set of changes turning one tag set into another
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagDiff {
    /// Tags to add or overwrite
    pub upsert: Tags,

    /// Tag keys to remove
    pub remove: Vec<String>,
}

impl TagDiff {
    /// Compute the diff from `old` to `new`
    pub fn between(old: &Tags, new: &Tags) -> Self {
        let upsert = new
            .iter()
            .filter(|(key, value)| old.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let remove = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect();

        Self { upsert, remove }
    }

    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }

    /// Apply this diff to a tag set
    pub fn apply(&self, tags: &mut Tags) {
        for key in &self.remove {
            tags.remove(key);
        }
        for (key, value) in &self.upsert {
            tags.insert(key.clone(), value.clone());
        }
    }
}

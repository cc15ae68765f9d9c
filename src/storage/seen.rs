//! Seen-link set and its persisted shapes.
//!
//! The canonical file is
//!
//! ```json
//! { "version": 2, "updated_at": "2026-01-01T00:00:00Z", "seen": ["https://..."] }
//! ```
//!
//! Older files are still accepted and rewritten on first load:
//! `{"seen": [...]}` without a version, a bare array of links, an array of
//! `{"id": .., "link"|"url": ..}` objects, and an `{"<id>": "<link>"}` map.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::normalize_link;

/// Current on-disk format version.
pub const SEEN_FORMAT_VERSION: u32 = 2;

/// Per-site set of normalized links already notified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenLinkSet {
    links: BTreeSet<String>,
}

impl SeenLinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw links, normalizing each one.
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let links = links
            .into_iter()
            .map(|l| normalize_link(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Membership test on the normalized form of `link`.
    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(&normalize_link(link))
    }

    /// Links in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    /// Normalize `candidates`, return those not yet seen and fold all of
    /// them into the set.
    ///
    /// New links keep the candidates' order; a link repeated within one
    /// call is reported once.
    pub fn diff_and_merge<S: AsRef<str>>(&mut self, candidates: &[S]) -> Vec<String> {
        let mut fresh = Vec::new();
        for candidate in candidates {
            let link = normalize_link(candidate.as_ref());
            if link.is_empty() {
                continue;
            }
            if self.links.insert(link.clone()) {
                fresh.push(link);
            }
        }
        fresh
    }

    /// Serialize to the canonical shape.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let file = SeenFile {
            version: SEEN_FORMAT_VERSION,
            updated_at: Some(Utc::now()),
            seen: self.links.iter().cloned().collect(),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    /// Parse any accepted shape.
    ///
    /// Empty input yields an empty, up-to-date set.
    pub fn from_json(bytes: &[u8]) -> Result<LoadedSet> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(LoadedSet {
                set: Self::new(),
                needs_migration: false,
            });
        }

        let shape: StoredShape = serde_json::from_slice(bytes)?;
        let (raw, legacy): (Vec<String>, bool) = match shape {
            StoredShape::Versioned(file) => {
                let legacy = file.version < SEEN_FORMAT_VERSION;
                (file.seen, legacy)
            }
            StoredShape::Links(links) => (links, true),
            StoredShape::Entries(entries) => {
                (entries.into_iter().filter_map(|e| e.link).collect(), true)
            }
            StoredShape::IdMap(map) => (map.into_values().collect(), true),
        };

        let set = Self::from_links(&raw);
        // Stored entries that were not yet normalized also warrant a rewrite
        let denormalized = raw.len() != set.len() || raw.iter().any(|l| !set.links.contains(l));

        Ok(LoadedSet {
            set,
            needs_migration: legacy || denormalized,
        })
    }
}

/// Outcome of parsing a stored set.
#[derive(Debug)]
pub struct LoadedSet {
    pub set: SeenLinkSet,
    /// The stored bytes are not in the canonical shape
    pub needs_migration: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeenFile {
    #[serde(default = "legacy_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    seen: Vec<String>,
}

fn legacy_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(default, alias = "url")]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredShape {
    Versioned(SeenFile),
    Links(Vec<String>),
    Entries(Vec<LegacyEntry>),
    IdMap(BTreeMap<String, String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_and_merge_compares_normalized_forms() {
        let mut set = SeenLinkSet::from_links(["https://x/a"]);
        let fresh = set.diff_and_merge(&["https://X/A", "https://x/b"]);

        assert_eq!(fresh, vec!["https://x/b".to_string()]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(" HTTPS://X/B "));
    }

    #[test]
    fn test_diff_and_merge_reports_duplicates_once() {
        let mut set = SeenLinkSet::new();
        let fresh = set.diff_and_merge(&["https://x/1", "https://X/1", "", "https://x/2"]);
        assert_eq!(fresh, vec!["https://x/1", "https://x/2"]);
    }

    #[test]
    fn test_same_candidates_twice_yield_nothing_new() {
        let mut set = SeenLinkSet::new();
        let links = ["https://x/1", "https://x/2"];
        assert_eq!(set.diff_and_merge(&links).len(), 2);
        assert!(set.diff_and_merge(&links).is_empty());
    }

    #[test]
    fn test_roundtrip_reproduces_set() {
        let set = SeenLinkSet::from_links(["https://x/b", "https://x/a"]);
        let loaded = SeenLinkSet::from_json(&set.to_json().unwrap()).unwrap();

        assert_eq!(loaded.set, set);
        assert!(!loaded.needs_migration);
    }

    #[test]
    fn test_canonical_file_is_sorted() {
        let set = SeenLinkSet::from_links(["https://x/c", "https://x/a", "https://x/b"]);
        let value: serde_json::Value = serde_json::from_slice(&set.to_json().unwrap()).unwrap();

        assert_eq!(value["version"], 2);
        assert_eq!(
            value["seen"],
            serde_json::json!(["https://x/a", "https://x/b", "https://x/c"])
        );
    }

    #[test]
    fn test_empty_input_is_empty_set() {
        let loaded = SeenLinkSet::from_json(b"  \n").unwrap();
        assert!(loaded.set.is_empty());
        assert!(!loaded.needs_migration);
    }

    #[test]
    fn test_unversioned_seen_object_migrates() {
        let loaded = SeenLinkSet::from_json(br#"{"seen": ["https://X/A ", "https://x/b"]}"#).unwrap();

        assert!(loaded.needs_migration);
        assert_eq!(
            loaded.set.iter().collect::<Vec<_>>(),
            vec!["https://x/a", "https://x/b"]
        );
    }

    #[test]
    fn test_bare_array_migrates() {
        let loaded = SeenLinkSet::from_json(br#"["https://x/1", "https://x/2"]"#).unwrap();
        assert!(loaded.needs_migration);
        assert_eq!(loaded.set.len(), 2);
    }

    #[test]
    fn test_id_keyed_entries_migrate() {
        let loaded = SeenLinkSet::from_json(
            br#"[
                {"id": "1001", "link": "https://Aukro.cz/item/1001"},
                {"id": 1002, "url": "https://aukro.cz/item/1002"},
                {"id": "1003"}
            ]"#,
        )
        .unwrap();

        assert!(loaded.needs_migration);
        assert_eq!(
            loaded.set.iter().collect::<Vec<_>>(),
            vec!["https://aukro.cz/item/1001", "https://aukro.cz/item/1002"]
        );
    }

    #[test]
    fn test_id_keyed_map_migrates() {
        let loaded = SeenLinkSet::from_json(
            br#"{"77": "https://www.vinted.cz/items/77", "78": "https://www.vinted.cz/items/78"}"#,
        )
        .unwrap();

        assert!(loaded.needs_migration);
        assert!(loaded.set.contains("https://www.vinted.cz/items/78"));
    }

    #[test]
    fn test_denormalized_canonical_file_is_rewritten() {
        let loaded =
            SeenLinkSet::from_json(br#"{"version": 2, "seen": ["HTTPS://X/A"]}"#).unwrap();
        assert!(loaded.needs_migration);
        assert!(loaded.set.contains("https://x/a"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(SeenLinkSet::from_json(b"{not json").is_err());
        assert!(SeenLinkSet::from_json(b"42").is_err());
    }
}

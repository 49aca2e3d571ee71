//! Key/value snapshot shared by the configuration providers.
//!
//! Keys are `:`-delimited paths (`Certward:DomainNames:0`) and compare
//! ASCII case-insensitively. A key may be present without a value; that is
//! how section markers from structured files are recorded.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Separator between key path segments.
pub const KEY_DELIMITER: &str = ":";

/// Join path segments into a configuration key.
pub fn combine_key<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

/// Order child segments the way array binding expects: numeric segments
/// first in numeric order, then the rest case-insensitively.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

fn normalize(key: &str) -> String {
    key.to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: Option<String>,
}

/// Immutable-by-convention set of configuration entries.
///
/// Providers build a fresh `ConfigData` and swap it in whole; it is never
/// patched while readers can see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigData {
    entries: BTreeMap<String, Entry>,
}

impl ConfigData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. `None` records a key without a value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        self.entries.insert(normalize(&key), Entry { key, value });
    }

    /// Raw lookup: `None` if the key is absent, `Some(None)` if it is present
    /// without a value.
    pub fn lookup(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&normalize(key))
            .map(|entry| entry.value.as_deref())
    }

    /// Immediate child segments under `parent_path`, with their original
    /// casing, deduplicated case-insensitively. An empty path lists the roots.
    pub fn child_keys(&self, parent_path: &str) -> Vec<String> {
        let prefix = if parent_path.is_empty() {
            String::new()
        } else {
            format!("{}{}", normalize(parent_path), KEY_DELIMITER)
        };

        let mut seen = BTreeMap::new();
        for (normalized, entry) in &self.entries {
            if !normalized.starts_with(&prefix) {
                continue;
            }
            // ASCII lowercasing keeps byte offsets, so the original key can be
            // sliced at the same position.
            let rest = &entry.key[prefix.len()..];
            let segment = rest.split(KEY_DELIMITER).next().unwrap_or(rest);
            if segment.is_empty() {
                continue;
            }
            seen.entry(normalize(segment))
                .or_insert_with(|| segment.to_string());
        }

        let mut children: Vec<String> = seen.into_values().collect();
        children.sort_by(|a, b| compare_segments(a, b));
        children
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order, original key casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .values()
            .map(|entry| (entry.key.as_str(), entry.value.as_deref()))
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut data = ConfigData::new();
        for (key, value) in iter {
            data.insert(key, Some(value.into()));
        }
        data
    }
}

//! Configuration provider capability and the fixed in-memory provider.

use std::sync::Arc;

use certward_common::ChangeSignal;

use crate::data::ConfigData;

/// A source of configuration entries.
///
/// `try_get` never surfaces a key that is present without a value: such a key
/// reads as absent. An empty string is a value and is returned as `Some("")`.
pub trait ConfigurationProvider: Send + Sync {
    /// Value for `key`, or `None` if absent or value-less.
    fn try_get(&self, key: &str) -> Option<String>;

    /// Immediate child segments under `parent_path`.
    fn child_keys(&self, parent_path: &str) -> Vec<String>;

    /// Signal for the provider's current data generation.
    fn change_signal(&self) -> ChangeSignal;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Collapse a raw lookup to the provider read contract.
pub(crate) fn present_value(raw: Option<Option<&str>>) -> Option<String> {
    match raw {
        Some(Some(value)) => Some(value.to_string()),
        // Present without a value reads as absent.
        Some(None) | None => None,
    }
}

/// Provider over a fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    name: String,
    data: Arc<ConfigData>,
}

impl MemoryConfigSource {
    pub fn new(name: impl Into<String>, data: ConfigData) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }

    /// Build from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(name, pairs.into_iter().collect())
    }

    pub fn data(&self) -> &ConfigData {
        &self.data
    }
}

impl ConfigurationProvider for MemoryConfigSource {
    fn try_get(&self, key: &str) -> Option<String> {
        present_value(self.data.lookup(key))
    }

    fn child_keys(&self, parent_path: &str) -> Vec<String> {
        self.data.child_keys(parent_path)
    }

    fn change_signal(&self) -> ChangeSignal {
        ChangeSignal::never()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! Runtime-mutable domain name source.
//!
//! The host calls [`DynamicConfigSource::set_addresses`] whenever the set of
//! managed domains changes. Each call replaces every entry the source holds
//! with `<Section>:DomainNames:<index>` keys and fires the change signal of
//! the generation it replaced.

use std::sync::Arc;

use arc_swap::ArcSwap;
use certward_common::{ChangeSignal, ChangeSource};
use tracing::debug;

use crate::data::{combine_key, ConfigData};
use crate::provider::{present_value, ConfigurationProvider};

/// Default configuration section.
pub const DEFAULT_SECTION: &str = "Certward";

/// Key segment the addresses are published under.
pub const DOMAIN_NAMES_KEY: &str = "DomainNames";

/// Configuration provider whose domain list is replaced at runtime.
#[derive(Debug)]
pub struct DynamicConfigSource {
    section: String,
    data: ArcSwap<ConfigData>,
    change: ChangeSource,
}

impl DynamicConfigSource {
    /// Empty source publishing under [`DEFAULT_SECTION`].
    pub fn new() -> Self {
        Self::with_section(DEFAULT_SECTION)
    }

    /// Empty source publishing under `section`.
    pub fn with_section(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            data: ArcSwap::from_pointee(ConfigData::new()),
            change: ChangeSource::new(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Replace the published domain list.
    ///
    /// Readers see either the previous list or this one, never a mix. The
    /// signal returned by [`change_signal`](Self::change_signal) before this
    /// call fires once the new list is visible.
    pub fn set_addresses<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut data = ConfigData::new();
        for (index, address) in addresses.into_iter().enumerate() {
            let index = index.to_string();
            let key = combine_key([self.section.as_str(), DOMAIN_NAMES_KEY, index.as_str()]);
            data.insert(key, Some(address.into()));
        }

        let count = data.len();
        self.data.store(Arc::new(data));
        let generation = self.change.trigger();

        debug!(
            section = %self.section,
            addresses = count,
            generation,
            "Replaced dynamic domain names"
        );
    }

    /// Addresses of the current generation, in index order.
    pub fn addresses(&self) -> Vec<String> {
        let data = self.data.load();
        let path = combine_key([self.section.as_str(), DOMAIN_NAMES_KEY]);
        data.child_keys(&path)
            .into_iter()
            .filter_map(|child| {
                let key = combine_key([path.as_str(), child.as_str()]);
                present_value(data.lookup(&key))
            })
            .collect()
    }

    /// Number of `set_addresses` calls applied so far.
    pub fn generation(&self) -> u64 {
        self.change.generation()
    }
}

impl Default for DynamicConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationProvider for DynamicConfigSource {
    fn try_get(&self, key: &str) -> Option<String> {
        present_value(self.data.load().lookup(key))
    }

    fn child_keys(&self, parent_path: &str) -> Vec<String> {
        self.data.load().child_keys(parent_path)
    }

    fn change_signal(&self) -> ChangeSignal {
        self.change.signal()
    }

    fn name(&self) -> &str {
        "dynamic"
    }
}

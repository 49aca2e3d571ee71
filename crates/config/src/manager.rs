//! Layered configuration.
//!
//! Providers are consulted newest first, so a provider added later overrides
//! the values of earlier ones. The manager fires its own change signal
//! whenever any provider's signal fires, and again when a provider is added.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use certward_common::{on_change, ChangeSignal, ChangeSource, ChangeSubscription};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::data::{combine_key, compare_segments};
use crate::provider::ConfigurationProvider;

struct Registered {
    provider: Arc<dyn ConfigurationProvider>,
    subscription: ChangeSubscription,
}

struct ManagerInner {
    providers: RwLock<Vec<Registered>>,
    change: ChangeSource,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        for registered in self.providers.get_mut().iter() {
            registered.subscription.cancel();
        }
    }
}

/// Aggregated view over a stack of configuration providers.
#[derive(Clone)]
pub struct ConfigurationManager {
    inner: Arc<ManagerInner>,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                providers: RwLock::new(Vec::new()),
                change: ChangeSource::new(),
            }),
        }
    }

    /// Add a provider on top of the stack and follow its change signal.
    pub fn add_provider(&self, provider: Arc<dyn ConfigurationProvider>) -> &Self {
        let weak_provider: Weak<dyn ConfigurationProvider> = Arc::downgrade(&provider);
        let weak_inner = Arc::downgrade(&self.inner);
        let provider_name = provider.name().to_string();

        let subscription = on_change(
            move || match weak_provider.upgrade() {
                Some(provider) => provider.change_signal(),
                None => ChangeSignal::never(),
            },
            move || {
                if let Some(inner) = weak_inner.upgrade() {
                    trace!(provider = %provider_name, "Provider changed, reloading configuration");
                    inner.change.trigger();
                }
            },
        );

        {
            let mut providers = self.inner.providers.write();
            debug!(
                provider = provider.name(),
                position = providers.len(),
                "Adding configuration provider"
            );
            providers.push(Registered {
                provider,
                subscription,
            });
        }

        self.inner.change.trigger();
        self
    }

    /// Value for `key` from the newest provider that has one.
    pub fn try_get(&self, key: &str) -> Option<String> {
        let providers = self.inner.providers.read();
        providers
            .iter()
            .rev()
            .find_map(|registered| registered.provider.try_get(key))
    }

    /// Child segments under `path`, unioned across providers.
    pub fn child_keys(&self, path: &str) -> Vec<String> {
        let providers = self.inner.providers.read();
        let mut seen = BTreeMap::new();
        for registered in providers.iter().rev() {
            for child in registered.provider.child_keys(path) {
                seen.entry(child.to_ascii_lowercase()).or_insert(child);
            }
        }

        let mut children: Vec<String> = seen.into_values().collect();
        children.sort_by(|a, b| compare_segments(a, b));
        children
    }

    /// Values of the children of `path` in index order, skipping children
    /// without a value.
    pub fn get_list(&self, path: &str) -> Vec<String> {
        self.child_keys(path)
            .into_iter()
            .filter_map(|child| self.try_get(&combine_key([path, child.as_str()])))
            .collect()
    }

    /// Signal for the current aggregated generation.
    pub fn change_signal(&self) -> ChangeSignal {
        self.inner.change.signal()
    }

    pub fn provider_count(&self) -> usize {
        self.inner.providers.read().len()
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationManager")
            .field("providers", &self.provider_count())
            .field("generation", &self.inner.change.generation())
            .finish()
    }
}

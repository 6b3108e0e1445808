use crate::rule::SegmentedRatioConfig;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Registry of per-model segmented pricing configurations.
///
/// One instance is constructed at startup and handed to every reader and
/// writer through the server state. A single reader/writer lock guards the
/// map; writers swap whole entries, so a reader never observes a partially
/// mutated configuration. Reads hand out owned copies, writes take ownership
/// of the caller's value.
pub struct RatioStore {
    configs: RwLock<HashMap<String, SegmentedRatioConfig>>,
    invalidations: broadcast::Sender<()>,
}

impl RatioStore {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(16);
        Self {
            configs: RwLock::new(HashMap::new()),
            invalidations,
        }
    }

    /// Clear every stored configuration. Idempotent; used once at startup
    /// before the persisted snapshot is restored.
    pub async fn reset(&self) {
        self.configs.write().await.clear();
    }

    /// Insert or replace the configuration for `model_name`.
    ///
    /// The rule list is stable-sorted by priority descending before storing,
    /// which is the only ordering the match engine relies on. No validation
    /// happens here; the administrative layer rejects malformed payloads
    /// before calling in.
    pub async fn set(&self, model_name: impl Into<String>, mut config: SegmentedRatioConfig) {
        config.sort_rules();
        self.configs.write().await.insert(model_name.into(), config);
        self.notify();
    }

    /// Owned copy of the configuration for `model_name`, if any.
    pub async fn get(&self, model_name: &str) -> Option<SegmentedRatioConfig> {
        self.configs.read().await.get(model_name).cloned()
    }

    /// Remove the configuration for `model_name`. Removing an unknown model
    /// is a no-op, but the invalidation signal fires either way.
    pub async fn delete(&self, model_name: &str) {
        self.configs.write().await.remove(model_name);
        self.notify();
    }

    /// Fully independent deep copy of every stored configuration, safe to
    /// serialize or inspect while the store keeps mutating.
    pub async fn snapshot(&self) -> HashMap<String, SegmentedRatioConfig> {
        self.configs.read().await.clone()
    }

    /// Replace the entire map in one step (snapshot restore).
    ///
    /// Every incoming rule list is re-sorted by priority. A concurrent
    /// reader sees either the old map or the new one, never a mixture; the
    /// invalidation signal fires once for the whole replacement.
    pub async fn replace_all(&self, mut configs: HashMap<String, SegmentedRatioConfig>) {
        for config in configs.values_mut() {
            config.sort_rules();
        }
        *self.configs.write().await = configs;
        self.notify();
    }

    /// Names of all models with segmented pricing enabled.
    pub async fn enabled_models(&self) -> Vec<String> {
        self.configs
            .read()
            .await
            .iter()
            .filter(|(_, config)| config.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether `model_name` has a configuration and it is enabled.
    pub async fn is_enabled(&self, model_name: &str) -> bool {
        self.configs
            .read()
            .await
            .get(model_name)
            .is_some_and(|config| config.enabled)
    }

    pub async fn model_count(&self) -> usize {
        self.configs.read().await.len()
    }

    /// Subscribe to cache-invalidation notifications. One message is sent
    /// per successful mutation; the store does not know who consumes them.
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<()> {
        self.invalidations.subscribe()
    }

    fn notify(&self) {
        // send only fails when nobody is subscribed
        let _ = self.invalidations.send(());
    }
}

impl Default for RatioStore {
    fn default() -> Self {
        Self::new()
    }
}

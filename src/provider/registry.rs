//! Name-keyed registry of live providers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::provider::SearchProvider;

/// Providers registered by the hosting application.
///
/// Starts empty; nothing is registered implicitly.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn SearchProvider>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own name, returning any provider it replaced.
    pub fn register(&self, provider: Arc<dyn SearchProvider>) -> Option<Arc<dyn SearchProvider>> {
        let name = provider.name().to_string();
        self.register_as(name, provider)
    }

    /// Register `provider` under an explicit name.
    pub fn register_as(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn SearchProvider>,
    ) -> Option<Arc<dyn SearchProvider>> {
        self.providers.write().insert(name.into(), provider)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.read().get(name).cloned()
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.providers.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.providers.write().clear();
    }
}

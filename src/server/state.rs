//! Application state shared across all request handlers.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::dataset::{ConversationStore, DatasetConfig, SessionPreferences};

/// Shared application state.
///
/// Handlers take the read guard for lookups and hold the write guard across
/// every validate-mutate-save sequence, so concurrent requests never
/// interleave on the list.
pub struct AppState {
    /// The conversation store.
    pub store: RwLock<ConversationStore>,
    /// Effective configuration.
    pub config: DatasetConfig,
}

impl AppState {
    /// Open the configured store and wrap it for sharing.
    #[must_use]
    pub fn new(config: DatasetConfig) -> Arc<Self> {
        let store = ConversationStore::from_config(&config.storage);
        Self::with_store(store, config)
    }

    /// Wrap an already opened store.
    #[must_use]
    pub fn with_store(store: ConversationStore, config: DatasetConfig) -> Arc<Self> {
        Arc::new(Self {
            store: RwLock::new(store),
            config,
        })
    }

    /// Preferences of a fresh session under this configuration.
    #[must_use]
    pub fn default_preferences(&self) -> SessionPreferences {
        SessionPreferences::defaults(&self.config.form.default_system_message)
    }
}

use std::collections::BTreeMap;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::{BackendKind, StudioConfig};

pub const SENTIMENT_SLOT: &str = "sentiment";
pub const GENERATOR_SLOT: &str = "generator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub repo: String,
    pub status: ModelStatus,
    pub last_updated: Option<SystemTime>,
}

impl ModelMetadata {
    pub fn new(name: &str, repo: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ModelStatus::Unloaded,
            repo: repo.to_string(),
            last_updated: None,
        }
    }
}

/// Lifecycle status of the two model slots.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<BTreeMap<String, ModelMetadata>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One slot per model, named after the configured repos.
    pub fn from_config(config: &StudioConfig) -> Self {
        let (sentiment_repo, generator_repo) = match config.backend {
            BackendKind::Candle => (config.sentiment.repo.as_str(), config.generator.repo.as_str()),
            BackendKind::Dummy => ("dummy", "dummy"),
        };

        let registry = Self::new();
        registry.register(ModelMetadata::new(SENTIMENT_SLOT, sentiment_repo));
        registry.register(ModelMetadata::new(GENERATOR_SLOT, generator_repo));
        registry
    }

    pub fn register(&self, meta: ModelMetadata) {
        self.models.write().insert(meta.name.clone(), meta);
    }

    pub fn list_models(&self) -> Vec<ModelMetadata> {
        let guard = self.models.read();
        guard.values().cloned().collect()
    }

    pub fn set_status(&self, name: &str, status: ModelStatus) -> Option<ModelMetadata> {
        let mut guard = self.models.write();
        if let Some(meta) = guard.get_mut(name) {
            meta.status = status;
            meta.last_updated = Some(SystemTime::now());
            return Some(meta.clone());
        }
        None
    }

    pub fn get_model(&self, name: &str) -> Option<ModelMetadata> {
        let guard = self.models.read();
        guard.get(name).cloned()
    }
}

//! Shared server state.

use std::sync::Arc;

use anyhow::{Context, Result};
use freshtag_core::{
    AppConfig, Database, MetricsRecorder, Schema, TagGenerator, TagStore, UserStore, ValidationEngine,
};

/// Everything a tool call needs, cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserStore,
    pub engine: ValidationEngine,
}

impl AppState {
    /// Open the entity database and the configured tag store.
    ///
    /// A tag store that cannot be reached does not fail startup; the engine
    /// then runs uncached.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let strategy = config.tag_strategy;

        let db = Database::open(&config.db_path, Schema::Entities)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?;
        let tags = TagStore::connect(&config).await;
        let metrics = Arc::new(MetricsRecorder::new(config.metrics_history));

        tracing::info!(
            db_path = %config.db_path.display(),
            tag_store = tags.backend_name(),
            strategy = strategy.as_str(),
            "state initialized"
        );

        Ok(Self {
            users: UserStore::new(db),
            engine: ValidationEngine::new(tags, TagGenerator::new(strategy), metrics),
            config: Arc::new(config),
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        self.engine.metrics()
    }

    /// Close the tag store and the entity database.
    pub async fn disconnect(&self) {
        self.engine.tags().disconnect().await;
        self.users.database().close().await;
    }

    /// In-memory database and tag store with default settings.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let db = Database::open_in_memory(Schema::Entities).await.unwrap();
        Self {
            config: Arc::new(AppConfig::default()),
            users: UserStore::new(db),
            engine: ValidationEngine::new(
                TagStore::in_memory(),
                TagGenerator::default(),
                Arc::new(MetricsRecorder::default()),
            ),
        }
    }
}

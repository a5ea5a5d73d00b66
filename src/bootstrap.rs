//! # System Bootstrap
//!
//! Wires the registry, store adapters, router, intent log, coordinator, facade
//! and background reconciler from one [`FieldkitConfig`], and owns their
//! lifecycle.
//!
//! ```no_run
//! # async fn example() -> fieldkit_core::FieldkitResult<()> {
//! use fieldkit_core::bootstrap::FieldkitSystem;
//! use fieldkit_core::config::ConfigManager;
//!
//! let manager = ConfigManager::load()?;
//! let mut system = FieldkitSystem::bootstrap(manager).await?;
//! let routes = system.facade().describe_routes();
//! # let _ = routes;
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::api::DataService;
use crate::config::{ConfigManager, FieldkitConfig, IntentLogBackend};
use crate::consistency::{
    ConsistencyCoordinator, FileIntentLog, IntentLog, MemoryIntentLog, ReconcileReport, Reconciler,
    ReconcilerHandle,
};
use crate::error::{FieldkitError, FieldkitResult};
use crate::facade::UnifiedQueryFacade;
use crate::guards::RotationGuard;
use crate::registry::DomainModelRegistry;
use crate::routing::StoreRouter;
use crate::stores::{
    MemoryBlobStore, MemorySearchStore, MemoryStructuredStore, MemoryTimeSeriesStore, StoreAdapter,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle snapshot for operators
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub environment: String,
    pub intent_log: &'static str,
    pub reconciler_running: bool,
    pub entity_types: usize,
    pub stores: usize,
}

pub struct FieldkitSystem {
    config_manager: Arc<ConfigManager>,
    registry: Arc<DomainModelRegistry>,
    coordinator: Arc<ConsistencyCoordinator>,
    facade: Arc<UnifiedQueryFacade>,
    reconciler: Reconciler,
    reconciler_handle: Option<ReconcilerHandle>,
}

impl FieldkitSystem {
    /// Bootstrap over the in-memory reference adapters
    pub async fn bootstrap(config_manager: Arc<ConfigManager>) -> FieldkitResult<Self> {
        let config = config_manager.config();
        let adapters: Vec<Arc<dyn StoreAdapter>> = vec![
            Arc::new(MemoryStructuredStore::new()),
            Arc::new(MemorySearchStore::new()),
            Arc::new(MemoryTimeSeriesStore::new()),
            Arc::new(MemoryBlobStore::new(config.stores.max_blob_bytes)),
        ];
        Self::bootstrap_with_adapters(config_manager, adapters).await
    }

    /// Bootstrap over caller-supplied adapters, one per store category
    pub async fn bootstrap_with_adapters(
        config_manager: Arc<ConfigManager>,
        adapters: Vec<Arc<dyn StoreAdapter>>,
    ) -> FieldkitResult<Self> {
        let config = config_manager.config().clone();
        info!(
            "🚀 BOOTSTRAP: Starting data-access layer for environment: {}",
            config_manager.environment()
        );

        let registry = Arc::new(DomainModelRegistry::with_farm_defaults()?);
        info!(
            "✅ BOOTSTRAP: Registry loaded with {} entity types",
            registry.len()
        );

        let router = adapters
            .into_iter()
            .fold(StoreRouter::builder(registry.clone()), |builder, adapter| {
                builder.adapter(adapter)
            })
            .store_config(&config.stores)
            .build()?;
        let router = Arc::new(router);

        let intent_log = Self::open_intent_log(&config).await?;
        info!("✅ BOOTSTRAP: Intent log backend: {}", intent_log.backend());

        let coordinator = Arc::new(ConsistencyCoordinator::from_config(
            router,
            intent_log,
            &config.consistency,
            &config.backoff,
        ));
        let facade = Arc::new(
            UnifiedQueryFacade::new(coordinator.clone(), config.query.clone())
                .with_guard(Arc::new(RotationGuard::from_config(&config.rotation))),
        );
        let reconciler = Reconciler::new(coordinator.clone(), config.consistency.poll_interval())
            .with_retention(config.consistency.completed_retention());

        // Resume whatever a previous process left pending before taking new writes
        let recovered = reconciler.reconcile_all().await?;
        if recovered.attempted > 0 {
            info!(
                "🔁 BOOTSTRAP: Recovered {} pending intents ({} completed, {} still pending)",
                recovered.attempted, recovered.completed, recovered.still_pending
            );
        }

        let reconciler_handle = if config.consistency.reconciler_enabled {
            Some(reconciler.clone().spawn())
        } else {
            info!("📋 BOOTSTRAP: Reconciler not started - manual control mode");
            None
        };

        info!("🎉 BOOTSTRAP: Data-access layer ready");
        Ok(Self {
            config_manager,
            registry,
            coordinator,
            facade,
            reconciler,
            reconciler_handle,
        })
    }

    async fn open_intent_log(config: &FieldkitConfig) -> FieldkitResult<Arc<dyn IntentLog>> {
        let settings = &config.consistency.intent_log;
        let log: Arc<dyn IntentLog> = match settings.backend {
            IntentLogBackend::Memory => {
                warn!("In-memory intent log: pending intents will not survive a restart");
                Arc::new(MemoryIntentLog::new())
            }
            IntentLogBackend::File => {
                let path = settings.path.as_ref().ok_or_else(|| {
                    FieldkitError::Validation("intent log backend 'file' requires a path".into())
                })?;
                Arc::new(FileIntentLog::open(path, settings.sync_writes).await?)
            }
            #[cfg(feature = "postgres")]
            IntentLogBackend::Postgres => {
                let url = settings.database_url.as_deref().ok_or_else(|| {
                    FieldkitError::Validation(
                        "intent log backend 'postgres' requires a database_url".into(),
                    )
                })?;
                Arc::new(crate::consistency::PgIntentLog::connect(url).await?)
            }
            #[cfg(not(feature = "postgres"))]
            IntentLogBackend::Postgres => {
                return Err(FieldkitError::Validation(
                    "intent log backend 'postgres' requires the 'postgres' feature".into(),
                ))
            }
        };
        Ok(log)
    }

    pub fn config(&self) -> &FieldkitConfig {
        self.config_manager.config()
    }

    pub fn registry(&self) -> &Arc<DomainModelRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<ConsistencyCoordinator> {
        &self.coordinator
    }

    pub fn facade(&self) -> &Arc<UnifiedQueryFacade> {
        &self.facade
    }

    pub fn data_service(&self) -> DataService {
        DataService::new(self.facade.clone())
    }

    /// Run one reconciliation pass now, ignoring backoff
    pub async fn reconcile_now(&self) -> FieldkitResult<ReconcileReport> {
        self.reconciler.reconcile_all().await
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            environment: self.config_manager.environment().to_string(),
            intent_log: self.coordinator.intent_log().backend(),
            reconciler_running: self
                .reconciler_handle
                .as_ref()
                .is_some_and(ReconcilerHandle::is_running),
            entity_types: self.registry.len(),
            stores: self.coordinator.router().handles().len(),
        }
    }

    /// Stop the reconciler. Pending intents stay in the log for the next start.
    pub async fn shutdown(&mut self) -> FieldkitResult<()> {
        if let Some(mut handle) = self.reconciler_handle.take() {
            handle.shutdown().await?;
            info!("🛑 Data-access layer shut down");
        } else {
            warn!("Data-access layer already stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DomainEntity, Plant};

    #[tokio::test]
    async fn test_bootstrap_with_defaults_serves_writes() {
        let manager = ConfigManager::from_config(FieldkitConfig::default(), "test").unwrap();
        let mut system = FieldkitSystem::bootstrap(manager).await.unwrap();

        let status = system.status();
        assert!(status.reconciler_running);
        assert_eq!(status.intent_log, "memory");
        assert_eq!(status.stores, 4);

        let tomato = Plant::new("Tomato", "Solanaceae");
        let receipt = system.facade().save(&tomato).await.unwrap();
        assert!(receipt.is_complete());
        let loaded: Plant = system.facade().load(tomato.id()).await.unwrap();
        assert_eq!(loaded, tomato);

        system.shutdown().await.unwrap();
        assert!(!system.status().reconciler_running);
    }

    #[tokio::test]
    async fn test_file_backend_is_opened_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = FieldkitConfig::default();
        config.consistency.reconciler_enabled = false;
        config.consistency.intent_log.backend = IntentLogBackend::File;
        config.consistency.intent_log.path = Some(dir.path().join("intents.jsonl"));
        let manager = ConfigManager::from_config(config, "test").unwrap();

        let system = FieldkitSystem::bootstrap(manager).await.unwrap();
        assert_eq!(system.status().intent_log, "file");
        assert!(!system.status().reconciler_running);
    }
}

use super::flaky_store::FlakyStore;
use crate::config::FieldkitConfig;
use crate::consistency::{ConsistencyCoordinator, IntentLog, MemoryIntentLog, Reconciler};
use crate::error::FieldkitResult;
use crate::facade::UnifiedQueryFacade;
use crate::guards::RotationGuard;
use crate::registry::DomainModelRegistry;
use crate::routing::StoreRouter;
use crate::stores::{
    MemoryBlobStore, MemorySearchStore, MemoryStructuredStore, MemoryTimeSeriesStore,
    StoreAdapter, StoreCategory,
};
use std::sync::Arc;

/// One fault-injecting wrapper per store category around the in-memory adapters
#[derive(Debug, Clone)]
pub struct FlakyStores {
    pub structured: Arc<FlakyStore>,
    pub search: Arc<FlakyStore>,
    pub timeseries: Arc<FlakyStore>,
    pub blob: Arc<FlakyStore>,
}

impl FlakyStores {
    pub fn new(max_blob_bytes: usize) -> Self {
        Self {
            structured: Arc::new(FlakyStore::new(Arc::new(MemoryStructuredStore::new()))),
            search: Arc::new(FlakyStore::new(Arc::new(MemorySearchStore::new()))),
            timeseries: Arc::new(FlakyStore::new(Arc::new(MemoryTimeSeriesStore::new()))),
            blob: Arc::new(FlakyStore::new(Arc::new(MemoryBlobStore::new(max_blob_bytes)))),
        }
    }

    pub fn get(&self, category: StoreCategory) -> &Arc<FlakyStore> {
        match category {
            StoreCategory::Structured => &self.structured,
            StoreCategory::Search => &self.search,
            StoreCategory::TimeSeries => &self.timeseries,
            StoreCategory::Blob => &self.blob,
        }
    }

    pub fn adapters(&self) -> Vec<Arc<dyn StoreAdapter>> {
        StoreCategory::ALL
            .iter()
            .map(|category| self.get(*category).clone() as Arc<dyn StoreAdapter>)
            .collect()
    }

    pub fn heal_all(&self) {
        for category in StoreCategory::ALL {
            self.get(category).heal();
        }
    }
}

/// Settings that keep fault tests fast: short store timeouts and backoff
pub fn test_config() -> FieldkitConfig {
    let mut config = FieldkitConfig::default();
    config.stores.default_timeout_ms = 200;
    config.consistency.max_attempts = 3;
    config.consistency.reconciler_poll_interval_ms = 20;
    config.backoff.base_delay_ms = 10;
    config.backoff.max_delay_ms = 50;
    config
}

/// Fully wired in-memory system over [`FlakyStores`], without a running reconciler
pub struct TestHarness {
    pub config: FieldkitConfig,
    pub stores: FlakyStores,
    pub registry: Arc<DomainModelRegistry>,
    pub router: Arc<StoreRouter>,
    pub intent_log: Arc<dyn IntentLog>,
    pub coordinator: Arc<ConsistencyCoordinator>,
    pub facade: Arc<UnifiedQueryFacade>,
    pub reconciler: Reconciler,
}

impl TestHarness {
    pub fn new() -> FieldkitResult<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: FieldkitConfig) -> FieldkitResult<Self> {
        Self::with_intent_log(config, Arc::new(MemoryIntentLog::new()))
    }

    pub fn with_intent_log(
        config: FieldkitConfig,
        intent_log: Arc<dyn IntentLog>,
    ) -> FieldkitResult<Self> {
        let stores = FlakyStores::new(config.stores.max_blob_bytes);
        Self::with_stores(config, stores, intent_log)
    }

    /// Build over existing stores, e.g. to simulate a restart with a reopened log
    pub fn with_stores(
        config: FieldkitConfig,
        stores: FlakyStores,
        intent_log: Arc<dyn IntentLog>,
    ) -> FieldkitResult<Self> {
        let registry = Arc::new(DomainModelRegistry::with_farm_defaults()?);
        let router = stores
            .adapters()
            .into_iter()
            .fold(StoreRouter::builder(registry.clone()), |builder, adapter| {
                builder.adapter(adapter)
            })
            .store_config(&config.stores)
            .build()?;
        let router = Arc::new(router);

        let coordinator = Arc::new(ConsistencyCoordinator::from_config(
            router.clone(),
            intent_log.clone(),
            &config.consistency,
            &config.backoff,
        ));
        let facade = Arc::new(
            UnifiedQueryFacade::new(coordinator.clone(), config.query.clone())
                .with_guard(Arc::new(RotationGuard::from_config(&config.rotation))),
        );
        let reconciler = Reconciler::new(coordinator.clone(), config.consistency.poll_interval())
            .with_retention(config.consistency.completed_retention());

        Ok(Self {
            config,
            stores,
            registry,
            router,
            intent_log,
            coordinator,
            facade,
            reconciler,
        })
    }
}

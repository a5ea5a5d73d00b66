//! # Store Router
//!
//! Maps `(entity type, attribute)` to the adapter that owns it. Routing is a pure
//! lookup over the registry's decomposition plans and the adapter table, so it
//! is deterministic and total for every attribute of a registered entity type.

use super::errors::{RoutingError, RoutingResult};
use super::handle::StoreHandle;
use crate::config::StoreConfig;
use crate::models::{Attributes, EntityType};
use crate::registry::{DecompositionPlan, DomainModelRegistry};
use crate::stores::{StoreAdapter, StoreCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Slice of a write destined for one store
#[derive(Debug, Clone, PartialEq)]
pub struct SubWrite {
    pub category: StoreCategory,
    pub attributes: Attributes,
}

/// One row of the route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescription {
    pub entity_type: EntityType,
    pub category: StoreCategory,
    pub adapter: String,
    pub attributes: Vec<String>,
}

#[derive(Debug)]
pub struct StoreRouter {
    registry: Arc<DomainModelRegistry>,
    handles: BTreeMap<StoreCategory, StoreHandle>,
}

impl StoreRouter {
    pub fn builder(registry: Arc<DomainModelRegistry>) -> StoreRouterBuilder {
        StoreRouterBuilder {
            registry,
            adapters: BTreeMap::new(),
            default_timeout: Duration::from_millis(
                crate::constants::system::DEFAULT_STORE_TIMEOUT_MS,
            ),
            timeouts: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<DomainModelRegistry> {
        &self.registry
    }

    pub fn plan(&self, entity_type: &EntityType) -> RoutingResult<Arc<DecompositionPlan>> {
        self.registry
            .get(entity_type)
            .ok_or_else(|| RoutingError::UnknownEntityType(entity_type.to_string()))
    }

    /// Adapter handle for one attribute of one entity type
    pub fn route(&self, entity_type: &EntityType, attribute: &str) -> RoutingResult<StoreHandle> {
        let plan = self.plan(entity_type)?;
        let category =
            plan.category_of(attribute)
                .ok_or_else(|| RoutingError::UnknownAttribute {
                    entity_type: entity_type.clone(),
                    attribute: attribute.to_string(),
                })?;
        self.handle(category)
    }

    pub fn handle(&self, category: StoreCategory) -> RoutingResult<StoreHandle> {
        self.handles
            .get(&category)
            .cloned()
            .ok_or(RoutingError::NoAdapter(category))
    }

    /// Every registered adapter, in fixed store order
    pub fn handles(&self) -> Vec<StoreHandle> {
        self.handles.values().cloned().collect()
    }

    /// Split a (partial) record into per-store sub-writes, in fixed store order
    pub fn route_write(
        &self,
        entity_type: &EntityType,
        attributes: &Attributes,
    ) -> RoutingResult<Vec<SubWrite>> {
        let plan = self.plan(entity_type)?;
        let mut groups: BTreeMap<StoreCategory, Attributes> = BTreeMap::new();
        for (name, value) in attributes {
            let category =
                plan.category_of(name)
                    .ok_or_else(|| RoutingError::UnknownAttribute {
                        entity_type: entity_type.clone(),
                        attribute: name.clone(),
                    })?;
            groups
                .entry(category)
                .or_default()
                .insert(name.clone(), value.clone());
        }

        groups
            .into_iter()
            .map(|(category, attributes)| {
                self.handle(category)?;
                Ok(SubWrite {
                    category,
                    attributes,
                })
            })
            .collect()
    }

    /// Check that every category used by a registered entity type has an adapter
    pub fn validate(&self) -> RoutingResult<()> {
        for plan in self.registry.plans() {
            for category in plan.categories() {
                if !self.handles.contains_key(&category) {
                    warn!(
                        entity_type = %plan.entity_type,
                        store = %category,
                        "Entity type routes to a store with no adapter"
                    );
                    return Err(RoutingError::NoAdapter(category));
                }
            }
        }
        Ok(())
    }

    /// Route table: entity type -> store -> attributes
    pub fn describe(&self) -> Vec<RouteDescription> {
        self.registry
            .plans()
            .iter()
            .flat_map(|plan| {
                plan.groups.iter().map(move |(category, attributes)| RouteDescription {
                    entity_type: plan.entity_type.clone(),
                    category: *category,
                    adapter: self
                        .handles
                        .get(category)
                        .map(|h| h.adapter_name().to_string())
                        .unwrap_or_else(|| "<unassigned>".to_string()),
                    attributes: attributes.clone(),
                })
            })
            .collect()
    }
}

pub struct StoreRouterBuilder {
    registry: Arc<DomainModelRegistry>,
    adapters: BTreeMap<StoreCategory, Arc<dyn StoreAdapter>>,
    default_timeout: Duration,
    timeouts: BTreeMap<StoreCategory, Duration>,
}

impl StoreRouterBuilder {
    /// Register an adapter under its own category, replacing any previous one
    pub fn adapter(mut self, adapter: Arc<dyn StoreAdapter>) -> Self {
        if let Some(previous) = self.adapters.insert(adapter.category(), adapter) {
            warn!(replaced = previous.name(), "Store adapter replaced");
        }
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn timeout(mut self, category: StoreCategory, timeout: Duration) -> Self {
        self.timeouts.insert(category, timeout);
        self
    }

    pub fn store_config(mut self, config: &StoreConfig) -> Self {
        self.default_timeout = Duration::from_millis(config.default_timeout_ms);
        for category in StoreCategory::ALL {
            if config.timeouts_ms.contains_key(&category) {
                self.timeouts.insert(category, config.timeout_for(category));
            }
        }
        self
    }

    /// Build and validate the router
    pub fn build(self) -> RoutingResult<StoreRouter> {
        let handles = self
            .adapters
            .into_iter()
            .map(|(category, adapter)| {
                let timeout = self
                    .timeouts
                    .get(&category)
                    .copied()
                    .unwrap_or(self.default_timeout);
                (category, StoreHandle::new(adapter, timeout))
            })
            .collect();
        let router = StoreRouter {
            registry: self.registry,
            handles,
        };
        router.validate()?;
        info!(
            stores = router.handles.len(),
            entity_types = router.registry.len(),
            "🧭 Store router ready"
        );
        Ok(router)
    }
}

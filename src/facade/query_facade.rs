//! # Unified Query Facade
//!
//! The single entry point callers use for farm entities. Reads fan out to every
//! store concurrently and merge; writes are validated, guarded, decomposed and
//! handed to the consistency coordinator.
//!
//! ## Usage
//!
//! ```rust
//! use fieldkit_core::models::{Observation, Plant};
//! use fieldkit_core::test_helpers::TestHarness;
//!
//! # tokio_test::block_on(async {
//! let harness = TestHarness::new().unwrap();
//! let facade = &harness.facade;
//!
//! let kale = Plant::new("Kale", "Brassicaceae").with_description("curly winter kale");
//! let receipt = facade.save(&kale).await.unwrap();
//! assert!(receipt.is_complete());
//!
//! // Structured attributes come back on search hits
//! facade.save(&Observation::new("sam", "slugs on the winter kale")).await.unwrap();
//! let hits = facade.search("kale", None).await.unwrap();
//! assert_eq!(hits.len(), 2);
//!
//! let loaded: Plant = facade.load(kale.id).await.unwrap();
//! assert_eq!(loaded.family, "Brassicaceae");
//! # });
//! ```

use super::view::{EntityView, Page};
use crate::config::QueryConfig;
use crate::consistency::{ConsistencyCoordinator, WriteReceipt};
use crate::constants::attributes::{FIELD_ID, ID};
use crate::error::{FieldkitError, FieldkitResult};
use crate::guards::{GuardContext, WriteGuard};
use crate::models::{Attributes, DomainEntity, EntityId, EntityType, PlantingEvent, StoreRecord};
use crate::registry::DomainModelRegistry;
use crate::routing::{RouteDescription, StoreHandle, StoreRouter};
use crate::stores::{StoreCategory, StoreFilter};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

#[derive(Debug)]
pub struct UnifiedQueryFacade {
    router: Arc<StoreRouter>,
    coordinator: Arc<ConsistencyCoordinator>,
    guards: Vec<Arc<dyn WriteGuard>>,
    guard_locks: DashMap<String, Arc<Mutex<()>>>,
    config: QueryConfig,
}

impl UnifiedQueryFacade {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>, config: QueryConfig) -> Self {
        Self {
            router: coordinator.router().clone(),
            coordinator,
            guards: Vec::new(),
            guard_locks: DashMap::new(),
            config,
        }
    }

    pub fn with_guard(mut self, guard: Arc<dyn WriteGuard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn router(&self) -> &Arc<StoreRouter> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<DomainModelRegistry> {
        self.router.registry()
    }

    pub fn coordinator(&self) -> &Arc<ConsistencyCoordinator> {
        &self.coordinator
    }

    /// Merge every store's record for `entity_id` into one view.
    ///
    /// Never fails because a store is down: the store is listed in
    /// `unavailable_stores` instead.
    #[instrument(skip_all, fields(entity_id = %entity_id))]
    pub async fn read(&self, entity_id: EntityId) -> FieldkitResult<EntityView> {
        let handles = self.router.handles();
        let results = join_all(handles.iter().map(|handle| handle.get(entity_id))).await;

        let mut view = EntityView::empty(entity_id);
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(Some(record)) => self.absorb(&mut view, handle.category(), record),
                Ok(None) => {}
                Err(e) => {
                    warn!(entity_id = %entity_id, store = %handle.category(), error = %e, "Store unavailable during read");
                    view.unavailable_stores.push(handle.category());
                }
            }
        }
        Ok(view)
    }

    /// Take the attributes `store` owns for the record's type
    fn absorb(&self, view: &mut EntityView, store: StoreCategory, record: StoreRecord) {
        match &view.entity_type {
            None => view.entity_type = Some(record.entity_type.clone()),
            Some(existing) if *existing != record.entity_type => {
                warn!(
                    entity_id = %view.entity_id,
                    store = %store,
                    expected = %existing,
                    found = %record.entity_type,
                    "Store record type disagrees with other stores; ignoring it"
                );
                return;
            }
            Some(_) => {}
        }

        let plan = self.registry().get(&record.entity_type);
        for (name, value) in record.attributes {
            let owned = plan
                .as_ref()
                .map_or(true, |plan| plan.category_of(&name) == Some(store));
            if owned {
                view.attributes.insert(name, value);
            }
        }
        view.sources.push(store);
        view.updated_at = view.updated_at.max(Some(record.updated_at));
    }

    /// Validate, guard and submit a (partial) write.
    ///
    /// Returns once every store acknowledged or the remainder is queued on a
    /// PENDING intent; use [`WriteReceipt::into_result`] to treat the latter as
    /// an error.
    #[instrument(skip_all, fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn write(
        &self,
        entity_type: &EntityType,
        entity_id: EntityId,
        partial: Attributes,
    ) -> FieldkitResult<WriteReceipt> {
        self.router.plan(entity_type)?;
        if partial.is_empty() {
            return Err(FieldkitError::Validation(format!(
                "Write to {entity_type} {entity_id} carries no attributes"
            )));
        }
        if partial.contains_key(ID) {
            return Err(FieldkitError::Validation(
                "'id' is the entity key and cannot be written as an attribute".to_string(),
            ));
        }

        let guards: Vec<&Arc<dyn WriteGuard>> = self
            .guards
            .iter()
            .filter(|guard| guard.applies_to(entity_type))
            .collect();

        // Type changes and immutability are enforced by the coordinator under
        // the entity lock
        if guards.is_empty() {
            return self
                .coordinator
                .submit_put(entity_type, entity_id, &partial)
                .await;
        }

        let current = self.read(entity_id).await?;
        if current.is_found() && !current.is_type(entity_type) {
            return Err(FieldkitError::Validation(format!(
                "Entity {entity_id} already exists as {}",
                current.entity_type.as_ref().map(EntityType::as_str).unwrap_or_default()
            )));
        }

        let mut proposed = current.attributes;
        for (name, value) in &partial {
            proposed.insert(name.clone(), value.clone());
        }
        let context = GuardContext {
            entity_type,
            entity_id,
            proposed: &proposed,
            router: &self.router,
            intent_log: self.coordinator.intent_log().as_ref(),
        };

        let held = self.lock_guard_keys(&guards, &context).await;
        let receipt: FieldkitResult<WriteReceipt> = async {
            for guard in &guards {
                debug!(guard = guard.description(), "Checking write guard");
                guard.check(&context).await?;
            }
            self.coordinator
                .submit_put(entity_type, entity_id, &partial)
                .await
        }
        .await;
        drop(held);
        self.guard_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        receipt
    }

    /// Lock every guard serialization key, in sorted order
    async fn lock_guard_keys(
        &self,
        guards: &[&Arc<dyn WriteGuard>],
        context: &GuardContext<'_>,
    ) -> Vec<OwnedMutexGuard<()>> {
        let mut keys: Vec<String> = guards
            .iter()
            .filter_map(|guard| guard.serialization_key(context))
            .collect();
        keys.sort();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self.guard_locks.entry(key).or_default().clone();
            held.push(lock.lock_owned().await);
        }
        held
    }

    /// Full-text search, each hit expanded to its merged view. Best hits first.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: Option<usize>) -> FieldkitResult<Vec<EntityView>> {
        let handle = self.router.handle(StoreCategory::Search)?;
        let limit = limit.unwrap_or(self.config.search_limit);
        let hits = handle.query(&StoreFilter::text(query, limit)).await?;

        let views = join_all(hits.iter().map(|hit| self.read(hit.entity_id))).await;
        views.into_iter().collect()
    }

    /// Remove an entity from every store through a delete intent
    #[instrument(skip_all, fields(entity_id = %entity_id))]
    pub async fn delete(&self, entity_id: EntityId) -> FieldkitResult<WriteReceipt> {
        let view = self.read(entity_id).await?;
        let entity_type = match view.entity_type {
            Some(entity_type) => entity_type,
            None if view.is_incomplete() => {
                return Err(FieldkitError::IncompleteRead {
                    entity_id,
                    unavailable: view.unavailable_stores,
                })
            }
            None => return Err(FieldkitError::NotFound(entity_id)),
        };
        if self.router.plan(&entity_type)?.immutable {
            return Err(FieldkitError::Validation(format!(
                "{entity_type} {entity_id} is immutable once recorded"
            )));
        }
        self.coordinator.submit_delete(&entity_type, entity_id).await
    }

    /// Newest-first page of one entity type, `page_size` from configuration
    pub async fn list(&self, entity_type: &EntityType, page: usize) -> FieldkitResult<Page> {
        self.list_with_size(entity_type, page, self.config.page_size).await
    }

    #[instrument(skip_all, fields(entity_type = %entity_type))]
    pub async fn list_with_size(
        &self,
        entity_type: &EntityType,
        page: usize,
        page_size: usize,
    ) -> FieldkitResult<Page> {
        let page_size = page_size.max(1);
        let plan = self.router.plan(entity_type)?;
        let handles: Vec<StoreHandle> = plan
            .categories()
            .into_iter()
            .map(|category| self.router.handle(category))
            .collect::<Result<_, _>>()?;

        let filter = StoreFilter::entity_type(entity_type.clone());
        let results = join_all(handles.iter().map(|handle| handle.query(&filter))).await;

        let mut newest: HashMap<EntityId, DateTime<Utc>> = HashMap::new();
        let mut unavailable_stores = Vec::new();
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(records) => {
                    for record in records {
                        let seen = newest.entry(record.entity_id).or_insert(record.updated_at);
                        *seen = (*seen).max(record.updated_at);
                    }
                }
                Err(e) => {
                    warn!(store = %handle.category(), error = %e, "Store unavailable during listing");
                    unavailable_stores.push(handle.category());
                }
            }
        }

        let mut ordered: Vec<(EntityId, DateTime<Utc>)> = newest.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let total = ordered.len();
        let ids: Vec<EntityId> = ordered
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .map(|(id, _)| id)
            .collect();
        let items = join_all(ids.into_iter().map(|id| self.read(id)))
            .await
            .into_iter()
            .collect::<FieldkitResult<Vec<_>>>()?;

        let (prev_page, next_page) = Page::cursors(page, page_size, total);
        Ok(Page {
            entity_type: entity_type.clone(),
            page,
            page_size,
            total,
            items,
            prev_page,
            next_page,
            unavailable_stores,
        })
    }

    /// Validate and write a typed domain entity
    pub async fn save<T: DomainEntity>(&self, entity: &T) -> FieldkitResult<WriteReceipt> {
        entity.validate().map_err(FieldkitError::Validation)?;
        let attributes = entity.to_attributes()?;
        self.write(&T::entity_type(), entity.id(), attributes).await
    }

    /// Read a typed domain entity. Incomplete views are an error here since a
    /// struct cannot represent missing attribute groups.
    pub async fn load<T: DomainEntity>(&self, entity_id: EntityId) -> FieldkitResult<T> {
        let view = self.read(entity_id).await?;
        if view.is_incomplete() {
            return Err(FieldkitError::IncompleteRead {
                entity_id,
                unavailable: view.unavailable_stores,
            });
        }
        match &view.entity_type {
            None => return Err(FieldkitError::NotFound(entity_id)),
            Some(found) if found != T::ENTITY_TYPE => {
                return Err(FieldkitError::Validation(format!(
                    "Entity {entity_id} is a {found}, not a {}",
                    T::ENTITY_TYPE
                )))
            }
            Some(_) => {}
        }
        Ok(T::from_attributes(entity_id, &view.attributes)?)
    }

    /// Planting events of a field, oldest first
    pub async fn rotation_history(&self, field_id: EntityId) -> FieldkitResult<Vec<PlantingEvent>> {
        let entity_type = PlantingEvent::entity_type();
        let handle = self.router.route(&entity_type, FIELD_ID)?;
        let records = handle
            .query(&StoreFilter::attribute_equals(
                entity_type,
                FIELD_ID,
                serde_json::to_value(field_id)?,
            ))
            .await?;

        let mut events = join_all(
            records
                .iter()
                .map(|record| self.load::<PlantingEvent>(record.entity_id)),
        )
        .await
        .into_iter()
        .collect::<FieldkitResult<Vec<_>>>()?;
        events.sort_by_key(|event| (event.start_date, event.end_date));
        Ok(events)
    }

    /// Route table for operators
    pub fn describe_routes(&self) -> Vec<RouteDescription> {
        self.router.describe()
    }
}

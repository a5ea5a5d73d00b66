//! # Domain Model Registry
//!
//! Holds the canonical entity types and the store decomposition of each one.
//! Registration happens at startup; afterwards the registry is read-mostly and
//! shared behind an `Arc`.

use super::errors::{SchemaError, SchemaResult};
use super::schema::{DecompositionPlan, EntitySchema};
use crate::models::{farm_schemas, DomainEntity, EntityType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Registration {
    schema: EntitySchema,
    plan: Arc<DecompositionPlan>,
}

#[derive(Debug, Default)]
pub struct DomainModelRegistry {
    entries: RwLock<HashMap<EntityType, Registration>>,
}

impl DomainModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the seven farm entity types
    pub fn with_farm_defaults() -> SchemaResult<Self> {
        let registry = Self::new();
        for (entity_type, schema) in farm_schemas() {
            registry.register(entity_type, schema)?;
        }
        info!(
            entity_types = registry.len(),
            "📚 Domain model registry loaded with farm defaults"
        );
        Ok(registry)
    }

    /// Register an entity type's storage plan.
    ///
    /// Registering the same schema twice is a no-op; a different schema for an
    /// already registered type is rejected.
    pub fn register(
        &self,
        entity_type: impl Into<EntityType>,
        schema: EntitySchema,
    ) -> SchemaResult<Arc<DecompositionPlan>> {
        let entity_type = entity_type.into();
        validate_entity_type(&entity_type)?;
        schema.validate(&entity_type)?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&entity_type) {
            if existing.schema.normalized() == schema.normalized() {
                debug!(entity_type = %entity_type, "Identical schema re-registered");
                return Ok(Arc::clone(&existing.plan));
            }
            return Err(SchemaError::ConflictingRegistration {
                detail: describe_conflict(&existing.schema, &schema),
                entity_type,
            });
        }

        let plan = Arc::new(DecompositionPlan::from_schema(entity_type.clone(), &schema));
        debug!(
            entity_type = %entity_type,
            categories = ?plan.categories(),
            attributes = plan.attribute_count(),
            "Registered entity type"
        );
        entries.insert(
            entity_type,
            Registration {
                schema,
                plan: Arc::clone(&plan),
            },
        );
        Ok(plan)
    }

    pub fn register_entity<T: DomainEntity>(&self) -> SchemaResult<Arc<DecompositionPlan>> {
        self.register(T::entity_type(), T::schema())
    }

    /// Decomposition plan for `entity_type`, if registered
    pub fn get(&self, entity_type: &EntityType) -> Option<Arc<DecompositionPlan>> {
        self.entries
            .read()
            .get(entity_type)
            .map(|r| Arc::clone(&r.plan))
    }

    pub fn schema(&self, entity_type: &EntityType) -> Option<EntitySchema> {
        self.entries.read().get(entity_type).map(|r| r.schema.clone())
    }

    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.entries.read().contains_key(entity_type)
    }

    /// Registered entity types, sorted by name
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.entries.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn plans(&self) -> Vec<Arc<DecompositionPlan>> {
        self.entity_types()
            .iter()
            .filter_map(|t| self.get(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_entity_type(entity_type: &EntityType) -> SchemaResult<()> {
    let name = entity_type.as_str();
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidEntityType(name.to_string()))
    }
}

fn describe_conflict(existing: &EntitySchema, proposed: &EntitySchema) -> String {
    let existing = existing.normalized();
    let proposed = proposed.normalized();
    if existing.immutable != proposed.immutable {
        return format!(
            "immutable flag differs ({} vs {})",
            existing.immutable, proposed.immutable
        );
    }
    let changed: Vec<String> = proposed
        .attributes
        .iter()
        .filter(|spec| !existing.attributes.contains(spec))
        .map(|spec| format!("{} -> {}", spec.name, spec.category))
        .chain(
            existing
                .attributes
                .iter()
                .filter(|spec| !proposed.attributes.iter().any(|p| p.name == spec.name))
                .map(|spec| format!("{} removed", spec.name)),
        )
        .collect();
    changed.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::StoreCategory;

    #[test]
    fn test_invalid_entity_type_names() {
        let registry = DomainModelRegistry::new();
        let schema = EntitySchema::builder().structured(&["a"]).build();
        for bad in ["", "Field", "9field", "field-type"] {
            assert!(matches!(
                registry.register(bad, schema.clone()),
                Err(SchemaError::InvalidEntityType(_))
            ));
        }
    }

    #[test]
    fn test_conflict_detail_names_the_moved_attribute() {
        let registry = DomainModelRegistry::new();
        registry
            .register("plant", EntitySchema::builder().structured(&["name"]).search(&["description"]).build())
            .unwrap();

        let err = registry
            .register("plant", EntitySchema::builder().structured(&["name", "description"]).build())
            .unwrap_err();
        match err {
            SchemaError::ConflictingRegistration { detail, .. } => {
                assert!(detail.contains("description -> structured"), "{detail}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            registry.get(&EntityType::new("plant")).unwrap().category_of("description"),
            Some(StoreCategory::Search)
        );
    }
}

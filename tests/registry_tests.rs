//! Domain model registry tests

use fieldkit_core::constants::entity_types;
use fieldkit_core::models::{DomainEntity, EntityType, Field, WeatherSample};
use fieldkit_core::registry::{DomainModelRegistry, EntitySchema, SchemaError};
use fieldkit_core::stores::StoreCategory;

#[test]
fn farm_defaults_register_every_builtin_type() {
    let registry = DomainModelRegistry::with_farm_defaults().unwrap();

    assert_eq!(registry.len(), entity_types::ALL.len());
    for name in entity_types::ALL {
        assert!(
            registry.get(&EntityType::new(name)).is_some(),
            "{name} should be registered"
        );
    }
}

#[test]
fn plan_assigns_each_attribute_to_exactly_one_store() {
    let registry = DomainModelRegistry::with_farm_defaults().unwrap();

    for plan in registry.plans() {
        let mut seen = std::collections::HashSet::new();
        for category in plan.categories() {
            for attribute in plan.attributes_in(category) {
                assert!(
                    seen.insert(attribute.clone()),
                    "{attribute} of {} appears in more than one store",
                    plan.entity_type
                );
                assert_eq!(plan.category_of(attribute), Some(category));
            }
        }
        assert_eq!(seen.len(), plan.attribute_count());
    }
}

#[test]
fn field_plan_splits_structured_and_search() {
    let registry = DomainModelRegistry::with_farm_defaults().unwrap();
    let plan = registry.get(&Field::entity_type()).unwrap();

    assert_eq!(plan.category_of("name"), Some(StoreCategory::Structured));
    assert_eq!(plan.category_of("boundary"), Some(StoreCategory::Structured));
    assert_eq!(plan.category_of("notes"), Some(StoreCategory::Search));
    assert_eq!(plan.category_of("id"), None);
    assert!(!plan.immutable);
}

#[test]
fn weather_samples_are_immutable_time_series() {
    let registry = DomainModelRegistry::with_farm_defaults().unwrap();
    let plan = registry.get(&WeatherSample::entity_type()).unwrap();

    assert!(plan.immutable);
    assert_eq!(plan.categories(), vec![StoreCategory::TimeSeries]);
}

#[test]
fn identical_registration_is_idempotent() {
    let registry = DomainModelRegistry::new();
    let schema = EntitySchema::builder()
        .structured(&["name", "acres"])
        .search(&["notes"])
        .build();

    let first = registry.register("orchard", schema.clone()).unwrap();
    let second = registry.register("orchard", schema).unwrap();

    assert_eq!(first.groups, second.groups);
    assert_eq!(registry.len(), 1);
}

#[test]
fn conflicting_registration_is_rejected() {
    let registry = DomainModelRegistry::new();
    registry
        .register("orchard", EntitySchema::builder().structured(&["name"]).build())
        .unwrap();

    let result = registry.register("orchard", EntitySchema::builder().search(&["name"]).build());

    assert!(matches!(
        result,
        Err(SchemaError::ConflictingRegistration { .. })
    ));
    let plan = registry.get(&EntityType::new("orchard")).unwrap();
    assert_eq!(plan.category_of("name"), Some(StoreCategory::Structured));
}

#[test]
fn empty_schema_is_rejected() {
    let registry = DomainModelRegistry::new();
    let result = registry.register("nothing", EntitySchema::builder().build());

    assert!(matches!(result, Err(SchemaError::EmptySchema(_))));
    assert!(registry.is_empty());
}

#[test]
fn attribute_in_two_stores_is_rejected() {
    let registry = DomainModelRegistry::new();
    let schema = EntitySchema::builder()
        .structured(&["label"])
        .search(&["label"])
        .build();

    assert!(matches!(
        registry.register("tag", schema),
        Err(SchemaError::DuplicateAttribute { .. })
    ));
}

//! Entity schemas and the decomposition plans derived from them.

use super::errors::{SchemaError, SchemaResult};
use crate::constants::attributes::ID;
use crate::models::EntityType;
use crate::stores::StoreCategory;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub category: StoreCategory,
}

/// Which store category each attribute of an entity type lives in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntitySchema {
    pub attributes: Vec<AttributeSpec>,
    /// Existing entities of this type reject further writes
    #[serde(default)]
    pub immutable: bool,
}

impl EntitySchema {
    pub fn builder() -> EntitySchemaBuilder {
        EntitySchemaBuilder::default()
    }

    /// Attributes sorted by name, so declaration order does not matter when comparing
    pub fn normalized(&self) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.sort_by(|a, b| a.name.cmp(&b.name).then(a.category.cmp(&b.category)));
        attributes.dedup();
        Self {
            attributes,
            immutable: self.immutable,
        }
    }

    pub fn validate(&self, entity_type: &EntityType) -> SchemaResult<()> {
        if self.attributes.is_empty() {
            return Err(SchemaError::EmptySchema(entity_type.clone()));
        }

        let mut seen: HashMap<&str, StoreCategory> = HashMap::new();
        for spec in &self.attributes {
            let valid_name = !spec.name.is_empty()
                && spec.name != ID
                && spec
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid_name {
                return Err(SchemaError::InvalidAttributeName {
                    entity_type: entity_type.clone(),
                    attribute: spec.name.clone(),
                });
            }
            if let Some(first) = seen.insert(&spec.name, spec.category) {
                if first != spec.category {
                    return Err(SchemaError::DuplicateAttribute {
                        entity_type: entity_type.clone(),
                        attribute: spec.name.clone(),
                        first,
                        second: spec.category,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EntitySchemaBuilder {
    attributes: Vec<AttributeSpec>,
    immutable: bool,
}

impl EntitySchemaBuilder {
    pub fn attribute(mut self, name: impl Into<String>, category: StoreCategory) -> Self {
        self.attributes.push(AttributeSpec {
            name: name.into(),
            category,
        });
        self
    }

    fn many(mut self, names: &[&str], category: StoreCategory) -> Self {
        for name in names {
            self = self.attribute(*name, category);
        }
        self
    }

    pub fn structured(self, names: &[&str]) -> Self {
        self.many(names, StoreCategory::Structured)
    }

    pub fn search(self, names: &[&str]) -> Self {
        self.many(names, StoreCategory::Search)
    }

    pub fn timeseries(self, names: &[&str]) -> Self {
        self.many(names, StoreCategory::TimeSeries)
    }

    pub fn blob(self, names: &[&str]) -> Self {
        self.many(names, StoreCategory::Blob)
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn build(self) -> EntitySchema {
        EntitySchema {
            attributes: self.attributes,
            immutable: self.immutable,
        }
    }
}

/// Registry output for one entity type: attribute groups per store category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecompositionPlan {
    pub entity_type: EntityType,
    /// Keyed by category, so iteration follows the fixed store order
    pub groups: BTreeMap<StoreCategory, Vec<String>>,
    pub immutable: bool,
    #[serde(skip)]
    index: HashMap<String, StoreCategory>,
}

impl DecompositionPlan {
    /// Build a plan from a schema that already passed [`EntitySchema::validate`]
    pub(crate) fn from_schema(entity_type: EntityType, schema: &EntitySchema) -> Self {
        let normalized = schema.normalized();
        let mut groups: BTreeMap<StoreCategory, Vec<String>> = BTreeMap::new();
        let mut index = HashMap::new();
        for spec in &normalized.attributes {
            groups
                .entry(spec.category)
                .or_default()
                .push(spec.name.clone());
            index.insert(spec.name.clone(), spec.category);
        }
        Self {
            entity_type,
            groups,
            immutable: normalized.immutable,
            index,
        }
    }

    pub fn category_of(&self, attribute: &str) -> Option<StoreCategory> {
        self.index.get(attribute).copied()
    }

    /// Categories this entity type touches, in fixed store order
    pub fn categories(&self) -> Vec<StoreCategory> {
        self.groups.keys().copied().collect()
    }

    pub fn attributes_in(&self, category: StoreCategory) -> &[String] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attribute_count(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.index.contains_key(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_groups_follow_fixed_store_order() {
        let schema = EntitySchema::builder()
            .blob(&["content"])
            .search(&["caption"])
            .structured(&["filename"])
            .build();
        let plan = DecompositionPlan::from_schema(EntityType::new("document"), &schema);

        assert_eq!(
            plan.categories(),
            vec![StoreCategory::Structured, StoreCategory::Search, StoreCategory::Blob]
        );
        assert_eq!(plan.category_of("caption"), Some(StoreCategory::Search));
        assert_eq!(plan.category_of("nope"), None);
    }

    #[test]
    fn test_validate_rejects_bad_names_and_duplicates() {
        let ty = EntityType::new("thing");
        let reserved = EntitySchema::builder().structured(&["id"]).build();
        assert!(matches!(
            reserved.validate(&ty),
            Err(SchemaError::InvalidAttributeName { .. })
        ));

        let dup = EntitySchema::builder()
            .structured(&["notes"])
            .search(&["notes"])
            .build();
        assert!(matches!(
            dup.validate(&ty),
            Err(SchemaError::DuplicateAttribute { .. })
        ));

        assert!(matches!(
            EntitySchema::default().validate(&ty),
            Err(SchemaError::EmptySchema(_))
        ));
    }

    #[test]
    fn test_normalized_ignores_declaration_order() {
        let a = EntitySchema::builder().structured(&["a", "b"]).build();
        let b = EntitySchema::builder().structured(&["b", "a"]).build();
        assert_ne!(a, b);
        assert_eq!(a.normalized(), b.normalized());
    }
}

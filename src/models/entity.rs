//! # Domain Entity Trait
//!
//! Bridges the typed farm structs and the attribute maps the facade moves between
//! stores. An entity serializes to a flat attribute map (minus its `id`), and the
//! registry schema decides which store each attribute lands in.

use super::ids::{EntityId, EntityType};
use super::record::Attributes;
use crate::constants::attributes::ID;
use crate::registry::EntitySchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub trait DomainEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Registered entity type name
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> EntityId;

    /// Storage decomposition for this entity type
    fn schema() -> EntitySchema;

    /// Domain-level invariants checked before any write
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn entity_type() -> EntityType {
        EntityType::new(Self::ENTITY_TYPE)
    }

    fn to_attributes(&self) -> Result<Attributes, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove(ID);
                Ok(map)
            }
            other => Err(serde::ser::Error::custom(format!(
                "{} must serialize to an object, got {other}",
                Self::ENTITY_TYPE
            ))),
        }
    }

    fn from_attributes(id: EntityId, attributes: &Attributes) -> Result<Self, serde_json::Error> {
        let mut map = attributes.clone();
        map.insert(ID.to_string(), serde_json::to_value(id)?);
        serde_json::from_value(Value::Object(map))
    }
}

use crate::models::EntityType;
use crate::stores::StoreCategory;
use thiserror::Error;

/// Bad registry configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Entity type '{entity_type}' already registered with a different plan: {detail}")]
    ConflictingRegistration {
        entity_type: EntityType,
        detail: String,
    },

    #[error("Entity type name is invalid: '{0}'")]
    InvalidEntityType(String),

    #[error("Schema for '{0}' declares no attributes")]
    EmptySchema(EntityType),

    #[error("Schema for '{entity_type}' has an invalid attribute name '{attribute}'")]
    InvalidAttributeName {
        entity_type: EntityType,
        attribute: String,
    },

    #[error(
        "Schema for '{entity_type}' maps attribute '{attribute}' to both {first} and {second}"
    )]
    DuplicateAttribute {
        entity_type: EntityType,
        attribute: String,
        first: StoreCategory,
        second: StoreCategory,
    },
}

pub type SchemaResult<T> = Result<T, SchemaError>;

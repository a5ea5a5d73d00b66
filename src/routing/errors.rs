use crate::models::EntityType;
use crate::stores::StoreCategory;
use thiserror::Error;

/// A request that cannot be mapped onto a store. The request is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Entity type '{entity_type}' has no attribute '{attribute}'")]
    UnknownAttribute {
        entity_type: EntityType,
        attribute: String,
    },

    #[error("No adapter registered for the {0} store")]
    NoAdapter(StoreCategory),
}

pub type RoutingResult<T> = Result<T, RoutingError>;

use crate::models::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-agnostic query filter.
///
/// Adapters answer the variants that make sense for their technology and
/// reject the rest with [`StoreError::UnsupportedFilter`](super::StoreError).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreFilter {
    /// Every record of one entity type
    EntityType { entity_type: EntityType },
    /// Records whose attribute equals `value`
    AttributeEquals {
        #[serde(default)]
        entity_type: Option<EntityType>,
        attribute: String,
        value: Value,
    },
    /// Full-text match, best hits first
    Text { query: String, limit: usize },
    /// Records whose timestamp falls in `[from, to)`
    TimeRange {
        #[serde(default)]
        entity_type: Option<EntityType>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl StoreFilter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntityType { .. } => "entity_type",
            Self::AttributeEquals { .. } => "attribute_equals",
            Self::Text { .. } => "text",
            Self::TimeRange { .. } => "time_range",
        }
    }

    pub fn entity_type(entity_type: impl Into<EntityType>) -> Self {
        Self::EntityType {
            entity_type: entity_type.into(),
        }
    }

    pub fn attribute_equals(
        entity_type: impl Into<EntityType>,
        attribute: impl Into<String>,
        value: Value,
    ) -> Self {
        Self::AttributeEquals {
            entity_type: Some(entity_type.into()),
            attribute: attribute.into(),
            value,
        }
    }

    pub fn text(query: impl Into<String>, limit: usize) -> Self {
        Self::Text {
            query: query.into(),
            limit,
        }
    }

    /// Entity type restriction, if the variant carries one
    pub fn restricts_to(&self) -> Option<&EntityType> {
        match self {
            Self::EntityType { entity_type } => Some(entity_type),
            Self::AttributeEquals { entity_type, .. } | Self::TimeRange { entity_type, .. } => {
                entity_type.as_ref()
            }
            Self::Text { .. } => None,
        }
    }
}

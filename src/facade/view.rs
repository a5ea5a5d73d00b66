use crate::models::{Attributes, EntityId, EntityType};
use crate::stores::StoreCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical entity merged from its per-store records.
///
/// `unavailable_stores` lists stores that failed or timed out during the read;
/// their attribute groups are missing and the view is incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub entity_id: EntityId,
    /// `None` when no reachable store holds a record for the id
    pub entity_type: Option<EntityType>,
    pub attributes: Attributes,
    /// Stores that returned a record
    pub sources: Vec<StoreCategory>,
    pub unavailable_stores: Vec<StoreCategory>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityView {
    pub fn empty(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            entity_type: None,
            attributes: Attributes::new(),
            sources: Vec::new(),
            unavailable_stores: Vec::new(),
            updated_at: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.entity_type.is_some()
    }

    pub fn is_incomplete(&self) -> bool {
        !self.unavailable_stores.is_empty()
    }

    pub fn is_type(&self, entity_type: &EntityType) -> bool {
        self.entity_type.as_ref() == Some(entity_type)
    }
}

/// One page of a newest-first listing. Pages are numbered from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub entity_type: EntityType,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub items: Vec<EntityView>,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
    /// Stores that could not be listed; `total` may be short
    pub unavailable_stores: Vec<StoreCategory>,
}

impl Page {
    pub(crate) fn cursors(page: usize, page_size: usize, total: usize) -> (Option<usize>, Option<usize>) {
        let prev = page.checked_sub(1);
        let next = (total > (page + 1) * page_size).then_some(page + 1);
        (prev, next)
    }
}

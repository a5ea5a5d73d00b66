use super::entity::DomainEntity;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use serde::{Deserialize, Serialize};

/// Binary document or image attached to an entity by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    #[serde(default)]
    pub attached_to: Option<EntityId>,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
    #[serde(default)]
    pub caption: String,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            attached_to: None,
            filename: filename.into(),
            content_type: content_type.into(),
            content,
            caption: String::new(),
        }
    }

    pub fn attached_to(mut self, entity_id: EntityId) -> Self {
        self.attached_to = Some(entity_id);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

impl DomainEntity for Document {
    const ENTITY_TYPE: &'static str = entity_types::DOCUMENT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&["attached_to", "filename", "content_type"])
            .blob(&["content"])
            .search(&["caption"])
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("Document filename cannot be empty".to_string());
        }
        Ok(())
    }
}

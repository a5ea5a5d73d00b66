use crate::consistency::{IntentRecord, WriteReceipt};
use crate::error::{FieldkitError, FieldkitResult};
use crate::facade::{EntityView, Page, UnifiedQueryFacade};
use crate::models::{Attributes, EntityId, EntityType, IntentId};
use crate::routing::RouteDescription;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DataRequest {
    Read {
        entity_id: EntityId,
    },
    /// Create (no `entity_id`) or partially update an entity
    Write {
        entity_type: EntityType,
        #[serde(default)]
        entity_id: Option<EntityId>,
        attributes: Attributes,
    },
    Delete {
        entity_id: EntityId,
    },
    Search {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    List {
        entity_type: EntityType,
        #[serde(default)]
        page: usize,
    },
    Routes,
    FailedIntents,
    Requeue {
        intent_id: IntentId,
    },
}

impl DataRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Delete { .. } => "delete",
            Self::Search { .. } => "search",
            Self::List { .. } => "list",
            Self::Routes => "routes",
            Self::FailedIntents => "failed_intents",
            Self::Requeue { .. } => "requeue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DataResponse {
    Entity(EntityView),
    Receipt(WriteReceipt),
    SearchResults(Vec<EntityView>),
    Page(Page),
    Routes(Vec<RouteDescription>),
    Intents(Vec<IntentRecord>),
    Requeued(IntentRecord),
    Error { kind: String, message: String },
}

impl DataResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<FieldkitError> for DataResponse {
    fn from(error: FieldkitError) -> Self {
        Self::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataService {
    facade: Arc<UnifiedQueryFacade>,
}

impl DataService {
    pub fn new(facade: Arc<UnifiedQueryFacade>) -> Self {
        Self { facade }
    }

    /// Handle one request. Failures become [`DataResponse::Error`].
    pub async fn handle(&self, request: DataRequest) -> DataResponse {
        let operation = request.name();
        debug!(operation, "Handling data request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(operation, kind = error.kind(), error = %error, "Data request failed");
                DataResponse::from(error)
            }
        }
    }

    /// JSON in, JSON out
    pub async fn handle_json(&self, payload: &str) -> String {
        let response = match serde_json::from_str::<DataRequest>(payload) {
            Ok(request) => self.handle(request).await,
            Err(e) => DataResponse::Error {
                kind: "invalid_request".to_string(),
                message: e.to_string(),
            },
        };
        serde_json::to_string(&response).unwrap_or_else(|e| serialization_failure(&e))
    }

    async fn dispatch(&self, request: DataRequest) -> FieldkitResult<DataResponse> {
        let facade = &self.facade;
        let response = match request {
            DataRequest::Read { entity_id } => {
                let view = facade.read(entity_id).await?;
                if !view.is_found() && !view.is_incomplete() {
                    return Err(FieldkitError::NotFound(entity_id));
                }
                DataResponse::Entity(view)
            }
            DataRequest::Write {
                entity_type,
                entity_id,
                attributes,
            } => {
                let entity_id = entity_id.unwrap_or_default();
                DataResponse::Receipt(facade.write(&entity_type, entity_id, attributes).await?)
            }
            DataRequest::Delete { entity_id } => DataResponse::Receipt(facade.delete(entity_id).await?),
            DataRequest::Search { query, limit } => {
                DataResponse::SearchResults(facade.search(&query, limit).await?)
            }
            DataRequest::List { entity_type, page } => {
                DataResponse::Page(facade.list(&entity_type, page).await?)
            }
            DataRequest::Routes => DataResponse::Routes(facade.describe_routes()),
            DataRequest::FailedIntents => {
                DataResponse::Intents(facade.coordinator().failed_intents().await?)
            }
            DataRequest::Requeue { intent_id } => {
                DataResponse::Requeued(facade.coordinator().requeue(intent_id).await?)
            }
        };
        Ok(response)
    }
}

/// Error envelope for a response that could not be encoded
fn serialization_failure(error: &serde_json::Error) -> String {
    serde_json::json!({
        "kind": "error",
        "data": {
            "kind": "serialization_error",
            "message": error.to_string(),
        },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHarness;
    use serde_json::json;

    fn service() -> DataService {
        DataService::new(TestHarness::new().unwrap().facade)
    }

    #[test]
    fn test_request_wire_format() {
        let request: DataRequest =
            serde_json::from_value(json!({"op": "list", "entity_type": "plant"})).unwrap();
        assert_eq!(
            request,
            DataRequest::List {
                entity_type: EntityType::new("plant"),
                page: 0
            }
        );
    }

    #[tokio::test]
    async fn test_write_then_read_through_json() {
        let service = service();
        let written = service
            .handle_json(
                &json!({
                    "op": "write",
                    "entity_type": "plant",
                    "attributes": {"name": "Tomato", "family": "Solanaceae", "description": "vine"}
                })
                .to_string(),
            )
            .await;
        let written: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(written["kind"], "receipt");
        assert_eq!(written["data"]["status"], "complete");

        let entity_id = written["data"]["entity_id"].as_str().unwrap().to_string();
        let read = service
            .handle_json(&json!({"op": "read", "entity_id": entity_id}).to_string())
            .await;
        let read: serde_json::Value = serde_json::from_str(&read).unwrap();
        assert_eq!(read["kind"], "entity");
        assert_eq!(read["data"]["attributes"]["family"], "Solanaceae");
    }

    #[tokio::test]
    async fn test_errors_carry_stable_kinds() {
        let service = service();

        let unknown = service
            .handle(DataRequest::List {
                entity_type: EntityType::new("silo"),
                page: 0,
            })
            .await;
        assert!(matches!(unknown, DataResponse::Error { ref kind, .. } if kind == "routing_error"));

        let missing = service
            .handle(DataRequest::Read {
                entity_id: EntityId::new(),
            })
            .await;
        assert!(matches!(missing, DataResponse::Error { ref kind, .. } if kind == "not_found"));

        let garbage = service.handle_json("{\"op\": \"explode\"}").await;
        assert!(garbage.contains("invalid_request"));
    }

    #[test]
    fn test_serialization_failure_is_valid_json() {
        let error = <serde_json::Error as serde::ser::Error>::custom("key \"soil\" is not a string\\");
        let encoded = serialization_failure(&error);

        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["kind"], "error");
        assert_eq!(decoded["data"]["kind"], "serialization_error");
        assert_eq!(decoded["data"]["message"], "key \"soil\" is not a string\\");
    }
}

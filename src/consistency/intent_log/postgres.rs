//! PostgreSQL-backed intent log.
//!
//! One row per intent. The full record is kept as JSONB alongside the
//! columns the queries filter on; sequences come from a database sequence so
//! several processes can share one log.

use super::IntentLog;
use crate::consistency::errors::{IntentLogError, IntentLogResult};
use crate::consistency::intent::{IntentRecord, IntentStatus};
use crate::models::{EntityId, IntentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

const SCHEMA: [&str; 4] = [
    "CREATE SEQUENCE IF NOT EXISTS fieldkit_intent_sequence START 1",
    "CREATE TABLE IF NOT EXISTS fieldkit_intents (
        intent_id UUID PRIMARY KEY,
        sequence BIGINT NOT NULL UNIQUE,
        entity_id UUID NOT NULL,
        status TEXT NOT NULL,
        record JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS fieldkit_intents_status_sequence
        ON fieldkit_intents (status, sequence)",
    "CREATE INDEX IF NOT EXISTS fieldkit_intents_entity_status
        ON fieldkit_intents (entity_id, status, sequence)",
];

/// Advisory lock serializing schema setup across processes
const SCHEMA_LOCK_KEY: i64 = 0x6669_656c_646b_6974;

#[derive(Debug, Clone)]
pub struct PgIntentLog {
    pool: PgPool,
}

impl PgIntentLog {
    pub async fn connect(database_url: &str) -> IntentLogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        let log = Self::from_pool(pool);
        log.ensure_schema().await?;
        Ok(log)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> IntentLogResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let mut result = Ok(());
        for statement in SCHEMA {
            if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
                result = Err(IntentLogError::from(e));
                break;
            }
        }

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        if result.is_ok() {
            info!("📒 Intent log schema ready");
        }
        result
    }

    async fn fetch(
        &self,
        sql: &str,
        entity: Option<uuid::Uuid>,
        status: IntentStatus,
    ) -> IntentLogResult<Vec<IntentRecord>> {
        let query = sqlx::query(sql).bind(status.to_string());
        let query = match entity {
            Some(id) => query.bind(id),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                row.try_get::<Json<IntentRecord>, _>("record")
                    .map(|json| json.0)
                    .map_err(IntentLogError::from)
            })
            .collect()
    }
}

#[async_trait]
impl IntentLog for PgIntentLog {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn next_sequence(&self) -> IntentLogResult<u64> {
        let value: i64 = sqlx::query_scalar("SELECT nextval('fieldkit_intent_sequence')")
            .fetch_one(&self.pool)
            .await?;
        Ok(value as u64)
    }

    async fn append(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO fieldkit_intents (intent_id, sequence, entity_id, status, record, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (intent_id) DO NOTHING",
        )
        .bind(record.intent_id.as_uuid())
        .bind(record.sequence as i64)
        .bind(record.entity_id.as_uuid())
        .bind(record.status.to_string())
        .bind(Json(record))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(IntentLogError::Duplicate {
                intent_id: record.intent_id,
            });
        }
        Ok(())
    }

    async fn update(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let updated = sqlx::query(
            "UPDATE fieldkit_intents SET status = $2, record = $3, updated_at = $4
             WHERE intent_id = $1",
        )
        .bind(record.intent_id.as_uuid())
        .bind(record.status.to_string())
        .bind(Json(record))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(IntentLogError::NotFound(record.intent_id));
        }
        Ok(())
    }

    async fn get(&self, intent_id: IntentId) -> IntentLogResult<Option<IntentRecord>> {
        let row = sqlx::query("SELECT record FROM fieldkit_intents WHERE intent_id = $1")
            .bind(intent_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<Json<IntentRecord>, _>("record").map(|json| json.0))
            .transpose()
            .map_err(IntentLogError::from)
    }

    async fn pending(&self) -> IntentLogResult<Vec<IntentRecord>> {
        self.by_status(IntentStatus::Pending).await
    }

    async fn pending_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        self.fetch(
            "SELECT record FROM fieldkit_intents WHERE status = $1 AND entity_id = $2 ORDER BY sequence",
            Some(entity_id.as_uuid()),
            IntentStatus::Pending,
        )
        .await
    }

    async fn open_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        self.fetch(
            "SELECT record FROM fieldkit_intents WHERE status <> $1 AND entity_id = $2 ORDER BY sequence",
            Some(entity_id.as_uuid()),
            IntentStatus::Complete,
        )
        .await
    }

    async fn by_status(&self, status: IntentStatus) -> IntentLogResult<Vec<IntentRecord>> {
        self.fetch(
            "SELECT record FROM fieldkit_intents WHERE status = $1 ORDER BY sequence",
            None,
            status,
        )
        .await
    }

    async fn prune_completed(&self, cutoff: DateTime<Utc>) -> IntentLogResult<usize> {
        // Sequences come from the database sequence, so every row may go
        let deleted = sqlx::query(
            "DELETE FROM fieldkit_intents WHERE status = $1 AND updated_at < $2",
        )
        .bind(IntentStatus::Complete.to_string())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(deleted.rows_affected() as usize)
    }
}

use super::IntentLog;
use crate::consistency::errors::{IntentLogError, IntentLogResult};
use crate::consistency::intent::{IntentRecord, IntentStatus};
use crate::models::{EntityId, IntentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct LogState {
    by_sequence: BTreeMap<u64, IntentRecord>,
    sequence_of: HashMap<IntentId, u64>,
}

/// Process-local intent log. Not durable across restarts; also used as the
/// read index behind [`FileIntentLog`](super::FileIntentLog).
#[derive(Debug)]
pub struct MemoryIntentLog {
    state: RwLock<LogState>,
    next_sequence: AtomicU64,
}

impl Default for MemoryIntentLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIntentLog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState::default()),
            next_sequence: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().by_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn allocate_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn insert(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let mut state = self.state.write();
        if state.sequence_of.contains_key(&record.intent_id) {
            return Err(IntentLogError::Duplicate {
                intent_id: record.intent_id,
            });
        }
        state.sequence_of.insert(record.intent_id, record.sequence);
        state.by_sequence.insert(record.sequence, record.clone());
        self.next_sequence
            .fetch_max(record.sequence + 1, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn replace(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let mut state = self.state.write();
        let sequence = *state
            .sequence_of
            .get(&record.intent_id)
            .ok_or(IntentLogError::NotFound(record.intent_id))?;
        state.by_sequence.insert(sequence, record.clone());
        Ok(())
    }

    /// Insert or replace; used when replaying a log where the last entry wins
    pub(crate) fn upsert(&self, record: IntentRecord) {
        let mut state = self.state.write();
        if let Some(previous) = state.sequence_of.insert(record.intent_id, record.sequence) {
            state.by_sequence.remove(&previous);
        }
        self.next_sequence
            .fetch_max(record.sequence + 1, Ordering::SeqCst);
        state.by_sequence.insert(record.sequence, record);
    }

    pub(crate) fn snapshot(&self) -> Vec<IntentRecord> {
        self.state.read().by_sequence.values().cloned().collect()
    }

    fn find(&self, keep: impl Fn(&IntentRecord) -> bool) -> Vec<IntentRecord> {
        self.state
            .read()
            .by_sequence
            .values()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }

    pub(crate) fn lookup(&self, intent_id: IntentId) -> Option<IntentRecord> {
        let state = self.state.read();
        state
            .sequence_of
            .get(&intent_id)
            .and_then(|seq| state.by_sequence.get(seq))
            .cloned()
    }

    pub(crate) fn with_status(&self, status: IntentStatus) -> Vec<IntentRecord> {
        self.find(|r| r.status == status)
    }

    pub(crate) fn pending_of(&self, entity_id: EntityId) -> Vec<IntentRecord> {
        self.find(|r| r.status == IntentStatus::Pending && r.entity_id == entity_id)
    }

    pub(crate) fn open_of(&self, entity_id: EntityId) -> Vec<IntentRecord> {
        self.find(|r| r.status != IntentStatus::Complete && r.entity_id == entity_id)
    }

    pub(crate) fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let newest = state.by_sequence.keys().next_back().copied();
        let expired: Vec<(u64, IntentId)> = state
            .by_sequence
            .iter()
            .filter(|(sequence, record)| {
                Some(**sequence) != newest
                    && record.status == IntentStatus::Complete
                    && record.updated_at < cutoff
            })
            .map(|(sequence, record)| (*sequence, record.intent_id))
            .collect();

        for (sequence, intent_id) in &expired {
            state.by_sequence.remove(sequence);
            state.sequence_of.remove(intent_id);
        }
        expired.len()
    }
}

#[async_trait]
impl IntentLog for MemoryIntentLog {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn next_sequence(&self) -> IntentLogResult<u64> {
        Ok(self.allocate_sequence())
    }

    async fn append(&self, record: &IntentRecord) -> IntentLogResult<()> {
        self.insert(record)
    }

    async fn update(&self, record: &IntentRecord) -> IntentLogResult<()> {
        self.replace(record)
    }

    async fn get(&self, intent_id: IntentId) -> IntentLogResult<Option<IntentRecord>> {
        Ok(self.lookup(intent_id))
    }

    async fn pending(&self) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.with_status(IntentStatus::Pending))
    }

    async fn pending_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.pending_of(entity_id))
    }

    async fn open_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.open_of(entity_id))
    }

    async fn by_status(&self, status: IntentStatus) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.with_status(status))
    }

    async fn prune_completed(&self, cutoff: DateTime<Utc>) -> IntentLogResult<usize> {
        Ok(self.prune(cutoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    fn record(log: &MemoryIntentLog, entity_id: EntityId) -> IntentRecord {
        IntentRecord::put(
            log.allocate_sequence(),
            entity_id,
            EntityType::new("field"),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_pending_is_sequence_ordered_per_entity() {
        let log = MemoryIntentLog::new();
        let entity = EntityId::new();
        let other = EntityId::new();

        let first = record(&log, entity);
        let unrelated = record(&log, other);
        let mut second = record(&log, entity);
        for r in [&first, &unrelated, &second] {
            log.append(r).await.unwrap();
        }

        let pending = log.pending_for_entity(entity).await.unwrap();
        assert_eq!(
            pending.iter().map(|r| r.intent_id).collect::<Vec<_>>(),
            vec![first.intent_id, second.intent_id]
        );

        second.status = IntentStatus::Complete;
        log.update(&second).await.unwrap();
        assert_eq!(log.pending().await.unwrap().len(), 2);
        assert_eq!(log.by_status(IntentStatus::Complete).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_twice_and_update_unknown_are_rejected() {
        let log = MemoryIntentLog::new();
        let r = record(&log, EntityId::new());
        log.append(&r).await.unwrap();

        assert!(matches!(
            log.append(&r).await,
            Err(IntentLogError::Duplicate { .. })
        ));

        let stranger = record(&log, EntityId::new());
        assert!(matches!(
            log.update(&stranger).await,
            Err(IntentLogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_prune_drops_only_expired_complete_intents() {
        let log = MemoryIntentLog::new();
        let entity = EntityId::new();

        let mut done: Vec<IntentRecord> = Vec::new();
        for _ in 0..10 {
            let mut r = record(&log, entity);
            log.append(&r).await.unwrap();
            r.status = IntentStatus::Complete;
            log.update(&r).await.unwrap();
            done.push(r);
        }
        let open = record(&log, entity);
        log.append(&open).await.unwrap();
        let mut failed = record(&log, entity);
        log.append(&failed).await.unwrap();
        failed.status = IntentStatus::Failed;
        log.update(&failed).await.unwrap();

        // Nothing is old enough yet
        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(log.prune_completed(past).await.unwrap(), 0);
        assert_eq!(log.len(), 12);

        let removed = log.prune_completed(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 10);
        assert_eq!(log.len(), 2);
        assert!(log.get(done[0].intent_id).await.unwrap().is_none());
        assert_eq!(log.pending().await.unwrap().len(), 1);

        let open_ids: Vec<IntentId> = log
            .open_for_entity(entity)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.intent_id)
            .collect();
        assert_eq!(open_ids, vec![open.intent_id, failed.intent_id]);

        let next = log.next_sequence().await.unwrap();
        assert!(next > failed.sequence);
    }

    #[tokio::test]
    async fn test_prune_keeps_the_newest_intent() {
        let log = MemoryIntentLog::new();
        let mut last = record(&log, EntityId::new());
        log.append(&last).await.unwrap();
        last.status = IntentStatus::Complete;
        log.update(&last).await.unwrap();

        let removed = log.prune_completed(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 0);
        assert!(log.get(last.intent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sequences_are_strictly_increasing() {
        let log = MemoryIntentLog::new();
        let a = log.next_sequence().await.unwrap();
        let b = log.next_sequence().await.unwrap();
        assert!(b > a);
    }
}

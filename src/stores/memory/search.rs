use super::RecordTable;
use crate::models::{Attributes, EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{
    PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
struct InvertedIndex {
    /// term -> entities containing it
    postings: HashMap<String, HashSet<EntityId>>,
    /// entity -> term frequencies, kept to unindex on update
    documents: HashMap<EntityId, HashMap<String, usize>>,
}

impl InvertedIndex {
    fn remove(&mut self, id: &EntityId) {
        if let Some(terms) = self.documents.remove(id) {
            for term in terms.keys() {
                if let Some(ids) = self.postings.get_mut(term) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
        }
    }

    fn index(&mut self, id: EntityId, attributes: &Attributes) {
        self.remove(&id);
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for value in attributes.values() {
            collect_terms(value, &mut frequencies);
        }
        for term in frequencies.keys() {
            self.postings.entry(term.clone()).or_default().insert(id);
        }
        self.documents.insert(id, frequencies);
    }

    /// Entities containing every query term, with a term-frequency score
    fn search(&self, terms: &[String]) -> Vec<(EntityId, usize)> {
        let Some((first, rest)) = terms.split_first() else {
            return Vec::new();
        };
        let Some(candidates) = self.postings.get(first) else {
            return Vec::new();
        };

        let mut hits: Vec<(EntityId, usize)> = candidates
            .iter()
            .filter(|id| {
                rest.iter()
                    .all(|t| self.postings.get(t).is_some_and(|ids| ids.contains(id)))
            })
            .map(|id| {
                let doc = &self.documents[id];
                let score = terms.iter().map(|t| doc.get(t).copied().unwrap_or(0)).sum();
                (*id, score)
            })
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hits
    }
}

/// Lower-cased alphanumeric terms of at least two characters
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn collect_terms(value: &Value, frequencies: &mut HashMap<String, usize>) {
    match value {
        Value::String(text) => {
            for term in tokenize(text) {
                *frequencies.entry(term).or_insert(0) += 1;
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_terms(v, frequencies)),
        Value::Object(map) => map.values().for_each(|v| collect_terms(v, frequencies)),
        _ => {}
    }
}

/// Full-text store with an in-memory inverted index over all string attributes
#[derive(Debug, Default)]
pub struct MemorySearchStore {
    table: RecordTable,
    index: RwLock<InvertedIndex>,
}

impl MemorySearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed_terms(&self) -> usize {
        self.index.read().postings.len()
    }
}

#[async_trait]
impl StoreAdapter for MemorySearchStore {
    fn category(&self) -> StoreCategory {
        StoreCategory::Search
    }

    fn name(&self) -> &str {
        "memory-search"
    }

    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        let (outcome, record) = self.table.upsert(id, data);
        if let (PutOutcome::Applied, Some(record)) = (outcome, record) {
            self.index.write().index(id, &record.attributes);
        }
        debug!(entity_id = %id, ?outcome, "search put");
        Ok(outcome)
    }

    async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>> {
        Ok(self.table.get(&id))
    }

    async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool> {
        let removed = self.table.delete(id, stamp).is_some();
        if removed {
            self.index.write().remove(&id);
        }
        Ok(removed)
    }

    async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>> {
        match filter {
            StoreFilter::Text { query, limit } => {
                let terms = tokenize(query);
                let hits = self.index.read().search(&terms);
                Ok(hits
                    .into_iter()
                    .filter_map(|(id, _)| self.table.get(&id))
                    .take(*limit)
                    .collect())
            }
            StoreFilter::EntityType { entity_type } => {
                Ok(self.table.scan(|r| &r.entity_type == entity_type))
            }
            other => Err(StoreError::UnsupportedFilter {
                store: self.category(),
                filter: other.name(),
            }),
        }
    }
}

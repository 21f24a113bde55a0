//! Exact in-memory store.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Candidate, PassageRecord, StoreError, VectorStore};
use crate::embeddings::cosine_similarity;

/// Brute-force cosine store.
///
/// Scans every record per query, so results are exact. Suited to tests,
/// demos, and corpora small enough that a linear scan beats index upkeep.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PassageRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, records: Vec<PassageRecord>) -> Result<(), StoreError> {
        let mut slot = self.records.write();
        for record in records {
            match slot.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => slot.push(record),
            }
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        let records = self.records.read();
        let mut hits: Vec<Candidate> = records
            .iter()
            .map(|record| Candidate {
                passage: record.passage.clone(),
                similarity: cosine_similarity(&record.embedding, embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passage::Passage;

    fn record(id: &str, text: &str, embedding: Vec<f32>) -> PassageRecord {
        PassageRecord::new(id, Passage::new(text), embedding)
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = MemoryStore::new();
        store
            .add(vec![
                record("a", "east", vec![1.0, 0.0]),
                record("b", "north", vec![0.0, 1.0]),
                record("c", "northeast", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].passage.text, "east");
        assert_eq!(hits[1].passage.text, "northeast");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn add_replaces_records_with_the_same_id() {
        let store = MemoryStore::new();
        store
            .add(vec![record("a", "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .add(vec![record("a", "new text", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].passage.text, "new text");
    }

    #[tokio::test]
    async fn k_larger_than_the_store_returns_everything() {
        let store = MemoryStore::new();
        store
            .add(vec![record("a", "only", vec![1.0, 0.0])])
            .await
            .unwrap();
        let hits = store.search(&[0.5, 0.5], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn empty_store_returns_no_candidates() {
        let store = MemoryStore::new();
        assert!(store.search(&[1.0], 5).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

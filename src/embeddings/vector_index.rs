// In-memory vector index with an on-disk snapshot format.
//
// Entries are kept in insertion order next to a position map keyed by
// record id. The position-to-record-id mapping is persisted with the
// vectors; losing it would make search results unattributable.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::errors::{CodeScopeError, Result};

/// One embedded record. The index never owns the structural record; the
/// `record_id` is a weak back-reference (the file path). `source_text` is
/// the exact text that produced the vector, kept for traceability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingEntry {
    pub record_id: String,
    pub vector: Vec<f32>,
    pub source_text: String,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    dimensions: usize,
    entries: Vec<EmbeddingEntry>,
}

#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<EmbeddingEntry>,
    positions: HashMap<String, usize>,
    dirty: bool,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
            positions: HashMap::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.positions.contains_key(record_id)
    }

    /// Insert or replace the entry for `record_id`. Replacement (not
    /// accumulation) is what keeps exactly one current vector per analyzed
    /// path when a file is re-analyzed.
    pub fn upsert(&mut self, entry: EmbeddingEntry) -> Result<()> {
        self.check_dimensions(entry.vector.len())?;
        match self.positions.get(&entry.record_id) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions
                    .insert(entry.record_id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Replace the entire contents; used when stale vectors must be
    /// regenerated from the store.
    pub fn rebuild(&mut self, entries: Vec<EmbeddingEntry>) -> Result<()> {
        for entry in &entries {
            self.check_dimensions(entry.vector.len())?;
        }
        self.positions = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.record_id.clone(), position))
            .collect();
        self.entries = entries;
        self.dirty = true;
        Ok(())
    }

    /// Nearest neighbors by inner product (cosine over the pre-normalized
    /// vectors stored here), descending; ties broken by ascending record id
    /// for determinism. `top_k` is clamped to the index size; an empty index
    /// yields an empty result, not an error.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimensions(query.len())?;

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry.record_id.clone(), dot(query, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k.min(self.entries.len()));
        Ok(scored)
    }

    pub fn entries(&self) -> &[EmbeddingEntry] {
        &self.entries
    }

    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = IndexSnapshot {
            dimensions: self.dimensions,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn from_snapshot_bytes(bytes: &[u8], expected_dimensions: usize) -> Result<Self> {
        let snapshot: IndexSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| CodeScopeError::IndexCorrupt(format!("unreadable snapshot: {e}")))?;
        if snapshot.dimensions != expected_dimensions {
            return Err(CodeScopeError::IndexCorrupt(format!(
                "snapshot dimensions {} do not match configured {}",
                snapshot.dimensions, expected_dimensions
            )));
        }
        for entry in &snapshot.entries {
            if entry.vector.len() != snapshot.dimensions {
                return Err(CodeScopeError::IndexCorrupt(format!(
                    "entry {} has {} dimensions, expected {}",
                    entry.record_id,
                    entry.vector.len(),
                    snapshot.dimensions
                )));
            }
        }

        let mut index = Self::new(expected_dimensions);
        index.positions = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.record_id.clone(), position))
            .collect();
        index.entries = snapshot.entries;
        Ok(index)
    }

    fn check_dimensions(&self, got: usize) -> Result<()> {
        if got != self.dimensions {
            return Err(CodeScopeError::InvalidArgument(format!(
                "vector has {got} dimensions, index expects {}",
                self.dimensions
            )));
        }
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry {
            record_id: id.to_string(),
            vector,
            source_text: format!("text for {id}"),
        }
    }

    #[test]
    fn upsert_replaces_instead_of_accumulating() {
        let mut index = VectorIndex::new(2);
        index.upsert(entry("a.py", vec![1.0, 0.0])).unwrap();
        index.upsert(entry("a.py", vec![0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].0, "a.py");
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_orders_by_score_then_record_id() {
        let mut index = VectorIndex::new(2);
        index.upsert(entry("b.py", vec![1.0, 0.0])).unwrap();
        index.upsert(entry("a.py", vec![1.0, 0.0])).unwrap();
        index.upsert(entry("c.py", vec![0.0, 1.0])).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a.py", "b.py", "c.py"]);
        assert!(hits[0].1 >= hits[1].1 && hits[1].1 >= hits[2].1);
    }

    #[test]
    fn empty_index_returns_empty_not_error() {
        let index = VectorIndex::new(4);
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn top_k_is_clamped_to_index_size() {
        let mut index = VectorIndex::new(2);
        index.upsert(entry("a.py", vec![1.0, 0.0])).unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new(3);
        assert!(matches!(
            index.upsert(entry("a.py", vec![1.0])),
            Err(CodeScopeError::InvalidArgument(_))
        ));
        index.upsert(entry("a.py", vec![1.0, 0.0, 0.0])).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(CodeScopeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_search_results() {
        let mut index = VectorIndex::new(2);
        index.upsert(entry("a.py", vec![0.6, 0.8])).unwrap();
        index.upsert(entry("b.py", vec![1.0, 0.0])).unwrap();

        let bytes = index.snapshot_bytes().unwrap();
        let reloaded = VectorIndex::from_snapshot_bytes(&bytes, 2).unwrap();
        assert_eq!(
            index.search(&[0.6, 0.8], 2).unwrap(),
            reloaded.search(&[0.6, 0.8], 2).unwrap()
        );
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        assert!(matches!(
            VectorIndex::from_snapshot_bytes(b"not json", 2),
            Err(CodeScopeError::IndexCorrupt(_))
        ));
        let mut index = VectorIndex::new(2);
        index.upsert(entry("a.py", vec![1.0, 0.0])).unwrap();
        let bytes = index.snapshot_bytes().unwrap();
        assert!(matches!(
            VectorIndex::from_snapshot_bytes(&bytes, 3),
            Err(CodeScopeError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn rebuild_replaces_all_entries() {
        let mut index = VectorIndex::new(2);
        index.upsert(entry("old.py", vec![1.0, 0.0])).unwrap();
        index
            .rebuild(vec![entry("new.py", vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains("new.py"));
        assert!(!index.contains("old.py"));
    }
}

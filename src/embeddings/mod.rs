// Embedding and index management.
//
// The embedding model is an opaque `text -> fixed-length vector` function
// behind the `EmbeddingModel` trait; the default implementation is a
// deterministic feature-hashing embedder so the pipeline runs without model
// downloads. Real ONNX-style models plug in behind the same trait.
//
// Concurrency: the in-memory index is the single shared mutable structure.
// Mutations (`add`, `rebuild`, `persist`) serialize under the write half of
// one RwLock; searches share the read half and never interleave with a
// mutation.

pub mod text_repr;
pub mod vector_index;

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::{CodeScopeError, Result};

pub use text_repr::build_text;
pub use vector_index::{EmbeddingEntry, VectorIndex};

/// Opaque embedding function. Implementations must be deterministic for the
/// same input text.
pub trait EmbeddingModel: Send + Sync {
    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic feature-hashing embedder.
///
/// Buckets word tokens and their character trigrams into the vector via
/// SHA-256, with a hash-derived sign. Trigrams give related identifiers
/// ("connect", "connection") overlapping mass, which is what makes alert
/// text correlate with code named after the same concepts.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            self.bucket(&token, &mut vector);
            let chars: Vec<char> = token.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    self.bucket(&trigram, &mut vector);
                }
            }
        }
        normalize(&mut vector);
        vector
    }

    fn bucket(&self, feature: &str, vector: &mut [f32]) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut hash_bytes = [0u8; 8];
        hash_bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(hash_bytes);
        let position = (hash % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[position] += sign;
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// L2-normalize in place. Zero vectors stay zero.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Owns the embedding model and the vector index, and keeps the two
/// consistent: vectors are normalized once at embed/add time, never at
/// search time.
pub struct EmbeddingIndexManager {
    model: Option<Box<dyn EmbeddingModel>>,
    dimensions: usize,
    index: RwLock<VectorIndex>,
    loaded: AtomicBool,
}

impl EmbeddingIndexManager {
    pub fn new(model: Box<dyn EmbeddingModel>) -> Self {
        let dimensions = model.dimensions();
        Self {
            model: Some(model),
            dimensions,
            index: RwLock::new(VectorIndex::new(dimensions)),
            loaded: AtomicBool::new(false),
        }
    }

    /// Manager with no model: analysis without embeddings still works, but
    /// any embedding-dependent call fails with `EmbeddingUnavailable`.
    pub fn without_model(dimensions: usize) -> Self {
        Self {
            model: None,
            dimensions,
            index: RwLock::new(VectorIndex::new(dimensions)),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.read_index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_index().is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Batched call into the embedding model. Vectors come back normalized.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.as_ref().ok_or_else(|| {
            CodeScopeError::EmbeddingUnavailable("no embedding model configured".to_string())
        })?;
        let mut vectors = model.embed_batch(texts)?;
        for vector in &mut vectors {
            if vector.len() != self.dimensions {
                return Err(CodeScopeError::EmbeddingUnavailable(format!(
                    "model returned {} dimensions, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
            normalize(vector);
        }
        Ok(vectors)
    }

    /// Insert or replace one vector, superseding any stale vector for the
    /// same record id.
    pub fn add(&self, record_id: &str, mut vector: Vec<f32>, source_text: &str) -> Result<()> {
        normalize(&mut vector);
        let mut index = self.write_index();
        index.upsert(EmbeddingEntry {
            record_id: record_id.to_string(),
            vector,
            source_text: source_text.to_string(),
        })?;
        debug!("indexed vector for {record_id} ({} total)", index.len());
        Ok(())
    }

    /// Replace the entire index contents.
    pub fn rebuild(&self, mut entries: Vec<EmbeddingEntry>) -> Result<()> {
        for entry in &mut entries {
            normalize(&mut entry.vector);
        }
        let count = entries.len();
        self.write_index().rebuild(entries)?;
        info!("rebuilt vector index with {count} entries");
        Ok(())
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>> {
        self.read_index().search(query, top_k)
    }

    /// Serialize the index atomically: snapshot in memory under the write
    /// lock, then write to a temp path and rename after the lock is
    /// released, so a crash mid-write never leaves a corrupt file.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let bytes = {
            let mut index = self.write_index();
            let bytes = index.snapshot_bytes()?;
            index.mark_clean();
            bytes
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;
        debug!("persisted vector index to {}", path.display());
        Ok(())
    }

    /// Load the persisted index. A missing file is the first-run condition
    /// and yields an empty index; an unreadable file is `IndexCorrupt`.
    pub fn load(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            info!("no vector index at {}, starting empty", path.display());
            *self.write_index() = VectorIndex::new(self.dimensions);
            self.loaded.store(true, Ordering::Relaxed);
            return Ok(());
        }

        let bytes = std::fs::read(path)?;
        let loaded = VectorIndex::from_snapshot_bytes(&bytes, self.dimensions)?;
        info!(
            "loaded vector index from {} ({} vectors)",
            path.display(),
            loaded.len()
        );
        *self.write_index() = loaded;
        self.loaded.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Current entries, cloned; used when rebuilding from the store.
    pub fn entries(&self) -> Vec<EmbeddingEntry> {
        self.read_index().entries().to_vec()
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.read_index().contains(record_id)
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, VectorIndex> {
        self.index.read().unwrap_or_else(|poisoned| {
            warn!("vector index lock poisoned; continuing with inner value");
            poisoned.into_inner()
        })
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, VectorIndex> {
        self.index.write().unwrap_or_else(|poisoned| {
            warn!("vector index lock poisoned; continuing with inner value");
            poisoned.into_inner()
        })
    }
}

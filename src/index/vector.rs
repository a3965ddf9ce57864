use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    /// Where the chunk came from ("learning_context", a roadmap file name, ...)
    source: String,
    content: String,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
///
/// Holds the learning-context corpus used to ground roadmap generation.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub source: String,
    pub content: String,
    pub score: f32,
}

impl VectorStore {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Add chunks with their embeddings, returning how many were stored.
    /// `embeddings` must be parallel with `chunks`; extra chunks without an
    /// embedding are dropped.
    pub fn add_chunks(
        &self,
        source: &str,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize> {
        let mut entries = self.entries.write();
        let mut added = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            if let Some(embedding) = embeddings.get(i) {
                entries.push(VectorEntry {
                    source: source.to_string(),
                    content: chunk.clone(),
                    embedding: embedding.clone(),
                });
                added += 1;
            }
        }

        self.persist(&entries)?;
        Ok(added)
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                source: e.source.clone(),
                content: e.content.clone(),
                score: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Delete all entries from a source.
    pub fn remove_source(&self, source: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.source != source);
        self.persist(&entries)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace vector store")?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> VectorStore {
        VectorStore::open_or_create(&dir.path().join("vectors.json")).unwrap()
    }

    #[test]
    fn test_cosine_identical_direction() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .add_chunks(
                "learning_context",
                &[
                    "databases".to_string(),
                    "web servers".to_string(),
                    "compilers".to_string(),
                ],
                vec![
                    vec![0.9, 0.1, 0.0],
                    vec![0.1, 0.9, 0.0],
                    vec![0.0, 0.1, 0.9],
                ],
            )
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "databases");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_top_k_larger_than_store() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store
            .add_chunks("s", &["only one".to_string()], vec![vec![1.0, 0.0]])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_extra_chunks_without_embeddings_dropped() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store
            .add_chunks(
                "s",
                &["a".to_string(), "b".to_string(), "c".to_string()],
                vec![vec![1.0], vec![0.5]],
            )
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_source() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.add_chunks("a", &["x".to_string()], vec![vec![1.0]]).unwrap();
        store.add_chunks("b", &["y".to_string()], vec![vec![1.0]]).unwrap();

        store.remove_source("a").unwrap();
        assert_eq!(store.len(), 1);
        let hits = store.search(&[1.0], 10);
        assert_eq!(hits[0].source, "b");
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vectors.json");

        {
            let store = VectorStore::open_or_create(&path).unwrap();
            store
                .add_chunks("ctx", &["persisted".to_string()], vec![vec![0.3, 0.7]])
                .unwrap();
        }

        let reopened = VectorStore::open_or_create(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(!reopened.is_empty());
    }
}

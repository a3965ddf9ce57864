use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Words this short carry no signal and are ignored on both sides.
const MIN_WORD_LEN: usize = 3;

/// A stored chunk entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkEntry {
    document_id: Uuid,
    chunk_index: usize,
    content: String,
    word_count: usize,
    indexed_at: DateTime<Utc>,
}

/// In-memory keyword-overlap index with disk persistence.
///
/// Scoring is the fraction of query words present in the chunk:
/// `|query_words ∩ chunk_words| / |query_words|`, over lowercased
/// words of at least [`MIN_WORD_LEN`] characters.
pub struct KeywordIndex {
    entries: RwLock<Vec<ChunkEntry>>,
    persist_path: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
}

/// Index-level counters for the health/stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_chunks: usize,
}

impl KeywordIndex {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .context("Failed to read keyword index")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Index chunks for a document. Blank chunks are skipped; chunk indices
    /// refer to positions in the input slice, so gaps are possible.
    pub fn index_chunks(&self, document_id: Uuid, chunks: &[String]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write();
        for (i, chunk) in chunks.iter().enumerate() {
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                continue;
            }
            entries.push(ChunkEntry {
                document_id,
                chunk_index: i,
                content: trimmed.to_string(),
                word_count: trimmed.split_whitespace().count(),
                indexed_at: Utc::now(),
            });
        }

        self.persist(&entries)
    }

    /// Search for the most relevant chunks, optionally within one document.
    pub fn search(
        &self,
        query: &str,
        document_id: Option<Uuid>,
        limit: usize,
    ) -> Vec<KeywordHit> {
        let query_words = significant_words(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        let entries = self.entries.read();
        let mut scored: Vec<KeywordHit> = entries
            .iter()
            .filter(|e| match document_id {
                Some(id) => e.document_id == id,
                None => true,
            })
            .filter_map(|e| {
                let chunk_words = significant_words(&e.content);
                let common = query_words.intersection(&chunk_words).count();
                if common == 0 {
                    return None;
                }
                Some(KeywordHit {
                    document_id: e.document_id,
                    chunk_index: e.chunk_index,
                    content: e.content.clone(),
                    score: common as f32 / query_words.len() as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    /// All chunk contents for a document, in chunk order.
    pub fn document_chunks(&self, document_id: Uuid) -> Vec<String> {
        let entries = self.entries.read();
        let mut chunks: Vec<(usize, String)> = entries
            .iter()
            .filter(|e| e.document_id == document_id)
            .map(|e| (e.chunk_index, e.content.clone()))
            .collect();
        chunks.sort_by_key(|(i, _)| *i);
        chunks.into_iter().map(|(_, c)| c).collect()
    }

    /// Delete all chunks for a document.
    pub fn remove_document(&self, document_id: Uuid) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.document_id != document_id);
        self.persist(&entries)
    }

    pub fn stats(&self) -> IndexStats {
        let entries = self.entries.read();
        let documents: HashSet<Uuid> = entries.iter().map(|e| e.document_id).collect();
        IndexStats {
            total_documents: documents.len(),
            total_chunks: entries.len(),
        }
    }

    /// Persist to disk (atomic write via temp file + rename).
    fn persist(&self, entries: &[ChunkEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data).context("Failed to write keyword index")?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace keyword index")?;
        Ok(())
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(|w| w.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_index(dir: &tempfile::TempDir) -> KeywordIndex {
        KeywordIndex::open_or_create(&dir.path().join("index.json")).unwrap()
    }

    #[test]
    fn test_index_and_search_basic() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();

        index
            .index_chunks(
                doc,
                &[
                    "Rust ownership model prevents data races".to_string(),
                    "Python uses a global interpreter lock".to_string(),
                ],
            )
            .unwrap();

        let hits = index.search("rust ownership", None, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_index, 0);
        assert!((hits[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_is_fraction_of_query_words() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();

        index
            .index_chunks(doc, &["the borrow checker enforces lifetimes".to_string()])
            .unwrap();

        // 1 of 2 significant query words matches
        let hits = index.search("borrow elephants", None, 5);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_short_words_ignored() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();

        index.index_chunks(doc, &["an ox is at it".to_string()]).unwrap();

        // Every query word is ≤2 chars, so the query has no signal
        assert!(index.search("an ox at it", None, 5).is_empty());
    }

    #[test]
    fn test_document_filter() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index.index_chunks(doc_a, &["rust traits and generics".to_string()]).unwrap();
        index.index_chunks(doc_b, &["rust async and futures".to_string()]).unwrap();

        let all = index.search("rust", None, 10);
        assert_eq!(all.len(), 2);

        let only_a = index.search("rust", Some(doc_a), 10);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].document_id, doc_a);
    }

    #[test]
    fn test_limit_respected() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();

        let chunks: Vec<String> = (0..20)
            .map(|i| format!("learning material about databases part {i}"))
            .collect();
        index.index_chunks(doc, &chunks).unwrap();

        let hits = index.search("databases", None, 5);
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_blank_chunks_skipped() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();

        index
            .index_chunks(
                doc,
                &["".to_string(), "   ".to_string(), "real content here".to_string()],
            )
            .unwrap();

        assert_eq!(index.stats().total_chunks, 1);
        // The surviving chunk keeps its original position
        assert_eq!(index.document_chunks(doc), vec!["real content here".to_string()]);
    }

    #[test]
    fn test_remove_document_cascades() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();
        let other = Uuid::new_v4();

        index.index_chunks(doc, &["chunk one".to_string(), "chunk two".to_string()]).unwrap();
        index.index_chunks(other, &["unrelated chunk".to_string()]).unwrap();

        index.remove_document(doc).unwrap();

        assert!(index.document_chunks(doc).is_empty());
        assert_eq!(index.stats().total_chunks, 1);
        assert_eq!(index.stats().total_documents, 1);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let doc = Uuid::new_v4();

        {
            let index = KeywordIndex::open_or_create(&path).unwrap();
            index.index_chunks(doc, &["persisted chunk content".to_string()]).unwrap();
        }

        let reopened = KeywordIndex::open_or_create(&path).unwrap();
        assert_eq!(reopened.stats().total_chunks, 1);
        let hits = reopened.search("persisted", None, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc);
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let dir = tempdir().unwrap();
        let index = open_index(&dir);
        let doc = Uuid::new_v4();
        index.index_chunks(doc, &["some content".to_string()]).unwrap();

        assert!(index.search("", None, 5).is_empty());
        assert!(index.search("   ", None, 5).is_empty());
    }
}

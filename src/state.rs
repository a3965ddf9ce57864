//! Shared application state: persisted collections, retrieval indexes,
//! session table, and concurrency limits.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::analysis::chunker;
use crate::config::Config;
use crate::index::keyword::KeywordIndex;
use crate::index::vector::VectorStore;
use crate::llm::embeddings;
use crate::models::{Document, Notification, Roadmap, Session, User};

/// On-disk snapshot of the persisted collections.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    users: Vec<User>,
    documents: Vec<Document>,
    roadmaps: Vec<Roadmap>,
    notifications: Vec<Notification>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<RwLock<Vec<User>>>,
    pub documents: Arc<RwLock<Vec<Document>>>,
    pub roadmaps: Arc<RwLock<Vec<Roadmap>>>,
    pub notifications: Arc<RwLock<Vec<Notification>>>,
    /// Session token -> session. Not persisted; restarts log everyone out.
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Outstanding OAuth state tokens -> issue time, for callback validation
    pub oauth_states: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    pub keyword_index: Arc<KeywordIndex>,
    pub vector_store: Arc<VectorStore>,
    pub http_client: reqwest::Client,
    pub analysis_semaphore: Arc<Semaphore>,
    pub chat_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;

        let db = load_database(&config.db_path())?;
        let keyword_index = KeywordIndex::open_or_create(&config.keyword_index_path())?;
        let vector_store = VectorStore::open_or_create(&config.vector_index_path())?;

        tracing::info!(
            "Loaded {} users, {} documents, {} roadmaps",
            db.users.len(),
            db.documents.len(),
            db.roadmaps.len()
        );

        Ok(Self {
            users: Arc::new(RwLock::new(db.users)),
            documents: Arc::new(RwLock::new(db.documents)),
            roadmaps: Arc::new(RwLock::new(db.roadmaps)),
            notifications: Arc::new(RwLock::new(db.notifications)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            oauth_states: Arc::new(RwLock::new(HashMap::new())),
            keyword_index: Arc::new(keyword_index),
            vector_store: Arc::new(vector_store),
            http_client: reqwest::Client::new(),
            analysis_semaphore: Arc::new(Semaphore::new(config.max_concurrent_analyses)),
            chat_semaphore: Arc::new(Semaphore::new(config.max_concurrent_chats)),
            config: Arc::new(config),
        })
    }

    /// Write the persisted collections to disk atomically.
    pub fn persist(&self) -> Result<()> {
        let db = Database {
            users: self.users.read().clone(),
            documents: self.documents.read().clone(),
            roadmaps: self.roadmaps.read().clone(),
            notifications: self.notifications.read().clone(),
        };

        let path = self.config.db_path();
        let json = serde_json::to_string_pretty(&db).context("Failed to serialize database")?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to rename {} into place", tmp.display()))?;

        Ok(())
    }

    /// Record a notification for a user. Callers persist afterwards.
    pub fn notify(&self, user_id: Uuid, message: impl Into<String>) {
        self.notifications.write().push(Notification {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            is_read: false,
            created_at: Utc::now(),
        });
    }

    /// Drop expired sessions. Called opportunistically on login.
    pub fn prune_sessions(&self) {
        let now = Utc::now();
        self.sessions.write().retain(|_, s| s.expires_at > now);
    }

    /// Seed the vector store with curriculum reference material: the
    /// learning-context file split into character windows, plus curated
    /// roadmap JSON files rendered as topic chunks. Skipped when the store
    /// already has entries.
    pub async fn seed_vector_store(&self) -> Result<()> {
        if !self.vector_store.is_empty() {
            tracing::info!(
                "Vector store already seeded ({} entries)",
                self.vector_store.len()
            );
            return Ok(());
        }

        let mut seeded = 0;

        if let Ok(text) = std::fs::read_to_string(&self.config.learning_context_file) {
            let chunks = chunker::char_window_chunks(&text);
            if !chunks.is_empty() {
                let vectors =
                    embeddings::embed_batch(&self.http_client, &self.config.llm, &chunks).await?;
                seeded += self
                    .vector_store
                    .add_chunks("learning_context", &chunks, vectors)?;
            }
        } else {
            tracing::debug!(
                "No learning context file at {}",
                self.config.learning_context_file.display()
            );
        }

        let topic_chunks = load_roadmap_topics(&self.config.roadmaps_dir);
        if !topic_chunks.is_empty() {
            let vectors =
                embeddings::embed_batch(&self.http_client, &self.config.llm, &topic_chunks)
                    .await?;
            seeded += self
                .vector_store
                .add_chunks("curated_roadmaps", &topic_chunks, vectors)?;
        }

        tracing::info!("Seeded vector store with {seeded} chunks");
        Ok(())
    }
}

fn load_database(path: &Path) -> Result<Database> {
    if !path.exists() {
        return Ok(Database::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render each curated roadmap JSON file into `Topic: {title}\n{description}`
/// chunks. Files that fail to parse are skipped with a warning.
fn load_roadmap_topics(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(json) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(value) => chunks.extend(topics_from_value(&value)),
            Err(e) => tracing::warn!("Skipping malformed roadmap file {}: {e}", path.display()),
        }
    }
    chunks
}

fn topics_from_value(value: &serde_json::Value) -> Vec<String> {
    let topics = match value.get("topics").and_then(|t| t.as_array()) {
        Some(arr) => arr.as_slice(),
        None => std::slice::from_ref(value),
    };

    topics
        .iter()
        .filter_map(|t| {
            let title = t.get("title").and_then(|v| v.as_str())?;
            let description = t
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Some(format!("Topic: {title}\n{description}"))
        })
        .collect()
}

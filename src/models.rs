use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// An uploaded document and its analysis results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub word_count: usize,
    pub status: DocumentStatus,
    pub summary: Option<String>,
    pub key_points: Vec<String>,
    pub qa_cards: Vec<QaCard>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Analyzing,
    Ready,
    Error(String),
}

/// A question/answer flashcard generated from a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaCard {
    pub question: String,
    pub answer: String,
}

/// A generated learning roadmap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub experience_level: String,
    pub timeline: String,
    pub specific_goals: Option<String>,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
}

/// One ordered step of a roadmap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub estimated_time: String,
    pub order: usize,
    pub state: StepState,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    InProgress,
    Completed,
}

/// A learning resource attached to a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

/// A user-facing notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// An authenticated session backing the `session_id` cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ─── Request / response types ────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identity: String,
    pub password: String,
}

/// User payload with the password hash stripped
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// Chat request: a question about one analyzed document
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub document_id: Uuid,
    pub message: String,
    pub history: Option<Vec<ChatMessage>>,
}

/// A single chat turn (user or assistant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chunk reference sent in the SSE `context` event
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnippet {
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoadmapRequest {
    /// The primary learning goal
    pub goal: String,
    #[serde(default = "default_experience_level")]
    pub experience_level: String,
    #[serde(default = "default_timeline")]
    pub timeline: String,
    pub specific_goals: Option<String>,
}

fn default_experience_level() -> String {
    "beginner".to_string()
}

fn default_timeline() -> String {
    "3 months".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepStateUpdate {
    pub state: StepState,
}

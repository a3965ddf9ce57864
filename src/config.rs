use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where persisted stores and index data live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Maximum upload size in MB
    pub max_upload_mb: u64,
    /// Maximum concurrent document analyses
    pub max_concurrent_analyses: usize,
    /// Maximum concurrent chat streams
    pub max_concurrent_chats: usize,
    /// Plain-text file seeding the learning-context vector store
    pub learning_context_file: PathBuf,
    /// Directory of JSON roadmap files seeding the vector store
    pub roadmaps_dir: PathBuf,
    /// OAuth login; `None` disables the OAuth routes
    pub oauth: Option<OauthConfig>,
}

/// Settings for an OAuth 2.0 authorization-code login. Endpoint defaults
/// target Google; any compliant provider works via the `OAUTH_*` overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for chat and analysis
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8000".to_string(),
            llm: LlmConfig::default(),
            session_ttl_secs: 7 * 24 * 3600,
            max_upload_mb: 10,
            max_concurrent_analyses: 2,
            max_concurrent_chats: 3,
            learning_context_file: PathBuf::from("./learning_context.txt"),
            roadmaps_dir: PathBuf::from("./data/roadmaps"),
            oauth: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("STUDYMATE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("STUDYMATE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("STUDYMATE_SESSION_TTL_SECS") {
            if let Ok(v) = val.parse() {
                config.session_ttl_secs = v;
            }
        }
        if let Ok(val) = std::env::var("STUDYMATE_MAX_UPLOAD_MB") {
            if let Ok(v) = val.parse() {
                config.max_upload_mb = v;
            }
        }
        if let Ok(val) = std::env::var("STUDYMATE_MAX_CONCURRENT_ANALYSES") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_analyses = v;
            }
        }
        if let Ok(val) = std::env::var("STUDYMATE_MAX_CONCURRENT_CHATS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_chats = v;
            }
        }
        if let Ok(path) = std::env::var("STUDYMATE_LEARNING_CONTEXT_FILE") {
            config.learning_context_file = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("STUDYMATE_ROADMAPS_DIR") {
            config.roadmaps_dir = PathBuf::from(dir);
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        if let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("OAUTH_CLIENT_ID"),
            std::env::var("OAUTH_CLIENT_SECRET"),
        ) {
            let var = |name: &str, default: String| {
                std::env::var(name).unwrap_or(default)
            };
            config.oauth = Some(OauthConfig {
                auth_url: var(
                    "OAUTH_AUTH_URL",
                    "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                ),
                token_url: var(
                    "OAUTH_TOKEN_URL",
                    "https://oauth2.googleapis.com/token".to_string(),
                ),
                userinfo_url: var(
                    "OAUTH_USERINFO_URL",
                    "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                ),
                redirect_url: var(
                    "OAUTH_REDIRECT_URL",
                    format!("http://{}/api/auth/oauth/callback", config.bind_addr),
                ),
                scope: var("OAUTH_SCOPE", "openid email profile".to_string()),
                client_id,
                client_secret,
            });
        }

        config
    }

    pub fn keyword_index_path(&self) -> PathBuf {
        self.data_dir.join("keyword_index.json")
    }

    pub fn vector_index_path(&self) -> PathBuf {
        self.data_dir.join("vector_index.json")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("studymate.json")
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

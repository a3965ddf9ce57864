//! # studymate
//!
//! A study assistant web application: users upload documents, the app analyzes
//! them with an LLM (summary, key points, Q&A cards), and users can chat with a
//! document or generate a personalized learning roadmap.
//!
//! ## Retrieval
//!
//! Two small in-process retrieval stores back the RAG features:
//!
//! ```text
//!   Document chat                      Roadmap generation
//!        │                                    │
//!        ▼                                    ▼
//!  ┌────────────────┐               ┌──────────────────┐
//!  │ KeywordIndex   │               │   VectorStore    │
//!  │ word-overlap   │               │ embeddings +     │
//!  │ scoring, per-  │               │ cosine similarity│
//!  │ document filter│               │ over context docs│
//!  └───────┬────────┘               └────────┬─────────┘
//!          │ top-K chunks                    │ top-3 chunks
//!          ▼                                 ▼
//!  ┌────────────────┐               ┌──────────────────┐
//!  │ chat prompt    │               │ roadmap prompt   │
//!  │ (SSE stream)   │               │ (strict JSON)    │
//!  └────────────────┘               └──────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, and LLM settings
//! - [`models`] - Shared data types: `User`, `Document`, `Roadmap`, request/response types
//! - [`auth`] - Password hashing, session tokens, and the `CurrentUser` extractor
//! - [`index`] - The two retrieval stores: keyword-overlap index and vector store
//! - [`llm`] - Generation (with retries), streaming chat, and embeddings via Ollama or OpenAI
//! - [`analysis`] - Chunking, document analysis pipeline, prompts, and input validation
//! - [`api`] - Axum HTTP handlers for auth, documents, chat, roadmaps, and notifications
//! - [`state`] - Shared application state holding stores, indexes, and persistence

pub mod analysis;
pub mod api;
pub mod auth;
pub mod config;
pub mod index;
pub mod llm;
pub mod models;
pub mod state;

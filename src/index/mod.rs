//! The two in-process retrieval stores.
//!
//! [`keyword`] scores chunks by word overlap and backs document chat;
//! [`vector`] scores by embedding cosine similarity and backs roadmap
//! context-building. They share a shape (add, search top-K, remove,
//! JSON persistence) but do not interact.

pub mod keyword;
pub mod vector;

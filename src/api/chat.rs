//! SSE chat over one analyzed document.
//!
//! Event order: one `context` event naming the chunks used, then `delta`
//! events with content, then `done`. Failures mid-stream surface as an
//! `error` event rather than a broken connection.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use super::ApiError;
use crate::analysis::{prompts, validate};
use crate::auth::CurrentUser;
use crate::llm::chat_stream::stream_chat;
use crate::models::{ChatMessage, ChatRequest, ContextSnippet, DocumentStatus};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 2_000;
const MAX_HISTORY_TURNS: usize = 10;
const CONTEXT_CHUNKS: usize = 3;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message = truncate_chars(&validate::sanitize_for_prompt(&req.message), MAX_MESSAGE_CHARS);
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is empty".to_string()));
    }

    let document = {
        let docs = state.documents.read();
        docs.iter()
            .find(|d| d.id == req.document_id && d.user_id == user.id)
            .cloned()
            .ok_or((StatusCode::NOT_FOUND, "Document not found".to_string()))?
    };
    if document.status != DocumentStatus::Ready {
        return Err((
            StatusCode::CONFLICT,
            "Document is still being analyzed".to_string(),
        ));
    }

    let hits = state
        .keyword_index
        .search(&message, Some(document.id), CONTEXT_CHUNKS);
    let snippets: Vec<ContextSnippet> = hits
        .iter()
        .map(|h| ContextSnippet {
            chunk_index: h.chunk_index,
            score: h.score,
        })
        .collect();

    // No matching chunks: fall back to answering from the stored summary
    let system = if hits.is_empty() {
        let summary = document.summary.clone().unwrap_or_default();
        prompts::chat_fallback_prompt(&document.filename, &summary)
    } else {
        let chunks: Vec<String> = hits.into_iter().map(|h| h.content).collect();
        prompts::chat_system_prompt(&document.filename, &chunks)
    };

    let mut messages = vec![ChatMessage {
        role: "system".to_string(),
        content: system,
    }];
    for turn in history_window(req.history.unwrap_or_default()) {
        messages.push(turn);
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: message,
    });

    let permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat is shutting down".to_string(),
            )
        })?;

    let llm_stream = stream_chat(&state.http_client, &state.config.llm, messages)
        .await
        .map_err(|e| {
            tracing::error!("Chat stream failed to start: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "The language model is unavailable".to_string(),
            )
        })?;

    let context_event = match Event::default().event("context").json_data(&snippets) {
        Ok(ev) => ev,
        Err(_) => Event::default().event("context").data("[]"),
    };

    let deltas = with_idle_timeout(llm_stream, IDLE_TIMEOUT).map(|item| match item {
        Ok(delta) => Event::default().event("delta").data(delta),
        Err(e) => {
            tracing::warn!("Chat stream error: {e:#}");
            Event::default().event("error").data(e.to_string())
        }
    });

    let events = stream::once(async move { context_event })
        .chain(deltas)
        .chain(stream::once(async { Event::default().event("done").data("") }))
        // Hold the concurrency permit for the life of the stream
        .map(move |ev| {
            let _permit = &permit;
            Ok::<_, Infallible>(ev)
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Keep the last `MAX_HISTORY_TURNS` user/assistant turns, sanitized.
fn history_window(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut turns: Vec<ChatMessage> = history
        .into_iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .map(|m| ChatMessage {
            role: m.role,
            content: truncate_chars(&validate::sanitize_for_prompt(&m.content), MAX_MESSAGE_CHARS),
        })
        .filter(|m| !m.content.is_empty())
        .collect();

    if turns.len() > MAX_HISTORY_TURNS {
        turns.drain(..turns.len() - MAX_HISTORY_TURNS);
    }
    turns
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// End the stream with an error item if the upstream goes quiet for longer
/// than `timeout` between deltas.
fn with_idle_timeout(
    inner: Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>,
    timeout: Duration,
) -> impl Stream<Item = anyhow::Result<String>> + Send {
    stream::unfold((inner, false), move |(mut inner, done)| async move {
        if done {
            return None;
        }
        match tokio::time::timeout(timeout, inner.next()).await {
            Ok(Some(item)) => {
                let done = item.is_err();
                Some((item, (inner, done)))
            }
            Ok(None) => None,
            Err(_) => Some((
                Err(anyhow::anyhow!("Chat response timed out")),
                (inner, true),
            )),
        }
    })
}

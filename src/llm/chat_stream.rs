use anyhow::{Context, Result};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use super::{to_wire, WireMessage};
use crate::config::LlmConfig;
use crate::models::ChatMessage;

type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Stream chat completions from the configured provider.
/// Returns a stream of content delta strings (one per token/chunk).
pub async fn stream_chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<ChatStream> {
    match config.provider.as_str() {
        "ollama" => stream_ollama(client, config, messages).await,
        "openai" => stream_openai(client, config, messages).await,
        other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
    }
}

// ─── Ollama (NDJSON body) ────────────────────────────────

#[derive(Serialize)]
struct OllamaStreamRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: WireMessage,
    done: bool,
}

async fn stream_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<ChatStream> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaStreamRequest {
        model: config.chat_model.clone(),
        messages: to_wire(messages),
        stream: true,
    };

    let resp = client
        .post(&url)
        .timeout(STREAM_TIMEOUT)
        .json(&req)
        .send()
        .await
        .context("Failed to connect to Ollama for chat streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_ollama_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse one Ollama NDJSON line: `Some(Ok(delta))`, `Some(Err(..))` on bad
/// JSON, `None` for blanks, empty deltas, and the done marker.
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(chunk) => {
            if chunk.done || chunk.message.content.is_empty() {
                return None;
            }
            Some(Ok(chunk.message.content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

// ─── OpenAI (SSE data: lines) ────────────────────────────

#[derive(Serialize)]
struct OpenAiStreamRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

async fn stream_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<ChatStream> {
    let url = format!("{}/v1/chat/completions", config.base_url);

    let req = OpenAiStreamRequest {
        model: config.chat_model.clone(),
        messages: to_wire(messages),
        stream: true,
    };

    let resp = client
        .post(&url)
        .timeout(STREAM_TIMEOUT)
        .header(
            "Authorization",
            format!("Bearer {}", config.api_key.as_deref().unwrap_or("")),
        )
        .json(&req)
        .send()
        .await
        .context("Failed to connect to OpenAI for chat streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_openai_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse one OpenAI SSE line: skips non-`data:` lines, `[DONE]`, and
/// role-only chunks.
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let data = line.trim().strip_prefix("data: ")?.trim();
    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default();
            if content.is_empty() {
                return None;
            }
            Some(Ok(content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

// ─── Line buffering ──────────────────────────────────────

/// Incremental line splitter over a chunked response body. Bytes accumulate
/// until a newline lands, so a JSON line split across network chunks comes
/// out whole. Blank lines (SSE separators) are dropped.
struct LineReader {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    buf: Vec<u8>,
    ready: VecDeque<String>,
    exhausted: bool,
}

impl LineReader {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            if !line.trim().is_empty() {
                self.ready.push_back(line.into_owned());
            }
        }
    }

    /// The unterminated remainder once the body ends, if any.
    fn take_tail(&mut self) -> Option<String> {
        let tail = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        (!tail.is_empty()).then_some(tail)
    }
}

/// Convert a byte stream into a stream of complete non-blank lines.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    let reader = LineReader {
        inner: Box::pin(byte_stream),
        buf: Vec::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    futures_util::stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(line) = reader.ready.pop_front() {
                return Some((Ok(line), reader));
            }
            if reader.exhausted {
                return reader.take_tail().map(|line| (Ok(line), reader));
            }

            match reader.inner.next().await {
                Some(Ok(bytes)) => reader.push_bytes(&bytes),
                Some(Err(e)) => {
                    return Some((Err(anyhow::anyhow!("Stream read error: {e}")), reader));
                }
                None => reader.exhausted = true,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_delta() {
        let line = r#"{"message":{"role":"assistant","content":"Photosynthesis"},"done":false}"#;
        assert_eq!(parse_ollama_line(line).unwrap().unwrap(), "Photosynthesis");
    }

    #[test]
    fn test_parse_ollama_done_and_empty() {
        assert!(parse_ollama_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).is_none());
        assert!(parse_ollama_line(r#"{"message":{"role":"assistant","content":""},"done":false}"#).is_none());
        assert!(parse_ollama_line("").is_none());
    }

    #[test]
    fn test_parse_ollama_malformed() {
        assert!(parse_ollama_line("not json at all").unwrap().is_err());
    }

    #[test]
    fn test_parse_openai_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(parse_openai_line(line).unwrap().unwrap(), "Hi");
    }

    #[test]
    fn test_parse_openai_skips_done_and_role_chunks() {
        assert!(parse_openai_line("data: [DONE]").is_none());
        assert!(parse_openai_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
        assert!(parse_openai_line(r#"data: {"choices":[{"delta":{"content":null}}]}"#).is_none());
    }

    #[test]
    fn test_parse_openai_ignores_non_data_lines() {
        assert!(parse_openai_line("event: message").is_none());
        assert!(parse_openai_line("").is_none());
    }

    #[test]
    fn test_parse_openai_malformed() {
        assert!(parse_openai_line("data: {broken").unwrap().is_err());
    }

    async fn collect_lines(chunks: Vec<&str>) -> Vec<String> {
        let body: Vec<reqwest::Result<bytes::Bytes>> = chunks
            .into_iter()
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        stream_lines(futures_util::stream::iter(body))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_stream_lines_reassembles_split_chunks() {
        // A JSON line split mid-object across two body chunks
        let lines = collect_lines(vec!["{\"a\":", "1}\n{\"b\":2}\n"]).await;
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn test_stream_lines_skips_blank_separators() {
        let lines = collect_lines(vec!["data: x\n\n\ndata: y\n"]).await;
        assert_eq!(lines, vec!["data: x", "data: y"]);
    }

    #[tokio::test]
    async fn test_stream_lines_yields_unterminated_tail() {
        let lines = collect_lines(vec!["first\n", "no newline at end"]).await;
        assert_eq!(lines, vec!["first", "no newline at end"]);
    }

    #[tokio::test]
    async fn test_stream_lines_empty_body() {
        let lines = collect_lines(vec![]).await;
        assert!(lines.is_empty());
    }
}

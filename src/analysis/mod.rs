//! Document analysis pipeline and its supporting pieces: chunking,
//! prompt templates, input validation, and LLM-output parsing.

pub mod chunker;
pub mod prompts;
pub mod validate;

use anyhow::Result;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::llm::client::generate;
use crate::models::QaCard;

/// The AI-generated artifacts stored on a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    pub qa_cards: Vec<QaCard>,
}

/// Run the full analysis pipeline: summary, key points, Q&A cards.
///
/// The summary call is required; key points and cards degrade to empty on
/// failure so a flaky LLM does not fail the whole upload.
pub async fn analyze_document(
    client: &reqwest::Client,
    config: &LlmConfig,
    content: &str,
) -> Result<DocumentAnalysis> {
    let summary_raw = generate(client, config, &prompts::summary_prompt(content)).await?;
    let summary = parse_summary(&summary_raw);

    let key_points = match generate(client, config, &prompts::key_points_prompt(content)).await {
        Ok(raw) => parse_key_points(&raw),
        Err(e) => {
            tracing::warn!("Key point extraction failed: {e:#}");
            Vec::new()
        }
    };

    let qa_cards =
        match generate(client, config, &prompts::qa_cards_prompt(content, &summary)).await {
            Ok(raw) => parse_qa_cards(&raw),
            Err(e) => {
                tracing::warn!("Q&A card generation failed: {e:#}");
                Vec::new()
            }
        };

    Ok(DocumentAnalysis {
        summary,
        key_points,
        qa_cards,
    })
}

/// Pull the "summary" field out of a structured response, falling back to
/// the raw text when the LLM ignored the JSON instruction.
pub fn parse_summary(response: &str) -> String {
    if let Some(obj) = extract_json_object(response) {
        if let Some(s) = obj.get("summary").and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }
    response.trim().to_string()
}

/// Parse key points from a JSON `key_points` array, or from bullet lines.
pub fn parse_key_points(response: &str) -> Vec<String> {
    if let Some(obj) = extract_json_object(response) {
        if let Some(arr) = obj.get("key_points").and_then(|v| v.as_array()) {
            return arr
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    response
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('*') || l.starts_with('-'))
        .map(|l| l.trim_start_matches(['*', '-']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Parse Q&A cards from a JSON array, falling back to `Q:`/`A:` text pairs.
pub fn parse_qa_cards(response: &str) -> Vec<QaCard> {
    if let Some(json_str) = extract_json_array(response) {
        if let Ok(cards) = serde_json::from_str::<Vec<QaCard>>(&json_str) {
            return cards;
        }
    }
    parse_qa_text_fallback(response)
}

/// Parse plain-text `Q: ...` / `A: ...` pairs into cards. An answer may span
/// multiple lines until the next `Q:`.
fn parse_qa_text_fallback(text: &str) -> Vec<QaCard> {
    let mut cards = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Vec<String> = Vec::new();

    let flush = |question: &mut Option<String>, answer: &mut Vec<String>, cards: &mut Vec<QaCard>| {
        if let Some(q) = question.take() {
            let a = answer.join("\n").trim().to_string();
            if !a.is_empty() {
                cards.push(QaCard {
                    question: q,
                    answer: a,
                });
            }
        }
        answer.clear();
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(q) = trimmed.strip_prefix("Q:") {
            flush(&mut question, &mut answer, &mut cards);
            question = Some(q.trim().to_string());
        } else if let Some(a) = trimmed.strip_prefix("A:") {
            answer.push(a.trim().to_string());
        } else if question.is_some() && !answer.is_empty() && !trimmed.is_empty() {
            answer.push(trimmed.to_string());
        }
    }
    flush(&mut question, &mut answer, &mut cards);

    cards
}

/// Extract the first JSON object from a response that may wrap it in a
/// fenced code block or surrounding prose.
pub fn extract_json_object(response: &str) -> Option<Value> {
    let candidate = slice_between(response, '{', '}')?;
    serde_json::from_str(candidate).ok()
}

/// Extract the first JSON array as a raw string, same tolerance as
/// [`extract_json_object`].
pub fn extract_json_array(response: &str) -> Option<String> {
    slice_between(response, '[', ']').map(str::to_string)
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

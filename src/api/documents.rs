//! Document upload, listing, and deletion. Analysis runs in a background
//! task so uploads return immediately.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use super::{auth::internal_error, ApiError};
use crate::analysis::{self, chunker};
use crate::auth::CurrentUser;
use crate::models::{Document, DocumentStatus};
use crate::state::AppState;

const SUPPORTED_TYPES: &[&str] = &["text/plain", "text/markdown"];
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("untitled.txt").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}")))?;
        upload = Some((filename, content_type, data));
        break;
    }

    let Some((filename, content_type, data)) = upload else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart field 'file' is required".to_string(),
        ));
    };

    if !analysis::validate::valid_filename(&filename) {
        return Err((StatusCode::BAD_REQUEST, "Invalid filename".to_string()));
    }
    if !is_supported(&filename, &content_type) {
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Unsupported file type '{content_type}'; upload plain text or markdown"),
        ));
    }
    if data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "File is empty".to_string()));
    }

    let content = String::from_utf8(data.to_vec())
        .map_err(|_| (StatusCode::BAD_REQUEST, "File is not valid UTF-8 text".to_string()))?;
    if content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "File contains no text".to_string()));
    }

    let document = Document {
        id: Uuid::new_v4(),
        user_id: user.id,
        filename,
        content_type: if content_type.is_empty() {
            "text/plain".to_string()
        } else {
            content_type
        },
        word_count: content.split_whitespace().count(),
        status: DocumentStatus::Uploaded,
        summary: None,
        key_points: Vec::new(),
        qa_cards: Vec::new(),
        uploaded_at: Utc::now(),
    };

    state.documents.write().push(document.clone());
    state
        .persist()
        .map_err(|e| internal_error("Failed to save document", e))?;

    tokio::spawn(run_analysis(state.clone(), document.id, content));

    Ok((StatusCode::CREATED, Json(document)))
}

fn is_supported(filename: &str, content_type: &str) -> bool {
    if SUPPORTED_TYPES.iter().any(|t| content_type.starts_with(t)) {
        return true;
    }
    // Browsers sometimes send octet-stream for .md files
    if content_type.is_empty() || content_type == "application/octet-stream" {
        let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
        return SUPPORTED_EXTENSIONS.contains(&ext.as_str());
    }
    false
}

/// Background analysis: chunk and index the text, then run the LLM pipeline
/// and store the results on the document.
async fn run_analysis(state: AppState, document_id: Uuid, content: String) {
    let _permit = match state.analysis_semaphore.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return,
    };

    set_status(&state, document_id, DocumentStatus::Analyzing);

    let result = analyze_and_index(&state, document_id, &content).await;
    let (status, message) = analysis_outcome(document_id, result);
    finalize_analysis(&state, document_id, status, &message);
}

/// Map the pipeline result to a document status and notification text.
/// The failure detail stays in the log; clients see a generic message.
fn analysis_outcome(document_id: Uuid, result: anyhow::Result<()>) -> (DocumentStatus, String) {
    match result {
        Ok(()) => (
            DocumentStatus::Ready,
            "Document analysis complete".to_string(),
        ),
        Err(e) => {
            tracing::error!("Analysis of document {document_id} failed: {e:#}");
            (
                DocumentStatus::Error("Analysis failed".to_string()),
                "Document analysis failed".to_string(),
            )
        }
    }
}

/// Store the outcome and notify the owner. A document deleted mid-analysis
/// has no record left to update, but this task may have indexed chunks after
/// the delete handler removed them; drop them here so indexed chunks never
/// outlive their document.
fn finalize_analysis(state: &AppState, document_id: Uuid, status: DocumentStatus, message: &str) {
    let owner = {
        let mut documents = state.documents.write();
        documents.iter_mut().find(|d| d.id == document_id).map(|doc| {
            doc.status = status;
            (doc.user_id, doc.filename.clone())
        })
    };

    match owner {
        Some((user_id, filename)) => {
            state.notify(user_id, format!("{message}: {filename}"));
            if let Err(e) = state.persist() {
                tracing::error!("Failed to persist after analysis: {e:#}");
            }
        }
        None => {
            tracing::info!("Document {document_id} was deleted during analysis, dropping its chunks");
            if let Err(e) = state.keyword_index.remove_document(document_id) {
                tracing::error!("Failed to drop chunks for deleted document {document_id}: {e:#}");
            }
        }
    }
}

async fn analyze_and_index(
    state: &AppState,
    document_id: Uuid,
    content: &str,
) -> anyhow::Result<()> {
    let chunks = chunker::sentence_chunks(content);
    state.keyword_index.index_chunks(document_id, &chunks)?;
    tracing::info!("Indexed {} chunks for document {document_id}", chunks.len());

    let analysis =
        analysis::analyze_document(&state.http_client, &state.config.llm, content).await?;

    let mut documents = state.documents.write();
    if let Some(doc) = documents.iter_mut().find(|d| d.id == document_id) {
        doc.summary = Some(analysis.summary);
        doc.key_points = analysis.key_points;
        doc.qa_cards = analysis.qa_cards;
    }

    Ok(())
}

fn set_status(state: &AppState, document_id: Uuid, status: DocumentStatus) {
    let mut documents = state.documents.write();
    if let Some(doc) = documents.iter_mut().find(|d| d.id == document_id) {
        doc.status = status;
    }
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Document>> {
    let mut docs: Vec<Document> = state
        .documents
        .read()
        .iter()
        .filter(|d| d.user_id == user.id)
        .cloned()
        .collect();
    docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    Json(docs)
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let docs = state.documents.read();
    docs.iter()
        .find(|d| d.id == id && d.user_id == user.id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Document not found".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existed = {
        let mut docs = state.documents.write();
        let before = docs.len();
        docs.retain(|d| !(d.id == id && d.user_id == user.id));
        docs.len() < before
    };

    if !existed {
        return Err((StatusCode::NOT_FOUND, "Document not found".to_string()));
    }

    // Indexed chunks go with the document
    state
        .keyword_index
        .remove_document(id)
        .map_err(|e| internal_error("Failed to remove document chunks", e))?;
    state
        .persist()
        .map_err(|e| internal_error("Failed to save deletion", e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        (dir, state)
    }

    fn make_document(state: &AppState) -> Document {
        let doc = Document {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            filename: "notes.txt".into(),
            content_type: "text/plain".into(),
            word_count: 10,
            status: DocumentStatus::Analyzing,
            summary: None,
            key_points: Vec::new(),
            qa_cards: Vec::new(),
            uploaded_at: Utc::now(),
        };
        state.documents.write().push(doc.clone());
        doc
    }

    #[test]
    fn test_finalize_updates_document_and_notifies() {
        let (_dir, state) = test_state();
        let doc = make_document(&state);
        state
            .keyword_index
            .index_chunks(doc.id, &["indexed chunk content".to_string()])
            .unwrap();

        finalize_analysis(&state, doc.id, DocumentStatus::Ready, "Document analysis complete");

        let docs = state.documents.read();
        assert_eq!(docs[0].status, DocumentStatus::Ready);
        assert_eq!(state.notifications.read().len(), 1);
        // Chunks stay while the document exists
        assert_eq!(state.keyword_index.stats().total_chunks, 1);
    }

    #[test]
    fn test_finalize_drops_chunks_for_deleted_document() {
        let (_dir, state) = test_state();
        // Chunks indexed by the background task after the document was
        // deleted out from under it
        let document_id = Uuid::new_v4();
        state
            .keyword_index
            .index_chunks(document_id, &["orphaned chunk content".to_string()])
            .unwrap();

        finalize_analysis(&state, document_id, DocumentStatus::Ready, "Document analysis complete");

        assert_eq!(state.keyword_index.stats().total_chunks, 0);
        assert!(state.keyword_index.document_chunks(document_id).is_empty());
        assert!(state.notifications.read().is_empty());
    }

    #[test]
    fn test_error_outcome_hides_failure_detail() {
        let err = anyhow::anyhow!("connection refused")
            .context("Failed to call Ollama chat API at http://localhost:11434");
        let (status, message) = analysis_outcome(Uuid::new_v4(), Err(err));

        match status {
            DocumentStatus::Error(msg) => {
                assert!(!msg.contains("11434"));
                assert!(!msg.contains("connection refused"));
                assert_eq!(msg, "Analysis failed");
            }
            other => panic!("expected error status, got {other:?}"),
        }
        assert_eq!(message, "Document analysis failed");
    }

    #[test]
    fn test_is_supported_types_and_extensions() {
        assert!(is_supported("notes.txt", "text/plain"));
        assert!(is_supported("notes.md", "text/markdown"));
        assert!(is_supported("notes.md", "application/octet-stream"));
        assert!(is_supported("notes.markdown", ""));
        assert!(!is_supported("slides.pdf", "application/pdf"));
        assert!(!is_supported("report.docx", "application/octet-stream"));
    }
}

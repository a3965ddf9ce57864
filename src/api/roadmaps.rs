//! Roadmap generation and progress tracking.
//!
//! Generation grounds the LLM in the top learning-context chunks from the
//! vector store, demands strict JSON, and rejects anything unparseable.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{auth::internal_error, ApiError};
use crate::analysis::{self, prompts, validate};
use crate::auth::CurrentUser;
use crate::llm::{client, embeddings};
use crate::models::{Resource, Roadmap, RoadmapRequest, Step, StepState, StepStateUpdate};
use crate::state::AppState;

const CONTEXT_CHUNKS: usize = 3;

/// Shape the LLM is asked to produce. Mapped into [`Step`]s with fresh ids.
#[derive(Deserialize)]
struct LlmRoadmap {
    steps: Vec<LlmStep>,
}

#[derive(Deserialize)]
struct LlmStep {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    estimated_time: String,
    #[serde(default)]
    resources: Vec<LlmResource>,
}

#[derive(Deserialize)]
struct LlmResource {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RoadmapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let goal = validate::sanitize_for_prompt(&req.goal);
    if let Err(rejection) = validate::validate_learning_goal(&goal) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "{} Try something like: {}",
                rejection.reason,
                rejection.suggestions.join("; ")
            ),
        ));
    }
    let enhanced = validate::enhance_goal(&goal);

    let context = retrieve_context(&state, &enhanced).await;
    let specific_goals: Vec<String> = req
        .specific_goals
        .as_deref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .into_iter()
        .collect();

    let prompt = prompts::roadmap_prompt(
        &enhanced,
        &req.experience_level,
        &req.timeline,
        &specific_goals,
        &context,
    );

    let response = client::generate(&state.http_client, &state.config.llm, &prompt)
        .await
        .map_err(|e| {
            tracing::error!("Roadmap generation failed: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "The language model is unavailable".to_string(),
            )
        })?;

    let steps = parse_steps(&response).ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "The language model returned an unusable roadmap".to_string(),
    ))?;

    let roadmap = Roadmap {
        id: Uuid::new_v4(),
        user_id: user.id,
        topic: goal,
        experience_level: req.experience_level,
        timeline: req.timeline,
        specific_goals: req.specific_goals,
        created_at: Utc::now(),
        steps,
    };

    state.roadmaps.write().push(roadmap.clone());
    state.notify(user.id, format!("Roadmap ready: {}", roadmap.topic));
    state
        .persist()
        .map_err(|e| internal_error("Failed to save roadmap", e))?;

    tracing::info!(
        "Created roadmap '{}' with {} steps for {}",
        roadmap.topic,
        roadmap.steps.len(),
        user.username
    );

    Ok((StatusCode::CREATED, Json(roadmap)))
}

/// Embed the goal and fetch the closest learning-context chunks. Retrieval
/// failure degrades to an ungrounded prompt rather than failing the request.
async fn retrieve_context(state: &AppState, query: &str) -> Vec<String> {
    if state.vector_store.is_empty() {
        return Vec::new();
    }

    match embeddings::embed_single(&state.http_client, &state.config.llm, query).await {
        Ok(embedding) => state
            .vector_store
            .search(&embedding, CONTEXT_CHUNKS)
            .into_iter()
            .map(|hit| hit.content)
            .collect(),
        Err(e) => {
            tracing::warn!("Context retrieval failed, generating ungrounded: {e:#}");
            Vec::new()
        }
    }
}

fn parse_steps(response: &str) -> Option<Vec<Step>> {
    let value = analysis::extract_json_object(response)?;
    let parsed: LlmRoadmap = serde_json::from_value(value).ok()?;
    if parsed.steps.is_empty() {
        return None;
    }

    let steps = parsed
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| Step {
            id: Uuid::new_v4(),
            name: s.name,
            description: s.description,
            estimated_time: s.estimated_time,
            order: i,
            state: StepState::NotStarted,
            resources: s
                .resources
                .into_iter()
                .map(|r| Resource {
                    name: r.name,
                    url: r.url,
                    description: r.description,
                })
                .collect(),
        })
        .collect();

    Some(steps)
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Roadmap>> {
    let mut roadmaps: Vec<Roadmap> = state
        .roadmaps
        .read()
        .iter()
        .filter(|r| r.user_id == user.id)
        .cloned()
        .collect();
    roadmaps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(roadmaps)
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Roadmap>, ApiError> {
    let roadmaps = state.roadmaps.read();
    roadmaps
        .iter()
        .find(|r| r.id == id && r.user_id == user.id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Roadmap not found".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existed = {
        let mut roadmaps = state.roadmaps.write();
        let before = roadmaps.len();
        roadmaps.retain(|r| !(r.id == id && r.user_id == user.id));
        roadmaps.len() < before
    };

    if !existed {
        return Err((StatusCode::NOT_FOUND, "Roadmap not found".to_string()));
    }

    state
        .persist()
        .map_err(|e| internal_error("Failed to save deletion", e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_step(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<StepStateUpdate>,
) -> Result<Json<Roadmap>, ApiError> {
    let roadmap = {
        let mut roadmaps = state.roadmaps.write();
        let roadmap = roadmaps
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user.id)
            .ok_or((StatusCode::NOT_FOUND, "Roadmap not found".to_string()))?;

        let step = roadmap
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or((StatusCode::NOT_FOUND, "Step not found".to_string()))?;

        step.state = update.state;
        roadmap.clone()
    };

    state
        .persist()
        .map_err(|e| internal_error("Failed to save progress", e))?;
    Ok(Json(roadmap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps_strict_json() {
        let response = r#"{
            "steps": [
                {"name": "Syntax basics", "description": "Variables and control flow.",
                 "estimated_time": "1 week",
                 "resources": [{"name": "The Book", "url": "https://doc.rust-lang.org/book/"}]},
                {"name": "Ownership", "description": "Borrowing and lifetimes.",
                 "estimated_time": "2 weeks", "resources": []}
            ]
        }"#;

        let steps = parse_steps(response).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].order, 0);
        assert_eq!(steps[1].order, 1);
        assert_eq!(steps[0].state, StepState::NotStarted);
        assert_eq!(steps[0].resources.len(), 1);
    }

    #[test]
    fn test_parse_steps_tolerates_wrapping_prose() {
        let response = "Here is your roadmap:\n```json\n{\"steps\": [{\"name\": \"Start\"}]}\n```";
        let steps = parse_steps(response).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "Start");
        assert!(steps[0].description.is_empty());
    }

    #[test]
    fn test_parse_steps_rejects_garbage() {
        assert!(parse_steps("I'd be happy to help you learn!").is_none());
        assert!(parse_steps(r#"{"steps": []}"#).is_none());
        assert!(parse_steps(r#"{"plan": "do things"}"#).is_none());
    }
}

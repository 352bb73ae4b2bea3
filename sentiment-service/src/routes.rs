//! HTTP surface of the scoring service.

use crate::orchestrator::BatchOrchestrator;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use croplisten_core::{Platform, SentimentError};
use sentiment::Analyzer;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use storage::DocumentStore;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub analyzer: Arc<Analyzer>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub model_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/analyse", post(analyse))
        .route("/analyse/batch", post(analyse_batch))
        .route("/analyse-by-id", post(analyse_by_id))
        .route("/unanalysed-count", get(unanalysed_count))
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<Value>);

fn internal_error(err: impl std::fmt::Display) -> ApiResponse {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
}

async fn home() -> Json<Value> {
    Json(json!({ "status": "running", "service": "sentiment-analysis" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let db = match state.store.count_unscored(Platform::Reddit).await {
        Ok(_) => "connected",
        Err(_) => "not connected",
    };
    Json(json!({ "status": "healthy", "model": state.model_url, "db": db }))
}

#[derive(Debug, Deserialize)]
struct AnalyseRequest {
    text: Option<String>,
    post_id: Option<String>,
}

async fn analyse(
    State(state): State<AppState>,
    Json(req): Json<AnalyseRequest>,
) -> ApiResponse {
    let Some(text) = req.text.filter(|t| !t.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No text provided" })),
        );
    };

    match state.analyzer.analyze(&text).await {
        Ok(analysis) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "analysis": {
                    "sentiment": analysis.sentiment,
                    "entities": analysis.entities,
                    "processed_text": analysis.processed_text,
                    "agricultural_terms": analysis.entities,
                },
                "post_id": req.post_id,
            })),
        ),
        Err(SentimentError::EmptyInput) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No text provided" })),
        ),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    source: Option<String>,
}

fn default_batch_size() -> usize {
    50
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            source: None,
        }
    }
}

async fn analyse_batch(
    State(state): State<AppState>,
    payload: Option<Json<BatchRequest>>,
) -> ApiResponse {
    let req = payload.map(|Json(r)| r).unwrap_or_default();

    let source = match req.source.as_deref() {
        Some(s) => match s.parse::<Platform>() {
            Ok(platform) => Some(platform),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": e })),
                )
            }
        },
        None => None,
    };

    info!(batch_size = req.batch_size, source = ?source, "starting batch analysis");
    match state.orchestrator.run_batch(req.batch_size, source).await {
        Ok(report) if report.fetched == 0 => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "processed": 0,
                "message": "No unanalysed posts found",
            })),
        ),
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "processed": report.processed,
                "errors": report.errors,
                "remaining": report.remaining,
                "message": format!(
                    "Processed {} posts, with {} errors. {} posts remaining.",
                    report.processed, report.errors, report.remaining.total
                ),
            })),
        ),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct AnalyseByIdRequest {
    post_id: String,
    #[serde(default)]
    source: Option<String>,
}

async fn analyse_by_id(
    State(state): State<AppState>,
    Json(req): Json<AnalyseByIdRequest>,
) -> ApiResponse {
    // With a source only that platform is checked; otherwise the post is
    // looked up on every platform in turn.
    let platforms: Vec<Platform> = match req.source.as_deref() {
        Some(s) => match s.parse::<Platform>() {
            Ok(platform) => vec![platform],
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": e })),
                )
            }
        },
        None => Platform::ALL.to_vec(),
    };

    let mut found = None;
    for platform in platforms {
        match state.store.find_post(platform, &req.post_id).await {
            Ok(Some(post)) => {
                found = Some((platform, post));
                break;
            }
            Ok(None) => {}
            Err(e) => return internal_error(e),
        }
    }

    let Some((platform, post)) = found else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Post with ID {} not found", req.post_id) })),
        );
    };

    if post.content_text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Post has no content to analyse" })),
        );
    }

    match state.analyzer.analyze(&post.content_text).await {
        Ok(analysis) => {
            if let Err(e) = state
                .store
                .update_sentiment(
                    platform,
                    &post.post_id,
                    &analysis.sentiment,
                    &analysis.entities,
                    &analysis.processed_text,
                )
                .await
            {
                return internal_error(e);
            }
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "post_id": post.post_id,
                    "source": platform.as_str().to_lowercase(),
                    "sentiment": analysis.sentiment,
                })),
            )
        }
        Err(SentimentError::EmptyInput) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Post has no content to analyse" })),
        ),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct CountQuery {
    source: Option<String>,
}

async fn unanalysed_count(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> ApiResponse {
    match query.source.as_deref() {
        Some(s) => match s.parse::<Platform>() {
            Ok(platform) => match state.store.count_unscored(platform).await {
                Ok(total) => (StatusCode::OK, Json(json!({ "total": total }))),
                Err(e) => internal_error(e),
            },
            Err(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Unknown source: {s}") })),
            ),
        },
        None => match state.orchestrator.unscored_counts().await {
            Ok(counts) => (StatusCode::OK, Json(json!(counts))),
            Err(e) => internal_error(e),
        },
    }
}

//! REST endpoints for email analysis.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartError, rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::extract::extract_text;
use crate::error::ExtractError;
use crate::pipeline::EmailAnalyzer;
use crate::pipeline::types::{AnalysisOutcome, Category, GeneratedBy};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<EmailAnalyzer>,
}

/// Build the Axum router with the analysis and health routes.
pub fn analysis_routes(analyzer: Arc<EmailAnalyzer>, max_body_bytes: usize) -> Router {
    let state = AppState { analyzer };

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_json))
        .route("/analyze", post(analyze_form))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub email_text: Option<String>,
}

/// Body returned by `POST /api/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub category: Category,
    pub confidence: f32,
    pub confidence_percent: String,
    pub response: String,
    pub suggested_actions: Vec<String>,
    pub method: String,
    pub generated_by: GeneratedBy,
    pub reasoning: String,
    pub analyzed_at: DateTime<Utc>,
}

impl From<AnalysisOutcome> for AnalysisResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        let confidence_percent = outcome.confidence_percent();
        Self {
            category: outcome.classification.category,
            confidence: outcome.classification.confidence,
            confidence_percent,
            response: outcome.response,
            suggested_actions: outcome.suggested_actions,
            method: outcome.classification.method,
            generated_by: outcome.generated_by,
            reasoning: outcome.classification.reasoning,
            analyzed_at: Utc::now(),
        }
    }
}

/// Body returned by the upload form endpoint `POST /analyze`, in the
/// Portuguese shape the web form reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAnalysisResponse {
    /// `PRODUTIVO` or `IMPRODUTIVO`.
    pub categoria: String,
    /// Confidence as a percentage string, e.g. `87.5%`.
    pub confianca: String,
    pub resposta_automatica: String,
    pub acoes_sugeridas: Vec<String>,
    pub metodo_classificacao: String,
    pub gerado_por: GeneratedBy,
    pub justificativa: String,
}

impl From<AnalysisOutcome> for FormAnalysisResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        let confianca = outcome.confidence_percent();
        let categoria = match outcome.classification.category {
            Category::Productive => "PRODUTIVO",
            Category::Unproductive => "IMPRODUTIVO",
        };
        Self {
            categoria: categoria.to_string(),
            confianca,
            resposta_automatica: outcome.response,
            acoes_sugeridas: outcome.suggested_actions,
            metodo_classificacao: outcome.classification.method,
            gerado_por: outcome.generated_by,
            justificativa: outcome.classification.reasoning,
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

/// Failures surfaced to HTTP clients as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge,
    Internal(String),
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(format!("Invalid form data: {}", e.body_text()))
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(format!("Invalid JSON body: {}", e.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large".to_string(),
            ),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "email-triage"
    }))
}

async fn analyze_json(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(request) = body?;
    let text = request.email_text.unwrap_or_default();
    let outcome = analyze(&state, &text).await?;
    Ok(Json(outcome.into()))
}

async fn analyze_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<FormAnalysisResponse>, ApiError> {
    let mut file_text = None;
    let mut form_text = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "email_file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // Skip the empty part browsers send when no file is chosen.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                info!(file_name = %file_name, bytes = data.len(), "Received upload");
                let text = tokio::task::spawn_blocking(move || extract_text(&file_name, &data))
                    .await
                    .map_err(|e| ApiError::Internal(format!("Extraction task failed: {e}")))??;
                file_text = Some(text);
            }
            "email_text" => {
                form_text = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let text = file_text.or(form_text).unwrap_or_default();
    let outcome = analyze(&state, &text).await?;
    Ok(Json(outcome.into()))
}

async fn analyze(state: &AppState, text: &str) -> Result<AnalysisOutcome, ApiError> {
    if text.trim().is_empty() {
        warn!("Rejected empty analysis request");
        return Err(ApiError::BadRequest("Email text is empty".to_string()));
    }
    Ok(state.analyzer.analyze(text).await)
}

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::pipeline::{Analysis, AnalysisInput, InferenceContext, InputError};
use crate::record::{DiseasePrediction, InferenceRecord, PredictorTier};

/// Header carrying the caller's identity (set by the auth layer in front of us).
pub const USER_HEADER: &str = "x-user-id";
pub const ANONYMOUS: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<InferenceContext>,
}

impl AppState {
    pub fn new(ctx: InferenceContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze_text))
        .route("/analyze/audio", post(analyze_audio))
        .route("/history", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResp {
    transcription: String,
    extracted_symptoms: Vec<String>,
    predictions: Vec<DiseasePrediction>,
    predictor: PredictorTier,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fallback_trail: Vec<String>,
    final_summary: String,
    persisted: bool,
}

impl From<Analysis> for AnalyzeResp {
    fn from(a: Analysis) -> Self {
        let r = a.record;
        Self {
            transcription: r.raw_text,
            extracted_symptoms: r.symptoms.as_slice().to_vec(),
            predictions: r.predictions.iter().cloned().collect(),
            predictor: r.predictor,
            fallback_trail: r.fallback_trail,
            final_summary: r.summary,
            persisted: a.persisted,
        }
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

async fn analyze_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<AnalyzeResp>, ApiError> {
    let input = AnalysisInput {
        user_id: user_id(&headers),
        text: body.text,
        audio: None,
    };
    let analysis = state.ctx.analyze(input).await?;
    Ok(Json(analysis.into()))
}

async fn analyze_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AnalyzeResp>, ApiError> {
    let input = AnalysisInput {
        user_id: user_id(&headers),
        text: None,
        audio: Some(body.to_vec()),
    };
    let analysis = state.ctx.analyze(input).await?;
    Ok(Json(analysis.into()))
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<InferenceRecord>>, ApiError> {
    let user = user_id(&headers);
    match state.ctx.store.for_user(&user).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            tracing::warn!(target: "persist", error = ?e, "history read failed");
            Err(ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "history unavailable".to_string(),
            })
        }
    }
}

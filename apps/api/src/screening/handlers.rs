use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::gate::Identity;
use crate::errors::AppError;
use crate::guard::Precheck;
use crate::screening::matching::{
    neural_match, validate_match_input, CandidateMatch, CandidateSummary,
};
use crate::screening::resume::{extract_resume, pdf_text, ExtractedResume};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractResumeRequest {
    pub raw_text: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeUploadResponse {
    pub filename: Option<String>,
    pub resume: ExtractedResume,
}

#[derive(Debug, Deserialize)]
pub struct NeuralMatchRequest {
    pub persona: String,
    pub candidates: Vec<CandidateSummary>,
}

impl Precheck for NeuralMatchRequest {
    fn precheck(&self) -> Result<(), AppError> {
        validate_match_input(&self.persona, &self.candidates)
    }
}

#[derive(Debug, Serialize)]
pub struct NeuralMatchResponse {
    pub matches: Vec<CandidateMatch>,
    pub tokens_remaining: i64,
}

/// POST /api/v1/screening/resume
pub async fn handle_extract_resume(
    State(state): State<AppState>,
    Json(req): Json<ExtractResumeRequest>,
) -> Result<Json<ExtractedResume>, AppError> {
    Ok(Json(extract_resume(&req.raw_text, &state.llm).await?))
}

/// POST /api/v1/screening/resume/upload (multipart field `file`, PDF)
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<ResumeUploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let is_pdf = field.content_type() == Some("application/pdf")
            || filename
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().ends_with(".pdf"));
        if !is_pdf {
            return Err(AppError::Validation("Only PDF uploads are supported".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Upload interrupted: {e}")))?;
        let text = tokio::task::spawn_blocking(move || pdf_text(&bytes))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        info!("Extracting uploaded resume for account {}", identity.id);
        let resume = extract_resume(&text, &state.llm).await?;
        return Ok(Json(ResumeUploadResponse { filename, resume }));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}

/// POST /api/v1/screening/match
/// Metered: the guard has already checked the body and charged the caller
/// when this runs.
pub async fn handle_neural_match(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<NeuralMatchRequest>,
) -> Result<Json<NeuralMatchResponse>, AppError> {
    let matches = neural_match(&req.persona, &req.candidates, &state.llm).await?;
    Ok(Json(NeuralMatchResponse {
        matches,
        tokens_remaining: identity.tokens,
    }))
}

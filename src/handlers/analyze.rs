//! # Single-Shot Analysis Handlers
//!
//! REST endpoints for analyzing one complete recording or transcript:
//!
//! - `POST /api/analyze/audio`: multipart WAV upload
//! - `POST /api/analyze/text`: JSON transcript body
//!
//! Both run the same pipeline as the stream (score -> extract -> normalize)
//! and wrap the outcome in a [`ScamReport`]. With no model key configured
//! they fall back to canned demo responses.

use crate::analysis::extract::extract_json;
use crate::analysis::normalize::normalize_analysis;
use crate::analysis::report::{build_report, ReportSource};
use crate::demo;
use crate::error::{AppError, AppResult};
use crate::schemas::TranscriptRequest;
use crate::scoring::ScoringClient;
use crate::state::AppState;

use actix_multipart::form::{bytes::Bytes as UploadedBytes, MultipartForm};
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Multipart form for the audio endpoint: a single `file` field.
#[derive(MultipartForm)]
pub struct AudioUploadForm {
    #[multipart(rename = "file")]
    pub file: UploadedBytes,
}

pub async fn analyze_audio(
    form: MultipartForm<AudioUploadForm>,
    app_state: web::Data<AppState>,
    scorer: web::Data<Option<Arc<ScoringClient>>>,
) -> AppResult<HttpResponse> {
    let started = Instant::now();
    let config = app_state.get_config();
    let upload = form.into_inner().file;

    let filename = upload.file_name.as_deref().unwrap_or("");
    if !filename.to_lowercase().ends_with(".wav") {
        return Err(AppError::BadRequest("Only WAV files are accepted.".to_string()));
    }

    if upload.data.len() > config.max_audio_size_bytes() {
        return Err(AppError::BadRequest(format!(
            "File exceeds {}MB limit.",
            config.limits.max_audio_size_mb
        )));
    }

    info!(
        filename = %filename,
        bytes = upload.data.len(),
        "Audio analysis requested"
    );

    let report = match scorer.get_ref() {
        Some(client) => {
            let raw = client.score_audio(&upload.data).await?;
            let value = extract_json(&raw)?;
            let result = normalize_analysis(&value);
            build_report(ReportSource::Audio(result), started)
        }
        None => demo::audio_report(),
    };

    Ok(HttpResponse::Ok().json(report))
}

pub async fn analyze_text(
    body: web::Json<TranscriptRequest>,
    app_state: web::Data<AppState>,
    scorer: web::Data<Option<Arc<ScoringClient>>>,
) -> AppResult<HttpResponse> {
    let started = Instant::now();
    let config = app_state.get_config();
    let transcript = body.into_inner().transcript;

    if transcript.trim().is_empty() {
        return Err(AppError::ValidationError("Transcript cannot be empty.".to_string()));
    }

    let length = transcript.chars().count();
    if length > config.limits.max_transcript_chars {
        return Err(AppError::ValidationError(format!(
            "Transcript exceeds {} character limit.",
            config.limits.max_transcript_chars
        )));
    }

    info!(chars = length, "Transcript analysis requested");

    let report = match scorer.get_ref() {
        Some(client) => {
            let raw = client.score_transcript(&transcript).await?;
            let value = extract_json(&raw)?;
            let result = normalize_analysis(&value);
            build_report(ReportSource::Text(result), started)
        }
        None => demo::transcript_report(&transcript),
    };

    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn demo_context() -> (web::Data<AppState>, web::Data<Option<Arc<ScoringClient>>>) {
        let state = web::Data::new(AppState::new(AppConfig::default()));
        let scorer = web::Data::new(None::<Arc<ScoringClient>>);
        (state, scorer)
    }

    #[actix_web::test]
    async fn test_analyze_text_demo_mode_succeeds() {
        let (state, scorer) = demo_context();
        let body = web::Json(TranscriptRequest {
            transcript: "This is the IRS, pay your taxes or be arrested".to_string(),
        });

        let response = analyze_text(body, state, scorer).await.unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_analyze_text_rejects_empty_transcript() {
        let (state, scorer) = demo_context();
        let body = web::Json(TranscriptRequest {
            transcript: "   ".to_string(),
        });

        let err = analyze_text(body, state, scorer).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn test_analyze_text_rejects_oversized_transcript() {
        let (state, scorer) = demo_context();
        let body = web::Json(TranscriptRequest {
            transcript: "a".repeat(10_001),
        });

        let err = analyze_text(body, state, scorer).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}

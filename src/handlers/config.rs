use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Sanitized view of the active configuration. The API key never leaves the
/// process; everything else is operational detail clients may inspect.
pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "scoring": {
                "audio_model": config.scoring.audio_model,
                "text_model": config.scoring.text_model,
                "request_timeout_secs": config.scoring.request_timeout_secs,
                "mode": if config.demo_mode() { "demo" } else { "live" }
            },
            "limits": {
                "max_audio_size_mb": config.limits.max_audio_size_mb,
                "max_transcript_chars": config.limits.max_transcript_chars,
                "max_chunk_bytes": config.limits.max_chunk_bytes,
                "max_chunks_per_session": config.limits.max_chunks_per_session,
                "receive_timeout_secs": config.limits.receive_timeout_secs,
                "silence_rms_threshold": config.limits.silence_rms_threshold
            },
            "thresholds": {
                "safe": config.thresholds.safe,
                "suspicious": config.thresholds.suspicious,
                "likely_scam": config.thresholds.likely_scam
            }
        }
    })))
}

//! # External Scoring Client
//!
//! Sends one audio chunk (or one transcript) plus the fixed instruction
//! prompt to the hosted chat-completions endpoint and returns the model's
//! raw reply text. The call is an opaque, possibly slow, possibly failing
//! remote operation: it is timeboxed by the client-wide request timeout and
//! every failure mode surfaces as a distinct [`ScoringError`] variant,
//! never silently swallowed at this layer.

use crate::config::ScoringConfig;
use crate::scoring::prompts::{SCAM_AUDIO_PROMPT, SCAM_TEXT_PROMPT};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Upper bound on how much of an upstream error body is kept for logs.
const ERROR_BODY_CHARS: usize = 200;

/// Failure modes of one scoring call, each surfaced distinctly.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Connection, TLS, or protocol-level failure
    #[error("scoring request failed: {0}")]
    Transport(reqwest::Error),

    /// The hard per-call ceiling elapsed
    #[error("scoring request timed out after {0}s")]
    Timeout(u64),

    /// The endpoint answered with a non-2xx status
    #[error("scoring endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The reply body did not contain the expected choices/message shape
    #[error("scoring reply missing message content")]
    MissingContent,

    /// The reply structure was present but the text was empty
    #[error("scoring reply was empty")]
    EmptyReply,
}

/// Expected shape of a chat-completions reply. Anything beyond the first
/// choice's message content is ignored.
#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for the hosted scoring model.
///
/// Holds a connection-pooled HTTP client with the per-call timeout baked in
/// at construction. Cheap to share behind an `Arc`; one instance serves all
/// sessions.
pub struct ScoringClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    audio_model: String,
    text_model: String,
    timeout_secs: u64,
}

impl ScoringClient {
    pub fn new(config: &ScoringConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            audio_model: config.audio_model.clone(),
            text_model: config.text_model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Score one audio chunk. The chunk travels as a base64 data URL in a
    /// multimodal user message, followed by the instruction prompt.
    pub async fn score_audio(&self, audio: &[u8]) -> Result<String, ScoringError> {
        let audio_b64 = BASE64.encode(audio);
        let content = json!([
            {
                "type": "audio_url",
                "audio_url": format!("data:audio/wav;base64,{}", audio_b64),
            },
            {
                "type": "text",
                "text": SCAM_AUDIO_PROMPT,
            },
        ]);

        debug!(bytes = audio.len(), model = %self.audio_model, "Scoring audio chunk");
        self.complete(&self.audio_model, content, false).await
    }

    /// Score a complete transcript. Also serves as the second-opinion
    /// escalation path for audio analyses.
    pub async fn score_transcript(&self, transcript: &str) -> Result<String, ScoringError> {
        let content = Value::String(format!(
            "{}\n\nTranscript:\n{}",
            SCAM_TEXT_PROMPT, transcript
        ));

        debug!(chars = transcript.len(), model = %self.text_model, "Scoring transcript");
        self.complete(&self.text_model, content, true).await
    }

    async fn complete(
        &self,
        model: &str,
        content: Value,
        json_object: bool,
    ) -> Result<String, ScoringError> {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": content}],
        });
        if json_object {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.classify_transport(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|err| self.classify_transport(err))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ScoringError::MissingContent)?;

        if content.trim().is_empty() {
            return Err(ScoringError::EmptyReply);
        }

        Ok(content)
    }

    fn classify_transport(&self, err: reqwest::Error) -> ScoringError {
        if err.is_timeout() {
            ScoringError::Timeout(self.timeout_secs)
        } else {
            ScoringError::Transport(err)
        }
    }
}

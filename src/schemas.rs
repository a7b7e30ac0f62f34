//! # Analysis Schemas
//!
//! Shared data types for scam-call analysis results. These mirror the JSON
//! shapes exchanged with API clients and expected from the scoring model.
//!
//! ## Invariants:
//! - Every score field is clamped to [0.0, 1.0] before it lands in one of
//!   these structs (see `analysis::normalize`)
//! - `Verdict` and `Severity` only ever hold one of their enum values;
//!   unrecognized model output is defaulted at the normalization boundary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a single scam signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Parse a severity string from model output.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Overall risk classification for a call or a single chunk.
///
/// Ordered from least to most severe; the mapping from score to verdict
/// lives in `analysis::verdict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Safe,
    Suspicious,
    LikelyScam,
    Scam,
}

impl Verdict {
    /// Parse a verdict string from model output.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SAFE" => Some(Verdict::Safe),
            "SUSPICIOUS" => Some(Verdict::Suspicious),
            "LIKELY_SCAM" => Some(Verdict::LikelyScam),
            "SCAM" => Some(Verdict::Scam),
            _ => None,
        }
    }

    /// String form matching the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "SAFE",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::LikelyScam => "LIKELY_SCAM",
            Verdict::Scam => "SCAM",
        }
    }
}

/// One discrete piece of scam evidence attached to a scoring decision.
///
/// Signals are accumulated across a streaming session and never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Which detection dimension fired (e.g. "URGENCY_TACTICS")
    pub category: String,

    /// What specifically was detected
    pub detail: String,

    /// How strongly this signal points at a scam
    pub severity: Severity,
}

/// Fully validated analysis of one audio segment or transcript.
///
/// Produced only by `analysis::normalize`, which guarantees every field is
/// in range regardless of what the model actually returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Scam likelihood in [0.0, 1.0]
    pub scam_score: f64,

    /// Model's self-reported confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Verdict the model assigned to this segment
    pub verdict: Verdict,

    /// Evidence backing the score
    pub signals: Vec<Signal>,

    /// Brief summary of what was said, when the model provided one
    pub transcript_summary: Option<String>,

    /// Suggested action for the user
    pub recommendation: String,
}

/// Unified report returned by the single-shot analysis endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScamReport {
    /// Unique report identifier ("analysis_<uuid>")
    pub id: String,

    /// Which pipeline produced this report: "audio", "text", or "stream"
    pub mode: String,

    /// Result of the audio model pass, if one ran
    pub audio_analysis: Option<AnalysisResult>,

    /// Result of the transcript model pass, if one ran
    pub text_analysis: Option<AnalysisResult>,

    /// Weighted blend of the available scores, in [0.0, 1.0]
    pub combined_score: f64,

    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f64,
}

impl ScamReport {
    /// Generate a fresh report identifier.
    pub fn new_id() -> String {
        format!("analysis_{}", Uuid::new_v4())
    }
}

/// Request body for `POST /api/analyze/text`.
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub transcript: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_round_trip() {
        for raw in ["SAFE", "SUSPICIOUS", "LIKELY_SCAM", "SCAM"] {
            let verdict = Verdict::parse(raw).unwrap();
            assert_eq!(verdict.as_str(), raw);
            // Serde uses the same spelling as the wire format
            let json = serde_json::to_string(&verdict).unwrap();
            assert_eq!(json, format!("\"{}\"", raw));
        }
        assert!(Verdict::parse("MAYBE_SCAM").is_none());
        assert!(Verdict::parse("safe").is_none());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("low"), Some(Severity::Low));
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("high"), Some(Severity::High));
        assert!(Severity::parse("critical").is_none());
        assert!(Severity::parse("HIGH").is_none());
    }

    #[test]
    fn test_verdict_ordering() {
        assert!(Verdict::Safe < Verdict::Suspicious);
        assert!(Verdict::Suspicious < Verdict::LikelyScam);
        assert!(Verdict::LikelyScam < Verdict::Scam);
    }

    #[test]
    fn test_signal_serialization() {
        let signal = Signal {
            category: "URGENCY_TACTICS".to_string(),
            detail: "Caller demands immediate payment".to_string(),
            severity: Severity::High,
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"severity\":\"high\""));
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signal);
    }

    #[test]
    fn test_report_id_format() {
        let id = ScamReport::new_id();
        assert!(id.starts_with("analysis_"));
        assert!(id.len() > "analysis_".len());
    }
}

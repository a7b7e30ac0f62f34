//! # Result Normalization
//!
//! Converts the untyped JSON object recovered from a model reply into a
//! fully-typed [`AnalysisResult`]. This is the last line of defense between
//! an adversarial or simply buggy model reply and the rest of the system,
//! so it never fails: every field has a named defaulting rule.
//!
//! ## Defaulting rules:
//! - `scam_score`: numeric or numeric string, clamped to [0.0, 1.0], else 0.0
//! - `confidence`: same parsing, clamped, else 0.5
//! - `verdict`: one of the four enum values, else SAFE
//! - signal `severity`: one of the three enum values, else medium
//! - signal `category`/`detail`: "UNKNOWN" / "" when absent
//! - `recommendation`: fixed neutral string when absent
//!
//! Out-of-range scores are clamped rather than rejected: 1.5 surfaces as
//! 1.0 and -0.5 as 0.0, never as an error.

use crate::schemas::{AnalysisResult, Severity, Signal, Verdict};
use serde_json::Value;

/// Neutral recommendation used when the model supplies none.
pub const DEFAULT_RECOMMENDATION: &str = "No specific recommendation.";

/// Clamp a score into the unit interval. Non-finite input collapses to 0.0.
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Normalize an untrusted model reply object into an [`AnalysisResult`].
pub fn normalize_analysis(data: &Value) -> AnalysisResult {
    let scam_score = clamp_unit(number_field(data, "scam_score").unwrap_or(0.0));
    let confidence = clamp_unit(number_field(data, "confidence").unwrap_or(0.5));

    let verdict = data
        .get("verdict")
        .and_then(Value::as_str)
        .and_then(Verdict::parse)
        .unwrap_or(Verdict::Safe);

    let signals = data
        .get("signals")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_signal).collect())
        .unwrap_or_default();

    let transcript_summary = data
        .get("transcript_summary")
        .and_then(Value::as_str)
        .map(str::to_string);

    let recommendation = data
        .get("recommendation")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_RECOMMENDATION)
        .to_string();

    AnalysisResult {
        scam_score,
        confidence,
        verdict,
        signals,
        transcript_summary,
        recommendation,
    }
}

/// Normalize one signal entry. Non-object entries are dropped; malformed
/// fields inside an object entry are defaulted instead of failing the record.
fn normalize_signal(raw: &Value) -> Option<Signal> {
    let entry = raw.as_object()?;

    let category = entry
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();

    let detail = entry
        .get("detail")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let severity = entry
        .get("severity")
        .and_then(Value::as_str)
        .and_then(Severity::parse)
        .unwrap_or(Severity::Medium);

    Some(Signal {
        category,
        detail,
        severity,
    })
}

/// Read a numeric field, accepting either a JSON number or a numeric string.
fn number_field(data: &Value, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

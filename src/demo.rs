//! # Demo Mode
//!
//! Canned responses served when no model API key is configured, so the full
//! product surface can be exercised offline. Streaming sessions walk a fixed
//! escalating script through the normal aggregation pipeline; the single-shot
//! endpoints answer with canned analyses picked by keyword (transcripts) or
//! rotation (audio).

use crate::analysis::report::{build_report, ReportSource};
use crate::schemas::{AnalysisResult, ScamReport, Severity, Signal, Verdict};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Rotation cursor for the canned audio analyses.
static AUDIO_CURSOR: AtomicUsize = AtomicUsize::new(0);

fn signal(category: &str, detail: &str, severity: Severity) -> Signal {
    Signal {
        category: category.to_string(),
        detail: detail.to_string(),
        severity,
    }
}

fn analysis(
    scam_score: f64,
    confidence: f64,
    verdict: Verdict,
    signals: Vec<Signal>,
    summary: &str,
    recommendation: &str,
) -> AnalysisResult {
    AnalysisResult {
        scam_score,
        confidence,
        verdict,
        signals,
        transcript_summary: Some(summary.to_string()),
        recommendation: recommendation.to_string(),
    }
}

/// Scripted per-chunk result for demo streaming sessions. The script
/// escalates from quiet to an unmistakable scam; sessions longer than the
/// script repeat its last step.
pub fn scripted_chunk(cursor: usize) -> AnalysisResult {
    let script: [AnalysisResult; 4] = [
        analysis(
            0.15,
            0.6,
            Verdict::Safe,
            vec![],
            "Call opens with a greeting",
            "Listening... no threats detected yet.",
        ),
        analysis(
            0.45,
            0.7,
            Verdict::Suspicious,
            vec![signal(
                "AUTHORITY_IMPERSONATION",
                "Caller claims to represent a government agency",
                Severity::Medium,
            )],
            "Caller introduces themselves as a government official",
            "Be cautious - potential authority impersonation detected.",
        ),
        analysis(
            0.75,
            0.85,
            Verdict::LikelyScam,
            vec![signal(
                "URGENCY_TACTICS",
                "Threatens immediate action if you don't comply",
                Severity::High,
            )],
            "Caller threatens legal consequences unless the listener acts now",
            "High risk - caller using urgency tactics and authority impersonation.",
        ),
        analysis(
            0.90,
            0.9,
            Verdict::Scam,
            vec![signal(
                "UNUSUAL_PAYMENT",
                "Requests payment via gift cards",
                Severity::High,
            )],
            "Caller demands payment in gift cards to resolve the threat",
            "Hang up immediately. This is very likely a scam.",
        ),
    ];

    let index = cursor.min(script.len() - 1);
    script[index].clone()
}

/// Canned report for the audio upload endpoint, rotating through the
/// scenario set.
pub fn audio_report() -> ScamReport {
    let scenarios = canned_analyses();
    let index = AUDIO_CURSOR.fetch_add(1, Ordering::Relaxed) % scenarios.len();
    let (_, result) = scenarios.into_iter().nth(index).expect("scenario set is non-empty");
    build_report(ReportSource::Audio(result), Instant::now())
}

/// Canned report for the transcript endpoint, matched by keyword. Unmatched
/// transcripts come back as a safe call.
pub fn transcript_report(transcript: &str) -> ScamReport {
    let lower = transcript.to_lowercase();
    let keyword_map: [(&[&str], &str); 4] = [
        (&["irs", "tax", "arrest"], "irs_scam"),
        (&["social security", "ssn"], "ssn_fraud"),
        (&["amazon", "suspicious", "charge"], "amazon_scam"),
        (&["warranty", "vehicle", "car"], "warranty_robocall"),
    ];

    let matched = keyword_map
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(_, key)| *key)
        .unwrap_or("safe_call");

    let result = canned_analyses()
        .into_iter()
        .find(|(key, _)| *key == matched)
        .map(|(_, result)| result)
        .expect("every keyword target has a canned analysis");

    build_report(ReportSource::Text(result), Instant::now())
}

/// The canned scenario analyses, shared by both endpoints.
fn canned_analyses() -> Vec<(&'static str, AnalysisResult)> {
    vec![
        (
            "irs_scam",
            analysis(
                0.92,
                0.9,
                Verdict::Scam,
                vec![
                    signal(
                        "AUTHORITY_IMPERSONATION",
                        "Caller claims to be an IRS agent",
                        Severity::High,
                    ),
                    signal(
                        "URGENCY_TACTICS",
                        "Threatens arrest unless back taxes are paid today",
                        Severity::High,
                    ),
                ],
                "Caller impersonates the IRS and threatens arrest over unpaid taxes",
                "Hang up immediately. The IRS does not call to demand payment or threaten arrest.",
            ),
        ),
        (
            "ssn_fraud",
            analysis(
                0.88,
                0.85,
                Verdict::Scam,
                vec![
                    signal(
                        "INFORMATION_EXTRACTION",
                        "Asks the listener to confirm their Social Security number",
                        Severity::High,
                    ),
                    signal(
                        "EMOTIONAL_MANIPULATION",
                        "Claims the listener's SSN has been suspended",
                        Severity::Medium,
                    ),
                ],
                "Robocall claims the listener's Social Security number is suspended",
                "Do not share your SSN. The Social Security Administration never suspends numbers.",
            ),
        ),
        (
            "amazon_scam",
            analysis(
                0.80,
                0.8,
                Verdict::LikelyScam,
                vec![signal(
                    "AUTHORITY_IMPERSONATION",
                    "Automated voice claims a suspicious charge on an Amazon account",
                    Severity::High,
                )],
                "Robocall reports a suspicious Amazon charge and asks to press 1",
                "Do not press any buttons. Check your account directly through the official app.",
            ),
        ),
        (
            "warranty_robocall",
            analysis(
                0.70,
                0.75,
                Verdict::LikelyScam,
                vec![signal(
                    "KNOWN_SCAM_SCRIPTS",
                    "Extended vehicle warranty script",
                    Severity::Medium,
                )],
                "Robocall offers to extend the listener's vehicle warranty",
                "Hang up. Unsolicited warranty offers are a known scam pattern.",
            ),
        ),
        (
            "safe_call",
            analysis(
                0.05,
                0.9,
                Verdict::Safe,
                vec![],
                "Ordinary conversation with no scam indicators",
                "No action needed. This call shows no scam indicators.",
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_escalates() {
        let scores: Vec<f64> = (0..4).map(|i| scripted_chunk(i).scam_score).collect();
        assert_eq!(scores, vec![0.15, 0.45, 0.75, 0.90]);
    }

    #[test]
    fn test_script_repeats_last_step() {
        assert_eq!(scripted_chunk(10).scam_score, scripted_chunk(3).scam_score);
    }

    #[test]
    fn test_transcript_keyword_matching() {
        let report = transcript_report("This is the IRS, you will be arrested");
        assert_eq!(report.mode, "text");
        let result = report.text_analysis.unwrap();
        assert_eq!(result.verdict, Verdict::Scam);
        assert!(result
            .signals
            .iter()
            .any(|s| s.category == "AUTHORITY_IMPERSONATION"));
    }

    #[test]
    fn test_unmatched_transcript_is_safe() {
        let report = transcript_report("Hi grandma, just calling to say hello");
        let result = report.text_analysis.unwrap();
        assert_eq!(result.verdict, Verdict::Safe);
        assert!(report.combined_score < 0.3);
    }

    #[test]
    fn test_audio_report_shape() {
        let report = audio_report();
        assert_eq!(report.mode, "audio");
        assert!(report.audio_analysis.is_some());
        assert!(report.text_analysis.is_none());
        assert!(report.id.starts_with("analysis_"));
    }
}

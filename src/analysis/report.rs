//! # Report Building
//!
//! Assembles the unified [`ScamReport`] returned by the single-shot analysis
//! endpoints. When both an audio and a text (second-opinion) result exist,
//! the combined score weights the audio model higher; a single result passes
//! through unchanged.

use crate::schemas::{AnalysisResult, ScamReport};
use std::time::Instant;

/// Weight of the audio model's score when a second opinion is present.
pub const AUDIO_WEIGHT: f64 = 0.6;

/// Weight of the transcript model's score when a second opinion is present.
pub const TEXT_WEIGHT: f64 = 0.4;

/// Which analysis results feed a report. At least one is always present by
/// construction.
pub enum ReportSource {
    Audio(AnalysisResult),
    Text(AnalysisResult),
    AudioWithSecondOpinion {
        audio: AnalysisResult,
        text: AnalysisResult,
    },
}

impl ReportSource {
    fn mode(&self) -> &'static str {
        match self {
            ReportSource::Audio(_) => "audio",
            ReportSource::Text(_) => "text",
            ReportSource::AudioWithSecondOpinion { .. } => "audio",
        }
    }

    fn combined_score(&self) -> f64 {
        match self {
            ReportSource::Audio(result) | ReportSource::Text(result) => result.scam_score,
            ReportSource::AudioWithSecondOpinion { audio, text } => {
                AUDIO_WEIGHT * audio.scam_score + TEXT_WEIGHT * text.scam_score
            }
        }
    }
}

/// Build a report from one or both analysis results.
pub fn build_report(source: ReportSource, started: Instant) -> ScamReport {
    let mode = source.mode().to_string();
    let combined_score = round4(source.combined_score());

    let (audio_analysis, text_analysis) = match source {
        ReportSource::Audio(audio) => (Some(audio), None),
        ReportSource::Text(text) => (None, Some(text)),
        ReportSource::AudioWithSecondOpinion { audio, text } => (Some(audio), Some(text)),
    };

    ScamReport {
        id: ScamReport::new_id(),
        mode,
        audio_analysis,
        text_analysis,
        combined_score,
        processing_time_ms: round2(started.elapsed().as_secs_f64() * 1000.0),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Verdict;

    fn result(score: f64) -> AnalysisResult {
        AnalysisResult {
            scam_score: score,
            confidence: 0.9,
            verdict: Verdict::Safe,
            signals: Vec::new(),
            transcript_summary: None,
            recommendation: "test".to_string(),
        }
    }

    #[test]
    fn test_audio_only_passes_score_through() {
        let report = build_report(ReportSource::Audio(result(0.73)), Instant::now());
        assert_eq!(report.mode, "audio");
        assert_eq!(report.combined_score, 0.73);
        assert!(report.audio_analysis.is_some());
        assert!(report.text_analysis.is_none());
    }

    #[test]
    fn test_text_only_passes_score_through() {
        let report = build_report(ReportSource::Text(result(0.42)), Instant::now());
        assert_eq!(report.mode, "text");
        assert_eq!(report.combined_score, 0.42);
        assert!(report.audio_analysis.is_none());
        assert!(report.text_analysis.is_some());
    }

    #[test]
    fn test_combined_weights_table() {
        let cases = [
            (0.0, 0.0, 0.0),
            (1.0, 1.0, 1.0),
            (0.5, 0.5, 0.5),
            (0.8, 0.2, 0.56),
            (0.3, 0.9, 0.54),
            (1.0, 0.0, 0.6),
            (0.0, 1.0, 0.4),
        ];

        for (audio, text, expected) in cases {
            let report = build_report(
                ReportSource::AudioWithSecondOpinion {
                    audio: result(audio),
                    text: result(text),
                },
                Instant::now(),
            );
            assert_eq!(
                report.combined_score, expected,
                "audio {} / text {}",
                audio, text
            );
        }
    }

    #[test]
    fn test_report_has_fresh_id() {
        let a = build_report(ReportSource::Audio(result(0.1)), Instant::now());
        let b = build_report(ReportSource::Audio(result(0.1)), Instant::now());
        assert!(a.id.starts_with("analysis_"));
        assert_ne!(a.id, b.id);
    }
}

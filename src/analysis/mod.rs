//! # Scam Analysis Pipeline
//!
//! The scoring pipeline that turns model replies into bounded verdicts:
//!
//! - **silence**: cheap RMS gate deciding whether a chunk is worth scoring
//! - **extract**: recovers one JSON object from free-form model text
//! - **normalize**: coerces the extracted object into a typed, clamped result
//! - **verdict**: maps scores onto the four-level verdict scale
//! - **aggregator**: per-session state machine combining chunk scores
//! - **report**: unified report assembly for the single-shot endpoints
//!
//! Control flow per streamed chunk: silence gate -> [skip] | scoring client
//! -> extract -> normalize -> aggregator -> partial result.

pub mod aggregator;
pub mod extract;
pub mod normalize;
pub mod report;
pub mod silence;
pub mod verdict;

#[cfg(test)]
mod tests {
    use super::aggregator::{BlendWeights, StreamAggregator};
    use super::extract::extract_json;
    use super::normalize::normalize_analysis;
    use super::verdict::VerdictThresholds;
    use crate::schemas::Verdict;

    /// Whole-pipeline pass: a prose-wrapped model reply through extraction,
    /// normalization, and aggregation.
    #[test]
    fn test_reply_to_partial_result() {
        let raw = r#"Sure! Here is the analysis you asked for:
```json
{
  "scam_score": 1.2,
  "confidence": 0.9,
  "verdict": "SCAM",
  "signals": [{"category": "URGENCY_TACTICS", "detail": "act now", "severity": "high"}],
  "transcript_summary": "Caller demands immediate payment",
  "recommendation": "Hang up."
}
```
Let me know if you need anything else."#;

        let value = extract_json(raw).unwrap();
        let result = normalize_analysis(&value);
        // The over-range score was clamped before aggregation ever sees it
        assert_eq!(result.scam_score, 1.0);

        let mut agg =
            StreamAggregator::new(VerdictThresholds::default(), BlendWeights::default());
        let partial = agg.record_scored(&result);
        assert_eq!(partial.verdict, Verdict::Scam);
        assert_eq!(partial.cumulative_score, 0.7);
        assert_eq!(partial.new_signals.len(), 1);

        let final_result = agg.finalize();
        // combined = 0.6 * 1.0 + 0.4 * 0.7
        assert_eq!(final_result.combined_score, 0.88);
        assert_eq!(final_result.verdict, Verdict::Scam);
    }
}

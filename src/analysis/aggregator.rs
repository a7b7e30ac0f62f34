//! # Stream Session Aggregation
//!
//! The stateful core of live streaming analysis. One [`StreamAggregator`]
//! owns one session's running score, peak score, and deduplicated signal
//! history, and combines a sequence of noisy per-chunk scores into a stable
//! running verdict plus a single final decision.
//!
//! ## Scoring model:
//! - `running = 0.7 * chunk + 0.3 * running`: exponential smoothing with a
//!   deliberate recency bias: recent chunks dominate, but one low-risk chunk
//!   cannot instantly erase an accumulated high-risk history
//! - `peak = max(peak, chunk)`: the worst single moment of the call
//! - finalize: `combined = round4(0.6 * peak + 0.4 * running)`: peak-weighted
//!   so a single severe chunk (an explicit threat, say) dominates the final
//!   call even when surrounded by benign chunks
//!
//! ## Session lifecycle:
//! Active -> Finalizing (end_stream, chunk cap, or receive timeout) ->
//! Closed. Closed is terminal; no further chunks are accepted.

use crate::analysis::verdict::VerdictThresholds;
use crate::schemas::{AnalysisResult, Severity, Signal, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Instant;

/// Weight of the newest chunk in the running score.
pub const SMOOTHING_NEW_WEIGHT: f64 = 0.7;

/// Weight of the accumulated history in the running score.
pub const SMOOTHING_PREV_WEIGHT: f64 = 0.3;

/// Combined scores in this band are flagged for human review.
const REVIEW_BAND: RangeInclusive<f64> = 0.35..=0.65;

/// When both running and peak score stay below this despite a non-trivial
/// session, the model never committed to a reading either way.
const LOW_CONFIDENCE_FLOOR: f64 = 0.55;

/// Review reason: the combined score landed in the ambiguous band.
pub const REASON_AMBIGUOUS: &str = "ambiguous score range";

/// Review reason: no chunk ever scored decisively.
pub const REASON_LOW_CONFIDENCE: &str = "low model confidence";

/// Weights blending peak and running score into the final combined score.
///
/// The defaults were chosen empirically, not derived from a measured
/// false-positive/negative tradeoff, so they are configuration rather than
/// constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlendWeights {
    pub peak: f64,
    pub running: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            peak: 0.6,
            running: 0.4,
        }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<(), String> {
        let in_range = (0.0..=1.0).contains(&self.peak) && (0.0..=1.0).contains(&self.running);
        let sum = self.peak + self.running;
        if in_range && sum > 0.0 && sum <= 1.0 + 1e-9 {
            Ok(())
        } else {
            Err(format!(
                "blend weights must lie in [0, 1] and sum to at most 1.0: peak={} running={}",
                self.peak, self.running
            ))
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepting and processing chunks
    Active,
    /// Terminal signal received; draining any in-flight work
    Finalizing,
    /// Final result emitted; no further chunks accepted
    Closed,
}

/// Per-chunk outcome emitted once per processed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialResult {
    /// 1-based index of this chunk within the session
    pub chunk_index: u32,

    /// Milliseconds elapsed since the session started
    pub timestamp_ms: u64,

    /// This chunk's score minus the previous running score
    pub score_delta: f64,

    /// Signals whose category had not been seen earlier in the session,
    /// so a client UI can highlight what's new without re-rendering history
    pub new_signals: Vec<Signal>,

    /// This chunk's own score
    pub scam_score: f64,

    /// Updated running (smoothed) score
    pub cumulative_score: f64,

    /// Updated peak score
    pub max_score: f64,

    /// Model confidence for this chunk
    pub confidence: f64,

    /// Verdict for this chunk's own score
    pub verdict: Verdict,

    /// All signals attached to this chunk
    pub signals: Vec<Signal>,

    /// Latest recommendation text
    pub recommendation: String,

    /// Latest transcript summary
    pub transcript_summary: String,
}

/// Final combined decision, produced exactly once at session end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    /// Total chunks processed this session
    pub total_chunks: u32,

    /// Blend of peak and running score
    pub combined_score: f64,

    /// Highest single-chunk score observed
    pub max_score: f64,

    /// Verdict for the combined score
    pub verdict: Verdict,

    /// Full ordered signal log for the session
    pub signals: Vec<Signal>,

    /// Last recommendation the model produced
    pub recommendation: String,

    /// Last transcript summary the model produced
    pub transcript_summary: String,

    /// Whether the automated verdict should be checked by a human
    pub review_required: bool,

    /// Why review is required, when it is
    pub review_reason: Option<String>,
}

/// State machine accumulating one streaming session's chunk results.
///
/// Mutated exclusively by the session controller, strictly in chunk arrival
/// order; the running-score update is order-dependent.
pub struct StreamAggregator {
    phase: SessionPhase,
    chunk_index: u32,
    scored_chunks: u32,
    running_score: f64,
    peak_score: f64,
    seen_categories: HashSet<String>,
    signals: Vec<Signal>,
    last_recommendation: String,
    last_summary: String,
    thresholds: VerdictThresholds,
    weights: BlendWeights,
    started: Instant,
}

impl StreamAggregator {
    pub fn new(thresholds: VerdictThresholds, weights: BlendWeights) -> Self {
        Self {
            phase: SessionPhase::Active,
            chunk_index: 0,
            scored_chunks: 0,
            running_score: 0.0,
            peak_score: 0.0,
            seen_categories: HashSet::new(),
            signals: Vec::new(),
            last_recommendation: String::new(),
            last_summary: String::new(),
            thresholds,
            weights,
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Chunks processed so far; monotonically non-decreasing.
    pub fn chunk_count(&self) -> u32 {
        self.chunk_index
    }

    pub fn running_score(&self) -> f64 {
        self.running_score
    }

    pub fn peak_score(&self) -> f64 {
        self.peak_score
    }

    /// Enter the Finalizing phase. Further chunk intake must stop; an
    /// in-flight scoring call may still deliver its result.
    pub fn begin_finalizing(&mut self) {
        if self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Finalizing;
        }
    }

    /// Fold one scored chunk into the session state.
    pub fn record_scored(&mut self, result: &AnalysisResult) -> PartialResult {
        let score = result.scam_score;
        let score_delta = score - self.running_score;

        self.running_score =
            SMOOTHING_NEW_WEIGHT * score + SMOOTHING_PREV_WEIGHT * self.running_score;
        if score > self.peak_score {
            self.peak_score = score;
        }

        let mut new_signals = Vec::new();
        for signal in &result.signals {
            if self.seen_categories.insert(signal.category.clone()) {
                new_signals.push(signal.clone());
            }
        }
        self.signals.extend(result.signals.iter().cloned());

        self.last_recommendation = result.recommendation.clone();
        if let Some(summary) = &result.transcript_summary {
            self.last_summary = summary.clone();
        }

        self.chunk_index += 1;
        self.scored_chunks += 1;

        PartialResult {
            chunk_index: self.chunk_index,
            timestamp_ms: self.started.elapsed().as_millis() as u64,
            score_delta: round4(score_delta),
            new_signals,
            scam_score: round4(score),
            cumulative_score: round4(self.running_score),
            max_score: round4(self.peak_score),
            confidence: round4(result.confidence),
            verdict: self.thresholds.classify(score),
            signals: result.signals.clone(),
            recommendation: self.last_recommendation.clone(),
            transcript_summary: self.last_summary.clone(),
        }
    }

    /// Record a chunk the silence gate filtered out. The chunk counter
    /// advances but running and peak score are untouched; the partial
    /// carries a single SILENCE marker instead of model evidence.
    pub fn record_silent(&mut self) -> PartialResult {
        self.chunk_index += 1;

        PartialResult {
            chunk_index: self.chunk_index,
            timestamp_ms: self.started.elapsed().as_millis() as u64,
            score_delta: 0.0,
            new_signals: Vec::new(),
            scam_score: 0.0,
            cumulative_score: round4(self.running_score),
            max_score: round4(self.peak_score),
            confidence: 1.0,
            verdict: Verdict::Safe,
            signals: vec![silence_signal()],
            recommendation: self.last_recommendation.clone(),
            transcript_summary: self.last_summary.clone(),
        }
    }

    /// Produce the final combined decision and close the session.
    pub fn finalize(&mut self) -> FinalResult {
        self.phase = SessionPhase::Closed;

        let combined =
            round4(self.weights.peak * self.peak_score + self.weights.running * self.running_score);
        let (review_required, review_reason) = self.review_status(combined);

        FinalResult {
            total_chunks: self.chunk_index,
            combined_score: combined,
            max_score: round4(self.peak_score),
            verdict: self.thresholds.classify(combined),
            signals: self.signals.clone(),
            recommendation: self.last_recommendation.clone(),
            transcript_summary: self.last_summary.clone(),
            review_required,
            review_reason,
        }
    }

    /// The two review reasons are distinct outputs: the ambiguous band is
    /// about the combined score, low confidence about the whole session
    /// never scoring decisively.
    fn review_status(&self, combined: f64) -> (bool, Option<String>) {
        if REVIEW_BAND.contains(&combined) {
            (true, Some(REASON_AMBIGUOUS.to_string()))
        } else if self.scored_chunks > 0
            && self.running_score < LOW_CONFIDENCE_FLOOR
            && self.peak_score < LOW_CONFIDENCE_FLOOR
        {
            (true, Some(REASON_LOW_CONFIDENCE.to_string()))
        } else {
            (false, None)
        }
    }
}

fn silence_signal() -> Signal {
    Signal {
        category: "SILENCE".to_string(),
        detail: "No speech detected in this segment".to_string(),
        severity: Severity::Low,
    }
}

/// Round to 4 decimal places for emitted scores. Internal state keeps full
/// precision.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::normalize::DEFAULT_RECOMMENDATION;

    fn aggregator() -> StreamAggregator {
        StreamAggregator::new(VerdictThresholds::default(), BlendWeights::default())
    }

    fn scored(score: f64) -> AnalysisResult {
        AnalysisResult {
            scam_score: score,
            confidence: 0.9,
            verdict: Verdict::Safe,
            signals: Vec::new(),
            transcript_summary: None,
            recommendation: DEFAULT_RECOMMENDATION.to_string(),
        }
    }

    fn scored_with_signals(score: f64, signals: Vec<Signal>) -> AnalysisResult {
        AnalysisResult {
            signals,
            ..scored(score)
        }
    }

    fn signal(category: &str) -> Signal {
        Signal {
            category: category.to_string(),
            detail: "detail".to_string(),
            severity: Severity::Medium,
        }
    }

    fn round6(value: f64) -> f64 {
        (value * 1_000_000.0).round() / 1_000_000.0
    }

    #[test]
    fn test_initial_state() {
        let agg = aggregator();
        assert_eq!(agg.phase(), SessionPhase::Active);
        assert_eq!(agg.chunk_count(), 0);
        assert_eq!(agg.running_score(), 0.0);
        assert_eq!(agg.peak_score(), 0.0);
    }

    #[test]
    fn test_exponential_smoothing_sequence() {
        let mut agg = aggregator();
        let expected = [0.07, 0.301, 0.7203, 0.35609, 0.526827];

        for (score, want) in [0.1, 0.4, 0.9, 0.2, 0.6].iter().zip(expected) {
            agg.record_scored(&scored(*score));
            assert_eq!(round6(agg.running_score()), want);
        }
    }

    #[test]
    fn test_peak_tracking() {
        let mut agg = aggregator();
        for score in [0.1, 0.5, 0.3, 0.9, 0.2] {
            agg.record_scored(&scored(score));
        }
        assert_eq!(agg.peak_score(), 0.9);
    }

    #[test]
    fn test_score_delta_precedes_update() {
        let mut agg = aggregator();
        let first = agg.record_scored(&scored(0.6));
        assert_eq!(first.score_delta, 0.6);

        // Running is now 0.42; delta for the next chunk is 0.8 - 0.42
        let second = agg.record_scored(&scored(0.8));
        assert_eq!(second.score_delta, 0.38);
    }

    #[test]
    fn test_silent_chunk_invariants() {
        let mut agg = aggregator();
        agg.record_scored(&scored(0.5));
        let running_before = agg.running_score();
        let peak_before = agg.peak_score();

        let partial = agg.record_silent();
        assert_eq!(agg.running_score(), running_before);
        assert_eq!(agg.peak_score(), peak_before);
        assert_eq!(partial.chunk_index, 2);
        assert_eq!(partial.scam_score, 0.0);
        assert_eq!(partial.verdict, Verdict::Safe);
        assert_eq!(partial.signals.len(), 1);
        assert_eq!(partial.signals[0].category, "SILENCE");
    }

    #[test]
    fn test_novel_signal_categories_reported_once() {
        let mut agg = aggregator();

        let first = agg.record_scored(&scored_with_signals(
            0.5,
            vec![signal("URGENCY"), signal("AUTHORITY")],
        ));
        assert_eq!(first.new_signals.len(), 2);

        let second = agg.record_scored(&scored_with_signals(
            0.6,
            vec![signal("URGENCY"), signal("PAYMENT")],
        ));
        assert_eq!(second.new_signals.len(), 1);
        assert_eq!(second.new_signals[0].category, "PAYMENT");
        // The full per-chunk list still carries the repeat
        assert_eq!(second.signals.len(), 2);
    }

    #[test]
    fn test_signal_log_accumulates_everything() {
        let mut agg = aggregator();
        agg.record_scored(&scored_with_signals(0.5, vec![signal("URGENCY")]));
        agg.record_scored(&scored_with_signals(0.6, vec![signal("URGENCY")]));

        let final_result = agg.finalize();
        assert_eq!(final_result.signals.len(), 2);
    }

    #[test]
    fn test_partial_carries_per_chunk_verdict() {
        let mut agg = aggregator();
        let partial = agg.record_scored(&scored(0.95));
        // The chunk's own score classifies, not the running score (0.665)
        assert_eq!(partial.verdict, Verdict::Scam);
        assert_eq!(partial.cumulative_score, 0.665);
    }

    #[test]
    fn test_finalize_peak_weighted_blend() {
        let mut agg = aggregator();
        agg.record_scored(&scored(0.9));
        agg.record_scored(&scored(0.3));

        assert_eq!(agg.peak_score(), 0.9);
        assert_eq!(round6(agg.running_score()), 0.399);

        let final_result = agg.finalize();
        assert_eq!(final_result.combined_score, 0.6996);
        assert_eq!(final_result.verdict, Verdict::LikelyScam);
        assert_eq!(final_result.total_chunks, 2);
        assert_eq!(final_result.max_score, 0.9);
        assert!(!final_result.review_required);
        assert!(final_result.review_reason.is_none());
        assert_eq!(agg.phase(), SessionPhase::Closed);
    }

    #[test]
    fn test_review_ambiguous_band() {
        let mut agg = aggregator();
        // One chunk at 0.5: running 0.35, peak 0.5, combined 0.44
        agg.record_scored(&scored(0.5));

        let final_result = agg.finalize();
        assert_eq!(final_result.combined_score, 0.44);
        assert!(final_result.review_required);
        assert_eq!(final_result.review_reason.as_deref(), Some(REASON_AMBIGUOUS));
    }

    #[test]
    fn test_review_low_confidence() {
        let mut agg = aggregator();
        // Combined lands below the ambiguous band, but nothing ever scored
        // decisively either way
        agg.record_scored(&scored(0.1));
        agg.record_scored(&scored(0.2));

        let final_result = agg.finalize();
        assert!(final_result.combined_score < 0.35);
        assert!(final_result.review_required);
        assert_eq!(
            final_result.review_reason.as_deref(),
            Some(REASON_LOW_CONFIDENCE)
        );
    }

    #[test]
    fn test_no_review_for_empty_session() {
        let mut agg = aggregator();
        let final_result = agg.finalize();
        assert_eq!(final_result.total_chunks, 0);
        assert_eq!(final_result.combined_score, 0.0);
        assert_eq!(final_result.verdict, Verdict::Safe);
        assert!(!final_result.review_required);
    }

    #[test]
    fn test_all_silent_session_needs_no_review() {
        let mut agg = aggregator();
        agg.record_silent();
        agg.record_silent();

        let final_result = agg.finalize();
        assert_eq!(final_result.total_chunks, 2);
        assert!(!final_result.review_required);
    }

    #[test]
    fn test_last_recommendation_and_summary_retained() {
        let mut agg = aggregator();

        let mut first = scored(0.7);
        first.recommendation = "Be cautious".to_string();
        first.transcript_summary = Some("Caller claims to be the bank".to_string());
        agg.record_scored(&first);

        // A chunk without a summary keeps the previous one
        let mut second = scored(0.2);
        second.recommendation = "Hang up".to_string();
        agg.record_scored(&second);

        let final_result = agg.finalize();
        assert_eq!(final_result.recommendation, "Hang up");
        assert_eq!(
            final_result.transcript_summary,
            "Caller claims to be the bank"
        );
    }

    #[test]
    fn test_phase_transitions() {
        let mut agg = aggregator();
        assert!(agg.is_active());

        agg.begin_finalizing();
        assert_eq!(agg.phase(), SessionPhase::Finalizing);
        assert!(!agg.is_active());

        agg.finalize();
        assert_eq!(agg.phase(), SessionPhase::Closed);

        // Finalizing a closed session does not reopen it
        agg.begin_finalizing();
        assert_eq!(agg.phase(), SessionPhase::Closed);
    }

    #[test]
    fn test_blend_weight_validation() {
        assert!(BlendWeights::default().validate().is_ok());
        assert!(BlendWeights {
            peak: 1.2,
            running: 0.4
        }
        .validate()
        .is_err());
        assert!(BlendWeights {
            peak: 0.0,
            running: 0.0
        }
        .validate()
        .is_err());
        assert!(BlendWeights {
            peak: 0.7,
            running: 0.7
        }
        .validate()
        .is_err());
    }
}

//! # Verdict Classification
//!
//! Maps a scam score in [0, 1] onto the four-level verdict scale via fixed
//! cut-points. Used both per-chunk (against the chunk's own score) and at
//! session finalize (against the combined score).

use crate::schemas::Verdict;
use serde::{Deserialize, Serialize};

/// Score cut-points partitioning [0, 1] into the four verdict bands.
///
/// Lower bounds are inclusive: a score of exactly 0.30 is already
/// SUSPICIOUS. Loaded once at startup and never mutated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerdictThresholds {
    /// Scores below this are SAFE
    pub safe: f64,

    /// Scores below this (and at least `safe`) are SUSPICIOUS
    pub suspicious: f64,

    /// Scores below this (and at least `suspicious`) are LIKELY_SCAM;
    /// everything above is SCAM
    pub likely_scam: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            safe: 0.30,
            suspicious: 0.60,
            likely_scam: 0.85,
        }
    }
}

impl VerdictThresholds {
    /// Classify a score. Total over all f64 inputs; monotonic in the score.
    pub fn classify(&self, score: f64) -> Verdict {
        if score < self.safe {
            Verdict::Safe
        } else if score < self.suspicious {
            Verdict::Suspicious
        } else if score < self.likely_scam {
            Verdict::LikelyScam
        } else {
            Verdict::Scam
        }
    }

    /// Check the cut-points are strictly ascending within (0, 1).
    pub fn validate(&self) -> Result<(), String> {
        let ordered = 0.0 < self.safe
            && self.safe < self.suspicious
            && self.suspicious < self.likely_scam
            && self.likely_scam <= 1.0;

        if ordered {
            Ok(())
        } else {
            Err(format!(
                "verdict thresholds must be strictly ascending within (0, 1]: {} / {} / {}",
                self.safe, self.suspicious, self.likely_scam
            ))
        }
    }
}

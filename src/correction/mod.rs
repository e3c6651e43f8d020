//! Heuristic confirmation corrector
//!
//! A rule-based 0–100 confirmation score computed from the raw observation is
//! mapped to a target class distribution and blended into the ensemble's
//! distribution. The blended result replaces the ensemble's only when it
//! turns the verdict into `confirmed_exoplanet` with a clear confidence gain.
//!
//! Known calibration bias: the correction can only ever move the served label
//! toward `confirmed_exoplanet`, never toward the other classes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{ClassLabel, ClassificationResult, Observation};

/// Starting score before adjustments
pub const BASE_SCORE: i32 = 50;

/// Minimum confidence gain for the correction to be applied
pub const MIN_CONFIDENCE_GAIN: f64 = 0.15;

/// One additive score adjustment with its reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub points: i32,
    pub reason: String,
}

impl ScoreAdjustment {
    fn new(points: i32, reason: impl Into<String>) -> Self {
        Self { points, reason: reason.into() }
    }
}

/// Outcome of running the corrector on one ensemble result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Correction {
    /// The corrected result replaces the ensemble's
    Applied {
        corrected: ClassificationResult,
        original: ClassificationResult,
        score: u32,
    },
    /// The ensemble result stands; `candidate` is what the blend produced
    Unchanged {
        result: ClassificationResult,
        candidate: ClassificationResult,
        score: u32,
    },
    /// The corrector could not run on this input
    Fallback { result: ClassificationResult, reason: String },
}

impl Correction {
    /// The result to serve
    pub fn result(&self) -> &ClassificationResult {
        match self {
            Correction::Applied { corrected, .. } => corrected,
            Correction::Unchanged { result, .. } | Correction::Fallback { result, .. } => result,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Correction::Applied { .. })
    }

    /// The uncorrected result when the correction was applied
    pub fn original(&self) -> Option<&ClassificationResult> {
        match self {
            Correction::Applied { original, .. } => Some(original),
            _ => None,
        }
    }

    pub fn score(&self) -> Option<u32> {
        match self {
            Correction::Applied { score, .. } | Correction::Unchanged { score, .. } => Some(*score),
            Correction::Fallback { .. } => None,
        }
    }
}

/// Rule-based confirmation corrector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfirmationCorrector;

impl ConfirmationCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Score adjustments that apply to `obs`, in rule order
    pub fn explain(&self, obs: &Observation) -> Vec<ScoreAdjustment> {
        let mut adjustments = Vec::new();
        let snr = obs.snr;
        let depth = obs.transit_depth;
        let period = obs.orbital_period;

        adjustments.push(match snr {
            s if s >= 15.0 => ScoreAdjustment::new(20, format!("excellent SNR ({:.1} >= 15)", s)),
            s if s >= 12.0 => ScoreAdjustment::new(15, format!("very good SNR ({:.1} >= 12)", s)),
            s if s >= 10.0 => ScoreAdjustment::new(10, format!("good SNR ({:.1} >= 10)", s)),
            s if s >= 7.0 => ScoreAdjustment::new(5, format!("acceptable SNR ({:.1} >= 7)", s)),
            s => ScoreAdjustment::new(-10, format!("low SNR ({:.1} < 7)", s)),
        });

        // depth of exactly 0.0001 is neither rewarded nor penalized
        if depth > 0.0001 && depth < 0.05 {
            adjustments.push(ScoreAdjustment::new(15, format!("planet-like transit depth ({:.5})", depth)));
        } else if depth >= 0.05 {
            adjustments.push(ScoreAdjustment::new(
                -30,
                format!("very deep transit ({:.4}), likely eclipsing binary", depth),
            ));
        } else if depth < 0.0001 {
            adjustments.push(ScoreAdjustment::new(-10, format!("transit too shallow ({:.6})", depth)));
        }

        if obs.stellar_temp > 4500.0 && obs.stellar_temp < 6500.0 && obs.stellar_mass > 0.7 && obs.stellar_mass < 1.3 {
            adjustments.push(ScoreAdjustment::new(
                10,
                format!("Sun-like host ({:.0} K, {:.2} Msun)", obs.stellar_temp, obs.stellar_mass),
            ));
        }

        let max_duration = 3.0 + period.ln_1p() * 0.8;
        if obs.transit_duration >= 2.0 && obs.transit_duration <= max_duration {
            adjustments.push(ScoreAdjustment::new(
                10,
                format!("duration {:.2} h consistent with period (2 to {:.2} h)", obs.transit_duration, max_duration),
            ));
        }

        if obs.stellar_magnitude < 13.0 {
            adjustments.push(ScoreAdjustment::new(10, format!("bright star (mag {:.1} < 13)", obs.stellar_magnitude)));
        } else if obs.stellar_magnitude < 15.0 {
            adjustments.push(ScoreAdjustment::new(5, format!("moderately bright star (mag {:.1} < 15)", obs.stellar_magnitude)));
        }

        if period > 150.0 && snr >= 10.0 && depth > 0.001 && depth < 0.01 {
            adjustments.push(ScoreAdjustment::new(15, format!("long period ({:.1} d) with good SNR", period)));
        }

        adjustments
    }

    /// Confirmation score in [0, 100]
    pub fn score(&self, obs: &Observation) -> u32 {
        let total: i32 = BASE_SCORE + self.explain(obs).iter().map(|a| a.points).sum::<i32>();
        total.clamp(0, 100) as u32
    }

    /// Target distribution (encoding order) for a score band
    pub fn target_distribution(&self, score: u32, p_confirmed: f64) -> [f64; 3] {
        // (confirmed, candidate, false positive)
        let (confirmed, candidate, false_positive) = match score {
            s if s >= 90 => (0.92, 0.04, 0.04),
            s if s >= 80 => (0.80, 0.12, 0.08),
            s if s >= 70 => (0.70, 0.20, 0.10),
            s if s >= 60 => (0.55, 0.30, 0.15),
            s if s >= 50 => (0.45, 0.35, 0.20),
            _ => ((p_confirmed - 0.1).max(0.20), 0.40, 0.40),
        };
        let mut target = [0.0; 3];
        target[ClassLabel::ConfirmedExoplanet.index()] = confirmed;
        target[ClassLabel::PlanetaryCandidate.index()] = candidate;
        target[ClassLabel::FalsePositive.index()] = false_positive;
        target
    }

    /// Weight given to the target distribution in the blend
    pub fn blend_weight(&self, score: u32) -> f64 {
        match score {
            s if s >= 85 => 0.90,
            s if s >= 70 => 0.80,
            _ => 0.70,
        }
    }

    /// Blend `target` into `probs` with weight `w`, clamp, and renormalize.
    /// Returns `None` when the blend degenerates.
    pub fn blend(&self, probs: &[f64; 3], target: &[f64; 3], w: f64) -> Option<[f64; 3]> {
        let mut blended = [0.0; 3];
        for i in 0..3 {
            blended[i] = (w * target[i] + (1.0 - w) * probs[i]).clamp(0.0, 1.0);
        }
        let sum: f64 = blended.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return None;
        }
        for p in blended.iter_mut() {
            *p /= sum;
        }
        Some(blended)
    }

    /// Run the corrector on an ensemble result
    pub fn correct(&self, obs: &Observation, result: &ClassificationResult) -> Correction {
        if !obs.is_finite() {
            return Correction::Fallback {
                result: *result,
                reason: "observation has non-finite fields".to_string(),
            };
        }
        let sum: f64 = result.probabilities.iter().sum();
        if result.probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) || !(sum > 0.0) {
            return Correction::Fallback {
                result: *result,
                reason: "degenerate class distribution".to_string(),
            };
        }

        let score = self.score(obs);
        let target = self.target_distribution(score, result.probability(ClassLabel::ConfirmedExoplanet));
        let Some(blended) = self.blend(&result.probabilities, &target, self.blend_weight(score)) else {
            return Correction::Fallback {
                result: *result,
                reason: "blend produced a degenerate distribution".to_string(),
            };
        };
        let candidate = ClassificationResult::from_distribution(blended, result.model_agreement);

        let applies = candidate.label == ClassLabel::ConfirmedExoplanet
            && candidate.confidence > result.confidence + MIN_CONFIDENCE_GAIN;
        debug!(score, applies, corrected = %candidate.label, original = %result.label, "Confirmation corrector");

        if applies {
            Correction::Applied { corrected: candidate, original: *result, score }
        } else {
            Correction::Unchanged { result: *result, candidate, score }
        }
    }
}

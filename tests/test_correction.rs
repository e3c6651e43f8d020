//! Integration test: confirmation corrector over a grid of inputs

use exoplanet_classifier::correction::{ConfirmationCorrector, Correction, MIN_CONFIDENCE_GAIN};
use exoplanet_classifier::data::{ClassLabel, ClassificationResult, Observation};
use exoplanet_classifier::synthetic::KNOWN_PLANETS;

fn distributions() -> Vec<[f64; 3]> {
    vec![
        [0.9, 0.05, 0.05],
        [0.4, 0.35, 0.25],
        [0.2, 0.3, 0.5],
        [0.05, 0.9, 0.05],
        [0.1, 0.1, 0.8],
        [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
    ]
}

fn observations() -> Vec<Observation> {
    let mut obs: Vec<Observation> = KNOWN_PLANETS
        .iter()
        .map(|(_, values)| Observation::from_values(*values))
        .collect();
    obs.push(Observation::from_values([2.1, 2.5, 0.15, 12.0, 1.0, 5800.0, 12.0]));
    obs.push(Observation::from_values([0.7, 0.4, 0.00005, 3.5, 2.5, 9500.0, 17.5]));
    obs
}

#[test]
fn test_outcomes_are_consistent() {
    let corrector = ConfirmationCorrector::new();
    for obs in observations() {
        for probs in distributions() {
            let original = ClassificationResult::from_distribution(probs, 0.5);
            match corrector.correct(&obs, &original) {
                Correction::Applied { corrected, original: before, score } => {
                    assert_eq!(corrected.label, ClassLabel::ConfirmedExoplanet);
                    assert!(corrected.confidence > before.confidence + MIN_CONFIDENCE_GAIN);
                    assert_eq!(before, original);
                    assert!(score <= 100);
                    let sum: f64 = corrected.probabilities.iter().sum();
                    assert!((sum - 1.0).abs() < 1e-9);
                }
                Correction::Unchanged { result, candidate, .. } => {
                    assert_eq!(result, original);
                    let sum: f64 = candidate.probabilities.iter().sum();
                    assert!((sum - 1.0).abs() < 1e-9);
                }
                Correction::Fallback { .. } => panic!("finite input should not fall back"),
            }
        }
    }
}

#[test]
fn test_known_planets_score_well() {
    let corrector = ConfirmationCorrector::new();
    for (name, values) in KNOWN_PLANETS.iter() {
        let score = corrector.score(&Observation::from_values(*values));
        assert!(score >= 60, "{} scored {}", name, score);
    }
}

#[test]
fn test_score_monotone_in_snr_with_depth_in_band() {
    let corrector = ConfirmationCorrector::new();
    let mut previous = 0;
    for step in 0..=30 {
        let snr = 5.0 + step as f64 * 0.5;
        // Faint, hot host so the total stays below the clamp
        let obs = Observation::from_values([40.0, 4.0, 0.004, snr, 1.6, 7000.0, 16.0]);
        let score = corrector.score(&obs);
        assert!(score >= previous, "snr {} dropped score to {}", snr, score);
        previous = score;
    }
    assert_eq!(previous, 95);
}

#[test]
fn test_eclipsing_binary_is_not_promoted_from_confident_false_positive() {
    let corrector = ConfirmationCorrector::new();
    let obs = Observation::from_values([2.1, 2.5, 0.15, 12.0, 1.0, 5800.0, 12.0]);
    let original = ClassificationResult::from_distribution([0.05, 0.9, 0.05], 1.0);
    let outcome = corrector.correct(&obs, &original);
    assert!(!outcome.is_applied());
    assert_eq!(outcome.result().label, ClassLabel::FalsePositive);
}

#[test]
fn test_degenerate_distribution_falls_back() {
    let corrector = ConfirmationCorrector::new();
    let obs = Observation::from_values([40.0, 4.0, 0.004, 12.0, 1.0, 5700.0, 12.0]);
    let mut degenerate = ClassificationResult::from_distribution([0.5, 0.3, 0.2], 1.0);
    degenerate.probabilities = [0.0, 0.0, 0.0];
    assert!(matches!(corrector.correct(&obs, &degenerate), Correction::Fallback { .. }));
}

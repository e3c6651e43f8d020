//! Per-observation diagnostics
//!
//! Explains a single classification: what each ensemble member voted, how
//! the confirmation score was built, which signals look suspicious, what the
//! closed-form physics says, and whether the correction fired.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::correction::{Correction, ScoreAdjustment, MIN_CONFIDENCE_GAIN};
use crate::data::{ClassLabel, ClassificationResult, Observation};
use crate::error::Result;
use crate::feature_engineering::{planet_properties, PhysicalEstimate, TransitFeatureEngineer};
use crate::system::{ClassificationSystem, Prediction};

/// Engineered features surfaced in reports
const KEY_FEATURES: [&str; 8] = [
    "duration_period_ratio",
    "radius_ratio",
    "signal_strength",
    "semimajor_axis_estimate",
    "equilibrium_temp_estimate",
    "transit_probability",
    "duration_anomaly",
    "snr_per_depth",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
    SubEarth,
    EarthToSuperEarth,
    NeptuneLike,
    JupiterLike,
    SuperJupiter,
}

impl SizeClass {
    pub fn from_radius(earth_radii: f64) -> Self {
        match earth_radii {
            r if r < 0.5 => SizeClass::SubEarth,
            r if r < 2.0 => SizeClass::EarthToSuperEarth,
            r if r < 6.0 => SizeClass::NeptuneLike,
            r if r < 15.0 => SizeClass::JupiterLike,
            _ => SizeClass::SuperJupiter,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SizeClass::SubEarth => "sub-Earth",
            SizeClass::EarthToSuperEarth => "Earth to super-Earth",
            SizeClass::NeptuneLike => "Neptune-like",
            SizeClass::JupiterLike => "Jupiter-like",
            SizeClass::SuperJupiter => "super-Jupiter (unlikely for a planet)",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitClass {
    VeryClose,
    Close,
    InnerSystem,
    OuterSystem,
    Far,
}

impl OrbitClass {
    pub fn from_semi_major_axis(au: f64) -> Self {
        match au {
            a if a < 0.1 => OrbitClass::VeryClose,
            a if a < 0.5 => OrbitClass::Close,
            a if a < 1.5 => OrbitClass::InnerSystem,
            a if a < 5.0 => OrbitClass::OuterSystem,
            _ => OrbitClass::Far,
        }
    }
}

impl fmt::Display for OrbitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrbitClass::VeryClose => "very close orbit",
            OrbitClass::Close => "close orbit",
            OrbitClass::InnerSystem => "inner system",
            OrbitClass::OuterSystem => "outer system",
            OrbitClass::Far => "far orbit",
        })
    }
}

/// Physics-only verdict from indicator counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    StrongPlanet,
    GoodPlanet,
    ModeratePlanet,
    Uncertain,
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Assessment::StrongPlanet => "strong planet signal, expected confirmed_exoplanet",
            Assessment::GoodPlanet => "good planet signal, expected confirmed_exoplanet or planetary_candidate",
            Assessment::ModeratePlanet => "moderate planet signal, expected planetary_candidate",
            Assessment::Uncertain => "uncertain, expected planetary_candidate or false_positive",
        })
    }
}

/// Model-free reading of an observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationAssessment {
    pub physical: PhysicalEstimate,
    pub size_class: SizeClass,
    pub orbit_class: OrbitClass,
    /// Out of 6
    pub planet_indicators: usize,
    /// Out of 4
    pub false_positive_indicators: usize,
    pub assessment: Assessment,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

/// Assess an observation from closed-form physics alone
pub fn assess_observation(obs: &Observation) -> ObservationAssessment {
    let physical = planet_properties(obs);
    let radius = physical.planet_radius;
    let duration_ratio = (obs.transit_duration / 24.0) / obs.orbital_period;
    let depth = obs.transit_depth;

    let planet_indicators = [
        depth > 0.0001 && depth < 0.05,
        obs.snr > 7.0 && obs.snr < 100.0,
        radius > 0.5 && radius < 20.0,
        duration_ratio > 0.01 && duration_ratio < 0.15,
        obs.stellar_temp > 3000.0 && obs.stellar_temp < 8000.0,
        obs.stellar_mass > 0.5 && obs.stellar_mass < 2.0,
    ]
    .iter()
    .filter(|&&hit| hit)
    .count();
    let false_positive_indicators = [depth > 0.05, obs.snr < 7.0, radius > 20.0, duration_ratio > 0.2]
        .iter()
        .filter(|&&hit| hit)
        .count();

    let assessment = if planet_indicators >= 5 && false_positive_indicators == 0 {
        Assessment::StrongPlanet
    } else if planet_indicators >= 3 && false_positive_indicators <= 1 {
        Assessment::GoodPlanet
    } else if planet_indicators >= 2 {
        Assessment::ModeratePlanet
    } else {
        Assessment::Uncertain
    };

    let mut warnings = Vec::new();
    if obs.snr < 7.0 {
        warnings.push(format!("SNR {:.1} is below the usual detection threshold of 7", obs.snr));
    }
    if depth > 0.05 {
        warnings.push(format!("very deep transit ({:.2}%), possibly an eclipsing binary", depth * 100.0));
    } else if depth < 0.0001 {
        warnings.push(format!("very shallow transit ({:.4}%), small planet or noise", depth * 100.0));
    }
    if duration_ratio > 0.2 {
        warnings.push("transit is very long relative to the period".to_string());
    } else if duration_ratio < 0.01 {
        warnings.push("transit is very short relative to the period, possibly grazing".to_string());
    }

    let mut notes = Vec::new();
    if obs.orbital_period > 200.0 {
        notes.push(format!(
            "long period ({:.1} d): few transits observed, harder to confirm",
            obs.orbital_period
        ));
    } else if obs.orbital_period < 2.0 {
        notes.push(format!("very short period ({:.2} d): check for an eclipsing binary", obs.orbital_period));
    }
    if physical.semi_major_axis > 0.8
        && physical.semi_major_axis < 1.2
        && obs.orbital_period > 200.0
        && obs.orbital_period < 400.0
    {
        notes.push("orbit lies in the habitable-zone range".to_string());
    }

    ObservationAssessment {
        physical,
        size_class: SizeClass::from_radius(radius),
        orbit_class: OrbitClass::from_semi_major_axis(physical.semi_major_axis),
        planet_indicators,
        false_positive_indicators,
        assessment,
        warnings,
        notes,
    }
}

/// One member's hard vote and class distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberVote {
    pub name: String,
    pub label: ClassLabel,
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// Full diagnosis of one observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub observation: Observation,
    pub key_features: BTreeMap<String, f64>,
    pub physics: ObservationAssessment,
    pub member_votes: Vec<MemberVote>,
    /// Ensemble result before correction
    pub ensemble: ClassificationResult,
    pub confirmation_score: Option<u32>,
    pub score_breakdown: Vec<ScoreAdjustment>,
    pub red_flags: Vec<String>,
    pub correction_explanation: String,
    pub prediction: Prediction,
}

fn red_flags(obs: &Observation, ensemble: &ClassificationResult) -> Vec<String> {
    let mut flags = Vec::new();
    if obs.snr >= 12.0 && ensemble.label != ClassLabel::ConfirmedExoplanet {
        flags.push(format!("high SNR ({:.1}) but classified as {}", obs.snr, ensemble.label));
    }
    if obs.transit_depth > 0.05 && obs.snr >= 12.0 {
        flags.push(format!(
            "deep transit ({:.2}%) with high SNR, typical of an eclipsing binary",
            obs.transit_depth * 100.0
        ));
    }
    if obs.orbital_period > 150.0 && obs.snr >= 10.0 && ensemble.label == ClassLabel::FalsePositive {
        flags.push(format!(
            "long period ({:.1} d) with good SNR classified as false_positive",
            obs.orbital_period
        ));
    }
    flags
}

fn explain_correction(correction: &Correction) -> String {
    match correction {
        Correction::Applied { corrected, original, score } => format!(
            "correction applied: score {}/100 moved {} ({:.2}) to {} ({:.2})",
            score, original.label, original.confidence, corrected.label, corrected.confidence
        ),
        Correction::Unchanged { result, candidate, score } => {
            if candidate.label != ClassLabel::ConfirmedExoplanet {
                format!(
                    "not applied: score {}/100 blends to {}, only confirmed_exoplanet corrections are served",
                    score, candidate.label
                )
            } else {
                format!(
                    "not applied: score {}/100 gives confidence {:.2}, needs more than {:.2}",
                    score,
                    candidate.confidence,
                    result.confidence + MIN_CONFIDENCE_GAIN
                )
            }
        }
        Correction::Fallback { reason, .. } => format!("corrector skipped: {}", reason),
    }
}

/// Diagnose one observation against a trained system
pub fn diagnose(system: &ClassificationSystem, obs: &Observation) -> Result<DiagnosticReport> {
    let analysis = system.analyze(obs)?;

    let key_features = TransitFeatureEngineer::feature_names()
        .into_iter()
        .zip(analysis.engineered.iter())
        .filter(|(name, _)| KEY_FEATURES.contains(&name.as_str()))
        .map(|(name, &v)| (name, v))
        .collect();

    let member_votes = analysis
        .members
        .iter()
        .map(|m| MemberVote {
            name: m.name.clone(),
            label: ClassLabel::from_index(m.predictions[0]).unwrap_or(ClassLabel::FalsePositive),
            probabilities: m.probabilities.as_ref().map(|p| {
                ClassLabel::ALL
                    .iter()
                    .map(|l| (l.as_str().to_string(), p[[0, l.index()]]))
                    .collect()
            }),
        })
        .collect();

    let corrector = system.corrector();
    Ok(DiagnosticReport {
        observation: *obs,
        key_features,
        physics: assess_observation(obs),
        member_votes,
        ensemble: analysis.ensemble,
        confirmation_score: analysis.correction.score(),
        score_breakdown: corrector.explain(obs),
        red_flags: red_flags(obs, &analysis.ensemble),
        correction_explanation: explain_correction(&analysis.correction),
        prediction: analysis.prediction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_kepler_22b() {
        let obs = Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7]);
        let assessment = assess_observation(&obs);
        assert_eq!(assessment.false_positive_indicators, 0);
        assert_eq!(assessment.planet_indicators, 5);
        assert_eq!(assessment.assessment, Assessment::StrongPlanet);
        assert_eq!(assessment.size_class, SizeClass::NeptuneLike);
        assert!(assessment.notes.iter().any(|n| n.contains("long period")));
        assert!(assessment.warnings.iter().any(|w| w.contains("short relative")));
    }

    #[test]
    fn test_assess_eclipsing_binary() {
        let obs = Observation::from_values([1.5, 3.0, 0.2, 25.0, 1.0, 5800.0, 12.0]);
        let assessment = assess_observation(&obs);
        assert!(assessment.false_positive_indicators >= 1);
        assert!(assessment.warnings.iter().any(|w| w.contains("eclipsing binary")));
    }

    #[test]
    fn test_size_and_orbit_classes() {
        assert_eq!(SizeClass::from_radius(1.0), SizeClass::EarthToSuperEarth);
        assert_eq!(SizeClass::from_radius(11.0), SizeClass::JupiterLike);
        assert_eq!(SizeClass::from_radius(30.0), SizeClass::SuperJupiter);
        assert_eq!(OrbitClass::from_semi_major_axis(0.05), OrbitClass::VeryClose);
        assert_eq!(OrbitClass::from_semi_major_axis(1.0), OrbitClass::InnerSystem);
    }

    #[test]
    fn test_red_flags() {
        let obs = Observation::from_values([200.0, 8.0, 0.08, 15.0, 1.0, 5700.0, 12.0]);
        let ensemble = ClassificationResult::from_distribution([0.1, 0.8, 0.1], 1.0);
        let flags = red_flags(&obs, &ensemble);
        assert_eq!(flags.len(), 3);

        let confirmed = ClassificationResult::from_distribution([0.8, 0.1, 0.1], 1.0);
        let quiet = Observation::from_values([10.0, 3.0, 0.002, 8.0, 1.0, 5700.0, 12.0]);
        assert!(red_flags(&quiet, &confirmed).is_empty());
    }

    #[test]
    fn test_explain_fallback() {
        let result = ClassificationResult::from_distribution([0.2, 0.3, 0.5], 1.0);
        let text = explain_correction(&Correction::Fallback {
            result,
            reason: "observation has non-finite fields".to_string(),
        });
        assert!(text.starts_with("corrector skipped"));
    }
}

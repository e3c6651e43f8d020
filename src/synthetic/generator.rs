//! Class-conditional synthetic catalog generator

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::{Catalog, CatalogEntry, ClassLabel, Observation, PropertyTargets};
use crate::error::{ExoplanetError, Result};

/// Depth scale for a radius in Earth radii around a Sun-sized star
const DEPTH_PER_EARTH_RADIUS: f64 = 0.00916;

/// Seeded synthetic catalog generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogGenerator {
    n_samples: usize,
    confirmed_fraction: f64,
    candidate_fraction: f64,
    seed: u64,
}

impl Default for CatalogGenerator {
    fn default() -> Self {
        Self {
            n_samples: 5000,
            confirmed_fraction: 0.30,
            candidate_fraction: 0.35,
            seed: 42,
        }
    }
}

fn lognormal(mu: f64, sigma: f64) -> Result<LogNormal<f64>> {
    LogNormal::new(mu, sigma).map_err(|e| ExoplanetError::ConfigError(format!("lognormal({}, {}): {}", mu, sigma, e)))
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std).map_err(|e| ExoplanetError::ConfigError(format!("normal({}, {}): {}", mean, std, e)))
}

/// Sampling distributions for confirmed planets or candidates
struct PlanetProfile {
    period: LogNormal<f64>,
    mass: Normal<f64>,
    temp: Normal<f64>,
    magnitude: Normal<f64>,
    radius: LogNormal<f64>,
    duration: Normal<f64>,
    snr: LogNormal<f64>,
    min_snr: f64,
    impact: Uniform<f64>,
    label: ClassLabel,
}

impl PlanetProfile {
    fn confirmed() -> Result<Self> {
        Ok(Self {
            period: lognormal(2.5, 1.5)?,
            mass: normal(1.0, 0.3)?,
            temp: normal(5500.0, 800.0)?,
            magnitude: normal(14.0, 2.0)?,
            radius: lognormal(0.5, 0.8)?,
            duration: normal(3.0, 1.0)?,
            snr: lognormal(2.5, 0.7)?,
            min_snr: 5.0,
            impact: Uniform::new(0.0, 0.9),
            label: ClassLabel::ConfirmedExoplanet,
        })
    }

    fn candidate() -> Result<Self> {
        Ok(Self {
            period: lognormal(2.5, 1.8)?,
            mass: normal(1.0, 0.4)?,
            temp: normal(5500.0, 1000.0)?,
            magnitude: normal(15.0, 2.5)?,
            radius: lognormal(0.5, 1.0)?,
            duration: normal(3.0, 1.5)?,
            snr: lognormal(1.8, 0.8)?,
            min_snr: 4.0,
            impact: Uniform::new(0.0, 0.95),
            label: ClassLabel::PlanetaryCandidate,
        })
    }

    /// One row; targets come from the unclamped draws
    fn sample(&self, rng: &mut ChaCha8Rng) -> CatalogEntry {
        let period = self.period.sample(rng);
        let mass = self.mass.sample(rng);
        let temp = self.temp.sample(rng);
        let magnitude = self.magnitude.sample(rng);

        let planet_radius = self.radius.sample(rng);
        let depth = (planet_radius * DEPTH_PER_EARTH_RADIUS).powi(2);
        let duration = self.duration.sample(rng);
        let snr = self.snr.sample(rng);
        // NaN when the mass draw is negative; such targets are filtered at training
        let semi_major_axis = (period / 365.25).powf(2.0 / 3.0) * mass.powf(1.0 / 3.0);
        let planet_temp = temp * (1.0 / (2.0 * semi_major_axis)).sqrt() * 0.01;
        let impact_parameter = self.impact.sample(rng);

        CatalogEntry {
            observation: Observation {
                orbital_period: period.max(0.5),
                transit_duration: duration.max(0.5),
                transit_depth: depth.clamp(0.0001, 0.1),
                snr: snr.max(self.min_snr),
                stellar_mass: mass.max(0.1),
                stellar_temp: temp.clamp(3000.0, 10000.0),
                stellar_magnitude: magnitude.clamp(8.0, 20.0),
            },
            label: self.label,
            properties: PropertyTargets {
                planet_radius,
                planet_temp,
                semi_major_axis,
                impact_parameter,
            },
        }
    }
}

impl CatalogGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set class fractions for confirmed planets and candidates; false positives take the rest
    pub fn with_fractions(mut self, confirmed: f64, candidate: f64) -> Self {
        self.confirmed_fraction = confirmed;
        self.candidate_fraction = candidate;
        self
    }

    /// Row counts per class as (confirmed, candidate, false positive)
    pub fn class_sizes(&self) -> (usize, usize, usize) {
        let confirmed = (self.n_samples as f64 * self.confirmed_fraction) as usize;
        let candidate = (self.n_samples as f64 * self.candidate_fraction) as usize;
        let false_positive = self.n_samples.saturating_sub(confirmed + candidate);
        (confirmed, candidate, false_positive)
    }

    fn validate(&self) -> Result<()> {
        let fractions_ok = (0.0..=1.0).contains(&self.confirmed_fraction)
            && (0.0..=1.0).contains(&self.candidate_fraction)
            && self.confirmed_fraction + self.candidate_fraction <= 1.0;
        if !fractions_ok {
            return Err(ExoplanetError::InvalidParameter {
                name: "class fractions".to_string(),
                value: format!("{} + {}", self.confirmed_fraction, self.candidate_fraction),
                reason: "must be non-negative and sum to at most 1".to_string(),
            });
        }
        Ok(())
    }

    /// Generate the catalog; the same seed always yields the same rows
    pub fn generate(&self) -> Result<Catalog> {
        self.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let (n_confirmed, n_candidate, n_false_positive) = self.class_sizes();

        let mut entries = Vec::with_capacity(self.n_samples);

        let confirmed = PlanetProfile::confirmed()?;
        entries.extend((0..n_confirmed).map(|_| confirmed.sample(&mut rng)));
        let candidate = PlanetProfile::candidate()?;
        entries.extend((0..n_candidate).map(|_| candidate.sample(&mut rng)));

        // Eclipsing binaries and artifacts: deeper, longer, noisier
        let period = lognormal(2.0, 2.0)?;
        let mass = normal(1.0, 0.5)?;
        let temp = normal(5500.0, 1200.0)?;
        let magnitude = normal(15.5, 3.0)?;
        let depth = lognormal(-4.0, 1.5)?;
        let duration = normal(4.0, 2.0)?;
        let snr = lognormal(1.5, 1.0)?;
        for _ in 0..n_false_positive {
            let observation = Observation {
                orbital_period: period.sample(&mut rng).max(0.5),
                stellar_mass: mass.sample(&mut rng).max(0.1),
                stellar_temp: temp.sample(&mut rng).clamp(3000.0, 10000.0),
                stellar_magnitude: magnitude.sample(&mut rng).clamp(8.0, 20.0),
                transit_depth: depth.sample(&mut rng).clamp(0.0001, 0.3),
                transit_duration: duration.sample(&mut rng).max(0.5),
                snr: snr.sample(&mut rng).max(3.0),
            };
            entries.push(CatalogEntry {
                observation,
                label: ClassLabel::FalsePositive,
                properties: PropertyTargets::missing(),
            });
        }

        info!(
            confirmed = n_confirmed,
            candidate = n_candidate,
            false_positive = n_false_positive,
            seed = self.seed,
            "Generated synthetic catalog"
        );
        Ok(Catalog::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_sizes() {
        let generator = CatalogGenerator::new();
        assert_eq!(generator.class_sizes(), (1500, 1750, 1750));
        let catalog = generator.with_n_samples(200).generate().unwrap();
        assert_eq!(catalog.len(), 200);
        assert_eq!(catalog.class_counts(), [60, 70, 70]);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = CatalogGenerator::new().with_n_samples(50).generate().unwrap();
        let b = CatalogGenerator::new().with_n_samples(50).generate().unwrap();
        let c = CatalogGenerator::new().with_n_samples(50).with_seed(7).generate().unwrap();
        assert_eq!(a.entries[10].observation, b.entries[10].observation);
        assert_ne!(a.entries[10].observation, c.entries[10].observation);
    }

    #[test]
    fn test_clamps_respected() {
        let catalog = CatalogGenerator::new().with_n_samples(600).generate().unwrap();
        for entry in &catalog.entries {
            let obs = entry.observation;
            assert!(obs.orbital_period >= 0.5);
            assert!(obs.transit_duration >= 0.5);
            assert!((3000.0..=10000.0).contains(&obs.stellar_temp));
            assert!((8.0..=20.0).contains(&obs.stellar_magnitude));
            match entry.label {
                ClassLabel::FalsePositive => {
                    assert!(obs.snr >= 3.0 && obs.transit_depth <= 0.3);
                    assert!(entry.properties.planet_radius.is_nan());
                }
                ClassLabel::ConfirmedExoplanet => {
                    assert!(obs.snr >= 5.0 && obs.transit_depth <= 0.1);
                    assert!(entry.properties.impact_parameter < 0.9);
                }
                ClassLabel::PlanetaryCandidate => assert!(obs.snr >= 4.0),
            }
        }
    }

    #[test]
    fn test_invalid_fractions() {
        assert!(CatalogGenerator::new().with_fractions(0.7, 0.5).generate().is_err());
    }
}

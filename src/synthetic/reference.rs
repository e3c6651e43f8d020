//! Reference catalog of confirmed planets

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::data::{Catalog, CatalogEntry, ClassLabel, Observation, PropertyTargets};
use crate::error::{ExoplanetError, Result};

/// Well-known confirmed planets, values in `FEATURE_COLUMNS` order
pub const KNOWN_PLANETS: [(&str, [f64; 7]); 10] = [
    ("HD 209458 b", [3.52, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]),
    ("HD 189733 b", [2.22, 1.8, 0.024, 35.0, 0.82, 5040.0, 7.7]),
    ("WASP-12 b", [1.09, 2.5, 0.014, 28.0, 1.35, 6300.0, 11.7]),
    ("WASP-33 b", [1.22, 2.8, 0.011, 25.0, 1.50, 7430.0, 8.3]),
    ("HAT-P-7 b", [2.20, 3.8, 0.0042, 22.0, 1.47, 6350.0, 10.5]),
    ("Kepler-22 b", [289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7]),
    ("HD 17156 b", [21.2, 5.5, 0.0065, 18.0, 1.28, 6079.0, 8.2]),
    ("HD 80606 b", [111.4, 12.0, 0.0063, 15.0, 1.00, 5570.0, 9.0]),
    ("Kepler-10 b", [0.84, 1.8, 0.00015, 20.0, 0.91, 5627.0, 11.2]),
    ("Kepler-16 b", [228.8, 6.0, 0.0015, 10.0, 0.69, 4450.0, 12.0]),
];

/// Earth radii per solar radius
const EARTH_RADII_PER_SOLAR: f64 = 109.1;

// (weight, lognormal mu, lognormal sigma)
const PERIOD_CATEGORIES: [(f64, f64, f64); 4] = [
    (0.15, 0.0, 0.8), // ultra-short
    (0.35, 1.5, 0.6), // short
    (0.30, 3.5, 0.7), // medium
    (0.20, 5.0, 0.6), // long
];

// (weight, low, high) in Earth radii
const RADIUS_CATEGORIES: [(f64, f64, f64); 4] = [
    (0.20, 0.8, 1.5),  // earth-like
    (0.30, 1.5, 3.0),  // super-earth
    (0.30, 3.0, 6.0),  // neptune
    (0.20, 8.0, 15.0), // jupiter
];

/// Seeded generator of realistic confirmed planets around Sun-like stars
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePlanetGenerator {
    pub n_generated: usize,
    pub seed: u64,
}

impl Default for ReferencePlanetGenerator {
    fn default() -> Self {
        Self { n_generated: 90, seed: 42 }
    }
}

fn distribution_error(e: impl std::fmt::Display) -> ExoplanetError {
    ExoplanetError::ConfigError(format!("invalid reference distribution: {}", e))
}

impl ReferencePlanetGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    /// Observations of the generated planets
    pub fn observations(&self) -> Result<Vec<Observation>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let period_pick = WeightedIndex::new(PERIOD_CATEGORIES.iter().map(|c| c.0)).map_err(distribution_error)?;
        let periods = PERIOD_CATEGORIES
            .iter()
            .map(|&(_, mu, sigma)| LogNormal::new(mu, sigma).map_err(distribution_error))
            .collect::<Result<Vec<_>>>()?;
        let radius_pick = WeightedIndex::new(RADIUS_CATEGORIES.iter().map(|c| c.0)).map_err(distribution_error)?;
        let radii: Vec<Uniform<f64>> = RADIUS_CATEGORIES.iter().map(|&(_, lo, hi)| Uniform::new(lo, hi)).collect();

        let mass = Normal::new(1.0, 0.25).map_err(distribution_error)?;
        let temp = Normal::new(5700.0, 600.0).map_err(distribution_error)?;
        let magnitude = Normal::new(12.0, 2.0).map_err(distribution_error)?;
        let snr_jitter = Uniform::new(0.8, 1.2);

        let mut out = Vec::with_capacity(self.n_generated);
        for _ in 0..self.n_generated {
            let period = periods[period_pick.sample(&mut rng)].sample(&mut rng);
            let st_mass: f64 = mass.sample(&mut rng);
            let st_temp: f64 = temp.sample(&mut rng);
            let st_mag: f64 = magnitude.sample(&mut rng);
            let planet_radius = radii[radius_pick.sample(&mut rng)].sample(&mut rng);

            let stellar_radius = st_mass.powf(0.8);
            let depth = (planet_radius / (stellar_radius * EARTH_RADII_PER_SOLAR)).powi(2);

            let base_duration = 2.0 + period.ln_1p() * 0.5;
            let duration = Normal::new(base_duration, base_duration * 0.15)
                .map_err(distribution_error)?
                .sample(&mut rng);

            // Fewer transits at long period, more photons from bright stars
            let snr = 20.0 / (1.0 + period / 40.0) * (-(st_mag - 10.0) / 4.0).exp() * snr_jitter.sample(&mut rng);

            out.push(Observation {
                orbital_period: period.max(0.5),
                transit_duration: duration.max(1.0),
                transit_depth: depth.clamp(0.0001, 0.05),
                snr: snr.clamp(5.0, 40.0),
                stellar_mass: st_mass.clamp(0.5, 2.0),
                stellar_temp: st_temp.clamp(4000.0, 7000.0),
                stellar_magnitude: st_mag.clamp(8.0, 16.0),
            });
        }
        Ok(out)
    }
}

/// Closed-form property targets for a confirmed planet observation
fn closed_form_targets(obs: &Observation, impact_parameter: f64) -> PropertyTargets {
    let semi_major_axis = (obs.orbital_period / 365.25).powf(2.0 / 3.0) * obs.stellar_mass.powf(1.0 / 3.0);
    PropertyTargets {
        planet_radius: obs.transit_depth.sqrt() * obs.stellar_mass.powf(0.8) * EARTH_RADII_PER_SOLAR,
        planet_temp: obs.stellar_temp * (1.0 / (2.0 * semi_major_axis)).sqrt() * 0.01,
        semi_major_axis,
        impact_parameter,
    }
}

/// The known planets followed by 90 seeded realistic ones, all labeled confirmed
pub fn reference_planets(seed: u64) -> Result<Catalog> {
    let generator = ReferencePlanetGenerator::new(seed);
    let mut observations: Vec<Observation> = KNOWN_PLANETS.iter().map(|(_, v)| Observation::from_values(*v)).collect();
    observations.extend(generator.observations()?);

    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
    let impact = Uniform::new(0.0, 0.8);
    let entries = observations
        .into_iter()
        .map(|observation| CatalogEntry {
            properties: closed_form_targets(&observation, impact.sample(&mut rng)),
            observation,
            label: ClassLabel::ConfirmedExoplanet,
        })
        .collect();
    Ok(Catalog::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_catalog_size_and_label() {
        let catalog = reference_planets(42).unwrap();
        assert_eq!(catalog.len(), 100);
        assert_eq!(catalog.class_counts(), [100, 0, 0]);
        assert_eq!(catalog.entries[5].observation.orbital_period, 289.9);
    }

    #[test]
    fn test_generated_planets_within_clamps() {
        for obs in ReferencePlanetGenerator::default().observations().unwrap() {
            assert!(obs.orbital_period >= 0.5);
            assert!(obs.transit_duration >= 1.0);
            assert!((0.0001..=0.05).contains(&obs.transit_depth));
            assert!((5.0..=40.0).contains(&obs.snr));
            assert!((4000.0..=7000.0).contains(&obs.stellar_temp));
        }
    }

    #[test]
    fn test_targets_are_finite() {
        let catalog = reference_planets(3).unwrap();
        for entry in &catalog.entries {
            assert!(entry.properties.values().iter().all(|v| v.is_finite()));
            assert!(entry.properties.impact_parameter < 0.8);
        }
        // Kepler-22 b: sqrt(0.00492) * 0.97^0.8 * 109.1
        let radius = catalog.entries[5].properties.planet_radius;
        assert!((radius - 0.00492f64.sqrt() * 0.97f64.powf(0.8) * 109.1).abs() < 1e-9);
    }
}

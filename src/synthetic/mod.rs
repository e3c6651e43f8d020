//! Offline catalog generation
//!
//! - [`CatalogGenerator`]: seeded class-conditional synthetic catalogs
//! - [`reference_planets`]: well-known confirmed planets plus seeded realistic ones
//!
//! Nothing here runs on the request path; the system uses it only to build a
//! training catalog when no model bundle exists.

mod generator;
mod reference;

pub use generator::CatalogGenerator;
pub use reference::{reference_planets, ReferencePlanetGenerator, KNOWN_PLANETS};

use crate::data::Catalog;
use crate::error::Result;

/// Default training catalog: synthetic rows plus the reference planets
pub fn training_catalog(n_samples: usize, seed: u64) -> Result<Catalog> {
    let mut catalog = CatalogGenerator::new()
        .with_n_samples(n_samples)
        .with_seed(seed)
        .generate()?;
    catalog.extend(reference_planets(seed)?);
    Ok(catalog)
}

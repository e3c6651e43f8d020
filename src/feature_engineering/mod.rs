//! Feature engineering
//!
//! Physics-based features derived from transit photometry and stellar
//! parameters.

mod transit;

pub use transit::{
    derive_features, planet_properties, PhysicalEstimate, TransitFeatureEngineer, DERIVED_FEATURES,
};

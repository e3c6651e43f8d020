//! Ensemble methods module
//!
//! - Soft-voting classification ensemble with uncertainty and agreement
//! - Per-property regression ensembles
//! - Voting combiners shared by both

mod classifier;
mod regressors;
mod voting;

pub use classifier::{
    EnsembleConfig, EnsembleEvaluation, EnsembleMember, EnsembleOutput, ExoplanetEnsemble, MemberKind,
    MemberOutput, MemberSpec,
};
pub use regressors::{PropertyPrediction, PropertyRegressors, RegressorConfig};
pub use voting::{model_agreement, normalized_entropy, VotingClassifier, VotingRegressor, VotingStrategy};

//! Model training module
//!
//! In-crate learners used by the classification ensemble and the property
//! regressors:
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost-style and LightGBM-style boosting
//! - Multinomial logistic regression
//! - Neural networks (MLP)
//! - Stratified splitting and cross-validation

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod lightgbm;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;
pub mod xgboost;

pub use cross_validation::{stratified_train_test_split, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig, GradientBoostingRegressor};
pub use lightgbm::{LightGBMClassifier, LightGBMConfig};
pub use linear_models::LogisticRegression;
pub use models::{
    accuracy, argmax_rows, balanced_class_weights, class_sample_weights, combine_weights, softmax,
    ClassMetrics, ClassWeight, ClassificationMetrics, Classifier, ProbabilisticClassifier,
    RegressionMetrics, Regressor,
};
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use random_forest::{MaxFeatures, RandomForest};
pub use xgboost::{XGBoostClassifier, XGBoostConfig, XGBoostRegressor};

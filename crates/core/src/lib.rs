//! Core types, configuration, and statistics for the order-flow validator.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod stats;

pub use config::{
    CostScenario, DecisionThresholds, InputConfig, LabelConfig, MultivariateConfig,
    SceneUniverse, StabilityConfig, UnivariateConfig, ValidatorConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{Result, ValidatorError};

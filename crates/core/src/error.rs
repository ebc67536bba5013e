//! Error types for the validation pipeline.
//!
//! Fatal errors (`Configuration`, `EmptyLabel`, `Schema`, `Numerical`) abort a
//! run before any artifact is written. `InsufficientSample` is the soft
//! failure used when a single screening slice is too sparse; callers log it
//! and move on.

use thiserror::Error;

/// Errors that can occur while validating indicator data.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Required configuration value or input column is absent or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Label series has no positive observations.
    #[error("empty label: {0}")]
    EmptyLabel(String),

    /// A screening slice lacks enough observations in one of the classes.
    #[error("insufficient sample for {context}: {positives} positive / {negatives} negative")]
    InsufficientSample {
        /// Slice description (scene/filter/meta-signal/metric).
        context: String,
        /// Rows with label 1.
        positives: usize,
        /// Rows with label 0.
        negatives: usize,
    },

    /// Input record does not match the indicator schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// A statistical model could not be computed.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Filesystem failure while reading inputs or writing artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ValidatorError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a configuration error for a missing input column.
    pub fn missing_column(column: &str) -> Self {
        Self::Configuration(format!("required column '{column}' is absent"))
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    /// Returns true for failures that must abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InsufficientSample { .. })
    }
}

impl From<serde_json::Error> for ValidatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for ValidatorError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result alias used across the validator crates.
pub type Result<T> = std::result::Result<T, ValidatorError>;

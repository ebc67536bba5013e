//! Data loading, schema normalisation and artifact storage for the
//! order-flow validator.
//!
//! This crate provides:
//! - The column-oriented observation table and its builder
//! - Indicator field catalog with legacy-alias normalisation
//! - CSV / JSON-lines loaders and a seeded synthetic generator
//! - CSV, Parquet, JSON and markdown artifact writers

pub mod artifacts;
pub mod csv_storage;
pub mod loader;
pub mod models;
pub mod parquet_storage;
pub mod report_writer;
pub mod rules;
pub mod schema;
pub mod synthetic;
pub mod workbook;

// Re-export commonly used types
pub use artifacts::{ArtifactPaths, ArtifactWriter, RunArtifacts};
pub use csv_storage::CsvStorage;
pub use loader::{load_observations, read_csv, read_json_lines};
pub use parquet_storage::ParquetStorage;
pub use report_writer::{CheckLine, ReportWriter, SummaryReport};
pub use rules::RuleStore;
pub use schema::{FieldGroup, FieldKind, FieldSpec, SchemaNormalizer};
pub use synthetic::{generate_dataset, SyntheticGenerator};
pub use workbook::{Sheet, Workbook};

// Re-export models
pub use models::{
    ComboMatrixRecord, ObservationRow, ObservationTable, ObservationTableBuilder, SceneLists,
};

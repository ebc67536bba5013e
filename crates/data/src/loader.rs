//! Observation loaders for CSV, JSON lines and the synthetic source.

use crate::models::observation::{ObservationTable, ObservationTableBuilder};
use crate::schema::SchemaNormalizer;
use crate::synthetic::generate_dataset;
use orderflow_validator_core::{InputConfig, Result, SceneUniverse, ValidatorError};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Loads the observation table described by `input`.
///
/// # Errors
/// Returns `ValidatorError::Configuration` if an input file is missing and
/// `ValidatorError::Schema` if a record does not normalise.
pub fn load_observations(input: &InputConfig, universe: &SceneUniverse) -> Result<ObservationTable> {
    let table = match input {
        InputConfig::Synthetic { rows, seed } => generate_dataset(*rows, *seed, universe)?,
        InputConfig::Csv { path } => read_csv(path)?,
        InputConfig::JsonLines { path } => read_json_lines(path)?,
    };
    info!(
        rows = table.len(),
        scenes = table.distinct_scenes().len(),
        "Loaded observation table"
    );
    Ok(table)
}

/// Reads a headered CSV of indicator fields (legacy names accepted).
///
/// # Errors
/// See [`load_observations`].
pub fn read_csv(path: &Path) -> Result<ObservationTable> {
    let file = open_input(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let normalizer = SchemaNormalizer;
    let mut builder = ObservationTableBuilder::default();

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let row = normalizer
            .normalize_text(headers.iter().zip(record.iter()))
            .map_err(|e| at_line(e, line + 2))?;
        builder.push(row).map_err(|e| at_line(e, line + 2))?;
    }
    Ok(builder.build())
}

/// Reads one JSON object per line; blank lines are skipped.
///
/// # Errors
/// See [`load_observations`].
pub fn read_json_lines(path: &Path) -> Result<ObservationTable> {
    let reader = BufReader::new(open_input(path)?);
    let normalizer = SchemaNormalizer;
    let mut builder = ObservationTableBuilder::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Value::Object(record) = serde_json::from_str::<Value>(&line)? else {
            return Err(ValidatorError::schema(format!(
                "line {}: expected a JSON object",
                idx + 1
            )));
        };
        let row = normalizer
            .normalize_json(&record)
            .map_err(|e| at_line(e, idx + 1))?;
        builder.push(row).map_err(|e| at_line(e, idx + 1))?;
    }
    Ok(builder.build())
}

fn open_input(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(ValidatorError::configuration(format!(
            "input file {} not found",
            path.display()
        )));
    }
    Ok(File::open(path)?)
}

fn csv_error(err: csv::Error) -> ValidatorError {
    ValidatorError::Serialization(err.to_string())
}

fn at_line(err: ValidatorError, line: usize) -> ValidatorError {
    match err {
        ValidatorError::Schema(msg) => ValidatorError::Schema(format!("line {line}: {msg}")),
        other => other,
    }
}

//! Column-oriented observation table.
//!
//! One row per time bucket or synthetic sample. `scene`, `state_tag` and
//! `session_id` are dedicated categorical columns every row must carry; all
//! other fields live in ordered numeric / categorical column maps. The table
//! is immutable once built.

use orderflow_validator_core::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single standardised observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub scene: String,
    pub state_tag: String,
    pub session_id: String,
    pub numeric: BTreeMap<String, f64>,
    pub categorical: BTreeMap<String, String>,
}

impl ObservationRow {
    pub fn new(
        scene: impl Into<String>,
        state_tag: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            scene: scene.into(),
            state_tag: state_tag.into(),
            session_id: session_id.into(),
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_categorical(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }
}

/// Immutable, column-oriented observation table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    len: usize,
    scene: Vec<String>,
    state_tag: Vec<String>,
    session_id: Vec<String>,
    numeric: BTreeMap<String, Vec<f64>>,
    categorical: BTreeMap<String, Vec<String>>,
}

pub const SCENE: &str = "scene";
pub const STATE_TAG: &str = "state_tag";
pub const SESSION_ID: &str = "session_id";

impl ObservationTable {
    /// Builds a table from rows, requiring every row to carry the same field
    /// set as the first one.
    ///
    /// # Errors
    /// Returns `ValidatorError::Schema` if a row adds or drops a field.
    pub fn from_rows(rows: Vec<ObservationRow>) -> Result<Self> {
        let mut builder = ObservationTableBuilder::default();
        for row in rows {
            builder.push(row)?;
        }
        Ok(builder.build())
    }

    /// Builds a table directly from columns.
    ///
    /// # Errors
    /// Returns `ValidatorError::Schema` if column lengths disagree or a
    /// dedicated column name is reused in a column map.
    pub fn from_columns(
        scene: Vec<String>,
        state_tag: Vec<String>,
        session_id: Vec<String>,
        numeric: BTreeMap<String, Vec<f64>>,
        categorical: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let len = scene.len();
        if state_tag.len() != len || session_id.len() != len {
            return Err(ValidatorError::schema(
                "scene, state_tag and session_id columns differ in length",
            ));
        }
        for (name, values) in &numeric {
            if values.len() != len {
                return Err(ValidatorError::schema(format!(
                    "numeric column '{name}' has {} rows, expected {len}",
                    values.len()
                )));
            }
        }
        for (name, values) in &categorical {
            if values.len() != len {
                return Err(ValidatorError::schema(format!(
                    "categorical column '{name}' has {} rows, expected {len}",
                    values.len()
                )));
            }
            if is_dedicated(name) {
                return Err(ValidatorError::schema(format!(
                    "'{name}' is a dedicated column"
                )));
            }
        }
        if let Some(name) = numeric.keys().find(|k| is_dedicated(k)) {
            return Err(ValidatorError::schema(format!(
                "'{name}' is a dedicated column"
            )));
        }
        Ok(Self {
            len,
            scene,
            state_tag,
            session_id,
            numeric,
            categorical,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn scenes(&self) -> &[String] {
        &self.scene
    }

    #[must_use]
    pub fn state_tags(&self) -> &[String] {
        &self.state_tag
    }

    #[must_use]
    pub fn session_ids(&self) -> &[String] {
        &self.session_id
    }

    /// Distinct scenes in ascending order.
    #[must_use]
    pub fn distinct_scenes(&self) -> Vec<String> {
        distinct(&self.scene)
    }

    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.numeric.get(name).map(Vec::as_slice)
    }

    /// Numeric column or a configuration error naming it.
    ///
    /// # Errors
    /// Returns `ValidatorError::Configuration` if the column is absent.
    pub fn require_numeric(&self, name: &str) -> Result<&[f64]> {
        self.numeric(name)
            .ok_or_else(|| ValidatorError::missing_column(name))
    }

    /// Categorical column, including the dedicated ones.
    #[must_use]
    pub fn categorical(&self, name: &str) -> Option<&[String]> {
        match name {
            SCENE => Some(&self.scene),
            STATE_TAG => Some(&self.state_tag),
            SESSION_ID => Some(&self.session_id),
            _ => self.categorical.get(name).map(Vec::as_slice),
        }
    }

    /// # Errors
    /// Returns `ValidatorError::Configuration` if the column is absent.
    pub fn require_categorical(&self, name: &str) -> Result<&[String]> {
        self.categorical(name)
            .ok_or_else(|| ValidatorError::missing_column(name))
    }

    /// Numeric column names in ascending order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric.keys().map(String::as_str)
    }

    /// Non-dedicated categorical column names in ascending order.
    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.categorical.keys().map(String::as_str)
    }
}

/// Incremental row-wise builder.
#[derive(Debug, Default)]
pub struct ObservationTableBuilder {
    table: ObservationTable,
}

impl ObservationTableBuilder {
    /// Appends a row.
    ///
    /// # Errors
    /// Returns `ValidatorError::Schema` if the row's field set differs from
    /// the rows already pushed.
    pub fn push(&mut self, row: ObservationRow) -> Result<()> {
        let t = &mut self.table;
        let row_index = t.len;
        if row_index == 0 {
            for key in row.numeric.keys().chain(row.categorical.keys()) {
                if is_dedicated(key) {
                    return Err(ValidatorError::schema(format!(
                        "'{key}' is a dedicated column"
                    )));
                }
            }
            for name in row.numeric.keys() {
                t.numeric.insert(name.clone(), Vec::new());
            }
            for name in row.categorical.keys() {
                t.categorical.insert(name.clone(), Vec::new());
            }
        } else {
            check_same_fields(row_index, t.numeric.keys(), row.numeric.keys())?;
            check_same_fields(row_index, t.categorical.keys(), row.categorical.keys())?;
        }

        for (name, value) in row.numeric {
            if let Some(column) = t.numeric.get_mut(&name) {
                column.push(value);
            }
        }
        for (name, value) in row.categorical {
            if let Some(column) = t.categorical.get_mut(&name) {
                column.push(value);
            }
        }
        t.scene.push(row.scene);
        t.state_tag.push(row.state_tag);
        t.session_id.push(row.session_id);
        t.len += 1;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.len == 0
    }

    #[must_use]
    pub fn build(self) -> ObservationTable {
        self.table
    }
}

fn check_same_fields<'a>(
    row_index: usize,
    expected: impl Iterator<Item = &'a String>,
    actual: impl Iterator<Item = &'a String>,
) -> Result<()> {
    let expected: BTreeSet<&String> = expected.collect();
    let actual: BTreeSet<&String> = actual.collect();
    if let Some(missing) = expected.difference(&actual).next() {
        return Err(ValidatorError::schema(format!(
            "row {row_index} is missing field '{missing}'"
        )));
    }
    if let Some(extra) = actual.difference(&expected).next() {
        return Err(ValidatorError::schema(format!(
            "row {row_index} introduces field '{extra}' absent from earlier rows"
        )));
    }
    Ok(())
}

fn is_dedicated(name: &str) -> bool {
    matches!(name, SCENE | STATE_TAG | SESSION_ID)
}

/// Distinct values in ascending order.
#[must_use]
pub fn distinct(values: &[String]) -> Vec<String> {
    values
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

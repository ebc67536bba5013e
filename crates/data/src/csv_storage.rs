use crate::models::observation::ObservationTable;
use crate::workbook::Sheet;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::path::Path;

pub struct CsvStorage;

impl CsvStorage {
    /// Writes an observation table as CSV with canonical field names.
    ///
    /// Format: scene,state_tag,session_id,<categorical...>,<numeric...>
    ///
    /// # Errors
    /// Returns error if file cannot be created or writing fails
    pub fn write_observations(path: &Path, table: &ObservationTable) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        let categorical: Vec<&str> = table.categorical_columns().collect();
        let numeric: Vec<&str> = table.numeric_columns().collect();

        let mut header = vec!["scene", "state_tag", "session_id"];
        header.extend(&categorical);
        header.extend(&numeric);
        writer.write_record(&header)?;

        for i in 0..table.len() {
            let mut record = vec![
                table.scenes()[i].clone(),
                table.state_tags()[i].clone(),
                table.session_ids()[i].clone(),
            ];
            for name in &categorical {
                let column = table.require_categorical(name)?;
                record.push(column[i].clone());
            }
            for name in &numeric {
                let column = table.require_numeric(name)?;
                record.push(column[i].to_string());
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes one report sheet: header row, then rows in order.
    ///
    /// # Errors
    /// Returns error if file cannot be created or writing fails
    pub fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create sheet file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(&sheet.columns)?;
        for row in &sheet.rows {
            writer.write_record(row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

use crate::models::combo_matrix::ComboMatrixRecord;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub struct ParquetStorage;

impl ParquetStorage {
    /// Arrow schema of the combination matrix.
    #[must_use]
    pub fn combo_matrix_schema() -> Schema {
        Schema::new(vec![
            Field::new("scene", DataType::Utf8, false),
            Field::new("meta_signal", DataType::Utf8, false),
            Field::new("N", DataType::UInt64, false),
            Field::new("hit_rate", DataType::Float64, true),
        ])
    }

    /// Writes the scene × meta-signal combination matrix to a Parquet file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or if writing to the Parquet file fails.
    pub fn write_combo_matrix(path: &Path, records: &[ComboMatrixRecord]) -> Result<()> {
        let schema = Arc::new(Self::combo_matrix_schema());

        let scene_array =
            StringArray::from(records.iter().map(|r| r.scene.as_str()).collect::<Vec<_>>());
        let meta_array = StringArray::from(
            records
                .iter()
                .map(|r| r.meta_signal.as_str())
                .collect::<Vec<_>>(),
        );
        let n_array = UInt64Array::from(records.iter().map(|r| r.n).collect::<Vec<_>>());
        let hit_array = Float64Array::from(records.iter().map(|r| r.hit_rate).collect::<Vec<_>>());

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(scene_array) as ArrayRef,
                Arc::new(meta_array) as ArrayRef,
                Arc::new(n_array) as ArrayRef,
                Arc::new(hit_array) as ArrayRef,
            ],
        )?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create Parquet file: {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }
}

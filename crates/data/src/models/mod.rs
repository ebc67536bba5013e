//! Data models for observations and run outputs.

pub mod combo_matrix;
pub mod observation;
pub mod scene_lists;

pub use combo_matrix::ComboMatrixRecord;
pub use observation::{ObservationRow, ObservationTable, ObservationTableBuilder};
pub use scene_lists::SceneLists;

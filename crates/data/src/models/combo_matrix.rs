use serde::{Deserialize, Serialize};

/// One (scene, meta-signal) cell of the combination matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboMatrixRecord {
    pub scene: String,
    pub meta_signal: String,
    /// Rows of the scene where the meta-signal fired.
    #[serde(rename = "N")]
    pub n: u64,
    /// Label mean over those rows; `None` when `n == 0`.
    pub hit_rate: Option<f64>,
}

//! Seeded synthetic indicator dataset.
//!
//! Produces a schema-compliant observation table covering every catalog
//! field, so the full pipeline can run without market data.

use crate::models::observation::ObservationTable;
use orderflow_validator_core::{Result, SceneUniverse};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::f64::consts::PI;

pub const STATE_TAGS: [&str; 3] = ["BALANCED", "TRENDING", "TRANSITIONAL"];
pub const SESSION_IDS: [&str; 3] = ["asia", "eu", "us"];
pub const DEFAULT_ROWS: usize = 1_200;
pub const DEFAULT_SEED: u64 = 7;

/// Deterministic generator for indicator tables.
pub struct SyntheticGenerator {
    rng: ChaCha8Rng,
    rows: usize,
    scenes: Vec<String>,
}

impl SyntheticGenerator {
    /// Creates a generator drawing scenes from `universe`. An empty universe
    /// falls back to `SCENE_001..SCENE_020`.
    #[must_use]
    pub fn new(rows: usize, seed: u64, universe: &SceneUniverse) -> Self {
        let scenes = if universe.is_empty() {
            SceneUniverse::numbered(20).scenes
        } else {
            universe.scenes.clone()
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            rows,
            scenes,
        }
    }

    /// Generates the table.
    ///
    /// # Errors
    /// Only fails if the column set is internally inconsistent.
    pub fn generate(mut self) -> Result<ObservationTable> {
        let n = self.rows;
        let mut num: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut cat: BTreeMap<String, Vec<String>> = BTreeMap::new();

        // Market structure
        let poc = self.normal_series(100.0, 2.5);
        let vah: Vec<f64> = poc
            .iter()
            .map(|p| p + (self.standard_normal() * 1.5).abs())
            .collect();
        let val: Vec<f64> = poc
            .iter()
            .map(|p| p - (self.standard_normal() * 1.5).abs())
            .collect();
        for field in ["near_val", "near_vah", "near_poc"] {
            let flags = self.binary_series();
            num.insert(field.to_string(), flags);
        }
        cat.insert(
            "value_migration".to_string(),
            self.choice_series(&["UP", "DOWN", "FLAT"]),
        );
        num.insert(
            "value_migration_speed".to_string(),
            self.normal_series(0.0, 0.05),
        );
        num.insert(
            "value_migration_consistency".to_string(),
            self.uniform_series(0.0, 1.0),
        );

        // Money flow
        num.insert("bar_delta".to_string(), self.normal_series(0.0, 50.0));
        let mut running = 0.0;
        let cvd: Vec<f64> = (0..n)
            .map(|_| {
                running += self.standard_normal();
                running
            })
            .collect();
        num.insert("cvd".to_string(), cvd);
        let fast = self.normal_series(0.0, 15.0);
        let slow = self.normal_series(0.0, 10.0);
        num.insert(
            "cvd_macd".to_string(),
            fast.iter().zip(&slow).map(|(f, s)| f - s).collect(),
        );
        num.insert("cvd_ema_fast".to_string(), fast);
        num.insert("cvd_ema_slow".to_string(), slow);
        num.insert("cvd_rsi".to_string(), self.uniform_series(0.0, 1.0));
        num.insert("cvd_z".to_string(), self.normal_series(0.0, 1.0));
        num.insert("imbalance".to_string(), self.uniform_series(-1.0, 1.0));

        // Key levels
        let support: Vec<f64> = val
            .iter()
            .map(|v| v - self.standard_normal().abs())
            .collect();
        let resistance: Vec<f64> = vah
            .iter()
            .map(|v| v + self.standard_normal().abs())
            .collect();
        num.insert("nearest_support".to_string(), support);
        num.insert("nearest_resistance".to_string(), resistance);
        num.insert("nearest_lvn".to_string(), self.abs_normal_series(0.0, 0.8));
        num.insert("nearest_hvn".to_string(), self.abs_normal_series(0.0, 0.8));
        num.insert("in_lvn".to_string(), self.binary_series());
        num.insert("absorption_detected".to_string(), self.binary_series());
        num.insert(
            "absorption_strength".to_string(),
            self.uniform_series(0.0, 1.0),
        );
        cat.insert(
            "absorption_side".to_string(),
            self.choice_series(&["bid", "ask"]),
        );

        // Volume, volatility and positioning
        num.insert(
            "volume".to_string(),
            self.abs_normal_series(5_000.0, 1_000.0),
        );
        num.insert("vol_pctl".to_string(), self.uniform_series(0.0, 1.0));
        num.insert("atr".to_string(), self.abs_normal_series(1.0, 0.2));
        num.insert("atr_norm_range".to_string(), self.abs_normal_series(1.2, 0.3));
        num.insert("keltner_pos".to_string(), self.uniform_series(-1.0, 1.0));
        num.insert("vwap_session".to_string(), self.normal_series(100.0, 2.0));
        num.insert("vwap_dev_bps".to_string(), self.normal_series(0.0, 5.0));
        num.insert("ls_norm".to_string(), self.uniform_series(0.0, 1.0));
        let session_id = self.choice_series(&SESSION_IDS);
        let state_tag = self.choice_series(&STATE_TAGS);
        num.insert("state_confidence".to_string(), self.uniform_series(0.0, 1.0));

        num.insert("spread_bps".to_string(), self.uniform_series(0.5, 3.0));
        num.insert("return".to_string(), self.normal_series(0.02, 0.15));

        let scenes = self.scenes.clone();
        let scene_refs: Vec<&str> = scenes.iter().map(String::as_str).collect();
        let scene = self.choice_series(&scene_refs);

        num.insert("poc".to_string(), poc);
        num.insert("vah".to_string(), vah);
        num.insert("val".to_string(), val);

        tracing::debug!(rows = n, scenes = scenes.len(), "Generated synthetic indicator table");
        ObservationTable::from_columns(scene, state_tag, session_id, num, cat)
    }

    /// Box-Muller standard normal draw.
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-10);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal_series(&mut self, loc: f64, scale: f64) -> Vec<f64> {
        (0..self.rows)
            .map(|_| loc + scale * self.standard_normal())
            .collect()
    }

    fn abs_normal_series(&mut self, loc: f64, scale: f64) -> Vec<f64> {
        self.normal_series(loc, scale)
            .into_iter()
            .map(f64::abs)
            .collect()
    }

    fn uniform_series(&mut self, low: f64, high: f64) -> Vec<f64> {
        (0..self.rows).map(|_| self.rng.gen_range(low..high)).collect()
    }

    fn binary_series(&mut self) -> Vec<f64> {
        (0..self.rows)
            .map(|_| f64::from(self.rng.gen_range(0_u8..2)))
            .collect()
    }

    fn choice_series(&mut self, options: &[&str]) -> Vec<String> {
        (0..self.rows)
            .map(|_| options[self.rng.gen_range(0..options.len())].to_string())
            .collect()
    }
}

/// Generates the default synthetic table for `universe`.
///
/// # Errors
/// See [`SyntheticGenerator::generate`].
pub fn generate_dataset(rows: usize, seed: u64, universe: &SceneUniverse) -> Result<ObservationTable> {
    SyntheticGenerator::new(rows, seed, universe).generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, STANDARD_FIELDS};

    #[test]
    fn default_dataset_has_every_catalog_field() {
        let table = generate_dataset(DEFAULT_ROWS, DEFAULT_SEED, &SceneUniverse::default()).unwrap();
        assert_eq!(table.len(), 1_200);
        for spec in STANDARD_FIELDS {
            if spec.name == "timestamp" {
                continue;
            }
            match spec.kind {
                FieldKind::Numeric => assert!(table.numeric(spec.name).is_some(), "{}", spec.name),
                FieldKind::Categorical => {
                    assert!(table.categorical(spec.name).is_some(), "{}", spec.name);
                }
            }
        }
    }

    #[test]
    fn same_seed_same_table() {
        let universe = SceneUniverse::numbered(5);
        let a = generate_dataset(200, 42, &universe).unwrap();
        let b = generate_dataset(200, 42, &universe).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_differs() {
        let universe = SceneUniverse::numbered(5);
        let a = generate_dataset(200, 1, &universe).unwrap();
        let b = generate_dataset(200, 2, &universe).unwrap();
        assert_ne!(a.numeric("return"), b.numeric("return"));
    }

    #[test]
    fn scenes_come_from_universe() {
        let universe = SceneUniverse::new(vec!["ALPHA".into(), "BETA".into()]);
        let table = generate_dataset(300, 7, &universe).unwrap();
        assert_eq!(table.distinct_scenes(), vec!["ALPHA", "BETA"]);
    }

    #[test]
    fn bounded_columns_stay_in_range() {
        let table = generate_dataset(500, 7, &SceneUniverse::default()).unwrap();
        assert!(table
            .numeric("vol_pctl")
            .unwrap()
            .iter()
            .all(|v| (0.0..1.0).contains(v)));
        assert!(table
            .numeric("spread_bps")
            .unwrap()
            .iter()
            .all(|v| (0.5..3.0).contains(v)));
        assert!(table.numeric("in_lvn").unwrap().iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn return_moments_are_plausible() {
        let table = generate_dataset(5_000, 7, &SceneUniverse::default()).unwrap();
        let returns = table.numeric("return").unwrap();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        assert!((mean - 0.02).abs() < 0.01, "mean {mean}");
    }
}

//! Indicator field catalog and legacy-alias normalisation.
//!
//! Raw payloads arrive either flat (`{"large_z": 1.2, "scene": "..."}`) or
//! grouped by indicator family (`{"MFI": {"large_z": 1.2}, ...}`). Both are
//! resolved against the canonical catalog into a typed [`ObservationRow`].
//! Unknown fields are rejected with [`ValidatorError::Schema`].

use crate::models::observation::{ObservationRow, SCENE, SESSION_ID, STATE_TAG};
use orderflow_validator_core::{Result, ValidatorError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Indicator family a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    /// Market structure (value area, migration).
    Msi,
    /// Money flow (delta, CVD family).
    Mfi,
    /// Key levels and absorption.
    Kli,
    /// Volume, volatility, session and regime state.
    State,
    /// Fields every observation carries outside the indicator families.
    Core,
}

impl FieldGroup {
    pub const INDICATOR_GROUPS: [Self; 4] = [Self::Msi, Self::Mfi, Self::Kli, Self::State];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Msi => "MSI",
            Self::Mfi => "MFI",
            Self::Kli => "KLI",
            Self::State => "STATE",
            Self::Core => "CORE",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "MSI" => Some(Self::Msi),
            "MFI" => Some(Self::Mfi),
            "KLI" => Some(Self::Kli),
            "STATE" => Some(Self::State),
            _ => None,
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub group: FieldGroup,
    pub kind: FieldKind,
}

const fn num(name: &'static str, group: FieldGroup) -> FieldSpec {
    FieldSpec {
        name,
        group,
        kind: FieldKind::Numeric,
    }
}

const fn cat(name: &'static str, group: FieldGroup) -> FieldSpec {
    FieldSpec {
        name,
        group,
        kind: FieldKind::Categorical,
    }
}

use FieldGroup::{Core, Kli, Mfi, Msi, State};

/// Canonical field catalog.
pub const STANDARD_FIELDS: &[FieldSpec] = &[
    num("poc", Msi),
    num("vah", Msi),
    num("val", Msi),
    num("near_val", Msi),
    num("near_vah", Msi),
    num("near_poc", Msi),
    cat("value_migration", Msi),
    num("value_migration_speed", Msi),
    num("value_migration_consistency", Msi),
    num("bar_delta", Mfi),
    num("cvd", Mfi),
    num("cvd_ema_fast", Mfi),
    num("cvd_ema_slow", Mfi),
    num("cvd_macd", Mfi),
    num("cvd_rsi", Mfi),
    num("cvd_z", Mfi),
    num("imbalance", Mfi),
    num("nearest_support", Kli),
    num("nearest_resistance", Kli),
    num("nearest_lvn", Kli),
    num("nearest_hvn", Kli),
    num("in_lvn", Kli),
    num("absorption_detected", Kli),
    num("absorption_strength", Kli),
    cat("absorption_side", Kli),
    num("volume", State),
    num("vol_pctl", State),
    num("atr", State),
    num("atr_norm_range", State),
    num("keltner_pos", State),
    num("vwap_session", State),
    num("vwap_dev_bps", State),
    num("ls_norm", State),
    cat("session_id", State),
    cat("state_tag", State),
    num("state_confidence", State),
    cat("scene", Core),
    num("return", Core),
    num("spread_bps", Core),
    cat("timestamp", Core),
];

/// Historical field names and the canonical field each maps to.
pub const LEGACY_ALIASES: &[(FieldGroup, &str, &str)] = &[
    (Msi, "point_of_control", "poc"),
    (Msi, "value_area_high", "vah"),
    (Msi, "value_area_low", "val"),
    (Msi, "near_value_area_low", "near_val"),
    (Msi, "near_value_area_high", "near_vah"),
    (Msi, "near_point_of_control", "near_poc"),
    (Msi, "value_shift", "value_migration"),
    (Msi, "value_shift_speed", "value_migration_speed"),
    (Msi, "value_shift_consistency", "value_migration_consistency"),
    (Mfi, "delta", "bar_delta"),
    (Mfi, "cumulative_volume_delta", "cvd"),
    (Mfi, "cvd_fast", "cvd_ema_fast"),
    (Mfi, "cvd_slow", "cvd_ema_slow"),
    (Mfi, "cvd_macd_hist", "cvd_macd"),
    (Mfi, "cvd_relative_strength", "cvd_rsi"),
    (Mfi, "large_z", "cvd_z"),
    (Mfi, "imbalance_pct", "imbalance"),
    (Kli, "support", "nearest_support"),
    (Kli, "resistance", "nearest_resistance"),
    (Kli, "lvn_distance", "nearest_lvn"),
    (Kli, "hvn_distance", "nearest_hvn"),
    (Kli, "is_in_lvn", "in_lvn"),
    (Kli, "absorption", "absorption_detected"),
    (Kli, "absorption_intensity", "absorption_strength"),
    (Kli, "absorption_direction", "absorption_side"),
    (State, "vol", "volume"),
    (State, "volume_percentile", "vol_pctl"),
    (State, "average_true_range", "atr"),
    (State, "atr_range_norm", "atr_norm_range"),
    (State, "keltner_position", "keltner_pos"),
    (State, "session_vwap", "vwap_session"),
    (State, "vwap_deviation_bps", "vwap_dev_bps"),
    (State, "long_short_norm", "ls_norm"),
    (State, "session", "session_id"),
    (State, "tag", "state_tag"),
    (State, "confidence", "state_confidence"),
];

/// Looks up a canonical field.
#[must_use]
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    STANDARD_FIELDS.iter().find(|spec| spec.name == name)
}

/// Resolves a raw key (canonical or legacy) to its catalog entry.
#[must_use]
pub fn resolve(raw: &str) -> Option<&'static FieldSpec> {
    field_spec(raw).or_else(|| {
        LEGACY_ALIASES
            .iter()
            .find(|(_, alias, _)| *alias == raw)
            .and_then(|(_, _, canonical)| field_spec(canonical))
    })
}

/// Resolves a raw key within one indicator family.
#[must_use]
pub fn resolve_in_group(group: FieldGroup, raw: &str) -> Option<&'static FieldSpec> {
    resolve(raw).filter(|spec| spec.group == group)
}

/// Canonical fields of one family, in catalog order.
pub fn fields_in(group: FieldGroup) -> impl Iterator<Item = &'static FieldSpec> {
    STANDARD_FIELDS.iter().filter(move |spec| spec.group == group)
}

/// Converts raw indicator payloads into typed observation rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaNormalizer;

impl SchemaNormalizer {
    /// Normalises one JSON object, flat or grouped by family.
    ///
    /// # Errors
    /// Returns `ValidatorError::Schema` for unknown or duplicated fields,
    /// unparsable values, or a missing `scene` / `state_tag` / `session_id`.
    pub fn normalize_json(&self, record: &Map<String, Value>) -> Result<ObservationRow> {
        let mut resolved: BTreeMap<&'static str, Value> = BTreeMap::new();
        for (key, value) in record {
            if let Some(group) = FieldGroup::from_key(key) {
                let Value::Object(inner) = value else {
                    return Err(ValidatorError::schema(format!(
                        "group '{key}' must be an object"
                    )));
                };
                for (inner_key, inner_value) in inner {
                    let spec = resolve_in_group(group, inner_key).ok_or_else(|| {
                        ValidatorError::schema(format!(
                            "unknown field '{inner_key}' for category {group}"
                        ))
                    })?;
                    insert_unique(&mut resolved, spec, inner_key, inner_value.clone())?;
                }
            } else {
                let spec = resolve(key).ok_or_else(|| {
                    ValidatorError::schema(format!("unknown field '{key}'"))
                })?;
                insert_unique(&mut resolved, spec, key, value.clone())?;
            }
        }
        build_row(resolved)
    }

    /// Normalises a flat record of textual cells (CSV rows).
    ///
    /// # Errors
    /// Same conditions as [`Self::normalize_json`].
    pub fn normalize_text<'a>(
        &self,
        cells: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<ObservationRow> {
        let mut resolved: BTreeMap<&'static str, Value> = BTreeMap::new();
        for (key, cell) in cells {
            let spec = resolve(key)
                .ok_or_else(|| ValidatorError::schema(format!("unknown field '{key}'")))?;
            insert_unique(&mut resolved, spec, key, Value::String(cell.to_string()))?;
        }
        build_row(resolved)
    }
}

fn insert_unique(
    resolved: &mut BTreeMap<&'static str, Value>,
    spec: &'static FieldSpec,
    raw_key: &str,
    value: Value,
) -> Result<()> {
    if resolved.insert(spec.name, value).is_some() {
        return Err(ValidatorError::schema(format!(
            "field '{}' supplied more than once (via '{raw_key}')",
            spec.name
        )));
    }
    Ok(())
}

fn build_row(mut resolved: BTreeMap<&'static str, Value>) -> Result<ObservationRow> {
    let scene = take_required_text(&mut resolved, SCENE)?;
    let state_tag = take_required_text(&mut resolved, STATE_TAG)?;
    let session_id = take_required_text(&mut resolved, SESSION_ID)?;
    let mut row = ObservationRow::new(scene, state_tag, session_id);

    for (name, value) in resolved {
        let spec = field_spec(name)
            .ok_or_else(|| ValidatorError::schema(format!("unknown field '{name}'")))?;
        match spec.kind {
            FieldKind::Numeric => {
                row.numeric.insert(name.to_string(), numeric_value(name, &value)?);
            }
            FieldKind::Categorical => {
                row.categorical
                    .insert(name.to_string(), text_value(name, &value)?);
            }
        }
    }
    Ok(row)
}

fn take_required_text(
    resolved: &mut BTreeMap<&'static str, Value>,
    name: &'static str,
) -> Result<String> {
    let value = resolved
        .remove(name)
        .ok_or_else(|| ValidatorError::schema(format!("record is missing '{name}'")))?;
    text_value(name, &value)
}

fn numeric_value(name: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => match s.trim() {
            "true" | "True" | "TRUE" => Some(1.0),
            "false" | "False" | "FALSE" => Some(0.0),
            other => other.parse::<f64>().ok(),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.ok_or_else(|| {
        ValidatorError::schema(format!("field '{name}' is not numeric: {value}"))
    })
}

fn text_value(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ValidatorError::schema(format!(
            "field '{name}' must be a non-empty label, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    // ============================================
    // Catalog
    // ============================================

    #[test]
    fn catalog_has_no_duplicates() {
        let mut names: Vec<_> = STANDARD_FIELDS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), STANDARD_FIELDS.len());
    }

    #[test]
    fn every_alias_targets_a_field_of_its_group() {
        for (group, alias, canonical) in LEGACY_ALIASES {
            let spec = field_spec(canonical).unwrap();
            assert_eq!(spec.group, *group, "alias {alias}");
            assert!(field_spec(alias).is_none(), "alias {alias} shadows a field");
        }
    }

    #[test]
    fn group_sizes_match_catalog() {
        assert_eq!(fields_in(FieldGroup::Msi).count(), 9);
        assert_eq!(fields_in(FieldGroup::Mfi).count(), 8);
        assert_eq!(fields_in(FieldGroup::Kli).count(), 8);
        assert_eq!(fields_in(FieldGroup::State).count(), 11);
    }

    #[test]
    fn resolve_maps_aliases() {
        assert_eq!(resolve("large_z").unwrap().name, "cvd_z");
        assert_eq!(resolve("volume_percentile").unwrap().name, "vol_pctl");
        assert_eq!(resolve("tag").unwrap().name, "state_tag");
        assert_eq!(resolve("cvd_z").unwrap().name, "cvd_z");
        assert!(resolve("mystery").is_none());
    }

    // ============================================
    // Normalisation
    // ============================================

    #[test]
    fn flat_record_with_aliases_normalises() {
        let record = object(json!({
            "scene": "SCENE_001",
            "tag": "TRENDING",
            "session": "eu",
            "large_z": 1.5,
            "return": "0.02",
            "is_in_lvn": true,
            "absorption_direction": "bid"
        }));
        let row = SchemaNormalizer.normalize_json(&record).unwrap();

        assert_eq!(row.scene, "SCENE_001");
        assert_eq!(row.state_tag, "TRENDING");
        assert_eq!(row.session_id, "eu");
        assert!((row.numeric["cvd_z"] - 1.5).abs() < f64::EPSILON);
        assert!((row.numeric["return"] - 0.02).abs() < f64::EPSILON);
        assert!((row.numeric["in_lvn"] - 1.0).abs() < f64::EPSILON);
        assert_eq!(row.categorical["absorption_side"], "bid");
    }

    #[test]
    fn grouped_payload_normalises() {
        let record = object(json!({
            "scene": "SCENE_002",
            "MFI": {"large_z": -0.4, "imbalance_pct": 0.1},
            "STATE": {"session": "us", "tag": "BALANCED", "volume_percentile": 0.9}
        }));
        let row = SchemaNormalizer.normalize_json(&record).unwrap();
        assert!((row.numeric["cvd_z"] + 0.4).abs() < f64::EPSILON);
        assert!((row.numeric["vol_pctl"] - 0.9).abs() < f64::EPSILON);
        assert_eq!(row.session_id, "us");
    }

    #[test]
    fn unknown_field_fails_fast() {
        let record = object(json!({
            "scene": "S", "state_tag": "BALANCED", "session_id": "eu", "mystery": 1
        }));
        let err = SchemaNormalizer.normalize_json(&record).unwrap_err();
        assert!(matches!(err, ValidatorError::Schema(_)));
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn field_in_wrong_group_is_rejected() {
        let record = object(json!({
            "scene": "S", "state_tag": "BALANCED", "session_id": "eu",
            "MSI": {"cvd_z": 1.0}
        }));
        assert!(SchemaNormalizer.normalize_json(&record).is_err());
    }

    #[test]
    fn alias_and_canonical_together_is_duplicate() {
        let record = object(json!({
            "scene": "S", "state_tag": "BALANCED", "session_id": "eu",
            "cvd_z": 1.0, "large_z": 2.0
        }));
        let err = SchemaNormalizer.normalize_json(&record).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn missing_scene_is_schema_error() {
        let record = object(json!({"state_tag": "BALANCED", "session_id": "eu"}));
        assert!(matches!(
            SchemaNormalizer.normalize_json(&record),
            Err(ValidatorError::Schema(_))
        ));
    }

    #[test]
    fn text_cells_parse_numbers() {
        let row = SchemaNormalizer
            .normalize_text([
                ("scene", "SCENE_003"),
                ("state_tag", "TRANSITIONAL"),
                ("session_id", "asia"),
                ("cvd_z", "-1.25"),
                ("near_poc", "1"),
            ])
            .unwrap();
        assert!((row.numeric["cvd_z"] + 1.25).abs() < f64::EPSILON);
        assert!((row.numeric["near_poc"] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_numeric_text_is_rejected() {
        let result = SchemaNormalizer.normalize_text([
            ("scene", "S"),
            ("state_tag", "BALANCED"),
            ("session_id", "eu"),
            ("cvd_z", "high"),
        ]);
        assert!(matches!(result, Err(ValidatorError::Schema(_))));
    }
}

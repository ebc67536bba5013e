use crate::config::{CostScenario, SceneUniverse, ValidatorConfig};
use crate::error::{Result, ValidatorError};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub struct ConfigLoader;

#[derive(Debug, Deserialize)]
struct ScenesFile {
    #[serde(default)]
    scenes: Vec<String>,
}

impl ConfigLoader {
    /// Loads validator configuration by merging defaults, TOML, environment
    /// variables and JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or a value is
    /// out of range.
    pub fn load() -> Result<ValidatorConfig> {
        Self::load_from("config/validator_v2.toml")
    }

    /// Loads validator configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or a value is
    /// out of range.
    pub fn load_from(path: impl AsRef<Path>) -> Result<ValidatorConfig> {
        let config: ValidatorConfig = Self::base(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads validator configuration with a specific profile overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or a value is
    /// out of range.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<ValidatorConfig> {
        let path = path.as_ref();
        let overlay = path.with_file_name(format!(
            "{}.{profile}.toml",
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("validator_v2")
        ));
        let config: ValidatorConfig = Self::base(path).merge(Toml::file(overlay)).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn base(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ValidatorConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("VALIDATOR_").split("__"))
            .join(Json::file(path.with_extension("json")))
    }

    /// Loads the scene universe (`scenes = [...]`).
    ///
    /// A missing file falls back to `SCENE_001..SCENE_020`; an existing file
    /// with an empty list is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or lists no scenes.
    pub fn load_scene_universe(path: impl AsRef<Path>) -> Result<SceneUniverse> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "Scene whitelist {} not found, using numbered fallback universe",
                path.display()
            );
            return Ok(SceneUniverse::numbered(20));
        }
        let file: ScenesFile = Self::by_extension(path).extract()?;
        if file.scenes.is_empty() {
            return Err(ValidatorError::configuration(format!(
                "scene whitelist {} lists no scenes",
                path.display()
            )));
        }
        Ok(SceneUniverse::new(file.scenes))
    }

    /// Loads named cost scenarios (`[scenario]` tables of bps values).
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    pub fn load_cost_scenarios(path: impl AsRef<Path>) -> Result<BTreeMap<String, CostScenario>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ValidatorError::configuration(format!(
                "cost scenario file {} not found",
                path.display()
            )));
        }
        Ok(Self::by_extension(path).extract()?)
    }

    fn by_extension(path: &Path) -> Figment {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Figment::from(Json::file(path)),
            _ => Figment::from(Toml::file(path)),
        }
    }
}

use super::{
    population::PopulationConfig,
    traits::{ConfigManifest, ConfigSection},
    training::TrainingConfig,
};
use crate::error::PbtError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment variables overriding file settings, e.g.
/// `PBT_POPULATION__SEED=7`.
pub const ENV_PREFIX: &str = "PBT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub population: PopulationConfig,
    pub training: TrainingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), PbtError> {
        self.population.validate()?;
        self.training.validate()?;
        Ok(())
    }

    /// Field descriptions of every section, in file order.
    pub fn manifest(&self) -> Vec<ConfigManifest> {
        vec![self.population.to_manifest(), self.training.to_manifest()]
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads a TOML or JSON file, letting `PBT_`-prefixed environment
    /// variables override individual keys.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PbtError> {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())?;

        config.validate()?;

        *self.write()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PbtError> {
        let config = self.get()?;
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| PbtError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)?;

        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig, PbtError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| PbtError::Configuration("Config lock poisoned".to_string()))
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), PbtError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.write()?;
        let mut updated = config.clone();
        f(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, AppConfig>, PbtError> {
        self.config
            .write()
            .map_err(|_| PbtError::Configuration("Config lock poisoned".to_string()))
    }
}

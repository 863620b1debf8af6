use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::PbtError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub population_size: usize,
    pub steps_per_burst: u64,
    pub exploit_fraction: f64,
    pub exploit_policy: ExploitPolicy,
    pub hall_of_fame_size: usize,
    pub seed: Option<u64>,
}

/// How the cluster runs exploit/explore after each round of training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploitPolicy {
    /// One combined round: every bottom member copies at once.
    Population,
    /// Each member, in id order, ranks the population and copies if needed.
    PerMember,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            steps_per_burst: 500,
            exploit_fraction: 0.2,
            exploit_policy: ExploitPolicy::Population,
            hall_of_fame_size: 5,
            seed: None,
        }
    }
}

impl ConfigSection for PopulationConfig {
    fn section_name() -> &'static str {
        "population"
    }

    fn validate(&self) -> Result<(), PbtError> {
        if self.population_size == 0 {
            return Err(PbtError::Configuration(
                "Population size must be at least 1".to_string()
            ));
        }
        if self.steps_per_burst == 0 {
            return Err(PbtError::Configuration(
                "Steps per burst must be at least 1".to_string()
            ));
        }
        if !(self.exploit_fraction > 0.0 && self.exploit_fraction <= 0.5) {
            return Err(PbtError::Configuration(
                "Exploit fraction must be greater than 0 and at most 0.5".to_string()
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Population".to_string(),
            fields: vec![
                FieldManifest {
                    name: "population_size".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(10),
                    min: Some(1.0),
                    max: Some(10000.0),
                    description: "Number of members trained side by side".to_string(),
                },
                FieldManifest {
                    name: "steps_per_burst".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(500),
                    min: Some(1.0),
                    max: None,
                    description: "Training steps between exploit/explore rounds".to_string(),
                },
                FieldManifest {
                    name: "exploit_fraction".to_string(),
                    field_type: "float".to_string(),
                    default: serde_json::json!(0.2),
                    min: Some(0.0),
                    max: Some(0.5),
                    description: "Share of worst members that copy the best ones".to_string(),
                },
                FieldManifest {
                    name: "exploit_policy".to_string(),
                    field_type: "enum".to_string(),
                    default: serde_json::json!("population"),
                    min: None,
                    max: None,
                    description: "population or per_member".to_string(),
                },
                FieldManifest {
                    name: "hall_of_fame_size".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(5),
                    min: Some(0.0),
                    max: None,
                    description: "Best snapshots kept over the whole run".to_string(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PopulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = PopulationConfig::default();
        config.exploit_fraction = 0.75;
        assert!(config.validate().is_err());

        let mut config = PopulationConfig::default();
        config.population_size = 0;
        assert!(config.validate().is_err());

        let mut config = PopulationConfig::default();
        config.steps_per_burst = 0;
        assert!(config.validate().is_err());
    }
}

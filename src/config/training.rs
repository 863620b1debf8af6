use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::PbtError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_steps: u64,
    pub parallel: bool,
    pub dimensions: usize,
    pub vary_optimizer: bool,
    pub gradient_noise: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            parallel: true,
            dimensions: 8,
            vary_optimizer: true,
            gradient_noise: 0.05,
        }
    }
}

impl ConfigSection for TrainingConfig {
    fn section_name() -> &'static str {
        "training"
    }

    fn validate(&self) -> Result<(), PbtError> {
        if self.dimensions == 0 {
            return Err(PbtError::Configuration(
                "Model dimensions must be positive".to_string()
            ));
        }
        if !self.gradient_noise.is_finite() || self.gradient_noise < 0.0 {
            return Err(PbtError::Configuration(
                "Gradient noise must be a non-negative number".to_string()
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Training".to_string(),
            fields: vec![
                FieldManifest {
                    name: "max_steps".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(10_000),
                    min: Some(0.0),
                    max: None,
                    description: "Members stop training once they reach this step".to_string(),
                },
                FieldManifest {
                    name: "parallel".to_string(),
                    field_type: "bool".to_string(),
                    default: serde_json::json!(true),
                    min: None,
                    max: None,
                    description: "Train members on the rayon thread pool".to_string(),
                },
                FieldManifest {
                    name: "dimensions".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(8),
                    min: Some(1.0),
                    max: None,
                    description: "Weights per bowl model".to_string(),
                },
                FieldManifest {
                    name: "vary_optimizer".to_string(),
                    field_type: "bool".to_string(),
                    default: serde_json::json!(true),
                    min: None,
                    max: None,
                    description: "Let exploration switch optimizers; otherwise always Adam".to_string(),
                },
                FieldManifest {
                    name: "gradient_noise".to_string(),
                    field_type: "float".to_string(),
                    default: serde_json::json!(0.05),
                    min: Some(0.0),
                    max: None,
                    description: "Amplitude of the noise added to each gradient".to_string(),
                },
            ],
        }
    }
}

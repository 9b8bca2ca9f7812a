use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// How categorical labels are checked against what the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
    #[default]
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Model artifact, a JSON document (default: `model.json`)
    pub model_path: PathBuf,

    /// Upper bound of the derived `bmi_capped` feature (default: 50.0)
    pub bmi_cap: f64,

    pub category_policy: CategoryPolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
            bmi_cap: 50.0,
            category_policy: CategoryPolicy::Strict,
        }
    }
}

impl RiskConfig {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: RiskConfig = serde_json::from_str(&text)?;
        debug!("Loaded configuration from {:?}: {:?}", path.as_ref(), config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bmi_cap.is_finite() || self.bmi_cap <= 0.0 {
            return Err(RiskError::Config(format!(
                "bmi_cap must be a positive number, got {}",
                self.bmi_cap
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: RiskConfig = serde_json::from_str(r#"{"category_policy": "permissive"}"#).unwrap();
        assert_eq!(config.category_policy, CategoryPolicy::Permissive);
        assert_eq!(config.bmi_cap, 50.0);
        assert_eq!(config.model_path, PathBuf::from("model.json"));
    }

    #[test]
    fn non_positive_cap_is_rejected() {
        let config = RiskConfig {
            bmi_cap: 0.0,
            ..RiskConfig::default()
        };
        assert!(matches!(config.validate(), Err(RiskError::Config(_))));
    }
}

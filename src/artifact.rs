use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{Result, RiskError};
use crate::model::{Classifier, ModelSpec};

#[derive(Debug)]
pub enum ArtifactShape {
    DirectModel(Arc<dyn Classifier>),
    /// The model was found under `key`; other entries are kept by name only.
    KeyedContainer {
        key: String,
        model: Arc<dyn Classifier>,
        auxiliary: Vec<String>,
    },
    Unrecognized,
}

/// Builds a classifier from `value` when it is a usable model entry.
fn build_entry(value: &Value) -> Option<Arc<dyn Classifier>> {
    if value.get("estimator").is_none() {
        return None;
    }
    let built = serde_json::from_value::<ModelSpec>(value.clone())
        .map_err(RiskError::from)
        .and_then(ModelSpec::build);
    match built {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("Skipping artifact entry that looks like a model: {}", e);
            None
        }
    }
}

impl ArtifactShape {
    pub fn classify(document: &Value) -> Self {
        if let Some(model) = build_entry(document) {
            return ArtifactShape::DirectModel(model);
        }
        let entries = match document.as_object() {
            Some(entries) => entries,
            None => return ArtifactShape::Unrecognized,
        };
        // document order, first model wins
        let found = entries
            .iter()
            .find_map(|(key, value)| build_entry(value).map(|model| (key.clone(), model)));
        match found {
            Some((key, model)) => {
                let auxiliary = entries.keys().filter(|k| **k != key).cloned().collect();
                ArtifactShape::KeyedContainer {
                    key,
                    model,
                    auxiliary,
                }
            }
            None => ArtifactShape::Unrecognized,
        }
    }

    pub fn into_model(self) -> Result<Arc<dyn Classifier>> {
        match self {
            ArtifactShape::DirectModel(model) => Ok(model),
            ArtifactShape::KeyedContainer { model, .. } => Ok(model),
            ArtifactShape::Unrecognized => Err(RiskError::ModelUnreadable(
                "Model not found in artifact".to_string(),
            )),
        }
    }
}

impl fmt::Display for ArtifactShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactShape::DirectModel(_) => write!(f, "direct model"),
            ArtifactShape::KeyedContainer { key, auxiliary, .. } => {
                write!(f, "container, model under {:?}", key)?;
                if !auxiliary.is_empty() {
                    write!(f, " (unused entries: {})", auxiliary.join(", "))?;
                }
                Ok(())
            }
            ArtifactShape::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

pub async fn load<P: AsRef<Path>>(path: P) -> Result<ArtifactShape> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        RiskError::ModelUnreadable(format!("cannot read {}: {}", path.display(), e))
    })?;
    let document: Value = serde_json::from_str(&text).map_err(|e| {
        RiskError::ModelUnreadable(format!("{} is not valid JSON: {}", path.display(), e))
    })?;
    let shape = ArtifactShape::classify(&document);
    info!("Artifact {} resolved as {}", path.display(), shape);
    if let ArtifactShape::KeyedContainer { auxiliary, .. } = &shape {
        debug!("Ignoring auxiliary artifact entries {:?}", auxiliary);
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_entry(names: &[&str]) -> Value {
        json!({
            "estimator": "logistic_regression",
            "feature_names": names,
            "coefficients": vec![0.0; names.len()],
            "intercept": 0.0,
        })
    }

    #[test]
    fn document_that_is_a_model_is_used_directly() {
        let shape = ArtifactShape::classify(&model_entry(&["age"]));
        assert!(matches!(shape, ArtifactShape::DirectModel(_)));
    }

    #[test]
    fn container_selects_first_model_entry() {
        let document = json!({
            "scaler": { "mean": [1.0], "scale": [2.0] },
            "clf": model_entry(&["age", "bmi"]),
            "backup": model_entry(&["age"]),
        });
        match ArtifactShape::classify(&document) {
            ArtifactShape::KeyedContainer {
                key,
                model,
                auxiliary,
            } => {
                assert_eq!(key, "clf");
                assert_eq!(model.contract().names(), vec!["age", "bmi"]);
                assert_eq!(auxiliary, vec!["scaler".to_string(), "backup".to_string()]);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn container_without_model_is_unreadable() {
        let document = json!({ "scaler": { "mean": [1.0] }, "encoder": null });
        let shape = ArtifactShape::classify(&document);
        assert!(matches!(shape, ArtifactShape::Unrecognized));
        assert!(matches!(shape.into_model(), Err(RiskError::ModelUnreadable(_))));
    }

    #[test]
    fn invalid_model_entry_is_skipped() {
        let mut broken = model_entry(&["age"]);
        broken["coefficients"] = json!([1.0, 2.0]);
        let document = json!({ "model": broken, "fallback": model_entry(&["bmi"]) });
        match ArtifactShape::classify(&document) {
            ArtifactShape::KeyedContainer { key, .. } => assert_eq!(key, "fallback"),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn scalar_document_is_unrecognized() {
        assert!(matches!(
            ArtifactShape::classify(&json!([1, 2, 3])),
            ArtifactShape::Unrecognized
        ));
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::contract::{FeatureContract, FeatureKind, FeatureSpec};
use crate::error::{Result, RiskError};
use crate::reconcile::{FeatureValue, ReconciledRecord};

/// A loaded model able to score a reconciled record.
pub trait Classifier: fmt::Debug + Send + Sync {
    fn contract(&self) -> &FeatureContract;

    fn predict(&self, record: &ReconciledRecord) -> Result<u8>;

    /// Probability of class 1.
    fn predict_proba(&self, record: &ReconciledRecord) -> Result<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticParams),
}

impl ModelSpec {
    pub fn build(self) -> Result<Arc<dyn Classifier>> {
        match self {
            ModelSpec::LogisticRegression(params) => Ok(Arc::new(LogisticModel::new(params)?)),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticParams {
    pub feature_names: Vec<String>,
    /// Features the model encodes itself, with the levels its encoder was fitted on.
    #[serde(default)]
    pub categorical_features: HashMap<String, Vec<String>>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// Binary logistic regression over the encoded feature row.
///
/// Numeric features contribute one column each. A categorical feature expands
/// into one indicator column per fitted level; a label outside those levels
/// encodes as all zeros.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    contract: FeatureContract,
    coefficients: Vec<f64>,
    intercept: f64,
    threshold: f64,
}

impl LogisticModel {
    pub fn new(params: LogisticParams) -> Result<Self> {
        let LogisticParams {
            feature_names,
            mut categorical_features,
            coefficients,
            intercept,
            threshold,
        } = params;

        if let Some(name) = categorical_features
            .keys()
            .find(|name| !feature_names.contains(*name))
        {
            return Err(RiskError::ModelUnreadable(format!(
                "categorical feature {:?} is not a declared feature",
                name
            )));
        }

        let features = feature_names
            .into_iter()
            .map(|name| {
                let kind = match categorical_features.remove(&name) {
                    Some(levels) => FeatureKind::Categorical { levels },
                    None => FeatureKind::Numeric,
                };
                FeatureSpec { name, kind }
            })
            .collect();
        let contract = FeatureContract::new(features)?;

        let width = encoded_width(&contract);
        if coefficients.len() != width {
            return Err(RiskError::ModelUnreadable(format!(
                "expected {} coefficients for the encoded features, found {}",
                width,
                coefficients.len()
            )));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RiskError::ModelUnreadable(format!(
                "decision threshold {} is not a probability",
                threshold
            )));
        }
        debug!(
            "Logistic model with {} features ({} encoded columns)",
            contract.len(),
            width
        );

        Ok(Self {
            contract,
            coefficients,
            intercept,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn encode(&self, record: &ReconciledRecord) -> Result<DenseMatrix<f64>> {
        let mut row = Vec::with_capacity(self.coefficients.len());
        for feature in self.contract.features() {
            let value = record.value(&feature.name)?;
            match (&feature.kind, &value) {
                (FeatureKind::Numeric, _) => {
                    let x = value.as_f64().ok_or_else(|| {
                        RiskError::mismatch(format!(
                            "model expects a number for {:?}, got {}",
                            feature.name, value
                        ))
                    })?;
                    row.push(x);
                }
                (FeatureKind::Categorical { levels }, FeatureValue::Label(label)) => {
                    row.extend(levels.iter().map(|level| if level == label { 1.0 } else { 0.0 }));
                }
                (FeatureKind::Categorical { .. }, _) => {
                    return Err(RiskError::mismatch(format!(
                        "model expects a label for {:?}, got {}",
                        feature.name, value
                    )))
                }
            }
        }
        trace!("Encoded row: {:?}", row);
        let width = row.len();
        Ok(DenseMatrix::new(1, width, row, false))
    }

    fn decision(&self, record: &ReconciledRecord) -> Result<f64> {
        let x = self.encode(record)?;
        let (_, cols) = x.shape();
        let z: f64 = (0..cols)
            .map(|j| *x.get((0, j)) * self.coefficients[j])
            .sum();
        Ok(z + self.intercept)
    }
}

impl Classifier for LogisticModel {
    fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    fn predict(&self, record: &ReconciledRecord) -> Result<u8> {
        let p = self.predict_proba(record)?;
        Ok(u8::from(p >= self.threshold))
    }

    fn predict_proba(&self, record: &ReconciledRecord) -> Result<f64> {
        Ok(sigmoid(self.decision(record)?))
    }
}

fn encoded_width(contract: &FeatureContract) -> usize {
    contract
        .features()
        .iter()
        .map(|feature| match &feature.kind {
            FeatureKind::Numeric => 1,
            FeatureKind::Categorical { levels } => levels.len(),
        })
        .sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::reconcile::Reconciler;
    use crate::records::sample_record;

    fn params(names: &[&str], coefficients: Vec<f64>, intercept: f64) -> LogisticParams {
        LogisticParams {
            feature_names: names.iter().map(|n| n.to_string()).collect(),
            categorical_features: HashMap::new(),
            coefficients,
            intercept,
            threshold: 0.5,
        }
    }

    #[test]
    fn model_entry_is_tagged_by_estimator() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{"estimator": "logistic_regression", "feature_names": ["age"],
                "coefficients": [0.1], "intercept": -1.0}"#,
        )
        .unwrap();
        let model = spec.build().unwrap();
        assert_eq!(model.contract().names(), vec!["age"]);
    }

    #[test]
    fn threshold_defaults_to_one_half() {
        let parsed: LogisticParams = serde_json::from_str(
            r#"{"feature_names": ["age"], "coefficients": [0.1], "intercept": 0.0}"#,
        )
        .unwrap();
        assert_eq!(LogisticModel::new(parsed).unwrap().threshold(), 0.5);

        let mut p = params(&["age"], vec![0.1], 0.0);
        p.threshold = 1.5;
        assert!(matches!(LogisticModel::new(p), Err(RiskError::ModelUnreadable(_))));
    }

    #[test]
    fn coefficient_count_must_match_encoding() {
        let mut p = params(&["age", "gender"], vec![0.1, 0.2], 0.0);
        p.categorical_features
            .insert("gender".into(), vec!["Female".into(), "Male".into()]);
        assert!(matches!(LogisticModel::new(p), Err(RiskError::ModelUnreadable(_))));
    }

    #[test]
    fn categorical_keys_must_be_declared() {
        let mut p = params(&["age"], vec![0.1], 0.0);
        p.categorical_features.insert("gender".into(), vec!["Male".into()]);
        assert!(matches!(LogisticModel::new(p), Err(RiskError::ModelUnreadable(_))));
    }

    #[test]
    fn label_and_probability_agree() {
        let model = LogisticModel::new(params(&["age", "bmi"], vec![0.05, 0.0], -3.0)).unwrap();
        let reconciler = Reconciler::new(model.contract().clone(), &RiskConfig::default());
        let record = reconciler.reconcile(&sample_record()).unwrap();

        let p = model.predict_proba(&record).unwrap();
        let expected = 1.0 / (1.0 + (-(67.0 * 0.05 - 3.0f64)).exp());
        approx::assert_abs_diff_eq!(p, expected, epsilon = 1e-12);
        assert_eq!(model.predict(&record).unwrap(), 1);
    }

    #[test]
    fn unseen_label_encodes_to_zeros() {
        let mut p = params(&["gender"], vec![2.0], 0.0);
        p.categorical_features.insert("gender".into(), vec!["Female".into()]);
        let model = LogisticModel::new(p).unwrap();
        let config = RiskConfig {
            category_policy: crate::config::CategoryPolicy::Permissive,
            ..RiskConfig::default()
        };
        let reconciler = Reconciler::new(model.contract().clone(), &config);
        let record = reconciler.reconcile(&sample_record()).unwrap();
        approx::assert_abs_diff_eq!(model.predict_proba(&record).unwrap(), 0.5, epsilon = 1e-12);
    }
}

use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, RiskError};
use crate::records::RAW_COLUMNS;

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    Numeric,
    /// A label the model's own pipeline encodes, with the levels it was fitted on.
    Categorical { levels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered feature names (and kinds) a model expects at inference time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContract {
    features: Vec<FeatureSpec>,
}

impl FeatureContract {
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        if features.is_empty() {
            return Err(RiskError::ModelUnreadable(
                "model declares no features".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.name.as_str()) {
                return Err(RiskError::ModelUnreadable(format!(
                    "feature {:?} declared twice",
                    feature.name
                )));
            }
        }
        Ok(Self { features })
    }

    pub fn numeric<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Self::new(
            names
                .iter()
                .map(|name| FeatureSpec {
                    name: name.as_ref().to_string(),
                    kind: FeatureKind::Numeric,
                })
                .collect(),
        )
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_categorical(&self) -> bool {
        self.features
            .iter()
            .any(|f| matches!(f.kind, FeatureKind::Categorical { .. }))
    }

    /// True when the declared names are exactly the raw form columns.
    pub fn is_raw_layout(&self) -> bool {
        let declared: HashSet<&str> = self.features.iter().map(|f| f.name.as_str()).collect();
        let raw: HashSet<&str> = RAW_COLUMNS.iter().copied().collect();
        declared == raw
    }
}

/// How a raw record is turned into the model's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Raw column names, categorical fields replaced by fixed integer codes.
    DirectNumeric,
    /// Derived `bmi_capped` plus one indicator column per category level.
    OneHot,
    /// Categorical labels passed through for the model to encode.
    Passthrough,
}

impl Strategy {
    pub fn select(contract: &FeatureContract) -> Strategy {
        if contract.has_categorical() {
            Strategy::Passthrough
        } else if contract.is_raw_layout() {
            Strategy::DirectNumeric
        } else {
            Strategy::OneHot
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::DirectNumeric => write!(f, "direct numeric mapping"),
            Strategy::OneHot => write!(f, "one-hot expansion"),
            Strategy::Passthrough => write!(f, "raw categorical passthrough"),
        }
    }
}

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::artifact;
use crate::config::RiskConfig;
use crate::error::Result;
use crate::model::Classifier;
use crate::reconcile::Reconciler;
use crate::records::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLabel {
    High,
    Low,
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLabel::High => write!(f, "High Risk"),
            RiskLabel::Low => write!(f, "Low Risk"),
        }
    }
}

/// Scored outcome of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub label: RiskLabel,
    pub prediction: u8,
    /// Probability of the high risk class.
    pub probability: f64,
}

impl Assessment {
    pub fn percent(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} probability)", self.label, self.percent())
    }
}

/// Process-wide state built once at startup: the loaded model and the
/// reconciler matching its contract. Read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppContext {
    model: Arc<dyn Classifier>,
    reconciler: Reconciler,
}

impl AppContext {
    pub async fn load(config: &RiskConfig) -> Result<Self> {
        let model = artifact::load(&config.model_path).await?.into_model()?;
        Ok(Self::new(model, config))
    }

    pub fn new(model: Arc<dyn Classifier>, config: &RiskConfig) -> Self {
        let reconciler = Reconciler::new(model.contract().clone(), config);
        Self { model, reconciler }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn model(&self) -> &Arc<dyn Classifier> {
        &self.model
    }

    pub fn assess(&self, raw: &RawRecord) -> Result<Assessment> {
        // label and probability must come from the same reconciled record
        let record = self.reconciler.reconcile(raw)?;
        let prediction = self.model.predict(&record)?;
        let probability = self.model.predict_proba(&record)?;
        let label = if prediction == 1 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        };
        debug!("Assessment: {} (p = {})", label, probability);
        Ok(Assessment {
            label,
            prediction,
            probability,
        })
    }
}

//! Stroke risk scoring.
//!
//! Reconciles a patient record with whatever feature contract the loaded
//! model artifact declares, then reports the model's risk label and
//! probability.

pub mod app;
pub mod artifact;
pub mod batch;
pub mod collector;
pub mod config;
pub mod contract;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod records;

pub use app::{AppContext, Assessment, RiskLabel};
pub use artifact::ArtifactShape;
pub use config::{CategoryPolicy, RiskConfig};
pub use contract::{FeatureContract, FeatureKind, FeatureSpec, Strategy};
pub use error::{Result, RiskError};
pub use model::{Classifier, LogisticModel, ModelSpec};
pub use reconcile::{FeatureValue, ReconciledRecord, Reconciler};
pub use records::RawRecord;

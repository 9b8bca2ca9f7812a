//! Feature reconciliation: turns a [`RawRecord`] into the exact single-row
//! table a loaded model was trained on.
//!
//! The column set and order of the output always equal the model's declared
//! contract. Which encoding is used depends on the [`Strategy`] selected from
//! that contract when the reconciler is built.

use std::fmt;

use log::{debug, info, trace};
use num::Num;
use polars::prelude::*;

use crate::config::{CategoryPolicy, RiskConfig};
use crate::contract::{FeatureContract, FeatureKind, Strategy};
use crate::error::{Result, RiskError};
use crate::records::{CategoricalField, Numeric, RawRecord, NUMERIC_COLUMNS};

/// Name of the engineered BMI feature clamped at the configured cap.
pub const BMI_CAPPED: &str = "bmi_capped";

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Label(String),
}

impl FeatureValue {
    fn to_series(&self, name: &str) -> Series {
        match self {
            FeatureValue::Int(v) => Series::new(name, &[*v]),
            FeatureValue::Float(v) => Series::new(name, &[*v]),
            FeatureValue::Label(v) => Series::new(name, &[v.as_str()]),
        }
    }

    fn from_series(series: &Series) -> Result<Self> {
        let value = match series.dtype() {
            DataType::Int64 => series.i64()?.get(0).map(FeatureValue::Int),
            DataType::Float64 => series.f64()?.get(0).map(FeatureValue::Float),
            DataType::Utf8 => series
                .utf8()?
                .get(0)
                .map(|label| FeatureValue::Label(label.to_string())),
            other => {
                return Err(RiskError::mismatch(format!(
                    "column {:?} has unsupported type {}",
                    series.name(),
                    other
                )))
            }
        };
        value.ok_or_else(|| {
            RiskError::mismatch(format!("column {:?} holds no value", series.name()))
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Label(_) => None,
        }
    }
}

impl From<Numeric> for FeatureValue {
    fn from(value: Numeric) -> Self {
        match value {
            Numeric::Int(v) => FeatureValue::Int(v),
            Numeric::Float(v) => FeatureValue::Float(v),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{}", v),
            FeatureValue::Float(v) => write!(f, "{}", v),
            FeatureValue::Label(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single-row table conforming to a model's feature contract.
#[derive(Debug, Clone)]
pub struct ReconciledRecord {
    frame: DataFrame,
}

impl ReconciledRecord {
    fn assemble(columns: Vec<(String, FeatureValue)>) -> Result<Self> {
        let series = columns
            .iter()
            .map(|(name, value)| value.to_series(name))
            .collect::<Vec<_>>();
        Ok(Self {
            frame: DataFrame::new(series)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn value(&self, column: &str) -> Result<FeatureValue> {
        let series = self
            .frame
            .column(column)
            .map_err(|_| RiskError::mismatch(format!("record has no column {:?}", column)))?;
        FeatureValue::from_series(series)
    }

    pub fn values(&self) -> Result<Vec<FeatureValue>> {
        self.frame
            .get_columns()
            .iter()
            .map(FeatureValue::from_series)
            .collect()
    }
}

fn capped<T: Num + PartialOrd + Copy>(value: T, upper: T) -> T {
    if value > upper {
        upper
    } else {
        value
    }
}

fn indicator_name(field: CategoricalField, label: &str) -> String {
    format!("{}_{}", field.column(), label)
}

/// Splits a declared indicator name such as `work_type_Govt_job` into its
/// categorical field and level.
fn parse_indicator(name: &str) -> Option<(CategoricalField, &str)> {
    CategoricalField::ALL.iter().copied().find_map(|field| {
        name.strip_prefix(field.column())
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|level| (field, level))
    })
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    contract: FeatureContract,
    strategy: Strategy,
    bmi_cap: f64,
    policy: CategoryPolicy,
}

impl Reconciler {
    pub fn new(contract: FeatureContract, config: &RiskConfig) -> Self {
        let strategy = Strategy::select(&contract);
        info!(
            "Reconciling {} declared features with {}",
            contract.len(),
            strategy
        );
        debug!("Declared features: {:?}", contract.names());
        Self {
            contract,
            strategy,
            bmi_cap: config.bmi_cap,
            policy: config.category_policy,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn reconcile(&self, raw: &RawRecord) -> Result<ReconciledRecord> {
        let columns = match self.strategy {
            Strategy::DirectNumeric => self.direct(raw)?,
            Strategy::OneHot => self.one_hot(raw)?,
            Strategy::Passthrough => self.passthrough(raw)?,
        };
        trace!("Reconciled record: {:?}", columns);
        ReconciledRecord::assemble(columns)
    }

    fn direct(&self, raw: &RawRecord) -> Result<Vec<(String, FeatureValue)>> {
        self.contract
            .features()
            .iter()
            .map(|feature| {
                let name = feature.name.as_str();
                let value: FeatureValue = if let Some(numeric) = raw.numeric(name) {
                    numeric.into()
                } else if let Some(field) = CategoricalField::from_column(name) {
                    FeatureValue::Int(raw.code(field))
                } else {
                    return Err(RiskError::mismatch(format!(
                        "{:?} is not a raw record field",
                        name
                    )));
                };
                Ok((feature.name.clone(), value))
            })
            .collect()
    }

    /// Everything one-hot expansion can produce for this record: the numeric
    /// fields, the raw categorical codes, the derived features and one
    /// indicator per observed level.
    fn expand(&self, raw: &RawRecord) -> Vec<(String, FeatureValue)> {
        let mut expanded: Vec<(String, FeatureValue)> = NUMERIC_COLUMNS
            .iter()
            .filter_map(|column| raw.numeric(column).map(|v| (column.to_string(), v.into())))
            .collect();
        expanded.push((
            BMI_CAPPED.to_string(),
            FeatureValue::Float(capped(raw.bmi, self.bmi_cap)),
        ));
        for field in CategoricalField::ALL {
            expanded.push((field.column().to_string(), FeatureValue::Int(raw.code(field))));
            expanded.push((indicator_name(field, raw.label(field)), FeatureValue::Int(1)));
        }
        expanded
    }

    fn one_hot(&self, raw: &RawRecord) -> Result<Vec<(String, FeatureValue)>> {
        let expanded = self.expand(raw);
        let mut used = 0;
        let mut columns = Vec::with_capacity(self.contract.len());
        for feature in self.contract.features() {
            let name = feature.name.as_str();
            if let Some((_, value)) = expanded.iter().find(|(column, _)| column == name) {
                used += 1;
                columns.push((feature.name.clone(), value.clone()));
                continue;
            }
            match parse_indicator(name) {
                Some((field, level)) => {
                    if self.policy == CategoryPolicy::Strict && !field.labels().contains(&level) {
                        return Err(RiskError::mismatch(format!(
                            "indicator {:?} names a level {} does not have",
                            name,
                            field.column()
                        )));
                    }
                    columns.push((feature.name.clone(), FeatureValue::Int(0)));
                }
                None => {
                    return Err(RiskError::mismatch(format!(
                        "cannot produce declared feature {:?} by one-hot expansion",
                        name
                    )))
                }
            }
        }
        trace!(
            "One-hot expansion: {} columns produced, {} declared, {} dropped",
            expanded.len(),
            columns.len(),
            expanded.len() - used
        );
        Ok(columns)
    }

    fn passthrough(&self, raw: &RawRecord) -> Result<Vec<(String, FeatureValue)>> {
        self.contract
            .features()
            .iter()
            .map(|feature| {
                let name = feature.name.as_str();
                let value: FeatureValue = match (&feature.kind, CategoricalField::from_column(name)) {
                    (FeatureKind::Categorical { levels }, Some(field)) => {
                        let label = raw.label(field);
                        if self.policy == CategoryPolicy::Strict
                            && !levels.iter().any(|level| level == label)
                        {
                            return Err(RiskError::mismatch(format!(
                                "model was not trained on {} level {:?}",
                                name, label
                            )));
                        }
                        FeatureValue::Label(label.to_string())
                    }
                    (FeatureKind::Categorical { .. }, None) => {
                        return Err(RiskError::mismatch(format!(
                            "{:?} is declared categorical but is not a categorical field",
                            name
                        )))
                    }
                    (FeatureKind::Numeric, Some(field)) => FeatureValue::Int(raw.code(field)),
                    (FeatureKind::Numeric, None) => match raw.numeric(name) {
                        Some(numeric) => numeric.into(),
                        None if name == BMI_CAPPED => {
                            FeatureValue::Float(capped(raw.bmi, self.bmi_cap))
                        }
                        None => {
                            return Err(RiskError::mismatch(format!(
                                "cannot pass {:?} through as a numeric feature",
                                name
                            )))
                        }
                    },
                };
                Ok((feature.name.clone(), value))
            })
            .collect()
    }
}

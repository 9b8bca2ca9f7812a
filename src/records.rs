use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;
use polars::prelude::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

pub const AGE: &str = "age";
pub const HYPERTENSION: &str = "hypertension";
pub const HEART_DISEASE: &str = "heart_disease";
pub const AVG_GLUCOSE_LEVEL: &str = "avg_glucose_level";
pub const BMI: &str = "bmi";
pub const GENDER: &str = "gender";
pub const EVER_MARRIED: &str = "ever_married";
pub const WORK_TYPE: &str = "work_type";
pub const RESIDENCE_TYPE: &str = "Residence_type";
pub const SMOKING_STATUS: &str = "smoking_status";

/// Column names of a raw record, in the order the form submits them.
pub const RAW_COLUMNS: [&str; 10] = [
    AGE,
    HYPERTENSION,
    HEART_DISEASE,
    AVG_GLUCOSE_LEVEL,
    BMI,
    GENDER,
    EVER_MARRIED,
    WORK_TYPE,
    RESIDENCE_TYPE,
    SMOKING_STATUS,
];

pub const NUMERIC_COLUMNS: [&str; 5] = [AGE, HYPERTENSION, HEART_DISEASE, AVG_GLUCOSE_LEVEL, BMI];

lazy_static! {
    /// Column types of the stroke dataset CSV. `bmi` stays text because the
    /// dataset spells missing values as `N/A`.
    pub static ref DATASET_SCHEMA: Arc<Schema> = Arc::new(Schema::from_iter(vec![
        Field::new("id", DataType::Int32),
        Field::new(GENDER, DataType::Utf8),
        Field::new(AGE, DataType::Float64),
        Field::new(HYPERTENSION, DataType::Int32),
        Field::new(HEART_DISEASE, DataType::Int32),
        Field::new(EVER_MARRIED, DataType::Utf8),
        Field::new(WORK_TYPE, DataType::Utf8),
        Field::new(RESIDENCE_TYPE, DataType::Utf8),
        Field::new(AVG_GLUCOSE_LEVEL, DataType::Float64),
        Field::new(BMI, DataType::Utf8),
        Field::new(SMOKING_STATUS, DataType::Utf8),
        Field::new("stroke", DataType::Int32),
    ]));
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident in $column:expr => {
            $($variant:ident = ($label:literal, $code:expr)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn code(self) -> i64 {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = RiskError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|level| level.label() == s)
                    .ok_or_else(|| RiskError::UnknownLevel {
                        field: $column,
                        value: s.to_string(),
                    })
            }
        }
    };
}

categorical! {
    Gender in GENDER => {
        Male = ("Male", 1),
        Female = ("Female", 0),
    }
}

categorical! {
    EverMarried in EVER_MARRIED => {
        Yes = ("Yes", 1),
        No = ("No", 0),
    }
}

categorical! {
    WorkType in WORK_TYPE => {
        Private = ("Private", 0),
        SelfEmployed = ("Self-employed", 1),
        GovtJob = ("Govt_job", 2),
        Children = ("children", 3),
        NeverWorked = ("Never_worked", 4),
    }
}

categorical! {
    ResidenceType in RESIDENCE_TYPE => {
        Urban = ("Urban", 1),
        Rural = ("Rural", 0),
    }
}

categorical! {
    SmokingStatus in SMOKING_STATUS => {
        FormerlySmoked = ("formerly smoked", 0),
        NeverSmoked = ("never smoked", 1),
        Smokes = ("smokes", 2),
        Unknown = ("Unknown", 3),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    Gender,
    EverMarried,
    WorkType,
    ResidenceType,
    SmokingStatus,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Gender,
        CategoricalField::EverMarried,
        CategoricalField::WorkType,
        CategoricalField::ResidenceType,
        CategoricalField::SmokingStatus,
    ];

    pub fn column(self) -> &'static str {
        match self {
            CategoricalField::Gender => GENDER,
            CategoricalField::EverMarried => EVER_MARRIED,
            CategoricalField::WorkType => WORK_TYPE,
            CategoricalField::ResidenceType => RESIDENCE_TYPE,
            CategoricalField::SmokingStatus => SMOKING_STATUS,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.column() == column)
    }

    pub fn labels(self) -> Vec<&'static str> {
        match self {
            CategoricalField::Gender => Gender::ALL.iter().map(|l| l.label()).collect(),
            CategoricalField::EverMarried => EverMarried::ALL.iter().map(|l| l.label()).collect(),
            CategoricalField::WorkType => WorkType::ALL.iter().map(|l| l.label()).collect(),
            CategoricalField::ResidenceType => {
                ResidenceType::ALL.iter().map(|l| l.label()).collect()
            }
            CategoricalField::SmokingStatus => {
                SmokingStatus::ALL.iter().map(|l| l.label()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

/// One submission from the collector. Values are already range checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub age: u8,
    pub hypertension: u8,
    pub heart_disease: u8,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub gender: Gender,
    pub ever_married: EverMarried,
    pub work_type: WorkType,
    #[serde(rename = "Residence_type")]
    pub residence_type: ResidenceType,
    pub smoking_status: SmokingStatus,
}

impl RawRecord {
    pub fn numeric(&self, column: &str) -> Option<Numeric> {
        match column {
            AGE => Some(Numeric::Int(i64::from(self.age))),
            HYPERTENSION => Some(Numeric::Int(i64::from(self.hypertension))),
            HEART_DISEASE => Some(Numeric::Int(i64::from(self.heart_disease))),
            AVG_GLUCOSE_LEVEL => Some(Numeric::Float(self.avg_glucose_level)),
            BMI => Some(Numeric::Float(self.bmi)),
            _ => None,
        }
    }

    pub fn label(&self, field: CategoricalField) -> &'static str {
        match field {
            CategoricalField::Gender => self.gender.label(),
            CategoricalField::EverMarried => self.ever_married.label(),
            CategoricalField::WorkType => self.work_type.label(),
            CategoricalField::ResidenceType => self.residence_type.label(),
            CategoricalField::SmokingStatus => self.smoking_status.label(),
        }
    }

    pub fn code(&self, field: CategoricalField) -> i64 {
        match field {
            CategoricalField::Gender => self.gender.code(),
            CategoricalField::EverMarried => self.ever_married.code(),
            CategoricalField::WorkType => self.work_type.code(),
            CategoricalField::ResidenceType => self.residence_type.code(),
            CategoricalField::SmokingStatus => self.smoking_status.code(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> RawRecord {
    RawRecord {
        age: 67,
        hypertension: 0,
        heart_disease: 1,
        avg_glucose_level: 228.69,
        bmi: 36.6,
        gender: Gender::Male,
        ever_married: EverMarried::Yes,
        work_type: WorkType::Private,
        residence_type: ResidenceType::Urban,
        smoking_status: SmokingStatus::FormerlySmoked,
    }
}

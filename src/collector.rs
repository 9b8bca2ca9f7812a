use std::ops::RangeInclusive;

use crate::error::{Result, RiskError};
use crate::records::{RawRecord, AGE, AVG_GLUCOSE_LEVEL, BMI, HEART_DISEASE, HYPERTENSION};

pub const AGE_RANGE: RangeInclusive<f64> = 1.0..=100.0;
pub const GLUCOSE_RANGE: RangeInclusive<f64> = 50.0..=300.0;
pub const BMI_RANGE: RangeInclusive<f64> = 10.0..=60.0;

/// Values as they arrive from a form or a dataset row, unchecked.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub age: f64,
    pub hypertension: i64,
    pub heart_disease: i64,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub gender: String,
    pub ever_married: String,
    pub work_type: String,
    pub residence_type: String,
    pub smoking_status: String,
}

fn binary(field: &'static str, value: i64) -> Result<u8> {
    match value {
        0 => Ok(0),
        1 => Ok(1),
        _ => Err(RiskError::OutOfRange {
            field,
            value: value.to_string(),
            expected: "{0, 1}",
        }),
    }
}

fn bounded(
    field: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
    expected: &'static str,
) -> Result<f64> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(RiskError::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        })
    }
}

impl FormInput {
    pub fn collect(&self) -> Result<RawRecord> {
        let age = bounded(AGE, self.age, &AGE_RANGE, "whole years 1..=100")?;
        if age.fract() != 0.0 {
            return Err(RiskError::OutOfRange {
                field: AGE,
                value: age.to_string(),
                expected: "whole years 1..=100",
            });
        }
        Ok(RawRecord {
            age: age as u8,
            hypertension: binary(HYPERTENSION, self.hypertension)?,
            heart_disease: binary(HEART_DISEASE, self.heart_disease)?,
            avg_glucose_level: bounded(
                AVG_GLUCOSE_LEVEL,
                self.avg_glucose_level,
                &GLUCOSE_RANGE,
                "50.0..=300.0",
            )?,
            bmi: bounded(BMI, self.bmi, &BMI_RANGE, "10.0..=60.0")?,
            gender: self.gender.parse()?,
            ever_married: self.ever_married.parse()?,
            work_type: self.work_type.parse()?,
            residence_type: self.residence_type.parse()?,
            smoking_status: self.smoking_status.parse()?,
        })
    }
}

use std::fs::File;
use std::path::Path;

use log::{info, warn};
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use tokio::task;

use crate::app::{AppContext, Assessment};
use crate::collector::FormInput;
use crate::error::{Result, RiskError};
use crate::records::{
    AGE, AVG_GLUCOSE_LEVEL, BMI, DATASET_SCHEMA, EVER_MARRIED, GENDER, HEART_DISEASE, HYPERTENSION,
    RESIDENCE_TYPE, SMOKING_STATUS, WORK_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn infer<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "csv" => Some(OutputFormat::Csv),
            "parquet" => Some(OutputFormat::Parquet),
            _ => None,
        }
    }
}

/// Outcome for one dataset row.
#[derive(Debug)]
pub struct RowOutcome {
    pub id: Option<i32>,
    pub result: Result<Assessment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub scored: usize,
    pub rejected: usize,
}

pub async fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref().to_path_buf();

    task::spawn_blocking(move || -> Result<DataFrame> {
        let file = File::open(path)?;
        Ok(CsvReader::new(file)
            .has_header(true)
            .with_dtypes(Some(DATASET_SCHEMA.clone()))
            .finish()?)
    })
    .await?
}

pub async fn write_csv<P: AsRef<Path>>(path: P, mut df: DataFrame) -> Result<()> {
    let path = path.as_ref().to_path_buf();

    task::spawn_blocking(move || -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    })
    .await?
}

pub async fn write_parquet<P: AsRef<Path>>(path: P, mut df: DataFrame) -> Result<()> {
    let path = path.as_ref().to_path_buf();

    task::spawn_blocking(move || -> Result<()> {
        let mut file = File::create(path)?;
        ParquetWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    })
    .await?
}

fn required<T>(value: Option<T>, field: &'static str, expected: &'static str) -> Result<T> {
    value.ok_or(RiskError::OutOfRange {
        field,
        value: "null".to_string(),
        expected,
    })
}

/// Extracts the raw inputs of every row. Row level problems (missing or
/// unparsable cells) are returned per row; a missing column fails the batch.
pub fn form_inputs(df: &DataFrame) -> Result<Vec<(Option<i32>, Result<FormInput>)>> {
    let ids = match df.column("id") {
        Ok(ids) => Some(ids.cast(&DataType::Int32)?),
        Err(_) => None,
    };
    let age = df.column(AGE)?.cast(&DataType::Float64)?;
    let hypertension = df.column(HYPERTENSION)?.cast(&DataType::Int64)?;
    let heart_disease = df.column(HEART_DISEASE)?.cast(&DataType::Int64)?;
    let glucose = df.column(AVG_GLUCOSE_LEVEL)?.cast(&DataType::Float64)?;
    let bmi = df.column(BMI)?.cast(&DataType::Utf8)?;
    let gender = df.column(GENDER)?.cast(&DataType::Utf8)?;
    let ever_married = df.column(EVER_MARRIED)?.cast(&DataType::Utf8)?;
    let work_type = df.column(WORK_TYPE)?.cast(&DataType::Utf8)?;
    let residence_type = df.column(RESIDENCE_TYPE)?.cast(&DataType::Utf8)?;
    let smoking_status = df.column(SMOKING_STATUS)?.cast(&DataType::Utf8)?;

    let ids = match &ids {
        Some(ids) => Some(ids.i32()?),
        None => None,
    };
    let age = age.f64()?;
    let hypertension = hypertension.i64()?;
    let heart_disease = heart_disease.i64()?;
    let glucose = glucose.f64()?;
    let bmi = bmi.utf8()?;
    let gender = gender.utf8()?;
    let ever_married = ever_married.utf8()?;
    let work_type = work_type.utf8()?;
    let residence_type = residence_type.utf8()?;
    let smoking_status = smoking_status.utf8()?;

    let text = |column: &Utf8Chunked, i: usize, field: &'static str| -> Result<String> {
        required(column.get(i), field, "a known level").map(str::to_string)
    };

    let rows = (0..df.height())
        .map(|i| {
            let id = ids.and_then(|ids| ids.get(i));
            let input = (|| -> Result<FormInput> {
                let bmi_text = required(bmi.get(i), BMI, "10.0..=60.0")?;
                let bmi = bmi_text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| RiskError::OutOfRange {
                        field: BMI,
                        value: bmi_text.to_string(),
                        expected: "10.0..=60.0",
                    })?;
                Ok(FormInput {
                    age: required(age.get(i), AGE, "whole years 1..=100")?,
                    hypertension: required(hypertension.get(i), HYPERTENSION, "{0, 1}")?,
                    heart_disease: required(heart_disease.get(i), HEART_DISEASE, "{0, 1}")?,
                    avg_glucose_level: required(glucose.get(i), AVG_GLUCOSE_LEVEL, "50.0..=300.0")?,
                    bmi,
                    gender: text(gender, i, GENDER)?,
                    ever_married: text(ever_married, i, EVER_MARRIED)?,
                    work_type: text(work_type, i, WORK_TYPE)?,
                    residence_type: text(residence_type, i, RESIDENCE_TYPE)?,
                    smoking_status: text(smoking_status, i, SMOKING_STATUS)?,
                })
            })();
            (id, input)
        })
        .collect();
    Ok(rows)
}

/// Scores every row. Per submission failures are kept in the outcome; any
/// other error aborts the batch.
pub fn score_frame(ctx: &AppContext, df: &DataFrame) -> Result<Vec<RowOutcome>> {
    form_inputs(df)?
        .into_iter()
        .map(|(id, input)| {
            let result = input.and_then(|input| input.collect()).and_then(|raw| ctx.assess(&raw));
            match result {
                Err(e) if !e.is_per_submission() => Err(e),
                result => Ok(RowOutcome { id, result }),
            }
        })
        .collect()
}

pub fn outcomes_frame(outcomes: &[RowOutcome]) -> Result<DataFrame> {
    let ids: Vec<Option<i32>> = outcomes.iter().map(|o| o.id).collect();
    let risk: Vec<Option<String>> = outcomes
        .iter()
        .map(|o| o.result.as_ref().ok().map(|a| a.label.to_string()))
        .collect();
    let prediction: Vec<Option<i32>> = outcomes
        .iter()
        .map(|o| o.result.as_ref().ok().map(|a| i32::from(a.prediction)))
        .collect();
    let probability: Vec<Option<f64>> = outcomes
        .iter()
        .map(|o| o.result.as_ref().ok().map(|a| a.probability))
        .collect();
    let error: Vec<Option<String>> = outcomes
        .iter()
        .map(|o| o.result.as_ref().err().map(|e| e.to_string()))
        .collect();

    Ok(DataFrame::new(vec![
        Series::new("id", ids),
        Series::new("risk", risk),
        Series::new("prediction", prediction),
        Series::new("probability", probability),
        Series::new("error", error),
    ])?)
}

pub async fn run(
    ctx: &AppContext,
    input: &Path,
    output: &Path,
    format: OutputFormat,
) -> Result<BatchSummary> {
    let df = read_csv(input).await?;
    info!("Read {} rows from {}", df.height(), input.display());

    let outcomes = score_frame(ctx, &df)?;
    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => summary.scored += 1,
            Err(e) => {
                summary.rejected += 1;
                warn!("Row {:?} rejected: {}", outcome.id, e);
            }
        }
    }

    let results = outcomes_frame(&outcomes)?;
    match format {
        OutputFormat::Csv => write_csv(output, results).await?,
        OutputFormat::Parquet => write_parquet(output, results).await?,
    }
    info!(
        "Wrote {} scored and {} rejected rows to {}",
        summary.scored,
        summary.rejected,
        output.display()
    );
    Ok(summary)
}

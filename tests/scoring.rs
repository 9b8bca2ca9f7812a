//! End-to-end scoring against artifact fixtures in `tests/fixtures`.

use std::path::PathBuf;

use approx::assert_abs_diff_eq;

use stroke_risk::records::{
    EverMarried, Gender, ResidenceType, SmokingStatus, WorkType,
};
use stroke_risk::{
    AppContext, ArtifactShape, FeatureValue, RawRecord, RiskConfig, RiskError, RiskLabel, Strategy,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn config_for(name: &str) -> RiskConfig {
    RiskConfig {
        model_path: fixture(name),
        ..RiskConfig::default()
    }
}

fn patient() -> RawRecord {
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

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[tokio::test]
async fn direct_numeric_artifact() {
    let ctx = AppContext::load(&config_for("direct_numeric.json"))
        .await
        .expect("load direct model");
    assert_eq!(ctx.reconciler().strategy(), Strategy::DirectNumeric);

    let record = ctx.reconciler().reconcile(&patient()).unwrap();
    assert_eq!(
        record.columns(),
        vec![
            "age",
            "hypertension",
            "heart_disease",
            "avg_glucose_level",
            "bmi",
            "gender",
            "ever_married",
            "work_type",
            "Residence_type",
            "smoking_status"
        ]
    );
    assert_eq!(
        record.values().unwrap(),
        vec![
            FeatureValue::Int(67),
            FeatureValue::Int(0),
            FeatureValue::Int(1),
            FeatureValue::Float(228.69),
            FeatureValue::Float(36.6),
            FeatureValue::Int(1),
            FeatureValue::Int(1),
            FeatureValue::Int(0),
            FeatureValue::Int(1),
            FeatureValue::Int(0),
        ]
    );

    let assessment = ctx.assess(&patient()).unwrap();
    let z = 67.0 * 0.05 + 0.4 + 228.69 * 0.005 + 36.6 * 0.01 + 0.1 + 0.2 + 0.05 - 5.0;
    assert_abs_diff_eq!(assessment.probability, logistic(z), epsilon = 1e-9);
    assert_eq!(assessment.label, RiskLabel::High);
    assert_eq!(assessment.prediction, 1);
}

#[tokio::test]
async fn one_hot_container_caps_bmi_and_matches_contract() {
    let shape = stroke_risk::artifact::load(fixture("one_hot_container.json"))
        .await
        .unwrap();
    match &shape {
        ArtifactShape::KeyedContainer { key, auxiliary, .. } => {
            assert_eq!(key, "model");
            assert_eq!(auxiliary, &vec!["scaler".to_string(), "encoder".to_string()]);
        }
        other => panic!("unexpected shape {:?}", other),
    }

    let ctx = AppContext::new(shape.into_model().unwrap(), &RiskConfig::default());
    assert_eq!(ctx.reconciler().strategy(), Strategy::OneHot);

    let mut raw = patient();
    raw.bmi = 55.0;
    let record = ctx.reconciler().reconcile(&raw).unwrap();
    let declared: Vec<String> = ctx
        .model()
        .contract()
        .names()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(record.columns(), declared);
    assert_eq!(record.value("bmi_capped").unwrap(), FeatureValue::Float(50.0));
    assert_eq!(record.value("gender_Male").unwrap(), FeatureValue::Int(1));
    assert_eq!(record.value("gender_Female").unwrap(), FeatureValue::Int(0));
    assert_eq!(record.value("work_type_children").unwrap(), FeatureValue::Int(0));

    let assessment = ctx.assess(&raw).unwrap();
    let z = 67.0 * 0.07 + 0.3 + 228.69 * 0.004 + 50.0 * 0.02 + 0.1 + 0.15 + 0.05 + 0.05 + 0.2
        - 7.5;
    assert_abs_diff_eq!(assessment.probability, logistic(z), epsilon = 1e-9);
    let expected = if logistic(z) >= 0.5 {
        RiskLabel::High
    } else {
        RiskLabel::Low
    };
    assert_eq!(assessment.label, expected);
}

#[tokio::test]
async fn passthrough_artifact_scores_labels() {
    let ctx = AppContext::load(&config_for("passthrough.json"))
        .await
        .unwrap();
    assert_eq!(ctx.reconciler().strategy(), Strategy::Passthrough);

    let record = ctx.reconciler().reconcile(&patient()).unwrap();
    assert_eq!(
        record.value("work_type").unwrap(),
        FeatureValue::Label("Private".to_string())
    );

    let assessment = ctx.assess(&patient()).unwrap();
    let z = 67.0 * 0.06 + 0.3 + 228.69 * 0.004 + 36.6 * 0.01 + 0.1 + 0.1 + 0.05 + 0.05 + 0.2
        - 6.0;
    assert_abs_diff_eq!(assessment.probability, logistic(z), epsilon = 1e-9);
    assert_eq!(assessment.prediction, u8::from(logistic(z) >= 0.3));
}

#[tokio::test]
async fn artifact_without_model_is_unreadable() {
    let err = AppContext::load(&config_for("no_model.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, RiskError::ModelUnreadable(ref msg) if msg == "Model not found in artifact"));
}

#[tokio::test]
async fn missing_artifact_is_unreadable() {
    let err = AppContext::load(&config_for("does_not_exist.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, RiskError::ModelUnreadable(_)));
}

#[tokio::test]
async fn repeated_assessments_agree() {
    let ctx = AppContext::load(&config_for("one_hot_container.json"))
        .await
        .unwrap();
    let first = ctx.assess(&patient()).unwrap();
    let second = ctx.assess(&patient()).unwrap();
    assert_eq!(first, second);
}

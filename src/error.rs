use polars::error::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Error, Debug)]
pub enum RiskError {
    /// No invocable model could be located in the artifact. Fatal at startup.
    #[error("model unreadable: {0}")]
    ModelUnreadable(String),
    /// The model declares features the record cannot be turned into.
    #[error("feature contract mismatch: {0}")]
    ContractMismatch(String),
    #[error("{field} = {value:?} is outside {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("unknown {field} level {value:?}")]
    UnknownLevel { field: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RiskError {
    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        RiskError::ContractMismatch(message.into())
    }

    /// Errors that only concern one submission; the process keeps serving.
    pub fn is_per_submission(&self) -> bool {
        matches!(
            self,
            RiskError::ContractMismatch(_)
                | RiskError::OutOfRange { .. }
                | RiskError::UnknownLevel { .. }
        )
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::models::CollectionMode;

pub type Result<T> = std::result::Result<T, GrowthError>;

#[derive(Error, Debug)]
pub enum GrowthError {
    /// Raw weight text that is not a non-negative whole number of grams
    #[error("invalid sample value {value:?}: weights must be non-negative whole grams")]
    InvalidSampleValue { value: String },

    /// Batch does not have the slot layout its collection mode requires
    #[error("batch shape mismatch for {mode} mode: {detail}")]
    BatchShapeMismatch {
        mode: CollectionMode,
        detail: String,
    },

    #[error("invalid age {0}: must be between 0 and 55 days")]
    InvalidAge(i64),

    #[error("invalid {field} {value:?}: must be non-empty and must not contain '-'")]
    InvalidKeyComponent { field: &'static str, value: String },

    #[error("invalid baseline weight {0}: must be a finite non-negative number")]
    InvalidBaselineWeight(f64),

    /// Baseline store could not be read or parsed
    #[error("baseline store {path} unavailable: {message}")]
    BaselineUnavailable { path: PathBuf, message: String },

    #[error("baseline store {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External sink rejected or never received the record
    #[error("submission failed: {source}")]
    SubmissionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Where the unsent record was kept, if it could be
        pending: Option<PathBuf>,
    },

    #[error("could not keep record at {path}: {source}")]
    Pending {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GrowthError {
    pub fn submission<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        GrowthError::SubmissionFailed {
            source: source.into(),
            pending: None,
        }
    }

    pub fn with_pending(self, path: PathBuf) -> Self {
        match self {
            GrowthError::SubmissionFailed { source, .. } => GrowthError::SubmissionFailed {
                source,
                pending: Some(path),
            },
            other => other,
        }
    }

    pub fn shape(mode: CollectionMode, detail: impl Into<String>) -> Self {
        GrowthError::BatchShapeMismatch {
            mode,
            detail: detail.into(),
        }
    }
}

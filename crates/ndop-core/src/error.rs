use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use ndop_ingest::{Dataset, SourceError};
use ndop_model::{BreakdownKind, ModelError, PatientStatus};

/// Failures that abort a publication run.
///
/// Data-quality problems in individual records never surface here; the
/// cleaner and resolver absorb them into Unknown and Unallocated buckets.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{dataset} is unavailable for {month}; a publication needs every month of the period")]
    DataUnavailable { dataset: Dataset, month: NaiveDate },

    #[error("mapping file {path} failed integrity checks: {message}")]
    MappingIntegrity { path: PathBuf, message: String },

    #[error(
        "{table} does not reconcile for {month} ({cohort}, {partition}): expected {expected}, found {actual}"
    )]
    Reconciliation {
        table: BreakdownKind,
        month: NaiveDate,
        cohort: PatientStatus,
        partition: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("source error: {0}")]
    Source(#[source] SourceError),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

impl PipelineError {
    /// Wrap a failure to load a fallback mapping file.
    pub(crate) fn mapping_file(path: &std::path::Path, error: SourceError) -> Self {
        match error {
            SourceError::MappingFile { path, message } => {
                PipelineError::MappingIntegrity { path, message }
            }
            SourceError::Spreadsheet { source, .. } => PipelineError::MappingIntegrity {
                path: path.to_path_buf(),
                message: source.to_string(),
            },
            SourceError::Csv { source, .. } => PipelineError::MappingIntegrity {
                path: path.to_path_buf(),
                message: source.to_string(),
            },
            other => PipelineError::from(other),
        }
    }
}

impl From<SourceError> for PipelineError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::MonthUnavailable { dataset, month } => {
                PipelineError::DataUnavailable { dataset, month }
            }
            other => PipelineError::Source(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

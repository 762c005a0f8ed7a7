use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Monthly datasets whose landing is tracked in the extract log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dataset {
    OptOutRecords,
    ListSize,
}

impl Dataset {
    /// Key used in the `extract_log` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::OptOutRecords => "ndop_demog",
            Dataset::ListSize => "gp_patient_list",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{dataset} has not landed for {month}")]
    MonthUnavailable { dataset: Dataset, month: NaiveDate },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to read spreadsheet {path}: {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mapping file {path}: {message}")]
    MappingFile { path: PathBuf, message: String },
}

impl SourceError {
    pub(crate) fn mapping(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SourceError::MappingFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

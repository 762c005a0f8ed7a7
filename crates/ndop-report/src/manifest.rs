//! Output manifest with SHA-256 digests.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use ndop_model::ReportingPeriod;

use crate::error::{ReportError, Result};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

const BUFFER_SIZE: usize = 64 * 1024;

/// A file written by the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub path: PathBuf,
    /// Data rows, excluding any header.
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub rows: usize,
    pub sha256: String,
}

/// Contents of `manifest.json`. Holds no timestamps, so identical runs
/// produce identical manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub period_end: NaiveDate,
    pub publication_date: NaiveDate,
    pub months: u32,
    pub files: Vec<ManifestEntry>,
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| ReportError::io(path, source))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|source| ReportError::io(path, source))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl Manifest {
    /// Digest every output file.
    pub fn build(period: &ReportingPeriod, outputs: &[OutputFile]) -> Result<Self> {
        let files = outputs
            .iter()
            .map(|output| {
                let sha256 = file_sha256(&output.path)?;
                debug!(file = %output.name, %sha256, "digested output");
                Ok(ManifestEntry {
                    name: output.name.clone(),
                    rows: output.rows,
                    sha256,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            period_end: period.end_date(),
            publication_date: period.publication_date(),
            months: period.month_count(),
            files,
        })
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(self).map_err(|source| ReportError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ReportError::io(&path, source))?;
        Ok(path)
    }
}

//! NDOP publication outputs.
//!
//! - **CSV extracts**: age/gender, registration and residence tables
//! - **Summary workbook**: sheet payload for the template renderer
//! - **Manifest**: row counts and SHA-256 digests of every file

mod error;
mod extract;
mod manifest;
mod workbook;

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, info_span};

use ndop_core::Publication;

pub use error::{ReportError, Result};
pub use extract::{
    AGE_GENDER_HEADERS, REGISTRATION_HEADERS, RESIDENCE_HEADERS, csv_file_name, format_rate,
    write_age_gender, write_csv_outputs, write_registration, write_residence,
};
pub use manifest::{MANIFEST_FILE_NAME, Manifest, ManifestEntry, OutputFile, file_sha256};
pub use workbook::{
    SummaryWorkbook, UNAVAILABLE, WorkbookSheet, ZERO, build_workbook, workbook_file_name,
    write_workbook,
};

/// Everything written by one run.
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub files: Vec<OutputFile>,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
}

/// Write the CSV extracts, workbook payload and manifest into `dir`,
/// creating it if needed.
pub fn write_outputs(dir: &Path, publication: &Publication) -> Result<WrittenOutputs> {
    let span = info_span!("write_outputs", output_dir = %dir.display());
    let _guard = span.enter();
    let start = Instant::now();

    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = write_csv_outputs(dir, publication)?;
    let workbook = build_workbook(publication);
    files.push(write_workbook(dir, &publication.period, &workbook)?);

    let manifest = Manifest::build(&publication.period, &files)?;
    let manifest_path = manifest.write(dir)?;
    info!(
        files = files.len(),
        duration_ms = start.elapsed().as_millis(),
        "outputs written"
    );
    Ok(WrittenOutputs {
        files,
        manifest,
        manifest_path,
    })
}

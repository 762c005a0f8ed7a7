//! Fallback geography mapping files.
//!
//! Practice and LSOA overrides are supplied as a workbook sheet (`.xlsx`,
//! `.xls`, `.ods`) or a CSV export with ONS-style column headers. A file is
//! rejected if required columns are missing, a key is blank, or the same key
//! is mapped to two different areas.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use csv::ReaderBuilder;
use tracing::debug;

use ndop_model::{GeographyArea, LsoaGeography, MappingFileConfig, PracticeGeography};

use crate::error::{Result, SourceError};

pub const PRACTICE_CODE: &str = "PRACTICE_CODE";
pub const PRACTICE_NAME: &str = "PRACTICE_NAME";
pub const POSTCODE: &str = "POSTCODE";
pub const SUB_ICB_CODE: &str = "LOC22CDH";
pub const SUB_ICB_ONS_CODE: &str = "LOC22CD";
pub const SUB_ICB_NAME: &str = "LOC22NM";
pub const ICB_CODE: &str = "ICB22CDH";
pub const ICB_ONS_CODE: &str = "ICB22CD";
pub const ICB_NAME: &str = "ICB22NM";
pub const REGION_CODE: &str = "NHSER22CDH";
pub const REGION_ONS_CODE: &str = "NHSER22CD";
pub const REGION_NAME: &str = "NHSER22NM";
pub const LSOA_CODE: &str = "LSOA11CD";
pub const LSOA_NAME: &str = "LSOA11NM";
pub const LA_CODE: &str = "LAD22CD";
pub const LA_NAME: &str = "LAD22NM";

/// Raw cells of a mapping sheet with its header row.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MappingTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }

    fn require(&self, path: &Path, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| {
            SourceError::mapping(path, format!("missing required column {name}"))
        })
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_ascii_uppercase()
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => normalize_cell(value),
        // Whole numbers come back as floats; keep codes like 101 from becoming 101.0.
        Data::Float(value) if value.fract() == 0.0 => format!("{value:.0}"),
        other => normalize_cell(&other.to_string()),
    }
}

fn cell<'a>(row: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    let value = row.get(idx?)?.as_str();
    (!value.is_empty()).then_some(value)
}

/// Read the configured sheet, or the first sheet when none is named.
pub fn read_mapping_table(file: &MappingFileConfig) -> Result<MappingTable> {
    let path = file.path.as_path();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let table = match extension.as_deref() {
        Some("csv") => read_csv_mapping(path)?,
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => {
            read_workbook_mapping(path, file.sheet.as_deref())?
        }
        _ => {
            return Err(SourceError::mapping(
                path,
                "unsupported file type; expected .csv, .xlsx, .xls or .ods",
            ));
        }
    };
    debug!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "read mapping table"
    );
    Ok(table)
}

fn read_csv_mapping(path: &Path) -> Result<MappingTable> {
    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(normalize_header)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(record.iter().map(normalize_cell).collect());
    }
    Ok(MappingTable { headers, rows })
}

fn read_workbook_mapping(path: &Path, sheet: Option<&str>) -> Result<MappingTable> {
    let spreadsheet_error = |source| SourceError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(spreadsheet_error)?;
    let sheet = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| SourceError::mapping(path, "workbook has no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(spreadsheet_error)?;
    let mut rows = range.rows();
    let headers = rows
        .next()
        .ok_or_else(|| SourceError::mapping(path, format!("sheet {sheet} is empty")))?
        .iter()
        .map(|cell| normalize_header(&cell_text(cell)))
        .collect();
    let rows = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Ok(MappingTable { headers, rows })
}

fn area(row: &[String], code: Option<usize>, ons: Option<usize>, name: Option<usize>) -> GeographyArea {
    GeographyArea {
        code: cell(row, code).unwrap_or_default().to_string(),
        ons_code: cell(row, ons).map(str::to_string),
        name: cell(row, name).map(str::to_string),
    }
}

/// Rows repeating a key must agree on the geography codes `codes` picks out.
/// Names and postcodes may differ in spelling; the first row wins.
fn insert_consistent<T>(
    entries: &mut BTreeMap<String, T>,
    path: &Path,
    key: String,
    value: T,
    codes: impl Fn(&T) -> String,
) -> Result<()> {
    if let Some(existing) = entries.get(&key) {
        let (existing, incoming) = (codes(existing), codes(&value));
        if existing != incoming {
            return Err(SourceError::mapping(
                path,
                format!("{key} is mapped to both {existing} and {incoming}"),
            ));
        }
        return Ok(());
    }
    entries.insert(key, value);
    Ok(())
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(String::is_empty)
}

/// Practice to Sub-ICB, ICB and region overrides keyed by practice code.
pub fn practice_overrides(
    table: &MappingTable,
    path: &Path,
) -> Result<BTreeMap<String, PracticeGeography>> {
    let practice = table.require(path, PRACTICE_CODE)?;
    let sub_icb = table.require(path, SUB_ICB_CODE)?;
    let icb = table.require(path, ICB_CODE)?;
    let region = table.require(path, REGION_CODE)?;
    let practice_name = table.column(PRACTICE_NAME);
    let postcode = table.column(POSTCODE);
    let sub_icb_ons = table.column(SUB_ICB_ONS_CODE);
    let sub_icb_name = table.column(SUB_ICB_NAME);
    let icb_ons = table.column(ICB_ONS_CODE);
    let icb_name = table.column(ICB_NAME);
    let region_ons = table.column(REGION_ONS_CODE);
    let region_name = table.column(REGION_NAME);

    let mut entries = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        if is_blank(row) {
            continue;
        }
        let line = idx + 2;
        let code = cell(row, Some(practice))
            .ok_or_else(|| SourceError::mapping(path, format!("row {line}: blank {PRACTICE_CODE}")))?
            .to_ascii_uppercase();
        for (column, name) in [(sub_icb, SUB_ICB_CODE), (icb, ICB_CODE), (region, REGION_CODE)] {
            if cell(row, Some(column)).is_none() {
                return Err(SourceError::mapping(
                    path,
                    format!("row {line}: blank {name} for practice {code}"),
                ));
            }
        }
        let geography = PracticeGeography {
            practice_code: code.clone(),
            practice_name: cell(row, practice_name).map(str::to_string),
            postcode: cell(row, postcode).map(str::to_string),
            sub_icb: area(row, Some(sub_icb), sub_icb_ons, sub_icb_name),
            icb: area(row, Some(icb), icb_ons, icb_name),
            region: area(row, Some(region), region_ons, region_name),
        };
        insert_consistent(&mut entries, path, code, geography, |g| {
            format!("{}/{}/{}", g.sub_icb.code, g.icb.code, g.region.code)
        })?;
    }
    Ok(entries)
}

/// LSOA to Sub-ICB and local authority overrides keyed by LSOA code.
pub fn lsoa_overrides(
    table: &MappingTable,
    path: &Path,
) -> Result<BTreeMap<String, LsoaGeography>> {
    let lsoa = table.require(path, LSOA_CODE)?;
    let sub_icb = table.require(path, SUB_ICB_CODE)?;
    let lsoa_name = table.column(LSOA_NAME);
    let sub_icb_ons = table.column(SUB_ICB_ONS_CODE);
    let sub_icb_name = table.column(SUB_ICB_NAME);
    let la_code = table.column(LA_CODE);
    let la_name = table.column(LA_NAME);

    let mut entries = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        if is_blank(row) {
            continue;
        }
        let line = idx + 2;
        let code = cell(row, Some(lsoa))
            .ok_or_else(|| SourceError::mapping(path, format!("row {line}: blank {LSOA_CODE}")))?
            .to_ascii_uppercase();
        if cell(row, Some(sub_icb)).is_none() {
            return Err(SourceError::mapping(
                path,
                format!("row {line}: blank {SUB_ICB_CODE} for LSOA {code}"),
            ));
        }
        let geography = LsoaGeography {
            lsoa_code: code.clone(),
            lsoa_name: cell(row, lsoa_name).map(str::to_string),
            sub_icb: area(row, Some(sub_icb), sub_icb_ons, sub_icb_name),
            local_authority: area(row, la_code, None, la_name),
        };
        insert_consistent(&mut entries, path, code, geography, |g| {
            format!("{}/{}", g.sub_icb.code, g.local_authority.code)
        })?;
    }
    Ok(entries)
}

pub fn load_practice_overrides(
    file: &MappingFileConfig,
) -> Result<BTreeMap<String, PracticeGeography>> {
    let table = read_mapping_table(file)?;
    practice_overrides(&table, &file.path)
}

pub fn load_lsoa_overrides(file: &MappingFileConfig) -> Result<BTreeMap<String, LsoaGeography>> {
    let table = read_mapping_table(file)?;
    lsoa_overrides(&table, &file.path)
}

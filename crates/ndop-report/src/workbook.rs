//! Summary workbook payload.
//!
//! The spreadsheet itself is rendered from a template by a separate tool
//! that replaces tags with the values here. This module builds the sheets
//! that tool consumes and writes them as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ndop_core::{ENGLAND_CODE, ENGLAND_NAME, ENGLAND_ONS_CODE, Publication};
use ndop_model::ReportingPeriod;

use crate::error::{ReportError, Result};
use crate::manifest::OutputFile;

/// Marker for a value that cannot be calculated.
pub const UNAVAILABLE: &str = "z";
/// Marker for a zero count in the practice sheet.
pub const ZERO: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookSheet {
    pub name: String,
    pub header: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Template tag to replacement text.
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryWorkbook {
    pub title_tags: BTreeMap<String, String>,
    pub sheets: Vec<WorkbookSheet>,
}

impl SummaryWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&WorkbookSheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.rows.len()).sum()
    }
}

pub fn workbook_file_name(period: &ReportingPeriod) -> String {
    format!("NDOP_sum_{}.json", period.file_stamp())
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn rate_cell(rate: Option<f64>) -> String {
    rate.map_or_else(|| UNAVAILABLE.to_string(), |rate| format!("{rate:.1}"))
}

fn count_cell(count: Option<u64>) -> String {
    count.map_or_else(|| UNAVAILABLE.to_string(), |count| count.to_string())
}

fn practice_count_cell(count: u64) -> String {
    if count == 0 {
        ZERO.to_string()
    } else {
        count.to_string()
    }
}

fn month_tags(month: NaiveDate) -> BTreeMap<String, String> {
    BTreeMap::from([(
        "<<REPORT_MONTH>>".to_string(),
        ReportingPeriod::month_label(month),
    )])
}

fn headline_sheet(publication: &Publication) -> WorkbookSheet {
    let period = &publication.period;
    let rows = publication
        .tables
        .headline
        .rows
        .iter()
        .map(|row| {
            vec![
                ReportingPeriod::month_label(row.month),
                ENGLAND_ONS_CODE.to_string(),
                ENGLAND_CODE.to_string(),
                ENGLAND_NAME.to_string(),
                row.opt_out.to_string(),
                row.list_size.to_string(),
                rate_cell(row.opt_out_rate()),
                row.deceased.to_string(),
            ]
        })
        .collect();
    let range = format!(
        "{} to {}",
        ReportingPeriod::month_label(period.start_date()),
        ReportingPeriod::month_label(period.end_date())
    );
    WorkbookSheet {
        name: "Headline".to_string(),
        header: vec![format!("National Data Opt-out, {range}")],
        columns: columns(&[
            "Date",
            "ONS code",
            "Code",
            "Name",
            "Opt-out",
            "List size",
            "Opt-out rate",
            "Deceased",
        ]),
        rows,
        tags: BTreeMap::from([("<<PERIOD_RANGE>>".to_string(), range)]),
    }
}

fn age_gender_sheet(publication: &Publication, month: NaiveDate) -> WorkbookSheet {
    let rows = publication
        .tables
        .age_gender
        .rows
        .iter()
        .filter(|row| row.month == month)
        .map(|row| {
            vec![
                row.age_band.clone(),
                row.gender.clone(),
                row.opt_out.to_string(),
                count_cell(row.list_size),
                rate_cell(row.opt_out_rate()),
            ]
        })
        .collect();
    WorkbookSheet {
        name: "Age and gender".to_string(),
        header: vec![format!(
            "National Data Opt-out by age and gender, {}",
            ReportingPeriod::month_label(month)
        )],
        columns: columns(&["Age band", "Gender", "Opt-out", "List size", "Opt-out rate"]),
        rows,
        tags: month_tags(month),
    }
}

fn practice_sheet(publication: &Publication, month: NaiveDate) -> WorkbookSheet {
    let rows = publication
        .tables
        .practices
        .rows
        .iter()
        .filter(|row| row.month == month)
        .map(|row| {
            vec![
                row.practice_code.clone(),
                row.practice_name.clone().unwrap_or_default(),
                row.postcode.clone().unwrap_or_default(),
                row.sub_icb.code.clone(),
                row.sub_icb.name.clone().unwrap_or_default(),
                practice_count_cell(row.opt_out),
                row.list_size
                    .map_or_else(|| UNAVAILABLE.to_string(), practice_count_cell),
                rate_cell(row.opt_out_rate()),
                practice_count_cell(row.deceased),
            ]
        })
        .collect();
    WorkbookSheet {
        name: "GP practice".to_string(),
        header: vec![format!(
            "National Data Opt-out by GP practice, {}",
            ReportingPeriod::month_label(month)
        )],
        columns: columns(&[
            "Practice code",
            "Practice name",
            "Postcode",
            "Sub-ICB code",
            "Sub-ICB name",
            "Opt-out",
            "List size",
            "Opt-out rate",
            "Deceased",
        ]),
        rows,
        tags: month_tags(month),
    }
}

fn sub_icb_sheet(publication: &Publication, month: NaiveDate) -> WorkbookSheet {
    let rows = publication
        .tables
        .registration
        .rows
        .iter()
        .filter(|row| row.month == month)
        .map(|row| {
            vec![
                row.sub_icb.code.clone(),
                row.sub_icb.ons_code.clone().unwrap_or_default(),
                row.sub_icb.name.clone().unwrap_or_default(),
                row.icb.code.clone(),
                row.icb.name.clone().unwrap_or_default(),
                row.region.code.clone(),
                row.region.name.clone().unwrap_or_default(),
                row.opt_out.to_string(),
                row.list_size.to_string(),
                rate_cell(row.opt_out_rate()),
                row.deceased.to_string(),
            ]
        })
        .collect();
    WorkbookSheet {
        name: "Sub-ICB".to_string(),
        header: vec![format!(
            "National Data Opt-out by Sub-ICB of registered practice, {}",
            ReportingPeriod::month_label(month)
        )],
        columns: columns(&[
            "Sub-ICB code",
            "ONS code",
            "Sub-ICB name",
            "ICB code",
            "ICB name",
            "Region code",
            "Region name",
            "Opt-out",
            "List size",
            "Opt-out rate",
            "Deceased",
        ]),
        rows,
        tags: month_tags(month),
    }
}

fn residence_sheet(publication: &Publication, month: NaiveDate) -> WorkbookSheet {
    let rows = publication
        .tables
        .residence
        .rows
        .iter()
        .filter(|row| row.month == month)
        .map(|row| {
            vec![
                row.lsoa_code.clone(),
                row.lsoa_name.clone().unwrap_or_default(),
                row.sub_icb.code.clone(),
                row.sub_icb.name.clone().unwrap_or_default(),
                row.local_authority.code.clone(),
                row.local_authority.name.clone().unwrap_or_default(),
                row.opt_out.to_string(),
                row.deceased.to_string(),
            ]
        })
        .collect();
    WorkbookSheet {
        name: "LSOA of residence".to_string(),
        header: vec![format!(
            "National Data Opt-out by LSOA of residence, {}",
            ReportingPeriod::month_label(month)
        )],
        columns: columns(&[
            "LSOA code",
            "LSOA name",
            "Sub-ICB code",
            "Sub-ICB name",
            "Local authority code",
            "Local authority name",
            "Opt-out",
            "Deceased",
        ]),
        rows,
        tags: month_tags(month),
    }
}

/// Headline sheet over the whole period; one sheet per breakdown for the end month.
pub fn build_workbook(publication: &Publication) -> SummaryWorkbook {
    let period = &publication.period;
    let end = period.end_date();
    SummaryWorkbook {
        title_tags: BTreeMap::from([
            (
                "<<DATE_PUBLISHED>>".to_string(),
                format!("Date Published: {}", period.formatted_publication_date()),
            ),
            (
                "<<REPORT_MONTH>>".to_string(),
                ReportingPeriod::month_label(end),
            ),
        ]),
        sheets: vec![
            headline_sheet(publication),
            age_gender_sheet(publication, end),
            practice_sheet(publication, end),
            sub_icb_sheet(publication, end),
            residence_sheet(publication, end),
        ],
    }
}

pub fn write_workbook(
    dir: &Path,
    period: &ReportingPeriod,
    workbook: &SummaryWorkbook,
) -> Result<OutputFile> {
    let name = workbook_file_name(period);
    let path = dir.join(&name);
    let json = serde_json::to_string_pretty(workbook).map_err(|source| ReportError::Json {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, json).map_err(|source| ReportError::io(&path, source))?;
    Ok(OutputFile {
        name,
        path,
        rows: workbook.row_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_use_publication_markers() {
        assert_eq!(rate_cell(None), "z");
        assert_eq!(rate_cell(Some(12.345)), "12.3");
        assert_eq!(count_cell(None), "z");
        assert_eq!(practice_count_cell(0), "-");
        assert_eq!(practice_count_cell(7), "7");
    }
}

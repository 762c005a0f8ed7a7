//! CSV extracts of the age/gender, registration and residence tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use ndop_core::{AgeGenderTable, Publication, RegistrationTable, ResidenceTable};
use ndop_model::{BreakdownKind, GeographyArea, ReportingPeriod, format_publication_month};

use crate::error::{ReportError, Result};
use crate::manifest::OutputFile;

pub const AGE_GENDER_HEADERS: [&str; 6] = [
    "ACH_DATE",
    "AGE_BAND",
    "GENDER",
    "OPT_OUT",
    "LIST_SIZE",
    "OPT_OUT_RATE",
];

pub const REGISTRATION_HEADERS: [&str; 14] = [
    "ACH_DATE",
    "SUB_ICB_LOCATION_CODE",
    "ONS_SUB_ICB_LOCATION_CODE",
    "SUB_ICB_LOCATION_NAME",
    "ICB_CODE",
    "ONS_ICB_CODE",
    "ICB_NAME",
    "COMM_REGION_CODE",
    "ONS_COMM_REGION_CODE",
    "COMM_REGION_NAME",
    "OPT_OUT",
    "LIST_SIZE",
    "OPT_OUT_RATE",
    "DECEASED",
];

pub const RESIDENCE_HEADERS: [&str; 10] = [
    "ACH_DATE",
    "LSOA_CODE",
    "LSOA_NAME",
    "SUB_ICB_LOCATION_CODE",
    "ONS_SUB_ICB_LOCATION_CODE",
    "SUB_ICB_LOCATION_NAME",
    "LA_CODE",
    "LA_NAME",
    "OPT_OUT",
    "DECEASED",
];

/// `NDOP_<table>_<Mon>_<YYYY>.csv`
pub fn csv_file_name(kind: BreakdownKind, period: &ReportingPeriod) -> String {
    format!("NDOP_{}_{}.csv", kind.as_str(), period.file_stamp())
}

/// Rates are percentages to four decimal places; undefined rates are blank.
pub fn format_rate(rate: Option<f64>) -> String {
    rate.map(|rate| format!("{rate:.4}")).unwrap_or_default()
}

#[derive(Serialize)]
struct AgeGenderRecord<'a> {
    ach_date: String,
    age_band: &'a str,
    gender: &'a str,
    opt_out: u64,
    list_size: u64,
    opt_out_rate: String,
}

#[derive(Serialize)]
struct RegistrationRecord<'a> {
    ach_date: String,
    sub_icb_location_code: &'a str,
    ons_sub_icb_location_code: Option<&'a str>,
    sub_icb_location_name: Option<&'a str>,
    icb_code: &'a str,
    ons_icb_code: Option<&'a str>,
    icb_name: Option<&'a str>,
    comm_region_code: &'a str,
    ons_comm_region_code: Option<&'a str>,
    comm_region_name: Option<&'a str>,
    opt_out: u64,
    list_size: u64,
    opt_out_rate: String,
    deceased: u64,
}

#[derive(Serialize)]
struct ResidenceRecord<'a> {
    ach_date: String,
    lsoa_code: &'a str,
    lsoa_name: Option<&'a str>,
    sub_icb_location_code: &'a str,
    ons_sub_icb_location_code: Option<&'a str>,
    sub_icb_location_name: Option<&'a str>,
    la_code: &'a str,
    la_name: Option<&'a str>,
    opt_out: u64,
    deceased: u64,
}

fn area(area: &GeographyArea) -> (&str, Option<&str>, Option<&str>) {
    (
        area.code.as_str(),
        area.ons_code.as_deref(),
        area.name.as_deref(),
    )
}

/// Header row, then one serialized record per item. Returns the data row count.
fn write_records<W: Write, T: Serialize>(
    writer: W,
    headers: &[&str],
    records: impl IntoIterator<Item = T>,
) -> csv::Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(headers)?;
    let mut rows = 0;
    for record in records {
        writer.serialize(record)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

pub fn write_age_gender<W: Write>(writer: W, table: &AgeGenderTable) -> csv::Result<usize> {
    write_records(
        writer,
        &AGE_GENDER_HEADERS,
        table.rows.iter().map(|row| AgeGenderRecord {
            ach_date: format_publication_month(row.month),
            age_band: &row.age_band,
            gender: &row.gender,
            opt_out: row.opt_out,
            // Rows without a denominator are published as zero list size and rate.
            list_size: row.list_size.unwrap_or(0),
            opt_out_rate: format_rate(Some(row.opt_out_rate().unwrap_or(0.0))),
        }),
    )
}

pub fn write_registration<W: Write>(writer: W, table: &RegistrationTable) -> csv::Result<usize> {
    write_records(
        writer,
        &REGISTRATION_HEADERS,
        table.rows.iter().map(|row| {
            let (sub_icb_code, sub_icb_ons, sub_icb_name) = area(&row.sub_icb);
            let (icb_code, icb_ons, icb_name) = area(&row.icb);
            let (region_code, region_ons, region_name) = area(&row.region);
            RegistrationRecord {
                ach_date: format_publication_month(row.month),
                sub_icb_location_code: sub_icb_code,
                ons_sub_icb_location_code: sub_icb_ons,
                sub_icb_location_name: sub_icb_name,
                icb_code,
                ons_icb_code: icb_ons,
                icb_name,
                comm_region_code: region_code,
                ons_comm_region_code: region_ons,
                comm_region_name: region_name,
                opt_out: row.opt_out,
                list_size: row.list_size,
                opt_out_rate: format_rate(row.opt_out_rate()),
                deceased: row.deceased,
            }
        }),
    )
}

pub fn write_residence<W: Write>(writer: W, table: &ResidenceTable) -> csv::Result<usize> {
    write_records(
        writer,
        &RESIDENCE_HEADERS,
        table.rows.iter().map(|row| {
            let (sub_icb_code, sub_icb_ons, sub_icb_name) = area(&row.sub_icb);
            let (la_code, _, la_name) = area(&row.local_authority);
            ResidenceRecord {
                ach_date: format_publication_month(row.month),
                lsoa_code: &row.lsoa_code,
                lsoa_name: row.lsoa_name.as_deref(),
                sub_icb_location_code: sub_icb_code,
                ons_sub_icb_location_code: sub_icb_ons,
                sub_icb_location_name: sub_icb_name,
                la_code,
                la_name,
                opt_out: row.opt_out,
                deceased: row.deceased,
            }
        }),
    )
}

fn write_file(
    dir: &Path,
    name: String,
    write: impl FnOnce(BufWriter<File>) -> csv::Result<usize>,
) -> Result<OutputFile> {
    let path = dir.join(&name);
    let file = File::create(&path).map_err(|source| ReportError::io(&path, source))?;
    let rows = write(BufWriter::new(file)).map_err(|source| ReportError::Csv {
        path: path.clone(),
        source,
    })?;
    debug!(file = %name, rows, "wrote CSV");
    Ok(OutputFile { name, path, rows })
}

/// Write the three CSV extracts into `dir`.
pub fn write_csv_outputs(dir: &Path, publication: &Publication) -> Result<Vec<OutputFile>> {
    let period = &publication.period;
    let tables = &publication.tables;
    Ok(vec![
        write_file(
            dir,
            csv_file_name(BreakdownKind::AgeGender, period),
            |writer| write_age_gender(writer, &tables.age_gender),
        )?,
        write_file(
            dir,
            csv_file_name(BreakdownKind::RegistrationGeography, period),
            |writer| write_registration(writer, &tables.registration),
        )?,
        write_file(
            dir,
            csv_file_name(BreakdownKind::ResidenceGeography, period),
            |writer| write_residence(writer, &tables.residence),
        )?,
    ])
}

//! Columnar representation of cleaned cohort records.

use chrono::NaiveDate;
use polars::prelude::{
    Column, DataFrame, DataType, IntoColumn, IntoLazy, NamedFrom, PolarsResult, Series, col, len,
};

use ndop_model::{CleanedRecord, PatientStatus, parse_iso_date};

use crate::error::{PipelineError, Result};

pub const ACH_DATE: &str = "ACH_DATE";
pub const PATIENT_ID: &str = "PATIENT_ID";
pub const NHS_NUMBER: &str = "NHS_NUMBER";
pub const GENDER: &str = "GENDER";
pub const AGE_BAND: &str = "AGE_BAND";
pub const GP_PRACTICE: &str = "GP_PRACTICE";
pub const LSOA_CODE: &str = "LSOA_CODE";

const COUNT: &str = "COUNT";

/// Column order of every cohort frame.
pub const COHORT_COLUMNS: [&str; 7] = [
    ACH_DATE,
    PATIENT_ID,
    NHS_NUMBER,
    GENDER,
    AGE_BAND,
    GP_PRACTICE,
    LSOA_CODE,
];

/// Build a cohort frame. All columns are strings so months stack without
/// dtype coercion; dates use ISO form.
pub fn cohort_frame(records: &[CleanedRecord]) -> PolarsResult<DataFrame> {
    let mut ach_date = Vec::with_capacity(records.len());
    let mut patient_id = Vec::with_capacity(records.len());
    let mut nhs_number = Vec::with_capacity(records.len());
    let mut gender = Vec::with_capacity(records.len());
    let mut age_band = Vec::with_capacity(records.len());
    let mut gp_practice = Vec::with_capacity(records.len());
    let mut lsoa_code = Vec::with_capacity(records.len());
    for record in records {
        ach_date.push(Some(record.month.format("%Y-%m-%d").to_string()));
        patient_id.push(record.patient_id.clone());
        nhs_number.push(record.nhs_number.clone());
        gender.push(Some(record.gender.label().to_string()));
        age_band.push(Some(record.age_band.clone()));
        gp_practice.push(record.gp_practice.clone());
        lsoa_code.push(record.lsoa_code.clone());
    }
    let columns: Vec<Column> = [
        (ACH_DATE, ach_date),
        (PATIENT_ID, patient_id),
        (NHS_NUMBER, nhs_number),
        (GENDER, gender),
        (AGE_BAND, age_band),
        (GP_PRACTICE, gp_practice),
        (LSOA_CODE, lsoa_code),
    ]
    .into_iter()
    .map(|(name, values): (&str, Vec<Option<String>>)| {
        Series::new(name.into(), values).into_column()
    })
    .collect();
    DataFrame::new(columns)
}

/// One month of cleaned records for one cohort.
///
/// Handing a `MonthlyFrame` to the accumulator is the release point for the
/// month's intermediates.
#[derive(Debug, Clone)]
pub struct MonthlyFrame {
    pub month: NaiveDate,
    pub status: PatientStatus,
    pub data: DataFrame,
}

impl MonthlyFrame {
    pub fn from_records(
        month: NaiveDate,
        status: PatientStatus,
        records: &[CleanedRecord],
    ) -> Result<Self> {
        if let Some(record) = records
            .iter()
            .find(|record| record.month != month || record.status != status)
        {
            return Err(PipelineError::InvalidInput(format!(
                "{} record for {} in the {status} frame for {month}",
                record.status, record.month
            )));
        }
        Ok(Self {
            month,
            status,
            data: cohort_frame(records)?,
        })
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }
}

/// Row counts for each distinct combination of `keys`. Null keys form their
/// own group.
pub fn grouped_counts(df: &DataFrame, keys: &[&str]) -> PolarsResult<Vec<(Vec<Option<String>>, u64)>> {
    let grouped = df
        .clone()
        .lazy()
        .group_by(keys.iter().map(|key| col(*key)).collect::<Vec<_>>())
        .agg([len().cast(DataType::UInt64).alias(COUNT)])
        .collect()?;
    let key_columns = keys
        .iter()
        .map(|key| grouped.column(key).and_then(|column| column.str()))
        .collect::<PolarsResult<Vec<_>>>()?;
    let counts = grouped.column(COUNT)?.u64()?;
    let mut rows = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        let key = key_columns
            .iter()
            .map(|column| column.get(idx).map(str::to_string))
            .collect();
        rows.push((key, counts.get(idx).unwrap_or(0)));
    }
    Ok(rows)
}

/// Parse the `ACH_DATE` key of a grouped row.
pub(crate) fn month_key(value: Option<&str>) -> Result<NaiveDate> {
    let value = value.ok_or_else(|| {
        PipelineError::InvalidInput(format!("null {ACH_DATE} in accumulated frame"))
    })?;
    Ok(parse_iso_date(value)?)
}

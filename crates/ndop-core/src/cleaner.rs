//! Record cleaning.
//!
//! Cleaning is a pure function of one month's raw cohort records. Invalid
//! identifiers are nulled rather than dropped; the only rows removed are
//! duplicate versions of the same patient within the month and cohort.

use std::collections::HashMap;
use std::ops::AddAssign;

use chrono::NaiveDate;
use regex::Regex;
use tracing::trace;

use ndop_model::{
    CleanedRecord, CleaningRules, Gender, PatientStatus, RawOptOutRecord, UNKNOWN_AGE_BAND,
    age_in_years,
};

use crate::error::{PipelineError, Result};
use crate::redact::redact_value;

#[derive(Debug, Clone, Copy, Default)]
struct CleaningCounts {
    nhs_numbers_nulled: usize,
    genders_defaulted: usize,
    ages_unknown: usize,
    lsoas_invalid: usize,
    practices_missing: usize,
}

/// Outcome of cleaning one month's cohort.
///
/// `input_rows == output_rows + duplicates_collapsed` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_collapsed: usize,
    pub nhs_numbers_nulled: usize,
    pub genders_defaulted: usize,
    pub ages_unknown: usize,
    pub lsoas_invalid: usize,
    pub practices_missing: usize,
}

impl CleaningReport {
    fn new(input_rows: usize, duplicates_collapsed: usize, counts: CleaningCounts) -> Self {
        Self {
            input_rows,
            output_rows: input_rows - duplicates_collapsed,
            duplicates_collapsed,
            nhs_numbers_nulled: counts.nhs_numbers_nulled,
            genders_defaulted: counts.genders_defaulted,
            ages_unknown: counts.ages_unknown,
            lsoas_invalid: counts.lsoas_invalid,
            practices_missing: counts.practices_missing,
        }
    }

    pub fn is_conserved(&self) -> bool {
        self.input_rows == self.output_rows + self.duplicates_collapsed
    }
}

impl AddAssign for CleaningReport {
    fn add_assign(&mut self, other: Self) {
        self.input_rows += other.input_rows;
        self.output_rows += other.output_rows;
        self.duplicates_collapsed += other.duplicates_collapsed;
        self.nhs_numbers_nulled += other.nhs_numbers_nulled;
        self.genders_defaulted += other.genders_defaulted;
        self.ages_unknown += other.ages_unknown;
        self.lsoas_invalid += other.lsoas_invalid;
        self.practices_missing += other.practices_missing;
    }
}

#[derive(Debug, Clone)]
pub struct CleanedCohort {
    pub records: Vec<CleanedRecord>,
    pub report: CleaningReport,
}

pub struct RecordCleaner<'a> {
    rules: &'a CleaningRules,
    lsoa_pattern: Regex,
}

impl<'a> RecordCleaner<'a> {
    pub fn new(rules: &'a CleaningRules) -> Result<Self> {
        let lsoa_pattern = Regex::new(&rules.lsoa_pattern).map_err(|err| {
            PipelineError::InvalidInput(format!(
                "invalid LSOA pattern '{}': {err}",
                rules.lsoa_pattern
            ))
        })?;
        Ok(Self {
            rules,
            lsoa_pattern,
        })
    }

    /// Clean one month's records for a cohort, consuming the raw rows.
    pub fn clean(
        &self,
        month: NaiveDate,
        status: PatientStatus,
        records: Vec<RawOptOutRecord>,
    ) -> CleanedCohort {
        let input_rows = records.len();
        let keep = duplicate_mask(&records);
        let duplicates_collapsed = keep.iter().filter(|keep| !**keep).count();

        let mut counts = CleaningCounts::default();
        let cleaned: Vec<CleanedRecord> = records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, keep)| keep.then_some(record))
            .map(|record| self.clean_record(month, status, record, &mut counts))
            .collect();

        CleanedCohort {
            records: cleaned,
            report: CleaningReport::new(input_rows, duplicates_collapsed, counts),
        }
    }

    fn clean_record(
        &self,
        month: NaiveDate,
        status: PatientStatus,
        record: RawOptOutRecord,
        counts: &mut CleaningCounts,
    ) -> CleanedRecord {
        let nhs_number = record
            .nhs_number
            .as_deref()
            .and_then(|value| self.valid_nhs_number(value));
        if nhs_number.is_none() {
            counts.nhs_numbers_nulled += 1;
            if let Some(raw) = record.nhs_number.as_deref() {
                trace!(%month, nhs_number = redact_value(raw), "nulled invalid NHS number");
            }
        }

        let gender = Gender::from_code(record.gender.as_deref());
        if !gender.is_known() {
            counts.genders_defaulted += 1;
        }

        let age = record
            .date_of_birth
            .map(|date_of_birth| age_in_years(date_of_birth, month));
        let age_band = self
            .rules
            .age_bands
            .band_for_age(age, self.rules.max_age)
            .to_string();
        if age_band == UNKNOWN_AGE_BAND {
            counts.ages_unknown += 1;
        }

        let gp_practice = record.gp_practice.as_deref().and_then(normalize_code);
        if gp_practice.is_none() {
            counts.practices_missing += 1;
        }

        let lsoa_code = record
            .lsoa_code
            .as_deref()
            .and_then(normalize_code)
            .filter(|code| self.lsoa_pattern.is_match(code));
        if lsoa_code.is_none() {
            counts.lsoas_invalid += 1;
        }

        CleanedRecord {
            month,
            status,
            patient_id: record.patient_id.as_deref().and_then(normalize_id),
            nhs_number,
            gender,
            age_band,
            gp_practice,
            lsoa_code,
        }
    }

    /// Ten digits passing the modulus-11 check, not on the invalid list and
    /// not in a test range.
    pub fn valid_nhs_number(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
        if !is_valid_nhs_check_digit(&digits) {
            return None;
        }
        if self
            .rules
            .invalid_nhs_numbers
            .iter()
            .any(|invalid| *invalid == digits)
        {
            return None;
        }
        if self
            .rules
            .test_number_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && digits.starts_with(prefix.as_str()))
        {
            return None;
        }
        Some(digits)
    }
}

pub fn is_valid_nhs_check_digit(digits: &str) -> bool {
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let values: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = values[..9]
        .iter()
        .zip((2..=10).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let check = match 11 - sum % 11 {
        11 => 0,
        10 => return false,
        check => check,
    };
    check == values[9]
}

fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    (!code.is_empty()).then_some(code)
}

fn normalize_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Keep one version per patient: the latest record start, earliest input on ties.
/// Rows without a patient identifier are always kept.
fn duplicate_mask(records: &[RawOptOutRecord]) -> Vec<bool> {
    let mut winners: HashMap<&str, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let Some(id) = record.patient_id.as_deref().map(str::trim) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        winners
            .entry(id)
            .and_modify(|winner| {
                if record.record_start_date > records[*winner].record_start_date {
                    *winner = idx;
                }
            })
            .or_insert(idx);
    }
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            match record.patient_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => winners.get(id) == Some(&idx),
                _ => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_digit_rules() {
        assert!(is_valid_nhs_check_digit("4010232137"));
        assert!(!is_valid_nhs_check_digit("4010232138"));
        assert!(!is_valid_nhs_check_digit("401023213"));
        assert!(!is_valid_nhs_check_digit("40102321X7"));
    }

    #[test]
    fn duplicate_mask_prefers_latest_start_then_first_seen() {
        let date = |m| NaiveDate::from_ymd_opt(2023, m, 1);
        let rec = |id: Option<&str>, start| RawOptOutRecord {
            patient_id: id.map(str::to_string),
            record_start_date: start,
            ..RawOptOutRecord::default()
        };
        let records = vec![
            rec(Some("a"), date(1)),
            rec(Some("a"), date(3)),
            rec(Some("a"), date(3)),
            rec(None, date(1)),
            rec(None, date(1)),
            rec(Some(" b "), date(2)),
        ];
        assert_eq!(
            duplicate_mask(&records),
            vec![false, true, false, true, true, true]
        );
    }
}

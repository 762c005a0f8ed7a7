//! Opt-out record shapes before and after cleaning.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::demographics::Gender;

/// Patient status cohort. Living and deceased records are counted under
/// different conventions and are never merged before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatientStatus {
    Living,
    Deceased,
}

impl PatientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PatientStatus::Living => "living",
            PatientStatus::Deceased => "deceased",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One opt-out record version as held by the source.
///
/// Identifier fields are carried verbatim and may be null or malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOptOutRecord {
    pub patient_id: Option<String>,
    pub nhs_number: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub gp_practice: Option<String>,
    pub lsoa_code: Option<String>,
    pub record_start_date: Option<NaiveDate>,
    pub record_end_date: Option<NaiveDate>,
}

impl RawOptOutRecord {
    /// Whether this record version is in force at the start of `month`.
    pub fn is_active_on(&self, month: NaiveDate) -> bool {
        let started = self.record_start_date.is_none_or(|start| start <= month);
        let not_ended = self.record_end_date.is_none_or(|end| end >= month);
        started && not_ended
    }

    /// Cohort of the patient at the start of `month`.
    pub fn status_on(&self, month: NaiveDate) -> PatientStatus {
        match self.date_of_death {
            Some(death) if death <= month => PatientStatus::Deceased,
            _ => PatientStatus::Living,
        }
    }
}

/// A record after validation and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub month: NaiveDate,
    pub status: PatientStatus,
    pub patient_id: Option<String>,
    /// Valid NHS number, or `None` when the source value failed validation.
    pub nhs_number: Option<String>,
    pub gender: Gender,
    pub age_band: String,
    /// Trimmed practice code; `None` aggregates as Unallocated.
    pub gp_practice: Option<String>,
    /// Well-formed LSOA code; `None` aggregates as Unallocated.
    pub lsoa_code: Option<String>,
}

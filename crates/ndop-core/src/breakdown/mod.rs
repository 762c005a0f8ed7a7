//! Breakdown Builders.
//!
//! Each builder reads the accumulated cohorts of a [`PeriodDataset`] and
//! produces one publication table. Builders never touch the source; all
//! geography comes from the period's immutable mappings.

pub mod age_gender;
pub mod headline;
pub mod registration;
pub mod residence;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info_span};

use ndop_model::AgeBands;

pub use age_gender::{AgeGenderRow, AgeGenderTable, build_age_gender};
pub use headline::{
    ENGLAND_CODE, ENGLAND_NAME, ENGLAND_ONS_CODE, HeadlineRow, HeadlineTable, build_headline,
};
pub use registration::{
    PracticeRow, PracticeTable, RegistrationTable, SubIcbRow, build_practices, build_registration,
};
pub use residence::{ResidenceRow, ResidenceTable, build_residence};

use crate::accumulator::AccumulatedFrame;
use crate::aggregator::PeriodDataset;
use crate::error::Result;
use crate::frame::{ACH_DATE, grouped_counts, month_key};

/// Opt-out rate as a percentage of list size. Undefined without a positive
/// denominator.
pub fn opt_out_rate(opt_out: u64, list_size: Option<u64>) -> Option<f64> {
    match list_size {
        Some(list_size) if list_size > 0 => Some(100.0 * opt_out as f64 / list_size as f64),
        _ => None,
    }
}

/// Counts of one cohort keyed by month, then by the values of `keys`.
pub(crate) type MonthlyCounts = BTreeMap<NaiveDate, BTreeMap<Vec<Option<String>>, u64>>;

pub(crate) fn cohort_counts(frame: &AccumulatedFrame, keys: &[&str]) -> Result<MonthlyCounts> {
    let mut group_keys = Vec::with_capacity(keys.len() + 1);
    group_keys.push(ACH_DATE);
    group_keys.extend_from_slice(keys);

    let mut counts: MonthlyCounts = BTreeMap::new();
    for (mut key, count) in grouped_counts(&frame.data, &group_keys)? {
        let month = month_key(key.first().and_then(|value| value.as_deref()))?;
        key.remove(0);
        *counts.entry(month).or_default().entry(key).or_insert(0) += count;
    }
    Ok(counts)
}

/// Every table of one publication.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownTables {
    pub headline: HeadlineTable,
    pub age_gender: AgeGenderTable,
    pub registration: RegistrationTable,
    pub practices: PracticeTable,
    pub residence: ResidenceTable,
}

/// Build every table from one dataset.
pub fn build_all(dataset: &PeriodDataset, bands: &AgeBands) -> Result<BreakdownTables> {
    let build_span = info_span!("breakdowns");
    build_span.in_scope(|| {
        let start = Instant::now();
        let tables = BreakdownTables {
            headline: build_headline(dataset)?,
            age_gender: build_age_gender(dataset, bands)?,
            registration: build_registration(dataset)?,
            practices: build_practices(dataset)?,
            residence: build_residence(dataset)?,
        };
        debug!(
            headline_rows = tables.headline.rows.len(),
            age_gender_rows = tables.age_gender.rows.len(),
            registration_rows = tables.registration.rows.len(),
            practice_rows = tables.practices.rows.len(),
            residence_rows = tables.residence.rows.len(),
            duration_ms = start.elapsed().as_millis(),
            "built breakdown tables"
        );
        Ok(tables)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_needs_a_positive_denominator() {
        assert_eq!(opt_out_rate(5, Some(200)), Some(2.5));
        assert_eq!(opt_out_rate(5, Some(0)), None);
        assert_eq!(opt_out_rate(5, None), None);
    }
}

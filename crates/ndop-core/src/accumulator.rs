//! Month-by-month accumulation of cohort frames.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use tracing::debug;

use ndop_model::PatientStatus;

use crate::error::{PipelineError, Result};
use crate::frame::{MonthlyFrame, cohort_frame};

/// Accumulates one cohort across the reporting period.
///
/// Months must arrive in strictly increasing order. Each appended month's
/// unsplit row count is recorded as the total every breakdown must reconcile
/// to. Chunks are compacted into one contiguous buffer every
/// `compact_every` appends so the chunk list stays short.
#[derive(Debug)]
pub struct CohortAccumulator {
    status: PatientStatus,
    data: DataFrame,
    totals: BTreeMap<NaiveDate, u64>,
    compact_every: usize,
    since_compaction: usize,
}

impl CohortAccumulator {
    pub fn new(status: PatientStatus, compact_every: usize) -> Result<Self> {
        Ok(Self {
            status,
            data: cohort_frame(&[])?,
            totals: BTreeMap::new(),
            compact_every,
            since_compaction: 0,
        })
    }

    pub fn status(&self) -> PatientStatus {
        self.status
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn totals(&self) -> &BTreeMap<NaiveDate, u64> {
        &self.totals
    }

    /// Append a month, taking ownership of its frame.
    pub fn append(&mut self, month: MonthlyFrame) -> Result<()> {
        if month.status != self.status {
            return Err(PipelineError::InvalidInput(format!(
                "cannot append a {} frame to the {} accumulation",
                month.status, self.status
            )));
        }
        if let Some(last) = self.totals.keys().next_back()
            && month.month <= *last
        {
            return Err(PipelineError::InvalidInput(format!(
                "month {} appended after {last}; months must be strictly increasing",
                month.month
            )));
        }

        let rows = month.height() as u64;
        self.data.vstack_mut(&month.data)?;
        self.totals.insert(month.month, rows);
        drop(month);

        self.since_compaction += 1;
        if self.compact_every > 0 && self.since_compaction >= self.compact_every {
            self.data.as_single_chunk_par();
            self.since_compaction = 0;
        }
        debug!(
            cohort = %self.status,
            rows,
            accumulated_rows = self.data.height(),
            "appended month"
        );
        Ok(())
    }

    pub fn finish(mut self) -> AccumulatedFrame {
        self.data.as_single_chunk_par();
        AccumulatedFrame {
            status: self.status,
            data: self.data,
            totals: self.totals,
        }
    }
}

/// Cleaned records of one cohort over the whole period.
#[derive(Debug, Clone)]
pub struct AccumulatedFrame {
    pub status: PatientStatus,
    pub data: DataFrame,
    pub totals: BTreeMap<NaiveDate, u64>,
}

impl AccumulatedFrame {
    pub fn total(&self, month: NaiveDate) -> u64 {
        self.totals.get(&month).copied().unwrap_or(0)
    }

    pub fn months(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.totals.keys().copied()
    }
}

/// Unsplit totals for both cohorts, keyed by month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlyTotals {
    pub living: BTreeMap<NaiveDate, u64>,
    pub deceased: BTreeMap<NaiveDate, u64>,
}

impl MonthlyTotals {
    pub fn from_frames(living: &AccumulatedFrame, deceased: &AccumulatedFrame) -> Self {
        Self {
            living: living.totals.clone(),
            deceased: deceased.totals.clone(),
        }
    }

    pub fn get(&self, status: PatientStatus, month: NaiveDate) -> u64 {
        let totals = match status {
            PatientStatus::Living => &self.living,
            PatientStatus::Deceased => &self.deceased,
        };
        totals.get(&month).copied().unwrap_or(0)
    }

    /// Every month with a total in either cohort.
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut months: Vec<NaiveDate> = self
            .living
            .keys()
            .chain(self.deceased.keys())
            .copied()
            .collect();
        months.sort_unstable();
        months.dedup();
        months
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndop_model::{CleanedRecord, Gender};

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, 1).expect("date")
    }

    fn frame(m: u32, rows: usize) -> MonthlyFrame {
        let records: Vec<CleanedRecord> = (0..rows)
            .map(|idx| CleanedRecord {
                month: month(m),
                status: PatientStatus::Living,
                patient_id: Some(format!("p{idx}")),
                nhs_number: None,
                gender: Gender::Female,
                age_band: "40-49".to_string(),
                gp_practice: None,
                lsoa_code: None,
            })
            .collect();
        MonthlyFrame::from_records(month(m), PatientStatus::Living, &records).expect("frame")
    }

    #[test]
    fn records_totals_and_compacts() {
        let mut acc = CohortAccumulator::new(PatientStatus::Living, 2).expect("accumulator");
        acc.append(frame(1, 3)).expect("append");
        acc.append(frame(2, 0)).expect("append");
        acc.append(frame(3, 2)).expect("append");
        assert_eq!(acc.height(), 5);

        let done = acc.finish();
        assert_eq!(done.total(month(1)), 3);
        assert_eq!(done.total(month(2)), 0);
        assert_eq!(done.total(month(3)), 2);
        assert_eq!(done.months().count(), 3);
        assert_eq!(done.data.first_col_n_chunks(), 1);
    }

    #[test]
    fn rejects_out_of_order_and_wrong_cohort() {
        let mut acc = CohortAccumulator::new(PatientStatus::Living, 0).expect("accumulator");
        acc.append(frame(2, 1)).expect("append");
        assert!(acc.append(frame(2, 1)).is_err());
        assert!(acc.append(frame(1, 1)).is_err());

        let mut deceased = CohortAccumulator::new(PatientStatus::Deceased, 0).expect("accumulator");
        assert!(deceased.append(frame(3, 1)).is_err());
    }
}

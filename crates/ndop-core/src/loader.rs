use chrono::NaiveDate;
use tracing::debug;

use ndop_ingest::OptOutSource;
use ndop_model::{CleaningRules, ListSize, PatientStatus, RawOptOutRecord};

use crate::error::Result;

/// Raw inputs for one month, partitioned by cohort.
#[derive(Debug, Clone)]
pub struct MonthlyLoad {
    pub month: NaiveDate,
    pub living: Vec<RawOptOutRecord>,
    pub deceased: Vec<RawOptOutRecord>,
    /// Active practices only; inactive practices have no entry.
    pub list_size: ListSize,
}

pub struct MonthlyLoader<'a, S: OptOutSource + ?Sized> {
    source: &'a S,
    rules: &'a CleaningRules,
}

impl<'a, S: OptOutSource + ?Sized> MonthlyLoader<'a, S> {
    pub fn new(source: &'a S, rules: &'a CleaningRules) -> Self {
        Self { source, rules }
    }

    /// Fetch records and list size for `month`. A month that has not landed
    /// fails with `DataUnavailable`.
    pub fn load(&self, month: NaiveDate) -> Result<MonthlyLoad> {
        let records = self.source.opt_out_records(month)?;
        let list_size_rows = self.source.list_size(month)?;

        let (deceased, living): (Vec<_>, Vec<_>) = records
            .into_iter()
            .filter(|record| record.is_active_on(month))
            .partition(|record| record.status_on(month) == PatientStatus::Deceased);
        let list_size = ListSize::from_records(
            month,
            list_size_rows,
            &self.rules.age_bands,
            self.rules.max_age,
        );
        debug!(
            %month,
            living = living.len(),
            deceased = deceased.len(),
            active_practices = list_size.by_practice.len(),
            "loaded month"
        );
        Ok(MonthlyLoad {
            month,
            living,
            deceased,
            list_size,
        })
    }
}

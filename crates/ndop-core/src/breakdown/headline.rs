//! National totals per month.

use chrono::NaiveDate;

use ndop_model::ListSize;

use crate::aggregator::PeriodDataset;
use crate::breakdown::{cohort_counts, opt_out_rate};
use crate::error::Result;

pub const ENGLAND_ONS_CODE: &str = "E92000001";
pub const ENGLAND_CODE: &str = "Eng";
pub const ENGLAND_NAME: &str = "England";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineRow {
    pub month: NaiveDate,
    pub opt_out: u64,
    pub list_size: u64,
    pub deceased: u64,
}

impl HeadlineRow {
    pub fn opt_out_rate(&self) -> Option<f64> {
        opt_out_rate(self.opt_out, Some(self.list_size))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlineTable {
    pub rows: Vec<HeadlineRow>,
}

impl HeadlineTable {
    pub fn latest(&self) -> Option<&HeadlineRow> {
        self.rows.iter().max_by_key(|row| row.month)
    }
}

pub fn build_headline(dataset: &PeriodDataset) -> Result<HeadlineTable> {
    let living = cohort_counts(&dataset.living, &[])?;
    let deceased = cohort_counts(&dataset.deceased, &[])?;
    let mut rows: Vec<HeadlineRow> = dataset
        .period
        .months()
        .into_iter()
        .map(|month| HeadlineRow {
            month,
            opt_out: living.get(&month).map_or(0, |groups| groups.values().sum()),
            list_size: dataset.list_size(month).map_or(0, ListSize::total),
            deceased: deceased.get(&month).map_or(0, |groups| groups.values().sum()),
        })
        .collect();
    rows.sort_by(|a, b| b.month.cmp(&a.month));
    Ok(HeadlineTable { rows })
}

//! Opt-outs by geography of the registered practice.
//!
//! Practices are placed in the Sub-ICB their month's mapping gives them.
//! Records without a practice, inactive practices and unmapped practices
//! all count towards a single Unallocated row per month. Every Sub-ICB with
//! an active practice is reported, including those with no opt-outs.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use ndop_model::{GeographyArea, GeographyMapping, ListSize, PracticeGeography, UNALLOCATED};

use crate::aggregator::PeriodDataset;
use crate::breakdown::{MonthlyCounts, cohort_counts, opt_out_rate};
use crate::error::Result;
use crate::frame::GP_PRACTICE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubIcbRow {
    pub month: NaiveDate,
    pub sub_icb: GeographyArea,
    pub icb: GeographyArea,
    pub region: GeographyArea,
    pub opt_out: u64,
    /// Patients at active practices placed in this Sub-ICB.
    pub list_size: u64,
    pub deceased: u64,
}

impl SubIcbRow {
    fn empty(month: NaiveDate, geography: Option<&PracticeGeography>) -> Self {
        let (sub_icb, icb, region) = match geography {
            Some(geography) => (
                geography.sub_icb.clone(),
                geography.icb.clone(),
                geography.region.clone(),
            ),
            None => (
                GeographyArea::unallocated(),
                GeographyArea::unallocated(),
                GeographyArea::unallocated(),
            ),
        };
        Self {
            month,
            sub_icb,
            icb,
            region,
            opt_out: 0,
            list_size: 0,
            deceased: 0,
        }
    }

    pub fn opt_out_rate(&self) -> Option<f64> {
        opt_out_rate(self.opt_out, Some(self.list_size))
    }

    pub fn is_unallocated(&self) -> bool {
        self.sub_icb.is_unallocated()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationTable {
    pub rows: Vec<SubIcbRow>,
}

impl RegistrationTable {
    pub fn unallocated(&self, month: NaiveDate) -> Option<&SubIcbRow> {
        self.rows
            .iter()
            .find(|row| row.month == month && row.is_unallocated())
    }
}

/// Practice-level view of the registration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeRow {
    pub month: NaiveDate,
    pub practice_code: String,
    pub practice_name: Option<String>,
    pub postcode: Option<String>,
    pub sub_icb: GeographyArea,
    pub opt_out: u64,
    /// `None` for inactive practices.
    pub list_size: Option<u64>,
    pub deceased: u64,
}

impl PracticeRow {
    pub fn opt_out_rate(&self) -> Option<f64> {
        opt_out_rate(self.opt_out, self.list_size)
    }

    pub fn is_unallocated(&self) -> bool {
        self.practice_code == UNALLOCATED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PracticeTable {
    pub rows: Vec<PracticeRow>,
}

fn practice_counts(counts: &MonthlyCounts, month: NaiveDate) -> Vec<(Option<&str>, u64)> {
    counts
        .get(&month)
        .map(|groups| {
            groups
                .iter()
                .map(|(key, count)| (key.first().and_then(|code| code.as_deref()), *count))
                .collect()
        })
        .unwrap_or_default()
}

fn sub_icb_key(geography: Option<&PracticeGeography>) -> String {
    geography.map_or_else(|| UNALLOCATED.to_string(), |geography| geography.sub_icb.code.clone())
}

/// Unallocated sorts after every Sub-ICB.
fn unallocated_last(unallocated: bool, code: &str) -> (bool, String) {
    (unallocated, code.to_string())
}

pub fn build_registration(dataset: &PeriodDataset) -> Result<RegistrationTable> {
    let living = cohort_counts(&dataset.living, &[GP_PRACTICE])?;
    let deceased = cohort_counts(&dataset.deceased, &[GP_PRACTICE])?;
    let empty_list = ListSize::default();

    let mut rows = Vec::new();
    for month in dataset.period.months() {
        let fallback = GeographyMapping::new(month);
        let mapping = dataset.geography.month(month).unwrap_or(&fallback);
        let list_size = dataset.list_size(month).unwrap_or(&empty_list);

        let mut by_sub_icb: BTreeMap<String, SubIcbRow> = BTreeMap::new();
        by_sub_icb.insert(UNALLOCATED.to_string(), SubIcbRow::empty(month, None));

        for (practice, patients) in &list_size.by_practice {
            let geography = mapping.practice(Some(practice.as_str()));
            by_sub_icb
                .entry(sub_icb_key(geography))
                .or_insert_with(|| SubIcbRow::empty(month, geography))
                .list_size += patients;
        }
        for (practice, count) in practice_counts(&living, month) {
            let geography = mapping.practice(practice);
            by_sub_icb
                .entry(sub_icb_key(geography))
                .or_insert_with(|| SubIcbRow::empty(month, geography))
                .opt_out += count;
        }
        for (practice, count) in practice_counts(&deceased, month) {
            let geography = mapping.practice(practice);
            by_sub_icb
                .entry(sub_icb_key(geography))
                .or_insert_with(|| SubIcbRow::empty(month, geography))
                .deceased += count;
        }
        rows.extend(by_sub_icb.into_values());
    }
    rows.sort_by(|a, b| {
        b.month.cmp(&a.month).then_with(|| {
            unallocated_last(a.is_unallocated(), &a.sub_icb.code)
                .cmp(&unallocated_last(b.is_unallocated(), &b.sub_icb.code))
        })
    });
    Ok(RegistrationTable { rows })
}

pub fn build_practices(dataset: &PeriodDataset) -> Result<PracticeTable> {
    let living = cohort_counts(&dataset.living, &[GP_PRACTICE])?;
    let deceased = cohort_counts(&dataset.deceased, &[GP_PRACTICE])?;
    let empty_list = ListSize::default();

    let mut rows = Vec::new();
    for month in dataset.period.months() {
        let fallback = GeographyMapping::new(month);
        let mapping = dataset.geography.month(month).unwrap_or(&fallback);
        let list_size = dataset.list_size(month).unwrap_or(&empty_list);

        let new_row = |code: Option<&str>| {
            let geography = mapping.practice(code);
            PracticeRow {
                month,
                practice_code: code.unwrap_or(UNALLOCATED).to_string(),
                practice_name: geography.and_then(|geography| geography.practice_name.clone()),
                postcode: geography.and_then(|geography| geography.postcode.clone()),
                sub_icb: geography
                    .map_or_else(GeographyArea::unallocated, |geography| {
                        geography.sub_icb.clone()
                    }),
                opt_out: 0,
                list_size: code.and_then(|code| list_size.practice(code)),
                deceased: 0,
            }
        };

        let mut by_practice: BTreeMap<Option<String>, PracticeRow> = BTreeMap::new();
        for practice in list_size.by_practice.keys() {
            by_practice.insert(Some(practice.clone()), new_row(Some(practice.as_str())));
        }
        for (practice, count) in practice_counts(&living, month) {
            by_practice
                .entry(practice.map(str::to_string))
                .or_insert_with(|| new_row(practice))
                .opt_out += count;
        }
        for (practice, count) in practice_counts(&deceased, month) {
            by_practice
                .entry(practice.map(str::to_string))
                .or_insert_with(|| new_row(practice))
                .deceased += count;
        }
        rows.extend(by_practice.into_values());
    }
    rows.sort_by(|a, b| {
        b.month.cmp(&a.month).then_with(|| {
            unallocated_last(a.is_unallocated(), &a.practice_code)
                .cmp(&unallocated_last(b.is_unallocated(), &b.practice_code))
        })
    });
    Ok(PracticeTable { rows })
}

//! Opt-outs by residence LSOA.
//!
//! Invalid, missing and unmapped LSOA codes share one Unallocated row per
//! month whose geography fields are all Unallocated.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use ndop_model::{GeographyArea, GeographyMapping, LsoaGeography, UNALLOCATED};

use crate::aggregator::PeriodDataset;
use crate::breakdown::{MonthlyCounts, cohort_counts};
use crate::error::Result;
use crate::frame::LSOA_CODE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidenceRow {
    pub month: NaiveDate,
    pub lsoa_code: String,
    pub lsoa_name: Option<String>,
    pub sub_icb: GeographyArea,
    pub local_authority: GeographyArea,
    pub opt_out: u64,
    pub deceased: u64,
}

impl ResidenceRow {
    fn empty(month: NaiveDate, geography: Option<&LsoaGeography>) -> Self {
        match geography {
            Some(geography) => Self {
                month,
                lsoa_code: geography.lsoa_code.clone(),
                lsoa_name: geography.lsoa_name.clone(),
                sub_icb: geography.sub_icb.clone(),
                local_authority: geography.local_authority.clone(),
                opt_out: 0,
                deceased: 0,
            },
            None => Self {
                month,
                lsoa_code: UNALLOCATED.to_string(),
                lsoa_name: Some(UNALLOCATED.to_string()),
                sub_icb: GeographyArea::unallocated(),
                local_authority: GeographyArea::unallocated(),
                opt_out: 0,
                deceased: 0,
            },
        }
    }

    pub fn is_unallocated(&self) -> bool {
        self.lsoa_code == UNALLOCATED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidenceTable {
    pub rows: Vec<ResidenceRow>,
}

fn accumulate(
    rows: &mut BTreeMap<String, ResidenceRow>,
    counts: &MonthlyCounts,
    month: NaiveDate,
    mapping: &GeographyMapping,
    mut add: impl FnMut(&mut ResidenceRow, u64),
) {
    let Some(groups) = counts.get(&month) else {
        return;
    };
    for (key, count) in groups {
        let geography = mapping.lsoa(key.first().and_then(|code| code.as_deref()));
        let row_key = geography.map_or_else(
            || UNALLOCATED.to_string(),
            |geography| geography.lsoa_code.clone(),
        );
        let row = rows
            .entry(row_key)
            .or_insert_with(|| ResidenceRow::empty(month, geography));
        add(row, *count);
    }
}

pub fn build_residence(dataset: &PeriodDataset) -> Result<ResidenceTable> {
    let living = cohort_counts(&dataset.living, &[LSOA_CODE])?;
    let deceased = cohort_counts(&dataset.deceased, &[LSOA_CODE])?;

    let mut rows = Vec::new();
    for month in dataset.period.months() {
        let fallback = GeographyMapping::new(month);
        let mapping = dataset.geography.month(month).unwrap_or(&fallback);

        let mut by_lsoa: BTreeMap<String, ResidenceRow> = BTreeMap::new();
        accumulate(&mut by_lsoa, &living, month, mapping, |row, count| {
            row.opt_out += count;
        });
        accumulate(&mut by_lsoa, &deceased, month, mapping, |row, count| {
            row.deceased += count;
        });
        rows.extend(by_lsoa.into_values());
    }
    rows.sort_by(|a, b| {
        b.month
            .cmp(&a.month)
            .then_with(|| a.is_unallocated().cmp(&b.is_unallocated()))
            .then_with(|| a.lsoa_code.cmp(&b.lsoa_code))
    });
    Ok(ResidenceTable { rows })
}

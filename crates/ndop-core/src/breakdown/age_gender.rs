//! Opt-outs by age band and gender.
//!
//! Living rows cover every band crossed with the known genders, a band total
//! over known genders, a total for every gender (Unknown included) and the
//! overall total. Unknown-gender records are never split by age. Deceased
//! records are counted by gender only.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use ndop_model::{ALL_DECEASED_LABEL, ALL_LABEL, AgeBands, Gender, ListSize};

use crate::aggregator::PeriodDataset;
use crate::breakdown::{MonthlyCounts, cohort_counts, opt_out_rate};
use crate::error::{PipelineError, Result};
use crate::frame::{AGE_BAND, GENDER};

#[derive(Debug, Clone, PartialEq)]
pub struct AgeGenderRow {
    pub month: NaiveDate,
    pub age_band: String,
    pub gender: String,
    pub opt_out: u64,
    /// `None` for deceased rows and categories the list size does not cover.
    pub list_size: Option<u64>,
}

impl AgeGenderRow {
    fn new(
        month: NaiveDate,
        age_band: &str,
        gender: &str,
        opt_out: u64,
        list_size: Option<u64>,
    ) -> Self {
        Self {
            month,
            age_band: age_band.to_string(),
            gender: gender.to_string(),
            opt_out,
            list_size,
        }
    }

    pub fn opt_out_rate(&self) -> Option<f64> {
        opt_out_rate(self.opt_out, self.list_size)
    }

    /// Whether the row splits a cohort by age.
    pub fn is_age_disaggregated(&self) -> bool {
        self.age_band != ALL_LABEL && self.age_band != ALL_DECEASED_LABEL
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgeGenderTable {
    pub rows: Vec<AgeGenderRow>,
}

impl AgeGenderTable {
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut months: Vec<NaiveDate> = self.rows.iter().map(|row| row.month).collect();
        months.sort_unstable();
        months.dedup();
        months
    }

    pub fn row(&self, month: NaiveDate, age_band: &str, gender: &str) -> Option<&AgeGenderRow> {
        self.rows
            .iter()
            .find(|row| row.month == month && row.age_band == age_band && row.gender == gender)
    }
}

type Cells = BTreeMap<(String, Gender), u64>;

fn cells(counts: &MonthlyCounts, month: NaiveDate) -> Result<Cells> {
    let mut cells = Cells::new();
    let Some(groups) = counts.get(&month) else {
        return Ok(cells);
    };
    for (key, count) in groups {
        let band = key.first().cloned().flatten().unwrap_or_default();
        let label = key.get(1).cloned().flatten().unwrap_or_default();
        let gender = Gender::from_label(&label).ok_or_else(|| {
            PipelineError::InvalidInput(format!("unrecognised gender label '{label}'"))
        })?;
        *cells.entry((band, gender)).or_insert(0) += count;
    }
    Ok(cells)
}

fn gender_total(cells: &Cells, gender: Gender) -> u64 {
    cells
        .iter()
        .filter(|((_, g), _)| *g == gender)
        .map(|(_, count)| *count)
        .sum()
}

/// Combined list size of the known genders in a band.
fn known_gender_list_size(list_size: Option<&ListSize>, band: &str) -> Option<u64> {
    let list_size = list_size?;
    let sizes: Vec<u64> = Gender::ALL
        .into_iter()
        .filter(|gender| gender.is_known())
        .filter_map(|gender| list_size.for_band_and_gender(band, gender))
        .collect();
    (!sizes.is_empty()).then(|| sizes.iter().sum())
}

fn living_rows(
    month: NaiveDate,
    cells: &Cells,
    list_size: Option<&ListSize>,
    bands: &AgeBands,
    rows: &mut Vec<AgeGenderRow>,
) {
    for band in bands.labels() {
        let mut band_total = 0;
        let mut band_reported = false;
        for gender in Gender::ALL.into_iter().filter(|gender| gender.is_known()) {
            let count = cells.get(&(band.to_string(), gender)).copied().unwrap_or(0);
            let denominator = list_size.and_then(|list| list.for_band_and_gender(band, gender));
            if count > 0 || denominator.is_some() {
                rows.push(AgeGenderRow::new(month, band, gender.label(), count, denominator));
                band_reported = true;
            }
            band_total += count;
        }
        if band_reported {
            rows.push(AgeGenderRow::new(
                month,
                band,
                ALL_LABEL,
                band_total,
                known_gender_list_size(list_size, band),
            ));
        }
    }

    for gender in Gender::ALL {
        rows.push(AgeGenderRow::new(
            month,
            ALL_LABEL,
            gender.label(),
            gender_total(cells, gender),
            list_size.and_then(|list| list.for_gender(gender)),
        ));
    }

    rows.push(AgeGenderRow::new(
        month,
        ALL_LABEL,
        ALL_LABEL,
        cells.values().sum(),
        list_size.map(ListSize::total),
    ));
}

fn deceased_rows(month: NaiveDate, cells: &Cells, rows: &mut Vec<AgeGenderRow>) {
    for gender in Gender::ALL {
        let count = gender_total(cells, gender);
        if count > 0 {
            rows.push(AgeGenderRow::new(
                month,
                ALL_DECEASED_LABEL,
                gender.label(),
                count,
                None,
            ));
        }
    }
    rows.push(AgeGenderRow::new(
        month,
        ALL_DECEASED_LABEL,
        ALL_DECEASED_LABEL,
        cells.values().sum(),
        None,
    ));
}

pub fn build_age_gender(dataset: &PeriodDataset, bands: &AgeBands) -> Result<AgeGenderTable> {
    let living = cohort_counts(&dataset.living, &[AGE_BAND, GENDER])?;
    let deceased = cohort_counts(&dataset.deceased, &[AGE_BAND, GENDER])?;

    let mut rows = Vec::new();
    for month in dataset.period.months() {
        living_rows(
            month,
            &cells(&living, month)?,
            dataset.list_size(month),
            bands,
            &mut rows,
        );
        deceased_rows(month, &cells(&deceased, month)?, &mut rows);
    }
    sort_rows(&mut rows, bands);
    Ok(AgeGenderTable { rows })
}

fn gender_rank(label: &str) -> usize {
    match label {
        ALL_LABEL => 0,
        ALL_DECEASED_LABEL => 1,
        _ => match Gender::from_label(label) {
            Some(Gender::Female) => 2,
            Some(Gender::Male) => 3,
            Some(Gender::Unknown) => 4,
            None => 5,
        },
    }
}

/// Configured bands, then `All`, `Unknown` and `All deceased`.
fn band_rank(label: &str, bands: &AgeBands) -> usize {
    let configured = bands.specs().len();
    match label {
        ALL_LABEL => configured,
        ALL_DECEASED_LABEL => configured + 2,
        _ => match bands.position(label) {
            position if position < configured => position,
            position if position == configured => configured + 1,
            _ => configured + 3,
        },
    }
}

/// Latest month first, then gender and band in publication order.
fn sort_rows(rows: &mut [AgeGenderRow], bands: &AgeBands) {
    rows.sort_by(|a, b| {
        b.month
            .cmp(&a.month)
            .then_with(|| gender_rank(&a.gender).cmp(&gender_rank(&b.gender)))
            .then_with(|| band_rank(&a.age_band, bands).cmp(&band_rank(&b.age_band, bands)))
            .then_with(|| a.age_band.cmp(&b.age_band))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndop_model::UNKNOWN_AGE_BAND;

    #[test]
    fn band_rank_places_rollups_after_bands() {
        let bands = AgeBands::ten_year();
        assert_eq!(band_rank("0-9", &bands), 0);
        assert_eq!(band_rank("90+", &bands), 9);
        assert_eq!(band_rank(ALL_LABEL, &bands), 10);
        assert_eq!(band_rank(UNKNOWN_AGE_BAND, &bands), 11);
        assert_eq!(band_rank(ALL_DECEASED_LABEL, &bands), 12);
    }

    #[test]
    fn gender_rank_follows_publication_order() {
        let mut labels = vec![
            Gender::Unknown.label(),
            Gender::Male.label(),
            ALL_DECEASED_LABEL,
            Gender::Female.label(),
            ALL_LABEL,
        ];
        labels.sort_by_key(|label| gender_rank(label));
        assert_eq!(
            labels,
            vec![
                ALL_LABEL,
                ALL_DECEASED_LABEL,
                "Female",
                "Male",
                "Unknown / Prefer not to say"
            ]
        );
    }

    #[test]
    fn unknown_gender_only_reaches_gender_totals() {
        let month = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let mut cells = Cells::new();
        cells.insert(("30-39".to_string(), Gender::Unknown), 1);
        cells.insert(("30-39".to_string(), Gender::Female), 2);
        let mut rows = Vec::new();
        living_rows(month, &cells, None, &AgeBands::ten_year(), &mut rows);

        assert!(
            rows.iter()
                .filter(|row| row.is_age_disaggregated())
                .all(|row| row.gender != Gender::Unknown.label())
        );
        let table = AgeGenderTable { rows };
        assert_eq!(
            table.row(month, ALL_LABEL, Gender::Unknown.label()).map(|row| row.opt_out),
            Some(1)
        );
        assert_eq!(table.row(month, "30-39", ALL_LABEL).map(|row| row.opt_out), Some(2));
        assert_eq!(table.row(month, ALL_LABEL, ALL_LABEL).map(|row| row.opt_out), Some(3));
    }
}

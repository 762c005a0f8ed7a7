use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::demographics::{AgeBands, Gender};

/// Registered patients at one practice for one sex and single year of age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSizeRecord {
    pub month: NaiveDate,
    pub practice_code: String,
    pub gender: Gender,
    /// Single year of age; the source caps the final year as an open group.
    pub age: Option<i64>,
    pub patients: u64,
}

/// Denominators for one month. Practices absent from the extract are inactive
/// and have no entry rather than a zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSize {
    pub month: Option<NaiveDate>,
    pub by_practice: BTreeMap<String, u64>,
    pub by_demographic: BTreeMap<(String, Gender), u64>,
}

impl ListSize {
    /// Fold long-format records into practice and band/gender totals.
    pub fn from_records(
        month: NaiveDate,
        records: impl IntoIterator<Item = ListSizeRecord>,
        bands: &AgeBands,
        max_age: u32,
    ) -> Self {
        let mut list_size = ListSize {
            month: Some(month),
            ..ListSize::default()
        };
        for record in records {
            let practice = record.practice_code.trim().to_ascii_uppercase();
            if practice.is_empty() {
                continue;
            }
            *list_size.by_practice.entry(practice).or_insert(0) += record.patients;
            let band = bands.band_for_age(record.age, max_age).to_string();
            *list_size
                .by_demographic
                .entry((band, record.gender))
                .or_insert(0) += record.patients;
        }
        list_size
    }

    pub fn is_active(&self, practice_code: &str) -> bool {
        self.by_practice.contains_key(practice_code)
    }

    pub fn practice(&self, practice_code: &str) -> Option<u64> {
        self.by_practice.get(practice_code).copied()
    }

    pub fn total(&self) -> u64 {
        self.by_practice.values().sum()
    }

    pub fn for_band_and_gender(&self, band: &str, gender: Gender) -> Option<u64> {
        self.by_demographic.get(&(band.to_string(), gender)).copied()
    }

    pub fn for_gender(&self, gender: Gender) -> Option<u64> {
        let mut found = false;
        let total: u64 = self
            .by_demographic
            .iter()
            .filter(|((_, g), _)| *g == gender)
            .inspect(|_| found = true)
            .map(|(_, patients)| *patients)
            .sum();
        found.then_some(total)
    }

    pub fn for_band(&self, band: &str) -> Option<u64> {
        let mut found = false;
        let total: u64 = self
            .by_demographic
            .iter()
            .filter(|((b, _), _)| b == band)
            .inspect(|_| found = true)
            .map(|(_, patients)| *patients)
            .sum();
        found.then_some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(practice: &str, gender: Gender, age: i64, patients: u64) -> ListSizeRecord {
        ListSizeRecord {
            month: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            practice_code: practice.to_string(),
            gender,
            age: Some(age),
            patients,
        }
    }

    #[test]
    fn folds_practice_and_demographic_totals() {
        let month = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let list = ListSize::from_records(
            month,
            vec![
                record("A81001", Gender::Female, 34, 10),
                record("A81001", Gender::Male, 35, 5),
                record(" a81002 ", Gender::Female, 91, 7),
            ],
            &AgeBands::ten_year(),
            120,
        );
        assert_eq!(list.practice("A81001"), Some(15));
        assert_eq!(list.practice("A81002"), Some(7));
        assert!(!list.is_active("A81003"));
        assert_eq!(list.total(), 22);
        assert_eq!(list.for_band_and_gender("30-39", Gender::Female), Some(10));
        assert_eq!(list.for_gender(Gender::Female), Some(17));
        assert_eq!(list.for_gender(Gender::Unknown), None);
        assert_eq!(list.for_band("90+"), Some(7));
    }
}

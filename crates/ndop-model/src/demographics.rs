//! Publication categories for gender and age.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Label for records whose age cannot be placed in a band.
pub const UNKNOWN_AGE_BAND: &str = "Unknown";
/// Roll-up label across every category of a dimension.
pub const ALL_LABEL: &str = "All";
/// Roll-up label for the deceased cohort.
pub const ALL_DECEASED_LABEL: &str = "All deceased";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Female, Gender::Male, Gender::Unknown];

    /// Map a raw source gender code. Anything unrecognised is `Unknown`.
    pub fn from_code(code: Option<&str>) -> Self {
        let Some(code) = code else {
            return Gender::Unknown;
        };
        match code.trim().to_ascii_uppercase().as_str() {
            "1" | "M" | "MALE" => Gender::Male,
            "2" | "F" | "FEMALE" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
            Gender::Unknown => "Unknown / Prefer not to say",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Gender::ALL.into_iter().find(|gender| gender.label() == label)
    }

    /// Unknown gender is never disaggregated by age.
    pub fn is_known(self) -> bool {
        !matches!(self, Gender::Unknown)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One configured age band; `max` is inclusive and absent for the final band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBandSpec {
    pub label: String,
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl AgeBandSpec {
    pub fn new(label: impl Into<String>, min: u32, max: Option<u32>) -> Self {
        Self {
            label: label.into(),
            min,
            max,
        }
    }

    fn contains(&self, age: u32) -> bool {
        age >= self.min && self.max.is_none_or(|max| age <= max)
    }
}

/// Ordered, validated set of age bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AgeBandSpec>", into = "Vec<AgeBandSpec>")]
pub struct AgeBands {
    bands: Vec<AgeBandSpec>,
}

impl AgeBands {
    /// Validate that bands start at zero, are contiguous and only the last is open-ended.
    pub fn new(bands: Vec<AgeBandSpec>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(ModelError::InvalidAgeBands("no bands configured".to_string()));
        };
        if first.min != 0 {
            return Err(ModelError::InvalidAgeBands(format!(
                "first band '{}' must start at 0",
                first.label
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for (idx, band) in bands.iter().enumerate() {
            let label = band.label.trim();
            if label.is_empty() || label == UNKNOWN_AGE_BAND || label == ALL_LABEL {
                return Err(ModelError::InvalidAgeBands(format!(
                    "band {idx} has a reserved or empty label '{label}'"
                )));
            }
            if !seen.insert(label.to_string()) {
                return Err(ModelError::InvalidAgeBands(format!(
                    "duplicate band label '{label}'"
                )));
            }
            let is_last = idx + 1 == bands.len();
            match band.max {
                Some(max) if max < band.min => {
                    return Err(ModelError::InvalidAgeBands(format!(
                        "band '{label}' ends before it starts"
                    )));
                }
                Some(max) if !is_last => {
                    let next = &bands[idx + 1];
                    if next.min != max + 1 {
                        return Err(ModelError::InvalidAgeBands(format!(
                            "band '{}' must start at {}",
                            next.label,
                            max + 1
                        )));
                    }
                }
                None if !is_last => {
                    return Err(ModelError::InvalidAgeBands(format!(
                        "only the final band may be open-ended, found '{label}'"
                    )));
                }
                _ => {}
            }
        }
        Ok(Self { bands })
    }

    /// Ten-year bands `0-9` to `80-89` plus `90+`.
    pub fn ten_year() -> Self {
        let mut bands: Vec<AgeBandSpec> = (0..9)
            .map(|decade| {
                let min = decade * 10;
                AgeBandSpec::new(format!("{min}-{}", min + 9), min, Some(min + 9))
            })
            .collect();
        bands.push(AgeBandSpec::new("90+", 90, None));
        Self { bands }
    }

    pub fn specs(&self) -> &[AgeBandSpec] {
        &self.bands
    }

    /// Band labels in publication order, followed by `Unknown`.
    pub fn labels(&self) -> Vec<&str> {
        self.bands
            .iter()
            .map(|band| band.label.as_str())
            .chain(std::iter::once(UNKNOWN_AGE_BAND))
            .collect()
    }

    /// Sort position of a label; unrecognised labels sort last.
    pub fn position(&self, label: &str) -> usize {
        self.labels()
            .iter()
            .position(|candidate| *candidate == label)
            .unwrap_or(usize::MAX)
    }

    /// Band for an age in whole years.
    pub fn band_for_age(&self, age: Option<i64>, max_age: u32) -> &str {
        let Some(age) = age else {
            return UNKNOWN_AGE_BAND;
        };
        let Ok(age) = u32::try_from(age) else {
            return UNKNOWN_AGE_BAND;
        };
        if age > max_age {
            return UNKNOWN_AGE_BAND;
        }
        self.bands
            .iter()
            .find(|band| band.contains(age))
            .map_or(UNKNOWN_AGE_BAND, |band| band.label.as_str())
    }
}

impl Default for AgeBands {
    fn default() -> Self {
        Self::ten_year()
    }
}

impl TryFrom<Vec<AgeBandSpec>> for AgeBands {
    type Error = ModelError;

    fn try_from(value: Vec<AgeBandSpec>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AgeBands> for Vec<AgeBandSpec> {
    fn from(value: AgeBands) -> Self {
        value.bands
    }
}

/// Completed years between `date_of_birth` and `on`; negative when born after `on`.
pub fn age_in_years(date_of_birth: NaiveDate, on: NaiveDate) -> i64 {
    let mut years = i64::from(on.year()) - i64::from(date_of_birth.year());
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_codes() {
        assert_eq!(Gender::from_code(Some("1")), Gender::Male);
        assert_eq!(Gender::from_code(Some(" 2 ")), Gender::Female);
        assert_eq!(Gender::from_code(Some("0")), Gender::Unknown);
        assert_eq!(Gender::from_code(Some("9")), Gender::Unknown);
        assert_eq!(Gender::from_code(Some("None")), Gender::Unknown);
        assert_eq!(Gender::from_code(None), Gender::Unknown);
        assert_eq!(
            Gender::from_label("Unknown / Prefer not to say"),
            Some(Gender::Unknown)
        );
    }

    #[test]
    fn ten_year_bands() {
        let bands = AgeBands::ten_year();
        assert_eq!(bands.band_for_age(Some(0), 120), "0-9");
        assert_eq!(bands.band_for_age(Some(34), 120), "30-39");
        assert_eq!(bands.band_for_age(Some(89), 120), "80-89");
        assert_eq!(bands.band_for_age(Some(104), 120), "90+");
        assert_eq!(bands.band_for_age(Some(121), 120), UNKNOWN_AGE_BAND);
        assert_eq!(bands.band_for_age(Some(-1), 120), UNKNOWN_AGE_BAND);
        assert_eq!(bands.band_for_age(None, 120), UNKNOWN_AGE_BAND);
        assert_eq!(bands.labels().len(), 11);
        assert_eq!(bands.position("90+"), 9);
        assert_eq!(bands.position(UNKNOWN_AGE_BAND), 10);
    }

    #[test]
    fn rejects_gapped_bands() {
        let err = AgeBands::new(vec![
            AgeBandSpec::new("0-15", 0, Some(15)),
            AgeBandSpec::new("18+", 18, None),
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidAgeBands(_)));
    }

    #[test]
    fn rejects_open_band_before_last() {
        let err = AgeBands::new(vec![
            AgeBandSpec::new("0+", 0, None),
            AgeBandSpec::new("18+", 18, None),
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidAgeBands(_)));
    }

    #[test]
    fn age_counts_completed_years() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        let before_birthday = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let after_birthday = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(age_in_years(dob, before_birthday), 33);
        assert_eq!(age_in_years(dob, after_birthday), 34);
        assert_eq!(age_in_years(after_birthday, before_birthday), -1);
    }
}

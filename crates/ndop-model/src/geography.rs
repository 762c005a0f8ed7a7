//! Registration and residence geography.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Label for practices, LSOAs and areas that cannot be allocated.
pub const UNALLOCATED: &str = "Unallocated";

/// An administrative area identified by its DH code, with ONS code and name
/// where the reference data provides them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeographyArea {
    pub code: String,
    pub ons_code: Option<String>,
    pub name: Option<String>,
}

impl GeographyArea {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ons_code: None,
            name: None,
        }
    }

    pub fn with_ons_code(mut self, ons_code: impl Into<String>) -> Self {
        self.ons_code = Some(ons_code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unallocated() -> Self {
        Self {
            code: UNALLOCATED.to_string(),
            ons_code: Some(UNALLOCATED.to_string()),
            name: Some(UNALLOCATED.to_string()),
        }
    }

    pub fn is_unallocated(&self) -> bool {
        self.code == UNALLOCATED
    }
}

/// Practice registration geography: Sub-ICB within ICB within Region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeGeography {
    pub practice_code: String,
    pub practice_name: Option<String>,
    pub postcode: Option<String>,
    pub sub_icb: GeographyArea,
    pub icb: GeographyArea,
    pub region: GeographyArea,
}

/// Residence geography of a Lower-layer Super Output Area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsoaGeography {
    pub lsoa_code: String,
    pub lsoa_name: Option<String>,
    pub sub_icb: GeographyArea,
    pub local_authority: GeographyArea,
}

/// Which provider answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MappingSource {
    Primary,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedPractice {
    Allocated {
        geography: PracticeGeography,
        source: MappingSource,
    },
    /// Inactive for the month or absent from every mapping.
    Unallocated,
}

impl ResolvedPractice {
    pub fn geography(&self) -> Option<&PracticeGeography> {
        match self {
            ResolvedPractice::Allocated { geography, .. } => Some(geography),
            ResolvedPractice::Unallocated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedLsoa {
    Allocated {
        geography: LsoaGeography,
        source: MappingSource,
    },
    Unallocated,
}

impl ResolvedLsoa {
    pub fn geography(&self) -> Option<&LsoaGeography> {
        match self {
            ResolvedLsoa::Allocated { geography, .. } => Some(geography),
            ResolvedLsoa::Unallocated => None,
        }
    }
}

/// Resolved geography for every code seen in one month's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeographyMapping {
    pub month: NaiveDate,
    pub practices: BTreeMap<String, ResolvedPractice>,
    pub lsoas: BTreeMap<String, ResolvedLsoa>,
}

impl GeographyMapping {
    pub fn new(month: NaiveDate) -> Self {
        Self {
            month,
            practices: BTreeMap::new(),
            lsoas: BTreeMap::new(),
        }
    }

    /// Geography for a practice; `None` for missing codes and Unallocated practices.
    pub fn practice(&self, code: Option<&str>) -> Option<&PracticeGeography> {
        self.practices.get(code?)?.geography()
    }

    pub fn lsoa(&self, code: Option<&str>) -> Option<&LsoaGeography> {
        self.lsoas.get(code?)?.geography()
    }

    pub fn unallocated_practice_count(&self) -> usize {
        self.practices
            .values()
            .filter(|resolved| matches!(resolved, ResolvedPractice::Unallocated))
            .count()
    }

    pub fn unallocated_lsoa_count(&self) -> usize {
        self.lsoas
            .values()
            .filter(|resolved| matches!(resolved, ResolvedLsoa::Unallocated))
            .count()
    }
}

/// Mappings for every month of a period. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodGeography {
    months: BTreeMap<NaiveDate, GeographyMapping>,
}

impl PeriodGeography {
    pub fn insert(&mut self, mapping: GeographyMapping) {
        self.months.insert(mapping.month, mapping);
    }

    pub fn month(&self, month: NaiveDate) -> Option<&GeographyMapping> {
        self.months.get(&month)
    }

    pub fn months(&self) -> impl Iterator<Item = &GeographyMapping> {
        self.months.values()
    }
}

//! Source traits for opt-out records, list sizes and reference geography.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use ndop_model::{
    GeographyArea, ListSizeRecord, LsoaGeography, PracticeGeography, RawOptOutRecord,
};

use crate::error::{Dataset, Result, SourceError};

/// Monthly opt-out records and list-size denominators.
///
/// A month that has not landed is reported as [`SourceError::MonthUnavailable`],
/// never as an empty result.
pub trait OptOutSource {
    /// Record versions in force at the start of `month`.
    fn opt_out_records(&self, month: NaiveDate) -> Result<Vec<RawOptOutRecord>>;

    /// Long-format list size rows extracted for `month`.
    fn list_size(&self, month: NaiveDate) -> Result<Vec<ListSizeRecord>>;
}

/// Entries of one reference table effective for a month, with the date the
/// table was last refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSnapshot<T> {
    pub as_of: Option<NaiveDate>,
    pub entries: BTreeMap<String, T>,
}

impl<T> Default for ReferenceSnapshot<T> {
    fn default() -> Self {
        Self {
            as_of: None,
            entries: BTreeMap::new(),
        }
    }
}

/// Current reference tables: practices and LSOAs with their geography.
pub trait ReferenceSource {
    /// Open practices on `month`, keyed by practice code.
    fn practices(&self, month: NaiveDate) -> Result<ReferenceSnapshot<PracticeGeography>>;

    /// LSOA residence geography effective on `month`, keyed by LSOA code.
    fn lsoas(&self, month: NaiveDate) -> Result<ReferenceSnapshot<LsoaGeography>>;
}

/// In-memory source for fixtures and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub records: Vec<RawOptOutRecord>,
    pub list_sizes: Vec<ListSizeRecord>,
    pub landed: BTreeSet<(Dataset, NaiveDate)>,
    pub practices: Vec<PracticeGeography>,
    pub lsoas: Vec<LsoaGeography>,
    pub reference_as_of: Option<NaiveDate>,
}

impl MemorySource {
    /// Mark both monthly datasets as landed for `month`.
    pub fn land(&mut self, month: NaiveDate) -> &mut Self {
        self.landed.insert((Dataset::OptOutRecords, month));
        self.landed.insert((Dataset::ListSize, month));
        self
    }

    fn ensure_landed(&self, dataset: Dataset, month: NaiveDate) -> Result<()> {
        if self.landed.contains(&(dataset, month)) {
            Ok(())
        } else {
            Err(SourceError::MonthUnavailable { dataset, month })
        }
    }
}

impl OptOutSource for MemorySource {
    fn opt_out_records(&self, month: NaiveDate) -> Result<Vec<RawOptOutRecord>> {
        self.ensure_landed(Dataset::OptOutRecords, month)?;
        Ok(self
            .records
            .iter()
            .filter(|record| record.is_active_on(month))
            .cloned()
            .collect())
    }

    fn list_size(&self, month: NaiveDate) -> Result<Vec<ListSizeRecord>> {
        self.ensure_landed(Dataset::ListSize, month)?;
        Ok(self
            .list_sizes
            .iter()
            .filter(|record| record.month == month)
            .cloned()
            .collect())
    }
}

impl ReferenceSource for MemorySource {
    fn practices(&self, _month: NaiveDate) -> Result<ReferenceSnapshot<PracticeGeography>> {
        Ok(ReferenceSnapshot {
            as_of: self.reference_as_of,
            entries: self
                .practices
                .iter()
                .map(|practice| (practice.practice_code.clone(), practice.clone()))
                .collect(),
        })
    }

    fn lsoas(&self, _month: NaiveDate) -> Result<ReferenceSnapshot<LsoaGeography>> {
        Ok(ReferenceSnapshot {
            as_of: self.reference_as_of,
            entries: self
                .lsoas
                .iter()
                .map(|lsoa| (lsoa.lsoa_code.clone(), lsoa.clone()))
                .collect(),
        })
    }
}

/// Look up an area by DH code, keeping the bare code when no name is known.
pub(crate) fn area_or_code(
    areas: &BTreeMap<String, GeographyArea>,
    code: &str,
) -> GeographyArea {
    areas
        .get(code)
        .cloned()
        .unwrap_or_else(|| GeographyArea::new(code))
}

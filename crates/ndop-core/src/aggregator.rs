//! Temporal Aggregator.
//!
//! Drives load, clean and resolve one month at a time in chronological order.
//! Each month's raw rows and cleaned records are released once its frames
//! have been handed to the cohort accumulators, so peak memory is one month
//! of intermediates plus the two running accumulations.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, info_span};

use ndop_ingest::{OptOutSource, ReferenceSource};
use ndop_model::{
    CleanedRecord, ListSize, PatientStatus, PeriodGeography, PublicationConfig, ReportingPeriod,
};

use crate::accumulator::{AccumulatedFrame, CohortAccumulator, MonthlyTotals};
use crate::cleaner::{CleaningReport, RecordCleaner};
use crate::error::Result;
use crate::frame::MonthlyFrame;
use crate::loader::{MonthlyLoad, MonthlyLoader};
use crate::reference::ReferenceResolver;

/// Everything the breakdown builders need for one reporting period.
#[derive(Debug, Clone)]
pub struct PeriodDataset {
    pub period: ReportingPeriod,
    pub living: AccumulatedFrame,
    pub deceased: AccumulatedFrame,
    pub totals: MonthlyTotals,
    pub list_sizes: BTreeMap<NaiveDate, ListSize>,
    pub geography: PeriodGeography,
    pub cleaning: BTreeMap<(NaiveDate, PatientStatus), CleaningReport>,
}

impl PeriodDataset {
    /// Accumulated frame of one cohort.
    pub fn cohort(&self, status: PatientStatus) -> &AccumulatedFrame {
        match status {
            PatientStatus::Living => &self.living,
            PatientStatus::Deceased => &self.deceased,
        }
    }

    pub fn list_size(&self, month: NaiveDate) -> Option<&ListSize> {
        self.list_sizes.get(&month)
    }
}

pub struct TemporalAggregator<'a, S: OptOutSource + ReferenceSource + ?Sized> {
    loader: MonthlyLoader<'a, S>,
    cleaner: RecordCleaner<'a>,
    resolver: ReferenceResolver<'a, S>,
    compact_every: usize,
}

impl<'a, S: OptOutSource + ReferenceSource + ?Sized> TemporalAggregator<'a, S> {
    /// Prepare the per-month components. Fallback mapping files are read
    /// here so a malformed file fails the run before any month is loaded.
    pub fn new(source: &'a S, config: &'a PublicationConfig) -> Result<Self> {
        Ok(Self {
            loader: MonthlyLoader::new(source, &config.cleaning),
            cleaner: RecordCleaner::new(&config.cleaning)?,
            resolver: ReferenceResolver::new(source, &config.geography)?,
            compact_every: config.aggregation.compact_every,
        })
    }

    /// Build the dataset with an already constructed resolver.
    pub fn with_resolver(
        source: &'a S,
        config: &'a PublicationConfig,
        resolver: ReferenceResolver<'a, S>,
    ) -> Result<Self> {
        Ok(Self {
            loader: MonthlyLoader::new(source, &config.cleaning),
            cleaner: RecordCleaner::new(&config.cleaning)?,
            resolver,
            compact_every: config.aggregation.compact_every,
        })
    }

    /// Process every month of `period` in order. The first unavailable
    /// month aborts the run; no partial dataset is returned.
    pub fn aggregate(&self, period: &ReportingPeriod) -> Result<PeriodDataset> {
        let start = Instant::now();
        let mut living = CohortAccumulator::new(PatientStatus::Living, self.compact_every)?;
        let mut deceased = CohortAccumulator::new(PatientStatus::Deceased, self.compact_every)?;
        let mut list_sizes = BTreeMap::new();
        let mut geography = PeriodGeography::default();
        let mut cleaning = BTreeMap::new();

        for month in period.months() {
            let month_span = info_span!("month", month = %month);
            month_span.in_scope(|| -> Result<()> {
                let month_start = Instant::now();
                let MonthlyLoad {
                    month,
                    living: raw_living,
                    deceased: raw_deceased,
                    list_size,
                } = self.loader.load(month)?;

                let cleaned_living = self.cleaner.clean(month, PatientStatus::Living, raw_living);
                let cleaned_deceased =
                    self.cleaner
                        .clean(month, PatientStatus::Deceased, raw_deceased);

                let practice_codes = practice_codes(
                    &cleaned_living.records,
                    &cleaned_deceased.records,
                    &list_size,
                );
                let lsoa_codes = lsoa_codes(&cleaned_living.records, &cleaned_deceased.records);
                let mapping =
                    self.resolver
                        .resolve(month, &practice_codes, &lsoa_codes, &list_size)?;

                living.append(MonthlyFrame::from_records(
                    month,
                    PatientStatus::Living,
                    &cleaned_living.records,
                )?)?;
                deceased.append(MonthlyFrame::from_records(
                    month,
                    PatientStatus::Deceased,
                    &cleaned_deceased.records,
                )?)?;

                log_cleaning(PatientStatus::Living, &cleaned_living.report);
                log_cleaning(PatientStatus::Deceased, &cleaned_deceased.report);
                info!(
                    living = cleaned_living.report.output_rows,
                    deceased = cleaned_deceased.report.output_rows,
                    list_size = list_size.total(),
                    practices_unallocated = mapping.unallocated_practice_count(),
                    lsoas_unallocated = mapping.unallocated_lsoa_count(),
                    duration_ms = month_start.elapsed().as_millis(),
                    "month accumulated"
                );

                cleaning.insert((month, PatientStatus::Living), cleaned_living.report);
                cleaning.insert((month, PatientStatus::Deceased), cleaned_deceased.report);
                list_sizes.insert(month, list_size);
                geography.insert(mapping);
                Ok(())
            })?;
        }

        let living = living.finish();
        let deceased = deceased.finish();
        let totals = MonthlyTotals::from_frames(&living, &deceased);
        info!(
            months = period.month_count(),
            living_rows = living.data.height(),
            deceased_rows = deceased.data.height(),
            duration_ms = start.elapsed().as_millis(),
            "period accumulated"
        );
        Ok(PeriodDataset {
            period: *period,
            living,
            deceased,
            totals,
            list_sizes,
            geography,
            cleaning,
        })
    }
}

/// Aggregate `period` from `source` with the configured rules.
pub fn aggregate_period<S: OptOutSource + ReferenceSource + ?Sized>(
    config: &PublicationConfig,
    period: &ReportingPeriod,
    source: &S,
) -> Result<PeriodDataset> {
    TemporalAggregator::new(source, config)?.aggregate(period)
}

/// Practices referenced by either cohort plus every practice with a list size.
fn practice_codes(
    living: &[CleanedRecord],
    deceased: &[CleanedRecord],
    list_size: &ListSize,
) -> BTreeSet<String> {
    living
        .iter()
        .chain(deceased)
        .filter_map(|record| record.gp_practice.clone())
        .chain(list_size.by_practice.keys().cloned())
        .collect()
}

fn lsoa_codes(living: &[CleanedRecord], deceased: &[CleanedRecord]) -> BTreeSet<String> {
    living
        .iter()
        .chain(deceased)
        .filter_map(|record| record.lsoa_code.clone())
        .collect()
}

fn log_cleaning(status: PatientStatus, report: &CleaningReport) {
    debug!(
        cohort = %status,
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        duplicates_collapsed = report.duplicates_collapsed,
        nhs_numbers_nulled = report.nhs_numbers_nulled,
        genders_defaulted = report.genders_defaulted,
        ages_unknown = report.ages_unknown,
        lsoas_invalid = report.lsoas_invalid,
        practices_missing = report.practices_missing,
        "cleaned cohort"
    );
}

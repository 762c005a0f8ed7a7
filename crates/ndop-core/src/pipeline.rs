//! End-to-end publication run: aggregate, build, reconcile.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, info_span};

use ndop_ingest::{OptOutSource, ReferenceSource};
use ndop_model::{PatientStatus, PublicationConfig, ReportingPeriod};

use crate::accumulator::MonthlyTotals;
use crate::aggregator::{PeriodDataset, aggregate_period};
use crate::breakdown::{BreakdownTables, build_all};
use crate::cleaner::CleaningReport;
use crate::error::Result;
use crate::reconcile::reconcile_all;

/// Reconciled tables of one run, ready for serialization.
///
/// The accumulated frames are dropped once the tables are built.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub period: ReportingPeriod,
    pub tables: BreakdownTables,
    pub totals: MonthlyTotals,
    pub cleaning: BTreeMap<(NaiveDate, PatientStatus), CleaningReport>,
}

impl Publication {
    /// Cleaning outcome summed over the period for one cohort.
    pub fn cleaning_totals(&self, status: PatientStatus) -> CleaningReport {
        let mut total = CleaningReport::default();
        for report in self
            .cleaning
            .iter()
            .filter(|((_, cohort), _)| *cohort == status)
            .map(|(_, report)| *report)
        {
            total += report;
        }
        total
    }
}

/// Build and reconcile every table from an aggregated dataset.
pub fn publish(dataset: PeriodDataset, config: &PublicationConfig) -> Result<Publication> {
    let tables = build_all(&dataset, &config.cleaning.age_bands)?;
    info_span!("reconcile").in_scope(|| reconcile_all(&tables, &dataset.totals))?;
    let PeriodDataset {
        period,
        totals,
        cleaning,
        ..
    } = dataset;
    Ok(Publication {
        period,
        tables,
        totals,
        cleaning,
    })
}

/// Produce the publication for `period`. Any unavailable month, malformed
/// mapping file or reconciliation mismatch fails the whole run.
pub fn run_publication<S: OptOutSource + ReferenceSource + ?Sized>(
    config: &PublicationConfig,
    period: &ReportingPeriod,
    source: &S,
) -> Result<Publication> {
    let run_span = info_span!(
        "publication",
        end_date = %period.end_date(),
        months = period.month_count()
    );
    let _run_guard = run_span.enter();
    let start = Instant::now();

    let dataset = aggregate_period(config, period, source)?;
    let publication = publish(dataset, config)?;

    info!(
        age_gender_rows = publication.tables.age_gender.rows.len(),
        registration_rows = publication.tables.registration.rows.len(),
        residence_rows = publication.tables.residence.rows.len(),
        duration_ms = start.elapsed().as_millis(),
        "publication built"
    );
    Ok(publication)
}

//! NDOP publication pipeline.
//!
//! Months are loaded, cleaned and resolved one at a time into per-cohort
//! accumulations, from which the headline, age/gender, registration and
//! residence tables are built and reconciled.

pub mod accumulator;
pub mod aggregator;
pub mod breakdown;
pub mod cleaner;
pub mod error;
pub mod frame;
pub mod loader;
pub mod pipeline;
pub mod reconcile;
pub mod redact;
pub mod reference;

pub use accumulator::{AccumulatedFrame, CohortAccumulator, MonthlyTotals};
pub use aggregator::{PeriodDataset, TemporalAggregator, aggregate_period};
pub use breakdown::{
    AgeGenderRow, AgeGenderTable, BreakdownTables, ENGLAND_CODE, ENGLAND_NAME, ENGLAND_ONS_CODE,
    HeadlineRow, HeadlineTable, PracticeRow, PracticeTable, RegistrationTable, ResidenceRow,
    ResidenceTable, SubIcbRow, build_age_gender, build_all, build_headline, build_practices,
    build_registration, build_residence, opt_out_rate,
};
pub use cleaner::{CleanedCohort, CleaningReport, RecordCleaner, is_valid_nhs_check_digit};
pub use error::{PipelineError, Result};
pub use frame::{MonthlyFrame, cohort_frame, grouped_counts};
pub use loader::{MonthlyLoad, MonthlyLoader};
pub use pipeline::{Publication, publish, run_publication};
pub use reconcile::{PartitionSums, Reconcile, reconcile_all};
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};
pub use reference::{GeographyProvider, ReferenceResolver, is_stale};

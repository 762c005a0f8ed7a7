pub mod breakdown;
pub mod config;
pub mod demographics;
pub mod error;
pub mod geography;
pub mod list_size;
pub mod period;
pub mod record;

pub use breakdown::BreakdownKind;
pub use config::{
    AggregationConfig, CleaningRules, GeographyConfig, MappingFileConfig, PublicationConfig,
};
pub use demographics::{
    ALL_DECEASED_LABEL, ALL_LABEL, AgeBandSpec, AgeBands, Gender, UNKNOWN_AGE_BAND, age_in_years,
};
pub use error::{ModelError, Result};
pub use geography::{
    GeographyArea, GeographyMapping, LsoaGeography, MappingSource, PeriodGeography,
    PracticeGeography, ResolvedLsoa, ResolvedPractice, UNALLOCATED,
};
pub use list_size::{ListSize, ListSizeRecord};
pub use period::{
    DEFAULT_REPORTING_MONTHS, ReportingPeriod, format_publication_month, parse_iso_date,
    parse_iso_date_opt,
};
pub use record::{CleanedRecord, PatientStatus, RawOptOutRecord};

//! Publication configuration.
//!
//! Constructed once at process start and passed by reference into each
//! component. Every field has a default so a partial TOML file is enough.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::demographics::AgeBands;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublicationConfig {
    /// SQLite database with opt-out records, list sizes and reference tables.
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub cleaning: CleaningRules,
    pub geography: GeographyConfig,
    pub aggregation: AggregationConfig,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("ndop.sqlite"),
            output_dir: PathBuf::from("outputs"),
            cleaning: CleaningRules::default(),
            geography: GeographyConfig::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningRules {
    pub invalid_nhs_numbers: Vec<String>,
    pub test_number_prefixes: Vec<String>,
    pub age_bands: AgeBands,
    pub max_age: u32,
    /// Well-formed LSOA codes; anything else aggregates as Unallocated.
    pub lsoa_pattern: String,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            invalid_nhs_numbers: (1..=9).map(|digit| digit.to_string().repeat(10)).collect(),
            test_number_prefixes: vec!["9".to_string()],
            age_bands: AgeBands::default(),
            max_age: 120,
            lsoa_pattern: "^[EW]01[0-9]{6}$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeographyConfig {
    /// Date a boundary change took effect. Reference tables last updated
    /// before it are stale for months on or after it.
    pub boundary_effective_date: Option<NaiveDate>,
    pub practice_overrides: Option<MappingFileConfig>,
    pub lsoa_overrides: Option<MappingFileConfig>,
}

/// A fallback mapping file and, for workbooks, the sheet to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingFileConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Compact accumulated chunks into one buffer every N appended months.
    pub compact_every: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { compact_every: 3 }
    }
}

//! Reference Resolver.
//!
//! Practice and LSOA codes are resolved through an ordered chain of
//! [`GeographyProvider`]s: the current reference tables and, when configured,
//! a fallback mapping file. The fallback answers codes the reference tables
//! lack. When a boundary change has taken effect and the reference tables
//! were last refreshed before it, the reference tables are stale and the
//! fallback is consulted first. Codes no provider knows are Unallocated, as
//! are practices with no list size for the month.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use ndop_ingest::{ReferenceSnapshot, ReferenceSource, load_lsoa_overrides, load_practice_overrides};
use ndop_model::{
    GeographyConfig, GeographyMapping, ListSize, LsoaGeography, MappingSource, PracticeGeography,
    ResolvedLsoa, ResolvedPractice,
};

use crate::error::{PipelineError, Result};

/// A source of geography for one kind of code.
pub trait GeographyProvider<T> {
    /// Date the provider's data was last refreshed; `None` when undated.
    fn as_of(&self) -> Option<NaiveDate>;

    fn lookup(&self, code: &str) -> Option<&T>;
}

impl<T> GeographyProvider<T> for ReferenceSnapshot<T> {
    fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    fn lookup(&self, code: &str) -> Option<&T> {
        self.entries.get(code)
    }
}

/// Whether `primary` predates a boundary change in force for `month`.
pub fn is_stale(
    primary_as_of: Option<NaiveDate>,
    month: NaiveDate,
    boundary_effective_date: Option<NaiveDate>,
) -> bool {
    match boundary_effective_date {
        Some(boundary) if month >= boundary => primary_as_of.is_none_or(|as_of| as_of < boundary),
        _ => false,
    }
}

/// Override files carry no refresh date and are never stale.
fn undated<T>(entries: BTreeMap<String, T>) -> ReferenceSnapshot<T> {
    ReferenceSnapshot {
        as_of: None,
        entries,
    }
}

/// Providers in lookup order for one month.
struct ProviderChain<'p, T> {
    providers: Vec<(&'p dyn GeographyProvider<T>, MappingSource)>,
}

impl<'p, T: Clone> ProviderChain<'p, T> {
    fn new(
        primary: &'p dyn GeographyProvider<T>,
        fallback: Option<&'p dyn GeographyProvider<T>>,
        stale: bool,
    ) -> Self {
        let mut providers = vec![(primary, MappingSource::Primary)];
        if let Some(fallback) = fallback {
            if stale {
                providers.insert(0, (fallback, MappingSource::Override));
            } else {
                providers.push((fallback, MappingSource::Override));
            }
        }
        Self { providers }
    }

    fn resolve(&self, code: &str) -> Option<(T, MappingSource)> {
        self.providers.iter().find_map(|(provider, source)| {
            provider.lookup(code).map(|entry| (entry.clone(), *source))
        })
    }
}

pub struct ReferenceResolver<'a, R: ReferenceSource + ?Sized> {
    source: &'a R,
    practice_overrides: Option<ReferenceSnapshot<PracticeGeography>>,
    lsoa_overrides: Option<ReferenceSnapshot<LsoaGeography>>,
    boundary_effective_date: Option<NaiveDate>,
}

impl<'a, R: ReferenceSource + ?Sized> ReferenceResolver<'a, R> {
    /// Load configured fallback files. Malformed files fail with
    /// `MappingIntegrity` before any month is processed.
    pub fn new(source: &'a R, config: &GeographyConfig) -> Result<Self> {
        let practice_overrides = match &config.practice_overrides {
            Some(file) => Some(
                load_practice_overrides(file)
                    .map_err(|err| PipelineError::mapping_file(&file.path, err))?,
            ),
            None => None,
        };
        let lsoa_overrides = match &config.lsoa_overrides {
            Some(file) => Some(
                load_lsoa_overrides(file)
                    .map_err(|err| PipelineError::mapping_file(&file.path, err))?,
            ),
            None => None,
        };
        if let Some(overrides) = &practice_overrides {
            info!(practices = overrides.len(), "loaded practice override mapping");
        }
        if let Some(overrides) = &lsoa_overrides {
            info!(lsoas = overrides.len(), "loaded LSOA override mapping");
        }
        Ok(Self::with_overrides(
            source,
            practice_overrides,
            lsoa_overrides,
            config.boundary_effective_date,
        ))
    }

    pub fn with_overrides(
        source: &'a R,
        practice_overrides: Option<BTreeMap<String, PracticeGeography>>,
        lsoa_overrides: Option<BTreeMap<String, LsoaGeography>>,
        boundary_effective_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            source,
            practice_overrides: practice_overrides.map(undated),
            lsoa_overrides: lsoa_overrides.map(undated),
            boundary_effective_date,
        }
    }

    /// Entries in the loaded practice and LSOA fallback files.
    pub fn override_counts(&self) -> (Option<usize>, Option<usize>) {
        (
            self.practice_overrides
                .as_ref()
                .map(|overrides| overrides.entries.len()),
            self.lsoa_overrides
                .as_ref()
                .map(|overrides| overrides.entries.len()),
        )
    }

    /// Resolve every practice and LSOA code seen in a month.
    pub fn resolve(
        &self,
        month: NaiveDate,
        practice_codes: &BTreeSet<String>,
        lsoa_codes: &BTreeSet<String>,
        list_size: &ListSize,
    ) -> Result<GeographyMapping> {
        let practices = self.source.practices(month)?;
        let lsoas = self.source.lsoas(month)?;
        let practices_stale = is_stale(practices.as_of(), month, self.boundary_effective_date);
        let lsoas_stale = is_stale(lsoas.as_of(), month, self.boundary_effective_date);

        let practice_chain = ProviderChain::new(
            &practices,
            self.practice_overrides
                .as_ref()
                .map(|p| p as &dyn GeographyProvider<PracticeGeography>),
            practices_stale,
        );
        let lsoa_chain = ProviderChain::new(
            &lsoas,
            self.lsoa_overrides
                .as_ref()
                .map(|p| p as &dyn GeographyProvider<LsoaGeography>),
            lsoas_stale,
        );

        let mut mapping = GeographyMapping::new(month);
        for code in practice_codes {
            let resolved = if !list_size.is_active(code) {
                ResolvedPractice::Unallocated
            } else {
                match practice_chain.resolve(code) {
                    Some((geography, source)) => ResolvedPractice::Allocated { geography, source },
                    None => ResolvedPractice::Unallocated,
                }
            };
            mapping.practices.insert(code.clone(), resolved);
        }
        for code in lsoa_codes {
            let resolved = match lsoa_chain.resolve(code) {
                Some((geography, source)) => ResolvedLsoa::Allocated { geography, source },
                None => ResolvedLsoa::Unallocated,
            };
            mapping.lsoas.insert(code.clone(), resolved);
        }

        let overridden = mapping
            .practices
            .values()
            .filter(|resolved| {
                matches!(
                    resolved,
                    ResolvedPractice::Allocated {
                        source: MappingSource::Override,
                        ..
                    }
                )
            })
            .count();
        debug!(
            %month,
            practices = mapping.practices.len(),
            practices_unallocated = mapping.unallocated_practice_count(),
            practices_from_override = overridden,
            practices_stale,
            lsoas = mapping.lsoas.len(),
            lsoas_unallocated = mapping.unallocated_lsoa_count(),
            lsoas_stale,
            "resolved geography"
        );
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).expect("date")
    }

    #[test]
    fn staleness_needs_a_boundary_in_force() {
        let boundary = Some(date(2022, 7));
        assert!(!is_stale(Some(date(2022, 1)), date(2022, 6), boundary));
        assert!(is_stale(Some(date(2022, 1)), date(2022, 7), boundary));
        assert!(is_stale(None, date(2023, 1), boundary));
        assert!(!is_stale(Some(date(2022, 7)), date(2023, 1), boundary));
        assert!(!is_stale(Some(date(2020, 1)), date(2023, 1), None));
    }
}

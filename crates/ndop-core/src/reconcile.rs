//! Cross-table reconciliation.
//!
//! Every table partitions each cohort's monthly total in one or more ways.
//! Each partition must sum to the accumulator's unsplit total for that month
//! and cohort; the first mismatch aborts the run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use ndop_model::{ALL_DECEASED_LABEL, ALL_LABEL, BreakdownKind, Gender, PatientStatus};

use crate::accumulator::MonthlyTotals;
use crate::breakdown::{
    AgeGenderTable, BreakdownTables, HeadlineTable, PracticeTable, RegistrationTable,
    ResidenceTable,
};
use crate::error::{PipelineError, Result};

pub type PartitionSums = BTreeMap<(NaiveDate, PatientStatus, &'static str), u64>;

pub trait Reconcile {
    const KIND: BreakdownKind;

    /// Partitions checked for every month.
    const PARTITIONS: &'static [(PatientStatus, &'static str)];

    fn partition_sums(&self) -> PartitionSums;

    fn reconcile(&self, totals: &MonthlyTotals) -> Result<()> {
        let sums = self.partition_sums();
        let months: BTreeSet<NaiveDate> = totals
            .months()
            .into_iter()
            .chain(sums.keys().map(|(month, _, _)| *month))
            .collect();
        for month in months {
            for (cohort, partition) in Self::PARTITIONS {
                let expected = totals.get(*cohort, month);
                let actual = sums
                    .get(&(month, *cohort, *partition))
                    .copied()
                    .unwrap_or(0);
                if expected != actual {
                    return Err(PipelineError::Reconciliation {
                        table: Self::KIND,
                        month,
                        cohort: *cohort,
                        partition: (*partition).to_string(),
                        expected,
                        actual,
                    });
                }
            }
        }
        debug!(table = %Self::KIND, "table reconciles");
        Ok(())
    }
}

fn add(
    sums: &mut PartitionSums,
    month: NaiveDate,
    cohort: PatientStatus,
    partition: &'static str,
    count: u64,
) {
    *sums.entry((month, cohort, partition)).or_insert(0) += count;
}

impl Reconcile for HeadlineTable {
    const KIND: BreakdownKind = BreakdownKind::Headline;
    const PARTITIONS: &'static [(PatientStatus, &'static str)] = &[
        (PatientStatus::Living, "opt_out"),
        (PatientStatus::Deceased, "deceased"),
    ];

    fn partition_sums(&self) -> PartitionSums {
        let mut sums = PartitionSums::new();
        for row in &self.rows {
            add(&mut sums, row.month, PatientStatus::Living, "opt_out", row.opt_out);
            add(&mut sums, row.month, PatientStatus::Deceased, "deceased", row.deceased);
        }
        sums
    }
}

impl Reconcile for AgeGenderTable {
    const KIND: BreakdownKind = BreakdownKind::AgeGender;
    const PARTITIONS: &'static [(PatientStatus, &'static str)] = &[
        (PatientStatus::Living, "age_band x gender"),
        (PatientStatus::Living, "gender"),
        (PatientStatus::Living, "age_band"),
        (PatientStatus::Living, "all"),
        (PatientStatus::Deceased, "gender"),
        (PatientStatus::Deceased, "all"),
    ];

    fn partition_sums(&self) -> PartitionSums {
        let unknown = Gender::Unknown.label();
        let mut sums = PartitionSums::new();
        for row in &self.rows {
            let (month, count) = (row.month, row.opt_out);
            match (row.age_band.as_str(), row.gender.as_str()) {
                (ALL_DECEASED_LABEL, ALL_DECEASED_LABEL) => {
                    add(&mut sums, month, PatientStatus::Deceased, "all", count);
                }
                (ALL_DECEASED_LABEL, _) => {
                    add(&mut sums, month, PatientStatus::Deceased, "gender", count);
                }
                (ALL_LABEL, ALL_LABEL) => {
                    add(&mut sums, month, PatientStatus::Living, "all", count);
                }
                (ALL_LABEL, gender) => {
                    add(&mut sums, month, PatientStatus::Living, "gender", count);
                    // Unknown gender has no age split; its total completes
                    // both age partitions.
                    if gender == unknown {
                        add(&mut sums, month, PatientStatus::Living, "age_band x gender", count);
                        add(&mut sums, month, PatientStatus::Living, "age_band", count);
                    }
                }
                (_, ALL_LABEL) => {
                    add(&mut sums, month, PatientStatus::Living, "age_band", count);
                }
                _ => {
                    add(&mut sums, month, PatientStatus::Living, "age_band x gender", count);
                }
            }
        }
        sums
    }
}

impl Reconcile for RegistrationTable {
    const KIND: BreakdownKind = BreakdownKind::RegistrationGeography;
    const PARTITIONS: &'static [(PatientStatus, &'static str)] = &[
        (PatientStatus::Living, "sub_icb"),
        (PatientStatus::Deceased, "sub_icb"),
    ];

    fn partition_sums(&self) -> PartitionSums {
        let mut sums = PartitionSums::new();
        for row in &self.rows {
            add(&mut sums, row.month, PatientStatus::Living, "sub_icb", row.opt_out);
            add(&mut sums, row.month, PatientStatus::Deceased, "sub_icb", row.deceased);
        }
        sums
    }
}

impl Reconcile for PracticeTable {
    const KIND: BreakdownKind = BreakdownKind::RegistrationGeography;
    const PARTITIONS: &'static [(PatientStatus, &'static str)] = &[
        (PatientStatus::Living, "practice"),
        (PatientStatus::Deceased, "practice"),
    ];

    fn partition_sums(&self) -> PartitionSums {
        let mut sums = PartitionSums::new();
        for row in &self.rows {
            add(&mut sums, row.month, PatientStatus::Living, "practice", row.opt_out);
            add(&mut sums, row.month, PatientStatus::Deceased, "practice", row.deceased);
        }
        sums
    }
}

impl Reconcile for ResidenceTable {
    const KIND: BreakdownKind = BreakdownKind::ResidenceGeography;
    const PARTITIONS: &'static [(PatientStatus, &'static str)] = &[
        (PatientStatus::Living, "lsoa"),
        (PatientStatus::Deceased, "lsoa"),
    ];

    fn partition_sums(&self) -> PartitionSums {
        let mut sums = PartitionSums::new();
        for row in &self.rows {
            add(&mut sums, row.month, PatientStatus::Living, "lsoa", row.opt_out);
            add(&mut sums, row.month, PatientStatus::Deceased, "lsoa", row.deceased);
        }
        sums
    }
}

/// Check every table of a publication.
pub fn reconcile_all(tables: &BreakdownTables, totals: &MonthlyTotals) -> Result<()> {
    tables.headline.reconcile(totals)?;
    tables.age_gender.reconcile(totals)?;
    tables.registration.reconcile(totals)?;
    tables.practices.reconcile(totals)?;
    tables.residence.reconcile(totals)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::HeadlineRow;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, 1).expect("date")
    }

    fn totals(living: &[(u32, u64)], deceased: &[(u32, u64)]) -> MonthlyTotals {
        MonthlyTotals {
            living: living.iter().map(|(m, n)| (month(*m), *n)).collect(),
            deceased: deceased.iter().map(|(m, n)| (month(*m), *n)).collect(),
        }
    }

    #[test]
    fn mismatch_names_table_month_and_cohort() {
        let table = HeadlineTable {
            rows: vec![HeadlineRow {
                month: month(11),
                opt_out: 10,
                list_size: 100,
                deceased: 1,
            }],
        };
        let err = table
            .reconcile(&totals(&[(11, 10)], &[(11, 2)]))
            .expect_err("deceased mismatch");
        match err {
            PipelineError::Reconciliation {
                table,
                month: m,
                cohort,
                expected,
                actual,
                ..
            } => {
                assert_eq!(table, BreakdownKind::Headline);
                assert_eq!(m, month(11));
                assert_eq!(cohort, PatientStatus::Deceased);
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn month_missing_from_table_fails_when_total_is_positive() {
        let table = HeadlineTable::default();
        assert!(table.reconcile(&totals(&[(1, 0)], &[(1, 0)])).is_ok());
        assert!(table.reconcile(&totals(&[(1, 4)], &[(1, 0)])).is_err());
    }
}

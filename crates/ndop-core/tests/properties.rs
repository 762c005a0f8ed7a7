mod common;

use common::{date, fixture};
use ndop_core::{RecordCleaner, run_publication};
use ndop_model::{
    ALL_LABEL, CleaningRules, Gender, PatientStatus, PublicationConfig, RawOptOutRecord,
    ReportingPeriod,
};
use proptest::prelude::*;

fn arb_record() -> impl Strategy<Value = RawOptOutRecord> {
    (
        prop::option::of(prop::sample::select(vec!["a", "b", "c", "d", "e", " f "])),
        prop::option::of(prop::sample::select(vec![
            "4010232137",
            "4010232138",
            "1111111111",
            "9434765919",
            "401 023 2137",
        ])),
        prop::option::of(prop::sample::select(vec!["1", "2", "0", "9", "M", "female", "x"])),
        prop::option::of(0i64..40_000),
        prop::option::of(prop::sample::select(vec!["A81001", "A81002", "A81003", "Z99999", ""])),
        prop::option::of(prop::sample::select(vec!["E01000001", "E01999999", "bad", "w01000002"])),
        prop::option::of(0u32..12),
        prop::option::of(0u32..14),
    )
        .prop_map(
            |(id, nhs, gender, born_days, practice, lsoa, start_month, death_month)| {
                let base = date(2023, 1, 1);
                RawOptOutRecord {
                    patient_id: id.map(str::to_string),
                    nhs_number: nhs.map(str::to_string),
                    gender: gender.map(str::to_string),
                    date_of_birth: born_days.map(|days| base - chrono::Duration::days(days)),
                    date_of_death: death_month
                        .and_then(|m| base.checked_add_months(chrono::Months::new(m))),
                    gp_practice: practice.map(str::to_string),
                    lsoa_code: lsoa.map(str::to_string),
                    record_start_date: start_month
                        .and_then(|m| base.checked_add_months(chrono::Months::new(m))),
                    record_end_date: None,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn cleaning_conserves_rows(records in prop::collection::vec(arb_record(), 0..40)) {
        let rules = CleaningRules::default();
        let cleaner = RecordCleaner::new(&rules).expect("cleaner");
        let input = records.len();
        let cleaned = cleaner.clean(date(2024, 1, 1), PatientStatus::Living, records);
        prop_assert!(cleaned.report.is_conserved());
        prop_assert_eq!(cleaned.report.input_rows, input);
        prop_assert_eq!(cleaned.records.len(), cleaned.report.output_rows);
    }

    #[test]
    fn every_table_reconciles(records in prop::collection::vec(arb_record(), 0..60)) {
        let mut source = fixture();
        source.records = records;
        let period = ReportingPeriod::new(date(2024, 1, 1), date(2024, 2, 8), 3).expect("period");
        let publication = run_publication(&PublicationConfig::default(), &period, &source)
            .expect("reconciled publication");

        for month in period.months() {
            let living = publication.totals.get(PatientStatus::Living, month);
            let all = publication.tables.age_gender.row(month, ALL_LABEL, ALL_LABEL);
            prop_assert_eq!(all.map(|row| row.opt_out), Some(living));

            let unallocated = publication.tables.registration.unallocated(month);
            prop_assert!(unallocated.is_some());
        }
        prop_assert!(
            publication
                .tables
                .age_gender
                .rows
                .iter()
                .filter(|row| row.is_age_disaggregated())
                .all(|row| row.gender != Gender::Unknown.label())
        );
    }
}

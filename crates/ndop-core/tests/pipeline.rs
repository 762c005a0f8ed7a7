mod common;

use std::collections::BTreeMap;

use common::{date, fixture, practice};
use ndop_core::{
    PipelineError, ReferenceResolver, TemporalAggregator, publish, run_publication,
};
use ndop_ingest::Dataset;
use ndop_model::{
    ALL_DECEASED_LABEL, ALL_LABEL, Gender, MappingSource, PatientStatus, PublicationConfig,
    ReportingPeriod, ResolvedPractice, UNALLOCATED,
};

fn period(months: u32) -> ReportingPeriod {
    ReportingPeriod::new(date(2024, 1, 1), date(2024, 2, 8), months).expect("period")
}

#[test]
fn three_month_period_covers_november_to_january() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(3), &source).expect("publish");

    assert_eq!(
        publication.tables.age_gender.months(),
        vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1)]
    );
    let headline: Vec<_> = publication
        .tables
        .headline
        .rows
        .iter()
        .map(|row| (row.month, row.opt_out, row.deceased, row.list_size))
        .collect();
    assert_eq!(
        headline,
        vec![
            (date(2024, 1, 1), 5, 1, 230),
            (date(2023, 12, 1), 6, 0, 230),
            (date(2023, 11, 1), 5, 0, 230),
        ]
    );
}

#[test]
fn single_month_period_contains_only_the_end_month() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(1), &source).expect("publish");

    let jan = date(2024, 1, 1);
    assert_eq!(publication.tables.age_gender.months(), vec![jan]);
    assert!(publication.tables.registration.rows.iter().all(|row| row.month == jan));
    assert!(publication.tables.residence.rows.iter().all(|row| row.month == jan));
    assert_eq!(publication.totals.months(), vec![jan]);
}

#[test]
fn null_gender_counts_only_in_gender_totals() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(3), &source).expect("publish");
    let table = &publication.tables.age_gender;
    let jan = date(2024, 1, 1);
    let unknown = Gender::Unknown.label();

    assert_eq!(table.row(jan, ALL_LABEL, unknown).map(|row| row.opt_out), Some(1));
    assert!(table.row(jan, "30-39", unknown).is_none());
    assert!(
        table
            .rows
            .iter()
            .filter(|row| row.is_age_disaggregated())
            .all(|row| row.gender != unknown)
    );

    let female = table.row(jan, "30-39", "Female").expect("30-39 female");
    assert_eq!((female.opt_out, female.list_size), (1, Some(100)));
    assert_eq!(female.opt_out_rate(), Some(1.0));
    let all = table.row(jan, ALL_LABEL, ALL_LABEL).expect("all");
    assert_eq!((all.opt_out, all.list_size), (5, Some(230)));
    let deceased = table
        .row(jan, ALL_DECEASED_LABEL, ALL_DECEASED_LABEL)
        .expect("deceased");
    assert_eq!((deceased.opt_out, deceased.list_size), (1, None));
}

#[test]
fn inactive_practice_is_unallocated_despite_mapping() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(3), &source).expect("publish");
    let jan = date(2024, 1, 1);

    let unallocated = publication
        .tables
        .registration
        .unallocated(jan)
        .expect("unallocated row");
    assert_eq!((unallocated.opt_out, unallocated.list_size), (1, 0));
    assert_eq!(unallocated.opt_out_rate(), None);

    let rows: BTreeMap<&str, (u64, u64, u64)> = publication
        .tables
        .registration
        .rows
        .iter()
        .filter(|row| row.month == jan)
        .map(|row| {
            (
                row.sub_icb.code.as_str(),
                (row.opt_out, row.list_size, row.deceased),
            )
        })
        .collect();
    assert_eq!(rows.get("00L"), Some(&(3, 180, 0)));
    assert_eq!(rows.get("00M"), Some(&(1, 50, 1)));
    assert_eq!(rows.get(UNALLOCATED), Some(&(1, 0, 0)));

    let practice = publication
        .tables
        .practices
        .rows
        .iter()
        .find(|row| row.month == jan && row.practice_code == "A81003")
        .expect("A81003 row");
    assert!(practice.sub_icb.is_unallocated());
    assert_eq!(practice.list_size, None);
}

#[test]
fn invalid_and_missing_lsoas_share_the_unallocated_row() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(3), &source).expect("publish");
    let jan: Vec<_> = publication
        .tables
        .residence
        .rows
        .iter()
        .filter(|row| row.month == date(2024, 1, 1))
        .map(|row| (row.lsoa_code.as_str(), row.opt_out, row.deceased))
        .collect();
    assert_eq!(jan, vec![("E01000001", 3, 1), (UNALLOCATED, 2, 0)]);
}

#[test]
fn duplicates_are_collapsed_and_rows_conserved() {
    let source = fixture();
    let publication =
        run_publication(&PublicationConfig::default(), &period(3), &source).expect("publish");
    let report = publication.cleaning[&(date(2024, 1, 1), PatientStatus::Living)];
    assert_eq!(report.input_rows, 6);
    assert_eq!(report.output_rows, 5);
    assert_eq!(report.duplicates_collapsed, 1);
    assert_eq!(report.genders_defaulted, 1);
    assert_eq!(report.lsoas_invalid, 2);
    assert!(publication.cleaning.values().all(|report| report.is_conserved()));
    assert_eq!(publication.cleaning_totals(PatientStatus::Deceased).output_rows, 1);
}

#[test]
fn missing_month_aborts_the_run() {
    let mut source = fixture();
    source
        .landed
        .remove(&(Dataset::ListSize, date(2023, 12, 1)));
    let err = run_publication(&PublicationConfig::default(), &period(3), &source)
        .expect_err("December list size is missing");
    match err {
        PipelineError::DataUnavailable { dataset, month } => {
            assert_eq!(dataset, Dataset::ListSize);
            assert_eq!(month, date(2023, 12, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn identical_inputs_give_identical_publications() {
    let source = fixture();
    let config = PublicationConfig::default();
    let first = run_publication(&config, &period(3), &source).expect("first run");
    let second = run_publication(&config, &period(3), &source).expect("second run");
    assert_eq!(first, second);
}

#[test]
fn stale_reference_prefers_the_override_after_the_boundary() {
    let source = fixture();
    let config = PublicationConfig::default();
    let overrides = BTreeMap::from([("A81002".to_string(), practice("A81002", "15N"))]);
    let resolver = ReferenceResolver::with_overrides(
        &source,
        Some(overrides),
        None,
        Some(date(2023, 12, 1)),
    );
    let dataset = TemporalAggregator::with_resolver(&source, &config, resolver)
        .expect("aggregator")
        .aggregate(&period(3))
        .expect("aggregate");

    let source_for = |month| match dataset
        .geography
        .month(month)
        .and_then(|mapping| mapping.practices.get("A81002"))
    {
        Some(ResolvedPractice::Allocated { geography, source }) => {
            Some((geography.sub_icb.code.clone(), *source))
        }
        _ => None,
    };
    assert_eq!(
        source_for(date(2023, 11, 1)),
        Some(("00M".to_string(), MappingSource::Primary))
    );
    assert_eq!(
        source_for(date(2024, 1, 1)),
        Some(("15N".to_string(), MappingSource::Override))
    );

    let publication = publish(dataset, &config).expect("publish");
    assert!(
        publication
            .tables
            .registration
            .rows
            .iter()
            .any(|row| row.month == date(2024, 1, 1) && row.sub_icb.code == "15N")
    );
}

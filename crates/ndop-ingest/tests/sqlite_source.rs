use chrono::NaiveDate;
use ndop_ingest::{Dataset, OptOutSource, ReferenceSource, SourceError, SqliteSource};
use ndop_model::{Gender, ListSizeRecord, RawOptOutRecord};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn source() -> SqliteSource {
    let source = SqliteSource::open_in_memory().expect("open sqlite");
    source.initialize_schema().expect("schema");
    source
}

fn record(patient: &str, start: NaiveDate, end: Option<NaiveDate>) -> RawOptOutRecord {
    RawOptOutRecord {
        patient_id: Some(patient.to_string()),
        nhs_number: Some("9434765919".to_string()),
        gender: Some("1".to_string()),
        date_of_birth: Some(date(1980, 5, 17)),
        gp_practice: Some("A81001".to_string()),
        lsoa_code: Some("E01012345".to_string()),
        record_start_date: Some(start),
        record_end_date: end,
        ..RawOptOutRecord::default()
    }
}

#[test]
fn unlanded_month_is_unavailable_not_empty() {
    let source = source();
    let month = date(2024, 1, 1);
    let err = source.opt_out_records(month).expect_err("not landed");
    assert!(matches!(
        err,
        SourceError::MonthUnavailable {
            dataset: Dataset::OptOutRecords,
            ..
        }
    ));

    source
        .mark_landed(Dataset::OptOutRecords, month)
        .expect("mark landed");
    let records = source.opt_out_records(month).expect("landed");
    assert!(records.is_empty());

    let err = source.list_size(month).expect_err("list size not landed");
    assert!(matches!(
        err,
        SourceError::MonthUnavailable {
            dataset: Dataset::ListSize,
            ..
        }
    ));
}

#[test]
fn records_are_sliced_to_versions_in_force() {
    let mut source = source();
    let month = date(2024, 1, 1);
    source
        .insert_opt_out_records(&[
            record("p1", date(2023, 6, 1), None),
            record("p2", date(2023, 6, 1), Some(date(2023, 12, 1))),
            record("p3", date(2024, 2, 1), None),
            record("p4", date(2023, 6, 1), Some(date(2024, 1, 1))),
        ])
        .expect("insert");
    source
        .mark_landed(Dataset::OptOutRecords, month)
        .expect("mark landed");

    let records = source.opt_out_records(month).expect("records");
    let ids: Vec<_> = records
        .iter()
        .filter_map(|r| r.patient_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["p1", "p4"]);
    assert_eq!(records[0].date_of_birth, Some(date(1980, 5, 17)));
}

#[test]
fn integer_identifiers_read_as_text() {
    let source = source();
    let month = date(2024, 1, 1);
    source
        .connection()
        .execute_batch(
            "INSERT INTO ndop_demog (patient_id, nhs_number, gender, record_start_date)
             VALUES (42, 9434765919, 2, '2023-01-01 00:00:00');
             INSERT INTO ndop_demog (patient_id, gender, date_of_birth, record_start_date)
             VALUES ('', '', 'not a date', '2023-01-01');",
        )
        .expect("seed");
    source
        .mark_landed(Dataset::OptOutRecords, month)
        .expect("mark landed");

    let records = source.opt_out_records(month).expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].patient_id.as_deref(), Some("42"));
    assert_eq!(records[0].nhs_number.as_deref(), Some("9434765919"));
    assert_eq!(records[0].gender.as_deref(), Some("2"));
    assert_eq!(records[0].record_start_date, Some(date(2023, 1, 1)));
    assert_eq!(records[1].patient_id, None);
    assert_eq!(records[1].date_of_birth, None);
}

#[test]
fn list_size_round_trips_through_long_table() {
    let mut source = source();
    let month = date(2024, 1, 1);
    source
        .insert_list_size(&[
            ListSizeRecord {
                month,
                practice_code: "A81001".to_string(),
                gender: Gender::Female,
                age: Some(34),
                patients: 120,
            },
            ListSizeRecord {
                month: date(2023, 12, 1),
                practice_code: "A81001".to_string(),
                gender: Gender::Male,
                age: Some(34),
                patients: 99,
            },
        ])
        .expect("insert");
    source
        .mark_landed(Dataset::ListSize, month)
        .expect("mark landed");

    let rows = source.list_size(month).expect("list size");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].gender, Gender::Female);
    assert_eq!(rows[0].patients, 120);
    assert_eq!(
        source.landed_months(Dataset::ListSize).expect("landed"),
        vec![month]
    );
}

#[test]
fn practice_reference_uses_latest_area_names() {
    let source = source();
    source
        .connection()
        .execute_batch(
            "INSERT INTO ods_practice VALUES
                ('A81001', 'THE DENSHAM SURGERY', 'TS18 1HU', '16C', 'QHM', 'Y63',
                 '1974-04-01', NULL, '2022-07-01', NULL),
                ('A81002', 'QUEENS PARK MEDICAL CENTRE', 'TS18 2AW', '16C', 'QHM', 'Y63',
                 '1974-04-01', '2023-06-30', '2022-07-01', NULL),
                ('A81003', 'VICTORIA MEDICAL PRACTICE', 'TS26 8DB', '16C', 'QHM', 'Y63',
                 '1974-04-01', NULL, '2024-03-01', NULL);
             INSERT INTO geo_equivalents VALUES
                ('16C', 'NHS Tees Valley CCG', 'E38000247', '2020-04-01'),
                ('16C', 'NHS North East and North Cumbria ICB - 16C', 'E38000247', '2022-07-01'),
                ('QHM', 'NHS North East and North Cumbria ICB', 'E54000050', '2022-07-01'),
                ('Y63', 'North East and Yorkshire', 'E40000012', '2022-07-01');",
        )
        .expect("seed");

    let snapshot = source.practices(date(2024, 1, 1)).expect("practices");
    assert_eq!(snapshot.as_of, Some(date(2024, 3, 1)));
    assert_eq!(
        snapshot.entries.keys().collect::<Vec<_>>(),
        vec!["A81001"],
        "closed and not-yet-effective practices are excluded"
    );
    let practice = &snapshot.entries["A81001"];
    assert_eq!(
        practice.sub_icb.name.as_deref(),
        Some("NHS North East and North Cumbria ICB - 16C")
    );
    assert_eq!(practice.sub_icb.ons_code.as_deref(), Some("E38000247"));
    assert_eq!(practice.region.ons_code.as_deref(), Some("E40000012"));
}

#[test]
fn lsoa_reference_keeps_codes_without_area_names() {
    let source = source();
    source
        .connection()
        .execute_batch(
            "INSERT INTO lsoa_sub_icb VALUES
                ('E01012345', 'Stockton-on-Tees 001A', '16C', 'E06000004', 'Stockton-on-Tees',
                 '2021-04-01', NULL);",
        )
        .expect("seed");

    let snapshot = source.lsoas(date(2024, 1, 1)).expect("lsoas");
    let lsoa = &snapshot.entries["E01012345"];
    assert_eq!(lsoa.sub_icb.code, "16C");
    assert_eq!(lsoa.sub_icb.name, None);
    assert_eq!(lsoa.local_authority.code, "E06000004");
    assert_eq!(
        lsoa.local_authority.name.as_deref(),
        Some("Stockton-on-Tees")
    );
}

use chrono::NaiveDate;
use ndop_model::{
    AgeBands, GeographyArea, GeographyMapping, MappingSource, PatientStatus, PracticeGeography,
    PublicationConfig, RawOptOutRecord, ResolvedPractice,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn record_activity_window_is_inclusive() {
    let record = RawOptOutRecord {
        record_start_date: Some(date(2023, 11, 1)),
        record_end_date: Some(date(2023, 12, 1)),
        ..RawOptOutRecord::default()
    };
    assert!(!record.is_active_on(date(2023, 10, 1)));
    assert!(record.is_active_on(date(2023, 11, 1)));
    assert!(record.is_active_on(date(2023, 12, 1)));
    assert!(!record.is_active_on(date(2024, 1, 1)));
}

#[test]
fn death_on_month_start_is_deceased() {
    let record = RawOptOutRecord {
        date_of_death: Some(date(2024, 1, 1)),
        ..RawOptOutRecord::default()
    };
    assert_eq!(record.status_on(date(2023, 12, 1)), PatientStatus::Living);
    assert_eq!(record.status_on(date(2024, 1, 1)), PatientStatus::Deceased);
}

#[test]
fn mapping_hides_unallocated_practices() {
    let mut mapping = GeographyMapping::new(date(2024, 1, 1));
    mapping.practices.insert(
        "A81001".to_string(),
        ResolvedPractice::Allocated {
            geography: PracticeGeography {
                practice_code: "A81001".to_string(),
                practice_name: Some("THE DENSHAM SURGERY".to_string()),
                postcode: Some("TS18 1HU".to_string()),
                sub_icb: GeographyArea::new("16C").with_name("NHS Tees Valley"),
                icb: GeographyArea::new("QHM"),
                region: GeographyArea::new("Y63"),
            },
            source: MappingSource::Primary,
        },
    );
    mapping
        .practices
        .insert("B99999".to_string(), ResolvedPractice::Unallocated);

    assert_eq!(
        mapping.practice(Some("A81001")).map(|g| g.sub_icb.code.as_str()),
        Some("16C")
    );
    assert!(mapping.practice(Some("B99999")).is_none());
    assert!(mapping.practice(None).is_none());
    assert_eq!(mapping.unallocated_practice_count(), 1);
}

#[test]
fn partial_toml_config_uses_defaults() {
    let config: PublicationConfig = toml::from_str(
        r#"
        database = "data/ndop.sqlite"

        [geography]
        boundary_effective_date = "2022-07-01"

        [geography.lsoa_overrides]
        path = "inputs/LSOA11_LOC22_ICB22_LAD22_EN_LU.xlsx"
        sheet = "LSOA11_LOC22_ICB22_LAD22"
        "#,
    )
    .expect("parse config");

    assert_eq!(config.database.to_str(), Some("data/ndop.sqlite"));
    assert_eq!(config.output_dir.to_str(), Some("outputs"));
    assert_eq!(config.cleaning.age_bands, AgeBands::ten_year());
    assert_eq!(config.cleaning.invalid_nhs_numbers.len(), 9);
    assert_eq!(
        config.geography.boundary_effective_date,
        Some(date(2022, 7, 1))
    );
    let lsoa = config.geography.lsoa_overrides.expect("lsoa overrides");
    assert_eq!(lsoa.sheet.as_deref(), Some("LSOA11_LOC22_ICB22_LAD22"));
    assert!(config.geography.practice_overrides.is_none());
}

#[test]
fn custom_age_bands_are_validated_on_load() {
    let result: Result<PublicationConfig, _> = toml::from_str(
        r#"
        [cleaning]
        age_bands = [
            { label = "0-17", min = 0, max = 17 },
            { label = "21+", min = 21 },
        ]
        "#,
    );
    assert!(result.is_err());

    let config: PublicationConfig = toml::from_str(
        r#"
        [cleaning]
        age_bands = [
            { label = "0-17", min = 0, max = 17 },
            { label = "18+", min = 18 },
        ]
        "#,
    )
    .expect("parse config");
    assert_eq!(config.cleaning.age_bands.labels(), vec!["0-17", "18+", "Unknown"]);
}

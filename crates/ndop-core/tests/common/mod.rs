#![allow(dead_code)]

use chrono::NaiveDate;
use ndop_ingest::MemorySource;
use ndop_model::{
    GeographyArea, Gender, ListSizeRecord, LsoaGeography, PracticeGeography, RawOptOutRecord,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn practice(code: &str, sub_icb: &str) -> PracticeGeography {
    PracticeGeography {
        practice_code: code.to_string(),
        practice_name: Some(format!("{code} SURGERY")),
        postcode: Some("LS1 4AP".to_string()),
        sub_icb: GeographyArea::new(sub_icb)
            .with_ons_code(format!("E38{sub_icb}"))
            .with_name(format!("NHS Sub-ICB {sub_icb}")),
        icb: GeographyArea::new("QHM")
            .with_ons_code("E54000050")
            .with_name("NHS North East And North Cumbria ICB"),
        region: GeographyArea::new("Y63")
            .with_ons_code("E40000012")
            .with_name("North East And Yorkshire"),
    }
}

pub fn lsoa(code: &str, sub_icb: &str) -> LsoaGeography {
    LsoaGeography {
        lsoa_code: code.to_string(),
        lsoa_name: Some(format!("Hartlepool {code}")),
        sub_icb: GeographyArea::new(sub_icb).with_name(format!("NHS Sub-ICB {sub_icb}")),
        local_authority: GeographyArea::new("E06000001").with_name("Hartlepool"),
    }
}

pub fn list_row(month: NaiveDate, practice: &str, gender: Gender, age: i64, patients: u64) -> ListSizeRecord {
    ListSizeRecord {
        month,
        practice_code: practice.to_string(),
        gender,
        age: Some(age),
        patients,
    }
}

pub struct Opt<'a> {
    pub id: &'a str,
    pub gender: Option<&'a str>,
    pub born: NaiveDate,
    pub practice: Option<&'a str>,
    pub lsoa: Option<&'a str>,
    pub start: NaiveDate,
}

impl Opt<'_> {
    pub fn record(&self) -> RawOptOutRecord {
        RawOptOutRecord {
            patient_id: Some(self.id.to_string()),
            nhs_number: Some("4010232137".to_string()),
            gender: self.gender.map(str::to_string),
            date_of_birth: Some(self.born),
            gp_practice: self.practice.map(str::to_string),
            lsoa_code: self.lsoa.map(str::to_string),
            record_start_date: Some(self.start),
            ..RawOptOutRecord::default()
        }
    }
}

/// Three landed months, Nov 2023 to Jan 2024.
///
/// A81001 and A81002 are active every month. A81003 is in the reference
/// tables but has no list size, so it is inactive.
pub fn fixture() -> MemorySource {
    let months = [date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1)];
    let mut source = MemorySource {
        practices: vec![
            practice("A81001", "00L"),
            practice("A81002", "00M"),
            practice("A81003", "00M"),
        ],
        lsoas: vec![lsoa("E01000001", "00L")],
        reference_as_of: Some(date(2023, 6, 1)),
        ..MemorySource::default()
    };
    for month in months {
        source.land(month);
        source.list_sizes.extend([
            list_row(month, "A81001", Gender::Female, 34, 100),
            list_row(month, "A81001", Gender::Male, 40, 80),
            list_row(month, "A81002", Gender::Female, 70, 50),
        ]);
    }

    let start = date(2023, 1, 1);
    source.records = vec![
        Opt {
            id: "p1",
            gender: Some("2"),
            born: date(1989, 6, 1),
            practice: Some("A81001"),
            lsoa: Some("E01000001"),
            start,
        }
        .record(),
        // Null gender, aged 34 throughout the period.
        Opt {
            id: "p2",
            gender: None,
            born: date(1989, 6, 15),
            practice: Some("A81001"),
            lsoa: Some("E01000001"),
            start,
        }
        .record(),
        Opt {
            id: "p3",
            gender: Some("1"),
            born: date(1975, 3, 3),
            practice: Some("A81003"),
            lsoa: Some("X123"),
            start,
        }
        .record(),
        Opt {
            id: "p4",
            gender: Some("F"),
            born: date(2001, 2, 2),
            practice: Some("a81002 "),
            lsoa: None,
            start: date(2023, 12, 1),
        }
        .record(),
        RawOptOutRecord {
            date_of_death: Some(date(2023, 12, 15)),
            ..Opt {
                id: "p5",
                gender: Some("2"),
                born: date(1940, 1, 1),
                practice: Some("A81002"),
                lsoa: Some("E01000001"),
                start,
            }
            .record()
        },
        Opt {
            id: "p6",
            gender: Some("1"),
            born: date(1950, 9, 9),
            practice: Some("A81001"),
            lsoa: Some("E01000001"),
            start,
        }
        .record(),
        // Later version of p6 in force from June; the two collapse to one.
        Opt {
            id: "p6",
            gender: Some("1"),
            born: date(1950, 9, 9),
            practice: Some("A81001"),
            lsoa: Some("E01000001"),
            start: date(2023, 6, 1),
        }
        .record(),
    ];
    source
}

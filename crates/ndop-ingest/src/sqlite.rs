//! SQLite-backed relational source.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use ndop_model::{
    Gender, GeographyArea, ListSizeRecord, LsoaGeography, PracticeGeography, RawOptOutRecord,
    parse_iso_date_opt,
};

use crate::error::{Dataset, Result, SourceError};
use crate::source::{OptOutSource, ReferenceSnapshot, ReferenceSource, area_or_code};

/// Tables read by the pipeline. Dates are ISO `YYYY-MM-DD` text.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS ndop_demog (
    patient_id TEXT,
    nhs_number TEXT,
    gender TEXT,
    date_of_birth TEXT,
    date_of_death TEXT,
    gp_practice TEXT,
    lsoa_code TEXT,
    record_start_date TEXT,
    record_end_date TEXT
);
CREATE INDEX IF NOT EXISTS idx_ndop_demog_start ON ndop_demog (record_start_date);

CREATE TABLE IF NOT EXISTS gp_patient_list (
    extract_date TEXT NOT NULL,
    practice_code TEXT NOT NULL,
    sex TEXT NOT NULL,
    age INTEGER,
    patients INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_gp_patient_list_date ON gp_patient_list (extract_date);

CREATE TABLE IF NOT EXISTS extract_log (
    dataset TEXT NOT NULL,
    extract_month TEXT NOT NULL,
    PRIMARY KEY (dataset, extract_month)
);

CREATE TABLE IF NOT EXISTS ods_practice (
    code TEXT NOT NULL,
    name TEXT,
    postcode TEXT,
    commissioner_code TEXT,
    icb_code TEXT,
    region_code TEXT,
    open_date TEXT,
    close_date TEXT,
    record_start_date TEXT,
    record_end_date TEXT
);

CREATE TABLE IF NOT EXISTS geo_equivalents (
    dh_geography_code TEXT NOT NULL,
    dh_geography_name TEXT,
    geography_code TEXT,
    date_of_operation TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lsoa_sub_icb (
    lsoa_code TEXT NOT NULL,
    lsoa_name TEXT,
    sub_icb_code TEXT,
    la_code TEXT,
    la_name TEXT,
    record_start_date TEXT,
    record_end_date TEXT
);
";

const RECORDS_QUERY: &str = "
SELECT patient_id, nhs_number, gender, date_of_birth, date_of_death,
       gp_practice, lsoa_code, record_start_date, record_end_date
FROM ndop_demog
WHERE (record_start_date IS NULL OR record_start_date <= ?1)
  AND (record_end_date IS NULL OR record_end_date >= ?1)
ORDER BY rowid";

const LIST_SIZE_QUERY: &str = "
SELECT practice_code, sex, age, patients
FROM gp_patient_list
WHERE extract_date = ?1
ORDER BY rowid";

// Latest equivalent per DH code operating on or before the month.
const AREAS_QUERY: &str = "
SELECT a.dh_geography_code, a.dh_geography_name, a.geography_code
FROM geo_equivalents AS a
INNER JOIN (
    SELECT dh_geography_code, MAX(date_of_operation) AS date_of_operation
    FROM geo_equivalents
    WHERE date_of_operation <= ?1
    GROUP BY dh_geography_code
) AS b
  ON a.dh_geography_code = b.dh_geography_code
 AND a.date_of_operation = b.date_of_operation
ORDER BY a.dh_geography_code, a.rowid";

const PRACTICES_QUERY: &str = "
SELECT code, name, postcode, commissioner_code, icb_code, region_code
FROM ods_practice
WHERE (open_date IS NULL OR open_date <= ?1)
  AND (close_date IS NULL OR close_date >= ?1)
  AND (record_start_date IS NULL OR record_start_date <= ?1)
  AND (record_end_date IS NULL OR record_end_date >= ?1)
ORDER BY code, record_start_date";

const LSOAS_QUERY: &str = "
SELECT lsoa_code, lsoa_name, sub_icb_code, la_code, la_name
FROM lsoa_sub_icb
WHERE (record_start_date IS NULL OR record_start_date <= ?1)
  AND (record_end_date IS NULL OR record_end_date >= ?1)
ORDER BY lsoa_code, record_start_date";

pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create every table the pipeline reads. Existing tables are left alone.
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Record that `dataset` has landed for `month`.
    pub fn mark_landed(&self, dataset: Dataset, month: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO extract_log (dataset, extract_month) VALUES (?1, ?2)",
            params![dataset.as_str(), iso(month)],
        )?;
        Ok(())
    }

    pub fn landed_months(&self, dataset: Dataset) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT extract_month FROM extract_log WHERE dataset = ?1 ORDER BY extract_month",
        )?;
        let months = stmt
            .query_map(params![dataset.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(months
            .iter()
            .filter_map(|value| parse_iso_date_opt(Some(value.as_str())))
            .collect())
    }

    pub fn insert_opt_out_records(&mut self, records: &[RawOptOutRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ndop_demog (
                    patient_id, nhs_number, gender, date_of_birth, date_of_death,
                    gp_practice, lsoa_code, record_start_date, record_end_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.patient_id,
                    record.nhs_number,
                    record.gender,
                    record.date_of_birth.map(iso),
                    record.date_of_death.map(iso),
                    record.gp_practice,
                    record.lsoa_code,
                    record.record_start_date.map(iso),
                    record.record_end_date.map(iso),
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn insert_list_size(&mut self, records: &[ListSizeRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO gp_patient_list (extract_date, practice_code, sex, age, patients)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let patients = i64::try_from(record.patients).unwrap_or(i64::MAX);
                stmt.execute(params![
                    iso(record.month),
                    record.practice_code,
                    sex_code(record.gender),
                    record.age,
                    patients,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn ensure_landed(&self, dataset: Dataset, month: NaiveDate) -> Result<()> {
        let landed: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM extract_log WHERE dataset = ?1 AND extract_month = ?2",
                params![dataset.as_str(), iso(month)],
                |row| row.get(0),
            )
            .optional()?;
        match landed {
            Some(_) => Ok(()),
            None => Err(SourceError::MonthUnavailable { dataset, month }),
        }
    }

    fn table_as_of(&self, table: &str) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = self.conn.query_row(
            &format!("SELECT MAX(record_start_date) FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        Ok(parse_iso_date_opt(latest.as_deref()))
    }

    fn areas(&self, month: NaiveDate) -> Result<BTreeMap<String, GeographyArea>> {
        let mut stmt = self.conn.prepare(AREAS_QUERY)?;
        let rows = stmt.query_map(params![iso(month)], |row| {
            Ok((text(row, 0)?, text(row, 1)?, text(row, 2)?))
        })?;
        let mut areas = BTreeMap::new();
        for row in rows {
            let (code, name, ons_code) = row?;
            let Some(code) = code.map(|code| code.trim().to_string()) else {
                continue;
            };
            areas.insert(
                code.clone(),
                GeographyArea {
                    code,
                    ons_code,
                    name,
                },
            );
        }
        Ok(areas)
    }
}

impl OptOutSource for SqliteSource {
    fn opt_out_records(&self, month: NaiveDate) -> Result<Vec<RawOptOutRecord>> {
        self.ensure_landed(Dataset::OptOutRecords, month)?;
        let mut stmt = self.conn.prepare(RECORDS_QUERY)?;
        let records = stmt
            .query_map(params![iso(month)], |row| {
                Ok(RawOptOutRecord {
                    patient_id: text(row, 0)?,
                    nhs_number: text(row, 1)?,
                    gender: text(row, 2)?,
                    date_of_birth: date(row, 3)?,
                    date_of_death: date(row, 4)?,
                    gp_practice: text(row, 5)?,
                    lsoa_code: text(row, 6)?,
                    record_start_date: date(row, 7)?,
                    record_end_date: date(row, 8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(%month, rows = records.len(), "loaded opt-out records");
        Ok(records)
    }

    fn list_size(&self, month: NaiveDate) -> Result<Vec<ListSizeRecord>> {
        self.ensure_landed(Dataset::ListSize, month)?;
        let mut stmt = self.conn.prepare(LIST_SIZE_QUERY)?;
        let records = stmt
            .query_map(params![iso(month)], |row| {
                let practice_code = text(row, 0)?.unwrap_or_default();
                let gender = Gender::from_code(text(row, 1)?.as_deref());
                let age: Option<i64> = row.get(2)?;
                let patients: i64 = row.get(3)?;
                Ok(ListSizeRecord {
                    month,
                    practice_code,
                    gender,
                    age,
                    patients: u64::try_from(patients).unwrap_or(0),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(%month, rows = records.len(), "loaded list size");
        Ok(records)
    }
}

impl ReferenceSource for SqliteSource {
    fn practices(&self, month: NaiveDate) -> Result<ReferenceSnapshot<PracticeGeography>> {
        let areas = self.areas(month)?;
        let mut stmt = self.conn.prepare(PRACTICES_QUERY)?;
        let rows = stmt.query_map(params![iso(month)], |row| {
            Ok((
                text(row, 0)?,
                text(row, 1)?,
                text(row, 2)?,
                text(row, 3)?,
                text(row, 4)?,
                text(row, 5)?,
            ))
        })?;
        let mut entries = BTreeMap::new();
        for row in rows {
            let (code, name, postcode, sub_icb, icb, region) = row?;
            let (Some(code), Some(sub_icb)) = (code, sub_icb) else {
                continue;
            };
            let code = code.trim().to_ascii_uppercase();
            let geography = PracticeGeography {
                practice_code: code.clone(),
                practice_name: name,
                postcode,
                sub_icb: area_or_code(&areas, sub_icb.trim()),
                icb: area_or_code(&areas, icb.as_deref().unwrap_or_default().trim()),
                region: area_or_code(&areas, region.as_deref().unwrap_or_default().trim()),
            };
            // Ordered by start date, so the latest version wins.
            entries.insert(code, geography);
        }
        let as_of = self.table_as_of("ods_practice")?;
        debug!(%month, practices = entries.len(), as_of = ?as_of, "loaded practice reference");
        Ok(ReferenceSnapshot { as_of, entries })
    }

    fn lsoas(&self, month: NaiveDate) -> Result<ReferenceSnapshot<LsoaGeography>> {
        let areas = self.areas(month)?;
        let mut stmt = self.conn.prepare(LSOAS_QUERY)?;
        let rows = stmt.query_map(params![iso(month)], |row| {
            Ok((
                text(row, 0)?,
                text(row, 1)?,
                text(row, 2)?,
                text(row, 3)?,
                text(row, 4)?,
            ))
        })?;
        let mut entries = BTreeMap::new();
        for row in rows {
            let (code, name, sub_icb, la_code, la_name) = row?;
            let (Some(code), Some(sub_icb)) = (code, sub_icb) else {
                continue;
            };
            let code = code.trim().to_ascii_uppercase();
            let mut local_authority = GeographyArea::new(la_code.unwrap_or_default());
            local_authority.name = la_name;
            entries.insert(
                code.clone(),
                LsoaGeography {
                    lsoa_code: code,
                    lsoa_name: name,
                    sub_icb: area_or_code(&areas, sub_icb.trim()),
                    local_authority,
                },
            );
        }
        let as_of = self.table_as_of("lsoa_sub_icb")?;
        debug!(%month, lsoas = entries.len(), as_of = ?as_of, "loaded LSOA reference");
        Ok(ReferenceSnapshot { as_of, entries })
    }
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn sex_code(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "FEMALE",
        Gender::Male => "MALE",
        Gender::Unknown => "UNKNOWN",
    }
}

/// Read a column as text whatever its storage class; identifiers and codes
/// are sometimes loaded as integers.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    };
    Ok(value.filter(|value| !value.trim().is_empty()))
}

/// Unparseable dates read as missing.
fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(parse_iso_date_opt(text(row, idx)?.as_deref()))
}

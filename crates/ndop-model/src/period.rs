//! Reporting window arithmetic.
//!
//! A publication covers `months` consecutive calendar months ending at the
//! report period end date (RPED). Every month is identified by its first day.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Default number of months covered by a publication.
pub const DEFAULT_REPORTING_MONTHS: u32 = 12;

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ModelError::InvalidDate {
        value: value.to_string(),
    })
}

/// Parse an ISO date leniently, returning `None` for empty or malformed input.
pub fn parse_iso_date_opt(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    // Source extracts sometimes carry a time component.
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    end_date: NaiveDate,
    publication_date: NaiveDate,
    months: u32,
}

impl ReportingPeriod {
    /// Create a validated reporting period.
    ///
    /// The end date must be the first day of a month and the period must
    /// cover at least one month.
    pub fn new(end_date: NaiveDate, publication_date: NaiveDate, months: u32) -> Result<Self> {
        if end_date.day() != 1 {
            return Err(ModelError::EndDateNotMonthStart(end_date));
        }
        if months == 0 {
            return Err(ModelError::EmptyPeriod);
        }
        end_date
            .checked_sub_months(Months::new(months - 1))
            .ok_or(ModelError::PeriodOutOfRange { end_date, months })?;
        Ok(Self {
            end_date,
            publication_date,
            months,
        })
    }

    /// Build a period from the command-surface strings.
    pub fn parse(rped: &str, pub_date: &str, months: u32) -> Result<Self> {
        Self::new(parse_iso_date(rped)?, parse_iso_date(pub_date)?, months)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn publication_date(&self) -> NaiveDate {
        self.publication_date
    }

    pub fn month_count(&self) -> u32 {
        self.months
    }

    /// First month of the window.
    pub fn start_date(&self) -> NaiveDate {
        // Validated in `new`.
        self.end_date
            .checked_sub_months(Months::new(self.months - 1))
            .unwrap_or(self.end_date)
    }

    /// Months of the window in chronological order.
    pub fn months(&self) -> Vec<NaiveDate> {
        let start = self.start_date();
        (0..self.months)
            .filter_map(|offset| start.checked_add_months(Months::new(offset)))
            .collect()
    }

    pub fn contains(&self, month: NaiveDate) -> bool {
        month.day() == 1 && month >= self.start_date() && month <= self.end_date
    }

    /// `Jan_2024` style stamp used in output file names.
    pub fn file_stamp(&self) -> String {
        self.end_date.format("%b_%Y").to_string()
    }

    /// `January 2024` style label.
    pub fn month_label(month: NaiveDate) -> String {
        month.format("%B %Y").to_string()
    }

    /// `8th February 2024` style publication date.
    pub fn formatted_publication_date(&self) -> String {
        let day = self.publication_date.day();
        let suffix = match day {
            4..=20 | 24..=30 => "th",
            _ => match day % 10 {
                1 => "st",
                2 => "nd",
                _ => "rd",
            },
        };
        format!(
            "{day}{suffix} {}",
            self.publication_date.format("%B %Y")
        )
    }
}

/// `dd/mm/yyyy` form used in the CSV extracts.
pub fn format_publication_month(month: NaiveDate) -> String {
    month.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn three_month_window_crosses_year() {
        let period = ReportingPeriod::new(date(2024, 1, 1), date(2024, 2, 8), 3).unwrap();
        assert_eq!(
            period.months(),
            vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1)]
        );
        assert_eq!(period.start_date(), date(2023, 11, 1));
        assert!(period.contains(date(2023, 12, 1)));
        assert!(!period.contains(date(2023, 10, 1)));
    }

    #[test]
    fn rejects_mid_month_end_date() {
        let err = ReportingPeriod::new(date(2024, 1, 15), date(2024, 2, 8), 12).unwrap_err();
        assert!(matches!(err, ModelError::EndDateNotMonthStart(_)));
    }

    #[test]
    fn rejects_zero_months() {
        let err = ReportingPeriod::new(date(2024, 1, 1), date(2024, 2, 8), 0).unwrap_err();
        assert!(matches!(err, ModelError::EmptyPeriod));
    }

    #[test]
    fn publication_date_suffixes() {
        let cases = [(1, "1st"), (2, "2nd"), (3, "3rd"), (8, "8th"), (11, "11th"), (22, "22nd"), (31, "31st")];
        for (day, expected) in cases {
            let period = ReportingPeriod::new(date(2024, 1, 1), date(2024, 3, day), 1).unwrap();
            assert_eq!(
                period.formatted_publication_date(),
                format!("{expected} March 2024")
            );
        }
    }

    #[test]
    fn file_stamp_uses_end_month() {
        let period = ReportingPeriod::parse("2024-01-01", "2024-02-08", 12).unwrap();
        assert_eq!(period.file_stamp(), "Jan_2024");
        assert_eq!(format_publication_month(period.end_date()), "01/01/2024");
    }

    #[test]
    fn lenient_date_parsing() {
        assert_eq!(parse_iso_date_opt(Some("2020-05-17")), Some(date(2020, 5, 17)));
        assert_eq!(
            parse_iso_date_opt(Some("2020-05-17 00:00:00")),
            Some(date(2020, 5, 17))
        );
        assert_eq!(parse_iso_date_opt(Some("  ")), None);
        assert_eq!(parse_iso_date_opt(Some("17/05/2020")), None);
        assert_eq!(parse_iso_date_opt(None), None);
    }
}

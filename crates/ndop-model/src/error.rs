use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("report period end date {0} must be the first day of a month")]
    EndDateNotMonthStart(NaiveDate),
    #[error("reporting period must cover at least one month")]
    EmptyPeriod,
    #[error("reporting period of {months} months ending {end_date} is out of range")]
    PeriodOutOfRange { end_date: NaiveDate, months: u32 },
    #[error("invalid age band configuration: {0}")]
    InvalidAgeBands(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

//! Publication configuration loading.
//!
//! The configuration is read once from an optional TOML file, overridden by
//! command-line flags and validated before any data is touched. Relative
//! paths in a file are taken relative to the file's directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

use ndop_core::RecordCleaner;
use ndop_model::{ModelError, PublicationConfig, ReportingPeriod};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid reporting period: {0}")]
    Period(#[source] ModelError),

    #[error("database {0} does not exist; create it with `ndop init-db`")]
    MissingDatabase(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Read `path`, or start from the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<PublicationConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(PublicationConfig::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(base) = path.parent() {
        resolve_relative_paths(&mut config, base);
    }
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<PublicationConfig, toml::de::Error> {
    toml::from_str(contents)
}

fn resolve_relative_paths(config: &mut PublicationConfig, base: &Path) {
    let resolve = |path: &mut PathBuf| {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    };
    resolve(&mut config.database);
    resolve(&mut config.output_dir);
    if let Some(file) = config.geography.practice_overrides.as_mut() {
        resolve(&mut file.path);
    }
    if let Some(file) = config.geography.lsoa_overrides.as_mut() {
        resolve(&mut file.path);
    }
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut PublicationConfig) {
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
    }
}

/// Checks that need more than deserialization. Age bands are validated as
/// they are parsed.
pub fn validate_config(config: &PublicationConfig) -> Result<(), ConfigError> {
    RecordCleaner::new(&config.cleaning).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    if config.cleaning.max_age == 0 {
        return Err(ConfigError::Invalid(
            "cleaning.max_age must be greater than zero".to_string(),
        ));
    }
    for (key, file) in [
        ("geography.practice_overrides", &config.geography.practice_overrides),
        ("geography.lsoa_overrides", &config.geography.lsoa_overrides),
    ] {
        if let Some(file) = file
            && !file.path.is_file()
        {
            return Err(ConfigError::Invalid(format!(
                "{key} file {} does not exist",
                file.path.display()
            )));
        }
    }
    Ok(())
}

pub fn reporting_period(
    rped: &str,
    pub_date: &str,
    months: u32,
) -> Result<ReportingPeriod, ConfigError> {
    ReportingPeriod::parse(rped, pub_date, months).map_err(ConfigError::Period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            database = "extracts/ndop.sqlite"

            [geography]
            boundary_effective_date = "2023-04-01"
            "#,
        )
        .expect("parse");
        assert_eq!(config.database, PathBuf::from("extracts/ndop.sqlite"));
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.cleaning.max_age, 120);
        assert_eq!(config.aggregation.compact_every, 3);
        assert_eq!(
            config.geography.boundary_effective_date.map(|date| date.to_string()),
            Some("2023-04-01".to_string())
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("databse = \"ndop.sqlite\"").is_err());
    }

    #[test]
    fn overlapping_age_bands_are_rejected() {
        let err = parse_config(
            r#"
            [[cleaning.age_bands]]
            label = "0-17"
            min = 0
            max = 17

            [[cleaning.age_bands]]
            label = "16+"
            min = 16
            "#,
        )
        .expect_err("overlapping bands");
        assert!(err.to_string().contains("must start at 18"), "{err}");
    }

    #[test]
    fn bad_lsoa_pattern_fails_validation() {
        let mut config = PublicationConfig::default();
        config.cleaning.lsoa_pattern = "^[EW01".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(message)) if message.contains("LSOA pattern")
        ));
    }

    #[test]
    fn flags_override_the_file() {
        let mut config = PublicationConfig::default();
        ConfigOverrides {
            database: Some(PathBuf::from("other.sqlite")),
            output_dir: None,
        }
        .apply(&mut config);
        assert_eq!(config.database, PathBuf::from("other.sqlite"));
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn period_must_start_on_the_first() {
        assert!(matches!(
            reporting_period("2024-01-15", "2024-02-08", 12),
            Err(ConfigError::Period(ModelError::EndDateNotMonthStart(_)))
        ));
        assert!(matches!(
            reporting_period("2024-01-01", "2024-02-08", 0),
            Err(ConfigError::Period(ModelError::EmptyPeriod))
        ));
    }
}

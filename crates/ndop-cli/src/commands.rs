//! Command implementations.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use ndop_core::{PipelineError, Publication, ReferenceResolver, run_publication};
use ndop_ingest::{MemorySource, SqliteSource};
use ndop_report::{WrittenOutputs, write_outputs};

use crate::cli::{CheckMappingsArgs, InitDbArgs, RunArgs};
use crate::config::{
    ConfigError, ConfigOverrides, load_config, reporting_period, validate_config,
};

/// Exit status for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_DATA_UNAVAILABLE: i32 = 3;
pub const EXIT_MAPPING_INTEGRITY: i32 = 4;
pub const EXIT_RECONCILIATION: i32 = 5;

pub struct RunOutcome {
    pub publication: Publication,
    pub outputs: WrittenOutputs,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingCheck {
    pub practices: Option<usize>,
    pub lsoas: Option<usize>,
}

pub fn run(args: &RunArgs) -> Result<RunOutcome> {
    let span = info_span!("run", rped = %args.rped, months = args.months);
    let _guard = span.enter();
    let start = Instant::now();

    let mut config = load_config(args.config.as_deref())?;
    ConfigOverrides {
        database: args.database.clone(),
        output_dir: args.output_dir.clone(),
    }
    .apply(&mut config);
    validate_config(&config)?;
    let period = reporting_period(&args.rped, &args.pub_date, args.months)?;
    if !config.database.is_file() {
        return Err(ConfigError::MissingDatabase(config.database.clone()).into());
    }

    let source = SqliteSource::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    let publication = run_publication(&config, &period, &source)?;
    let outputs = write_outputs(&config.output_dir, &publication).with_context(|| {
        format!(
            "failed to write outputs to {}",
            config.output_dir.display()
        )
    })?;

    info!(
        output_dir = %config.output_dir.display(),
        files = outputs.files.len(),
        duration_ms = start.elapsed().as_millis(),
        "run complete"
    );
    Ok(RunOutcome {
        publication,
        outputs,
        output_dir: config.output_dir,
    })
}

/// Load the configured fallback mapping files without reading any month.
pub fn check_mappings(args: &CheckMappingsArgs) -> Result<MappingCheck> {
    let config = load_config(args.config.as_deref())?;
    validate_config(&config)?;
    let source = MemorySource::default();
    let resolver = ReferenceResolver::new(&source, &config.geography)?;
    let (practices, lsoas) = resolver.override_counts();
    info!(?practices, ?lsoas, "mapping files passed integrity checks");
    Ok(MappingCheck { practices, lsoas })
}

pub fn init_db(args: &InitDbArgs) -> Result<()> {
    let source = SqliteSource::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;
    source
        .initialize_schema()
        .with_context(|| format!("failed to create tables in {}", args.database.display()))?;
    info!(database = %args.database.display(), "schema initialized");
    Ok(())
}

/// Map a failed command to its exit status.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    match error.downcast_ref::<PipelineError>() {
        Some(PipelineError::DataUnavailable { .. }) => EXIT_DATA_UNAVAILABLE,
        Some(PipelineError::MappingIntegrity { .. }) => EXIT_MAPPING_INTEGRITY,
        Some(PipelineError::Reconciliation { .. }) => EXIT_RECONCILIATION,
        Some(PipelineError::InvalidInput(_) | PipelineError::Model(_)) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

use tariff_etr::{
    average_by_period, read_records, read_reference, write_merged, write_results, EtrConfig,
    EtrError, EtrPipeline,
};

/// Input data failed schema or ISO3 alignment checks
const EXIT_VALIDATION: u8 = 2;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays a clean CSV
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let validation = err
        .chain()
        .filter_map(|e| e.downcast_ref::<EtrError>())
        .any(EtrError::is_fatal_validation);
    if validation {
        EXIT_VALIDATION
    } else {
        1
    }
}

fn try_main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        bail!("usage: tariff-etr <config.json> <records.csv>");
    }

    run(Path::new(&args[1]), Path::new(&args[2]))
}

fn run(config_path: &Path, records_path: &Path) -> Result<()> {
    let mut config = EtrConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config: {:?}", config_path))?;
    config.apply_env_overrides().context("Invalid ETR_* override")?;

    let pipeline = EtrPipeline::from_config(config).context("Failed to build rate table")?;
    info!(
        prefixes = pipeline.table().len(),
        digest = %pipeline.table().digest(),
        "rate table ready"
    );

    let file = File::open(records_path)
        .with_context(|| format!("Failed to open records: {:?}", records_path))?;
    let ingest = &pipeline.config().ingest;
    let mut records = read_records(file, ingest).context("Failed to read records")?;
    if let Some(period) = &ingest.period_column {
        records = average_by_period(records, period);
    }

    let report = pipeline.run(records)?;
    info!("{}", report.summary());

    let dims = &pipeline.config().dimensions;
    let stdout = io::stdout();

    match &pipeline.config().reference {
        Some(reference) => {
            let file = File::open(&reference.path)
                .with_context(|| format!("Failed to open reference data: {:?}", reference.path))?;
            let rows = read_reference(file, &reference.code_column, &reference.value_column)?;
            let merged = pipeline.merge_reference(report.results, &rows)?;
            write_merged(stdout.lock(), &merged, dims, &reference.value_column)?;
        }
        None => write_results(stdout.lock(), &report.results, dims)?,
    }

    Ok(())
}

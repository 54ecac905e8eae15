use std::error::Error;

use clap::Parser;
use log_delivery_validator::{
    config::{Args, Config, ConfigError},
    context::build_source,
    error::ValidationError,
    report::Report,
    validate,
};
use tracing::info;

fn setup_tracing() {
    // stdout is reserved for the report
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Help and version exit straight away. Any other argument error waits until the
/// environment has been checked, so env faults are reported first.
fn parse_args() -> Result<Args, ConfigError> {
    Args::try_parse().map_err(|e| {
        if !e.use_stderr() {
            e.exit();
        }
        ConfigError::from(e)
    })
}

async fn run(args: Result<Args, ConfigError>) -> Result<Report, ValidationError> {
    let config = Config::from_env()?;
    let args = args?;
    let total_input_records = args.record_count()?;
    let log_delay = args.log_delay()?;

    let mut source = build_source(&config).await?;
    validate(
        source.as_mut(),
        total_input_records,
        config.record_id_base,
        log_delay,
    )
    .await
}

fn exit_failure(err: &ValidationError) -> ! {
    eprintln!("[TEST FAILURE] {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("    caused by: {cause}");
        source = cause.source();
    }
    std::process::exit(1);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_tracing();
    let args = parse_args();

    match run(args).await {
        Ok(report) => {
            print!("{report}");
            info!("Validation finished");
        }
        Err(e) => exit_failure(&e),
    }
}

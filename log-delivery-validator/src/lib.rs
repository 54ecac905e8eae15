use tracing::{debug, info, warn, Level};

use crate::{
    config::last_record_id,
    destination::LogSource,
    error::ValidationError,
    reconcile::{reconcile, ReconciliationState},
    report::Report,
    universe::{RecordUniverse, RECORD_ID_LEN},
};

pub mod config;
pub mod context;
pub mod destination;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod universe;

/// Reads every line `source` has and compares it with the `total_input_records`
/// ids starting at `record_id_base`. Fails before reading anything when that range
/// does not fit in a `u64`.
pub async fn validate<S>(
    source: &mut S,
    total_input_records: u64,
    record_id_base: u64,
    log_delay: &str,
) -> Result<Report, ValidationError>
where
    S: LogSource + ?Sized,
{
    let last_id = last_record_id(total_input_records, record_id_base)?;
    let width = |id: u64| id.to_string().len();
    if width(record_id_base) != RECORD_ID_LEN || width(last_id) != RECORD_ID_LEN {
        warn!(
            "Expected ids {}..={} are not all {} digits wide and can never match a record prefix",
            record_id_base, last_id, RECORD_ID_LEN
        );
    }

    let universe = RecordUniverse::build(total_input_records, record_id_base);
    let mut state = ReconciliationState::new(universe);
    info!(
        "Validating {} expected records against {}",
        total_input_records,
        source.name()
    );

    reconcile(source, &mut state).await?;

    if tracing::enabled!(Level::DEBUG) {
        let missing = state.universe().missing_ids();
        if !missing.is_empty() {
            debug!(
                "First missing record ids: {:?}",
                missing.iter().take(20).collect::<Vec<_>>()
            );
        }
    }

    Ok(Report::new(
        source.name(),
        source.objects_read(),
        total_input_records,
        &state,
        log_delay,
    ))
}

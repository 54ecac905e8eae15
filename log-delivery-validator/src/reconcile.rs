use tracing::{debug, info};

use crate::{
    destination::LogSource,
    error::ValidationError,
    extract::extract,
    universe::{RecordId, RecordUniverse},
};

/// Running tally of a validation pass. Every parsed line bumps the line counter;
/// only expected ids flip a flag in the universe, so duplicates show up as the gap
/// between the two.
#[derive(Debug, Clone)]
pub struct ReconciliationState {
    total_lines_seen: u64,
    universe: RecordUniverse,
}

impl ReconciliationState {
    pub fn new(universe: RecordUniverse) -> Self {
        Self {
            total_lines_seen: 0,
            universe,
        }
    }

    pub fn observe(&mut self, record_id: &RecordId) {
        self.total_lines_seen += 1;
        self.universe.mark_seen(record_id.as_str());
    }

    pub fn total_lines_seen(&self) -> u64 {
        self.total_lines_seen
    }

    pub fn universe(&self) -> &RecordUniverse {
        &self.universe
    }
}

/// Drains `source` into `state`. Keeps going after every expected id has been seen
/// so the duplicate count covers the whole destination. Any destination or parse
/// error aborts the pass.
pub async fn reconcile<S>(
    source: &mut S,
    state: &mut ReconciliationState,
) -> Result<(), ValidationError>
where
    S: LogSource + ?Sized,
{
    let format = source.line_format();
    let mut batches: u64 = 0;
    while let Some(lines) = source.next_batch().await? {
        batches += 1;
        for line in lines.iter().filter(|line| !line.is_empty()) {
            let record = extract(line, format)?;
            state.observe(&record.record_id);
        }
        debug!(
            "Batch {} from {}: {} lines seen so far",
            batches,
            source.name(),
            state.total_lines_seen()
        );
    }
    info!(
        "Read {} lines from {} in {} batches",
        state.total_lines_seen(),
        source.name(),
        batches
    );
    Ok(())
}

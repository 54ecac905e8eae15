use std::fmt;

use crate::reconcile::ReconciliationState;

/// Final numbers for a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub destination: &'static str,
    pub objects_read: Option<u64>,
    pub total_input_records: u64,
    pub total_lines_observed: u64,
    pub unique_found: u64,
    pub duplicates: u64,
    pub loss_percent: u64,
    pub missing: u64,
    /// Passed through untouched from the command line.
    pub log_delay: String,
}

impl Report {
    pub fn new(
        destination: &'static str,
        objects_read: Option<u64>,
        total_input_records: u64,
        state: &ReconciliationState,
        log_delay: impl Into<String>,
    ) -> Self {
        let total_lines_observed = state.total_lines_seen();
        let unique_found = state.universe().seen_count();
        let missing = total_input_records.saturating_sub(unique_found);
        Self {
            destination,
            objects_read,
            total_input_records,
            total_lines_observed,
            unique_found,
            duplicates: total_lines_observed.saturating_sub(unique_found),
            loss_percent: loss_percent(total_input_records, unique_found),
            missing,
            log_delay: log_delay.into(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(9);
        if let Some(objects) = self.objects_read {
            lines.push(format!("Total object in {}: {}", self.destination, objects));
        }
        lines.push(format!("Total input record: {}", self.total_input_records));
        lines.push(format!(
            "Total record in destination: {}",
            self.total_lines_observed
        ));
        lines.push(format!("Unique record in destination: {}", self.unique_found));
        lines.push(format!("Duplicate records: {}", self.duplicates));
        lines.push(format!("Log Delay: {}", self.log_delay));
        lines.push(format!("Log Loss: {} %", self.loss_percent));
        if self.missing != 0 {
            lines.push(format!("Number of missing log records: {}", self.missing));
        }
        lines
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Truncating integer percentage of expected records that never arrived.
pub fn loss_percent(total_input_records: u64, unique_found: u64) -> u64 {
    total_input_records
        .saturating_sub(unique_found)
        .saturating_mul(100)
        .checked_div(total_input_records)
        .unwrap_or(0)
}

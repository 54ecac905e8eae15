use std::{borrow::Borrow, collections::HashMap, fmt};

/// Width of the id prefix our load producer writes at the start of every record,
/// e.g. `10029999_1639151827578_RandomString`.
pub const RECORD_ID_LEN: usize = 8;

pub const DEFAULT_RECORD_ID_BASE: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn from_sequence(value: u64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ids the producer was asked to write, each flagged once it has been seen at
/// the destination. Flags only ever go from unseen to seen, and ids outside the
/// initial range are never added.
#[derive(Debug, Clone)]
pub struct RecordUniverse {
    seen: HashMap<RecordId, bool>,
}

impl RecordUniverse {
    /// Builds `count` ids starting at `base_offset`. Callers reject a zero count
    /// and a range that overflows `u64` (see `config::last_record_id`) before
    /// getting here; ids past `u64::MAX` are never generated.
    pub fn build(count: u64, base_offset: u64) -> Self {
        let seen = (0..count)
            .map_while(|i| base_offset.checked_add(i))
            .map(|id| (RecordId::from_sequence(id), false))
            .collect();
        Self { seen }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// `None` for ids that are not part of the universe.
    pub fn is_seen(&self, id: &str) -> Option<bool> {
        self.seen.get(id).copied()
    }

    /// Flags `id` as delivered. Returns false, leaving the universe untouched, when
    /// the id was never expected.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        match self.seen.get_mut(id) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn seen_count(&self) -> u64 {
        self.seen.values().filter(|seen| **seen).count() as u64
    }

    /// Expected ids that never showed up, sorted so the output is stable.
    pub fn missing_ids(&self) -> Vec<&RecordId> {
        let mut missing: Vec<_> = self
            .seen
            .iter()
            .filter(|(_, seen)| !**seen)
            .map(|(id, _)| id)
            .collect();
        missing.sort();
        missing
    }
}

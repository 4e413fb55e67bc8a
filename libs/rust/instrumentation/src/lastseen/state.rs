//! Per-field observation state.

use dashmap::DashMap;

/// Last observed and last exported unix timestamps of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastSeen {
    /// Last observed unix timestamp, in seconds
    pub value: i64,
    /// Unix timestamp of the last successful export, in seconds
    pub last_flush: i64,
}

impl LastSeen {
    /// Whether enough time passed since the last export.
    #[must_use]
    pub const fn is_due(&self, interval_seconds: i64) -> bool {
        let diff = self.value.saturating_sub(self.last_flush);
        diff > 0 && diff > interval_seconds
    }
}

/// A claimed export: the state already records it as flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flush {
    /// Snapshot handed to the exporters
    pub(crate) seen: LastSeen,
    /// Export timestamp to restore if the export fails
    pub(crate) previous_flush: i64,
}

/// Concurrent field to [`LastSeen`] map. Entries are never removed.
#[derive(Debug, Default)]
pub(crate) struct State {
    fields: DashMap<String, LastSeen>,
}

impl State {
    /// Record an observation. Returns `false` when the value is unchanged.
    pub(crate) fn observe(&self, field: &str, now: i64) -> bool {
        if let Some(mut entry) = self.fields.get_mut(field) {
            if entry.value == now {
                return false;
            }
            entry.value = now;
            return true;
        }
        let mut entry = self.fields.entry(field.to_string()).or_default();
        if entry.value == now {
            return false;
        }
        entry.value = now;
        true
    }

    pub(crate) fn get(&self, field: &str) -> LastSeen {
        self.fields.get(field).map(|entry| *entry).unwrap_or_default()
    }

    /// Claim an export of `field` if one is due.
    ///
    /// The state is marked flushed before the export runs, so a concurrent
    /// claim of the same value finds nothing due.
    pub(crate) fn claim(&self, field: &str, interval_seconds: i64) -> Option<Flush> {
        let mut entry = self.fields.get_mut(field)?;
        if !entry.is_due(interval_seconds) {
            return None;
        }
        let previous_flush = entry.last_flush;
        entry.last_flush = entry.value;
        Some(Flush {
            seen: LastSeen {
                value: entry.value,
                last_flush: previous_flush,
            },
            previous_flush,
        })
    }

    /// Undo a failed claim unless a later claim already replaced it.
    pub(crate) fn rollback(&self, field: &str, flush: &Flush) {
        if let Some(mut entry) = self.fields.get_mut(field) {
            if entry.last_flush == flush.seen.value {
                entry.last_flush = flush.previous_flush;
            }
        }
    }

    pub(crate) fn fields(&self) -> Vec<String> {
        self.fields.iter().map(|entry| entry.key().clone()).collect()
    }
}

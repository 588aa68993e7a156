/*!
 * Reconciliation statistics
 */

use crate::error::ErrorCategory;
use serde::{Deserialize, Serialize};

/// Counters accumulated by a monitor since construction
///
/// `start_monitoring` resets the model but not these counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Events that ran to completion (including ones whose pushes failed)
    pub events_processed: u64,

    /// Events refused before touching the model
    pub events_rejected: u64,

    /// Backend commands applied successfully
    pub commands_sent: u64,

    /// Backend commands the backend refused
    pub commands_failed: u64,

    /// UIDs covered by backend commands, successful or not
    pub uids_pushed: u64,

    /// Full snapshots pushed by `start_monitoring`
    pub full_syncs: u64,

    /// Rejections caused by collaborator contract violations
    pub invariant_violations: u64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_command(&mut self, uids: usize, succeeded: bool) {
        self.uids_pushed += uids as u64;
        if succeeded {
            self.commands_sent += 1;
        } else {
            self.commands_failed += 1;
        }
    }

    pub(crate) fn record_outcome(&mut self, failure: Option<ErrorCategory>) {
        match failure {
            None | Some(ErrorCategory::Backend) => self.events_processed += 1,
            Some(ErrorCategory::InvariantViolation) => {
                self.events_rejected += 1;
                self.invariant_violations += 1;
            }
            Some(_) => self.events_rejected += 1,
        }
    }

    /// Fraction of backend commands that were applied (0.0 - 1.0)
    pub fn command_success_rate(&self) -> f64 {
        let total = self.commands_sent + self.commands_failed;
        if total == 0 {
            1.0
        } else {
            self.commands_sent as f64 / total as f64
        }
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Events: {} processed | {} rejected | Commands: {}/{} ({:.1}%) covering {} uids | Full syncs: {}",
            self.events_processed,
            self.events_rejected,
            self.commands_sent,
            self.commands_sent + self.commands_failed,
            self.command_success_rate() * 100.0,
            self.uids_pushed,
            self.full_syncs
        )
    }
}

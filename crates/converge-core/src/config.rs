//! Engine configuration

use crate::action::Operation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one reconciliation engine instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Per-operation stabilization budgets
    pub timeouts: OperationTimeouts,

    /// Stabilization poll cadence
    pub poll: PollSettings,
}

/// Stabilization budget for each operation class, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    pub create_secs: u64,
    pub read_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create_secs: 10 * 60,
            read_secs: 5 * 60,
            update_secs: 10 * 60,
            delete_secs: 10 * 60,
        }
    }
}

impl OperationTimeouts {
    pub fn for_operation(&self, operation: Operation) -> Duration {
        let secs = match operation {
            Operation::Create => self.create_secs,
            Operation::Read => self.read_secs,
            Operation::Update => self.update_secs,
            Operation::Delete => self.delete_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Poll cadence shared by every stabilizing entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Wait before the first re-read
    pub delay_ms: u64,

    /// Minimum wait between re-reads
    pub min_interval_ms: u64,

    /// Consecutive target observations required before success
    pub continuous_target_occurrence: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            delay_ms: 5_000,
            min_interval_ms: 10_000,
            continuous_target_occurrence: 1,
        }
    }
}

impl PollSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

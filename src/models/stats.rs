use serde::{Deserialize, Serialize};

/// Server-computed counters, replaced wholesale on every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_issues: u64,
    #[serde(default)]
    pub open_issues: u64,
    #[serde(default)]
    pub overdue_issues: u64,
    #[serde(default)]
    pub resolved_issues: u64,
    /// Average days from creation to resolution.
    #[serde(default)]
    pub avg_resolution_time: i64,
}

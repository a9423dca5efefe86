use serde::{Deserialize, Serialize};

use crate::model::ids::TaskId;

/// A single study task, optionally pinned to a calendar date.
///
/// The date is kept as an opaque `YYYY-MM-DD` string; an empty string means
/// the source document carried no date. Absence is preserved, never
/// inferred — a dateless task counts toward overall totals but never toward
/// daily metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub id: TaskId,
    pub name: String,
    pub date: String,
    pub completed: bool,
}

impl DailyTask {
    /// Creates a task with a freshly minted ID, not yet completed.
    ///
    /// Completion status is a destination-system concept set later by the
    /// user; it is never imported from pasted content.
    #[must_use]
    pub fn new(name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: TaskId::mint(),
            name: name.into(),
            date: date.into(),
            completed: false,
        }
    }

    /// Returns true when the task carries a calendar date.
    #[must_use]
    pub fn has_date(&self) -> bool {
        !self.date.is_empty()
    }
}

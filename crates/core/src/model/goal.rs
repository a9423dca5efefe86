use serde::{Deserialize, Serialize};

use crate::model::ids::{MonthlyGoalId, WeeklyGoalId};
use crate::model::task::DailyTask;

/// A goal for one week of the plan, with its nested tasks.
///
/// `completed` is an explicit flag, not derived from the nested tasks: a
/// week can be marked done while tasks remain open, and vice versa.
/// `week_number` carries no uniqueness constraint; duplicates are a
/// presentation concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoal {
    pub id: WeeklyGoalId,
    pub week_number: u32,
    pub goal: String,
    pub tasks: Vec<DailyTask>,
    pub completed: bool,
}

impl WeeklyGoal {
    /// Creates a weekly goal with a freshly minted ID, not yet completed.
    #[must_use]
    pub fn new(week_number: u32, goal: impl Into<String>, tasks: Vec<DailyTask>) -> Self {
        Self {
            id: WeeklyGoalId::mint(),
            week_number,
            goal: goal.into(),
            tasks,
            completed: false,
        }
    }
}

/// A month-level goal, independent of weekly and daily items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGoal {
    pub id: MonthlyGoalId,
    pub goal: String,
    pub completed: bool,
}

impl MonthlyGoal {
    /// Creates a monthly goal with a freshly minted ID, not yet completed.
    #[must_use]
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            id: MonthlyGoalId::mint(),
            goal: goal.into(),
            completed: false,
        }
    }
}

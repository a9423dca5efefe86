use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::goal::{MonthlyGoal, WeeklyGoal};
use crate::model::ids::{PlanId, TaskId};
use crate::model::task::DailyTask;

/// Canonical three-level plan: monthly goals, weekly goals with nested
/// tasks, and the flat task list.
///
/// `daily_tasks` is the authoritative superset: every task nested under a
/// weekly goal also appears here, and it is the single source of truth for
/// overall counting. The structure is fixed after normalization; only
/// completion flags flip (plus out-of-band CRUD applied by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub id: PlanId,
    pub exam_name: String,
    pub month: String,
    pub monthly_goals: Vec<MonthlyGoal>,
    pub weekly_goals: Vec<WeeklyGoal>,
    pub daily_tasks: Vec<DailyTask>,
    pub created_at: DateTime<Utc>,
}

impl StudyPlan {
    /// Looks a task up in the flat list.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&DailyTask> {
        self.daily_tasks.iter().find(|t| t.id == id)
    }

    /// True when every task nested under a weekly goal is also present in
    /// the flat list, by identity.
    #[must_use]
    pub fn flat_list_is_superset(&self) -> bool {
        self.weekly_goals
            .iter()
            .flat_map(|week| week.tasks.iter())
            .all(|nested| self.task(nested.id).is_some())
    }
}

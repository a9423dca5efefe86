mod goal;
mod ids;
mod plan;
mod task;

pub use goal::{MonthlyGoal, WeeklyGoal};
pub use ids::{MonthlyGoalId, ParseIdError, PlanId, TaskId, UserId, WeeklyGoalId};
pub use plan::StudyPlan;
pub use task::DailyTask;

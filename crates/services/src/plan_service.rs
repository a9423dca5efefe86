use std::sync::Arc;

use plan_core::Clock;
use plan_core::model::{
    DailyTask, MonthlyGoal, MonthlyGoalId, PlanId, StudyPlan, TaskId, UserId, WeeklyGoal,
    WeeklyGoalId,
};
use plan_core::normalize::{normalize, parse_document, validate};
use storage::repository::{
    GoalRepository, PlanListQuery, PlanRepository, PlanSummary, TaskFilter, TaskRepository,
};

use crate::error::PlanServiceError;

/// Orchestrates plan uploads and the CRUD applied to a plan afterwards.
///
/// Upload is the only path that creates plans: parse, validate, normalize,
/// persist. Everything after creation is flag flips and additions/removals
/// of individual tasks and goals; the hierarchy is never restructured.
#[derive(Clone)]
pub struct PlanService {
    clock: Clock,
    plans: Arc<dyn PlanRepository>,
    tasks: Arc<dyn TaskRepository>,
    goals: Arc<dyn GoalRepository>,
}

impl PlanService {
    #[must_use]
    pub fn new(
        clock: Clock,
        plans: Arc<dyn PlanRepository>,
        tasks: Arc<dyn TaskRepository>,
        goals: Arc<dyn GoalRepository>,
    ) -> Self {
        Self {
            clock,
            plans,
            tasks,
            goals,
        }
    }

    /// Turn raw uploaded text into a persisted canonical plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Parse` for malformed input,
    /// `PlanServiceError::Validation` when the document fails the shape
    /// check, and `PlanServiceError::Storage` if persistence fails.
    pub async fn upload_plan(
        &self,
        owner: UserId,
        raw: &str,
    ) -> Result<StudyPlan, PlanServiceError> {
        let doc = parse_document(raw)?;
        validate(&doc)?;

        let plan = normalize(&doc, self.clock.now());
        tracing::debug!(
            plan = %plan.id,
            exam = %plan.exam_name,
            tasks = plan.daily_tasks.len(),
            weeks = plan.weekly_goals.len(),
            "normalized uploaded plan"
        );

        self.plans.insert_plan(owner, &plan).await?;
        Ok(plan)
    }

    /// Fetch a plan with its full hierarchy.
    ///
    /// Returns `Ok(None)` when the plan does not exist.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails or the
    /// plan belongs to another owner.
    pub async fn get_plan(
        &self,
        owner: UserId,
        id: PlanId,
    ) -> Result<Option<StudyPlan>, PlanServiceError> {
        let plan = self.plans.get_plan(owner, id).await?;
        Ok(plan)
    }

    /// List the owner's plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn list_plans(
        &self,
        owner: UserId,
        query: PlanListQuery,
    ) -> Result<Vec<PlanSummary>, PlanServiceError> {
        let summaries = self.plans.list_plans(owner, query).await?;
        Ok(summaries)
    }

    /// Delete a plan and everything nested under it.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn delete_plan(&self, owner: UserId, id: PlanId) -> Result<(), PlanServiceError> {
        self.plans.delete_plan(owner, id).await?;
        Ok(())
    }

    /// Flip a task's completion flag.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn set_task_completed(
        &self,
        owner: UserId,
        task_id: TaskId,
        completed: bool,
    ) -> Result<(), PlanServiceError> {
        self.tasks.set_task_completed(owner, task_id, completed).await?;
        Ok(())
    }

    /// Flip a weekly goal's own completion flag; its tasks are untouched.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn set_weekly_goal_completed(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
        completed: bool,
    ) -> Result<(), PlanServiceError> {
        self.goals
            .set_weekly_goal_completed(owner, goal_id, completed)
            .await?;
        Ok(())
    }

    /// Flip a monthly goal's completion flag.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn set_monthly_goal_completed(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
        completed: bool,
    ) -> Result<(), PlanServiceError> {
        self.goals
            .set_monthly_goal_completed(owner, goal_id, completed)
            .await?;
        Ok(())
    }

    /// Add a task to a plan, optionally nested under a weekly goal.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if the plan or weekly goal is
    /// missing or owned by someone else.
    pub async fn add_task(
        &self,
        owner: UserId,
        plan_id: PlanId,
        week: Option<WeeklyGoalId>,
        name: String,
        date: String,
    ) -> Result<TaskId, PlanServiceError> {
        let task = DailyTask::new(name, date);
        self.tasks.insert_task(owner, plan_id, week, &task).await?;
        Ok(task.id)
    }

    /// Add an empty weekly goal to a plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn add_weekly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        week_number: u32,
        goal: String,
    ) -> Result<WeeklyGoalId, PlanServiceError> {
        let goal = WeeklyGoal::new(week_number, goal, Vec::new());
        self.goals.insert_weekly_goal(owner, plan_id, &goal).await?;
        Ok(goal.id)
    }

    /// Add a monthly goal to a plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn add_monthly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: String,
    ) -> Result<MonthlyGoalId, PlanServiceError> {
        let goal = MonthlyGoal::new(goal);
        self.goals.insert_monthly_goal(owner, plan_id, &goal).await?;
        Ok(goal.id)
    }

    /// List a plan's tasks, optionally filtered by date or weekly goal.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn list_tasks(
        &self,
        owner: UserId,
        plan_id: PlanId,
        filter: TaskFilter,
    ) -> Result<Vec<DailyTask>, PlanServiceError> {
        let tasks = self.tasks.list_tasks(owner, plan_id, filter).await?;
        Ok(tasks)
    }

    /// Remove a task from the flat list and any weekly goal nesting it.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn delete_task(&self, owner: UserId, task_id: TaskId) -> Result<(), PlanServiceError> {
        self.tasks.delete_task(owner, task_id).await?;
        Ok(())
    }

    /// Remove a weekly goal, detaching (not deleting) its tasks.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn delete_weekly_goal(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
    ) -> Result<(), PlanServiceError> {
        self.goals.delete_weekly_goal(owner, goal_id).await?;
        Ok(())
    }

    /// Remove a monthly goal.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if repository access fails.
    pub async fn delete_monthly_goal(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
    ) -> Result<(), PlanServiceError> {
        self.goals.delete_monthly_goal(owner, goal_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use plan_core::time::fixed_clock;
    use storage::repository::{InMemoryRepository, StorageError};

    fn build_service() -> PlanService {
        let repo = InMemoryRepository::new();
        PlanService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo),
        )
    }

    #[tokio::test]
    async fn upload_rejects_malformed_json() {
        let service = build_service();
        let err = service
            .upload_plan(UserId::new(1), "{oops")
            .await
            .unwrap_err();
        assert!(matches!(err, PlanServiceError::Parse(_)));
    }

    #[tokio::test]
    async fn upload_rejects_shapeless_documents() {
        let service = build_service();
        let err = service
            .upload_plan(UserId::new(1), r#"{"month": "June"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_persists_the_normalized_plan() {
        let service = build_service();
        let owner = UserId::new(1);
        let raw = r#"{"exam": "Boards", "weeklyGoals": [{"goal": "W1", "tasks": ["t1"]}]}"#;

        let plan = service.upload_plan(owner, raw).await.unwrap();
        assert_eq!(plan.exam_name, "Boards");

        let fetched = service.get_plan(owner, plan.id).await.unwrap().unwrap();
        assert_eq!(fetched, plan);
    }

    #[tokio::test]
    async fn added_tasks_keep_the_flat_list_authoritative() {
        let service = build_service();
        let owner = UserId::new(1);
        let raw = r#"{"examName": "X", "weeklyGoals": [{"goal": "W1"}]}"#;
        let plan = service.upload_plan(owner, raw).await.unwrap();
        let week_id = plan.weekly_goals[0].id;

        let task_id = service
            .add_task(owner, plan.id, Some(week_id), "t1".into(), String::new())
            .await
            .unwrap();

        let fetched = service.get_plan(owner, plan.id).await.unwrap().unwrap();
        assert!(fetched.flat_list_is_superset());
        assert!(fetched.task(task_id).is_some());
        assert_eq!(fetched.weekly_goals[0].tasks[0].id, task_id);
    }

    #[tokio::test]
    async fn flag_flips_require_ownership() {
        let service = build_service();
        let owner = UserId::new(1);
        let raw = r#"{"examName": "X", "dailyTasks": [{"name": "t"}]}"#;
        let plan = service.upload_plan(owner, raw).await.unwrap();

        let err = service
            .set_task_completed(UserId::new(2), plan.daily_tasks[0].id, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlanServiceError::Storage(StorageError::Forbidden)
        ));
    }
}

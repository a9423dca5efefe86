use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plan_core::model::{
    DailyTask, MonthlyGoal, MonthlyGoalId, PlanId, StudyPlan, TaskId, UserId, WeeklyGoal,
    WeeklyGoalId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The row exists but belongs to a different owner.
    #[error("forbidden")]
    Forbidden,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Listing shape for a user's plans; the full hierarchy is fetched per plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub id: PlanId,
    pub exam_name: String,
    pub month: String,
    pub created_at: DateTime<Utc>,
}

/// Paging and search parameters for plan listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanListQuery {
    /// Case-insensitive substring match on exam name or month label.
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for PlanListQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: 10,
            offset: 0,
        }
    }
}

/// Filters for task listings within one plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilter {
    /// Exact match on the task's date string.
    pub date: Option<String>,
    /// Restrict to tasks nested under one weekly goal.
    pub weekly_goal: Option<WeeklyGoalId>,
}

/// A bearer-token session mapping to an owner identity with expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Repository contract for whole plans.
///
/// Every operation takes the acting owner; rows owned by someone else yield
/// `StorageError::Forbidden`, missing rows `StorageError::NotFound`.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Persist a freshly normalized plan with its full hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the plan ID already exists, or
    /// other storage errors.
    async fn insert_plan(&self, owner: UserId, plan: &StudyPlan) -> Result<(), StorageError>;

    /// Fetch a plan with goals and tasks. Returns `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` when the plan belongs to another
    /// owner, or other storage errors.
    async fn get_plan(&self, owner: UserId, id: PlanId)
    -> Result<Option<StudyPlan>, StorageError>;

    /// List the owner's plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    async fn list_plans(
        &self,
        owner: UserId,
        query: PlanListQuery,
    ) -> Result<Vec<PlanSummary>, StorageError>;

    /// Delete a plan and everything nested under it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above, or other storage errors.
    async fn delete_plan(&self, owner: UserId, id: PlanId) -> Result<(), StorageError>;
}

/// Repository contract for daily tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Append a task to a plan's flat list, optionally nesting it under a
    /// weekly goal (the nested copy shares the task's identity).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when the plan or weekly goal is
    /// missing, `StorageError::Forbidden` on ownership mismatch.
    async fn insert_task(
        &self,
        owner: UserId,
        plan_id: PlanId,
        week: Option<WeeklyGoalId>,
        task: &DailyTask,
    ) -> Result<(), StorageError>;

    /// Flip a task's completion flag. Atomic: readers never observe a task
    /// completed in one view and open in the other.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn set_task_completed(
        &self,
        owner: UserId,
        task_id: TaskId,
        completed: bool,
    ) -> Result<(), StorageError>;

    /// List a plan's tasks, optionally filtered by date or weekly goal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn list_tasks(
        &self,
        owner: UserId,
        plan_id: PlanId,
        filter: TaskFilter,
    ) -> Result<Vec<DailyTask>, StorageError>;

    /// Remove a task from the flat list and from any weekly goal nesting it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn delete_task(&self, owner: UserId, task_id: TaskId) -> Result<(), StorageError>;
}

/// Repository contract for weekly and monthly goals.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Append a weekly goal; its nested tasks join the plan's flat list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn insert_weekly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &WeeklyGoal,
    ) -> Result<(), StorageError>;

    /// Append a monthly goal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn insert_monthly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &MonthlyGoal,
    ) -> Result<(), StorageError>;

    /// Flip a weekly goal's own completion flag; nested tasks are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn set_weekly_goal_completed(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
        completed: bool,
    ) -> Result<(), StorageError>;

    /// Flip a monthly goal's completion flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn set_monthly_goal_completed(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
        completed: bool,
    ) -> Result<(), StorageError>;

    /// Remove a weekly goal. Its tasks are detached, not deleted: they stay
    /// in the plan's flat list as unassigned tasks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn delete_weekly_goal(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
    ) -> Result<(), StorageError>;

    /// Remove a monthly goal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` / `StorageError::Forbidden` as
    /// above.
    async fn delete_monthly_goal(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
    ) -> Result<(), StorageError>;
}

/// Repository contract for bearer-token sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a session token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the token already exists.
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Look a token up. Expiry is the caller's concern; expired records are
    /// returned as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Drop a session token; missing tokens are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct OwnedPlan {
    owner: UserId,
    plan: StudyPlan,
}

type PlanGuard<'a> = MutexGuard<'a, HashMap<PlanId, OwnedPlan>>;
type SessionGuard<'a> = MutexGuard<'a, HashMap<String, SessionRecord>>;

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    plans: Arc<Mutex<HashMap<PlanId, OwnedPlan>>>,
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_plans(&self) -> Result<PlanGuard<'_>, StorageError> {
        self.plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn lock_sessions(&self) -> Result<SessionGuard<'_>, StorageError> {
        self.sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn check_owner(entry: &OwnedPlan, owner: UserId) -> Result<(), StorageError> {
    if entry.owner == owner {
        Ok(())
    } else {
        Err(StorageError::Forbidden)
    }
}

fn entry_with_task(
    guard: &mut HashMap<PlanId, OwnedPlan>,
    task_id: TaskId,
) -> Option<&mut OwnedPlan> {
    guard
        .values_mut()
        .find(|entry| entry.plan.daily_tasks.iter().any(|t| t.id == task_id))
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn insert_plan(&self, owner: UserId, plan: &StudyPlan) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        if guard.contains_key(&plan.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(
            plan.id,
            OwnedPlan {
                owner,
                plan: plan.clone(),
            },
        );
        Ok(())
    }

    async fn get_plan(
        &self,
        owner: UserId,
        id: PlanId,
    ) -> Result<Option<StudyPlan>, StorageError> {
        let guard = self.lock_plans()?;
        match guard.get(&id) {
            Some(entry) => {
                check_owner(entry, owner)?;
                Ok(Some(entry.plan.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_plans(
        &self,
        owner: UserId,
        query: PlanListQuery,
    ) -> Result<Vec<PlanSummary>, StorageError> {
        let guard = self.lock_plans()?;
        let needle = query.search.as_deref().map(str::to_lowercase);

        let mut summaries: Vec<PlanSummary> = guard
            .values()
            .filter(|entry| entry.owner == owner)
            .filter(|entry| {
                needle.as_deref().is_none_or(|n| {
                    entry.plan.exam_name.to_lowercase().contains(n)
                        || entry.plan.month.to_lowercase().contains(n)
                })
            })
            .map(|entry| PlanSummary {
                id: entry.plan.id,
                exam_name: entry.plan.exam_name.clone(),
                month: entry.plan.month.clone(),
                created_at: entry.plan.created_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(summaries
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn delete_plan(&self, owner: UserId, id: PlanId) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard.get(&id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;
        guard.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryRepository {
    async fn insert_task(
        &self,
        owner: UserId,
        plan_id: PlanId,
        week: Option<WeeklyGoalId>,
        task: &DailyTask,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard.get_mut(&plan_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        if let Some(week_id) = week {
            let goal = entry
                .plan
                .weekly_goals
                .iter_mut()
                .find(|g| g.id == week_id)
                .ok_or(StorageError::NotFound)?;
            goal.tasks.push(task.clone());
        }
        entry.plan.daily_tasks.push(task.clone());
        Ok(())
    }

    async fn set_task_completed(
        &self,
        owner: UserId,
        task_id: TaskId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = entry_with_task(&mut guard, task_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        // Flat list and nested copy are the same logical row; flip both.
        for task in entry.plan.daily_tasks.iter_mut().filter(|t| t.id == task_id) {
            task.completed = completed;
        }
        for goal in &mut entry.plan.weekly_goals {
            for task in goal.tasks.iter_mut().filter(|t| t.id == task_id) {
                task.completed = completed;
            }
        }
        Ok(())
    }

    async fn list_tasks(
        &self,
        owner: UserId,
        plan_id: PlanId,
        filter: TaskFilter,
    ) -> Result<Vec<DailyTask>, StorageError> {
        let guard = self.lock_plans()?;
        let entry = guard.get(&plan_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        let base: Vec<DailyTask> = match filter.weekly_goal {
            Some(week_id) => entry
                .plan
                .weekly_goals
                .iter()
                .find(|g| g.id == week_id)
                .ok_or(StorageError::NotFound)?
                .tasks
                .clone(),
            None => entry.plan.daily_tasks.clone(),
        };

        Ok(base
            .into_iter()
            .filter(|t| filter.date.as_deref().is_none_or(|d| t.date == d))
            .collect())
    }

    async fn delete_task(&self, owner: UserId, task_id: TaskId) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = entry_with_task(&mut guard, task_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        entry.plan.daily_tasks.retain(|t| t.id != task_id);
        for goal in &mut entry.plan.weekly_goals {
            goal.tasks.retain(|t| t.id != task_id);
        }
        Ok(())
    }
}

#[async_trait]
impl GoalRepository for InMemoryRepository {
    async fn insert_weekly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &WeeklyGoal,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard.get_mut(&plan_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        // The flat list stays the superset of all nested tasks.
        entry.plan.daily_tasks.extend(goal.tasks.iter().cloned());
        entry.plan.weekly_goals.push(goal.clone());
        Ok(())
    }

    async fn insert_monthly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &MonthlyGoal,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard.get_mut(&plan_id).ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;
        entry.plan.monthly_goals.push(goal.clone());
        Ok(())
    }

    async fn set_weekly_goal_completed(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard
            .values_mut()
            .find(|e| e.plan.weekly_goals.iter().any(|g| g.id == goal_id))
            .ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        for goal in entry
            .plan
            .weekly_goals
            .iter_mut()
            .filter(|g| g.id == goal_id)
        {
            goal.completed = completed;
        }
        Ok(())
    }

    async fn set_monthly_goal_completed(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard
            .values_mut()
            .find(|e| e.plan.monthly_goals.iter().any(|g| g.id == goal_id))
            .ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        for goal in entry
            .plan
            .monthly_goals
            .iter_mut()
            .filter(|g| g.id == goal_id)
        {
            goal.completed = completed;
        }
        Ok(())
    }

    async fn delete_weekly_goal(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard
            .values_mut()
            .find(|e| e.plan.weekly_goals.iter().any(|g| g.id == goal_id))
            .ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        // Nested tasks are detached, not deleted: their flat-list rows stay.
        entry.plan.weekly_goals.retain(|g| g.id != goal_id);
        Ok(())
    }

    async fn delete_monthly_goal(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock_plans()?;
        let entry = guard
            .values_mut()
            .find(|e| e.plan.monthly_goals.iter().any(|g| g.id == goal_id))
            .ok_or(StorageError::NotFound)?;
        check_owner(entry, owner)?;

        entry.plan.monthly_goals.retain(|g| g.id != goal_id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.lock_sessions()?;
        if guard.contains_key(&record.token) {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.lock_sessions()?;
        Ok(guard.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        let mut guard = self.lock_sessions()?;
        guard.remove(token);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub plans: Arc<dyn PlanRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub goals: Arc<dyn GoalRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let plans: Arc<dyn PlanRepository> = Arc::new(repo.clone());
        let tasks: Arc<dyn TaskRepository> = Arc::new(repo.clone());
        let goals: Arc<dyn GoalRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Self {
            plans,
            tasks,
            goals,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::normalize::normalize;
    use plan_core::time::fixed_now;
    use serde_json::json;

    fn build_plan() -> StudyPlan {
        let doc = json!({
            "examName": "Finals",
            "month": "June 2025",
            "monthlyGoals": ["M1"],
            "weeklyGoals": [{ "goal": "W1", "tasks": [
                { "name": "t1", "date": "2025-06-01" }
            ]}],
            "dailyTasks": [{ "name": "s1" }]
        });
        normalize(&doc, fixed_now())
    }

    #[tokio::test]
    async fn round_trips_a_plan() {
        let repo = InMemoryRepository::new();
        let owner = UserId::new(1);
        let plan = build_plan();
        repo.insert_plan(owner, &plan).await.unwrap();

        let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
        assert_eq!(fetched, plan);
    }

    #[tokio::test]
    async fn flag_flip_updates_flat_and_nested_views() {
        let repo = InMemoryRepository::new();
        let owner = UserId::new(1);
        let plan = build_plan();
        let nested_id = plan.weekly_goals[0].tasks[0].id;
        repo.insert_plan(owner, &plan).await.unwrap();

        repo.set_task_completed(owner, nested_id, true).await.unwrap();

        let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
        assert!(fetched.task(nested_id).unwrap().completed);
        assert!(fetched.weekly_goals[0].tasks[0].completed);
    }

    #[tokio::test]
    async fn other_owners_are_rejected() {
        let repo = InMemoryRepository::new();
        let owner = UserId::new(1);
        let intruder = UserId::new(2);
        let plan = build_plan();
        repo.insert_plan(owner, &plan).await.unwrap();

        assert!(matches!(
            repo.get_plan(intruder, plan.id).await,
            Err(StorageError::Forbidden)
        ));
        assert!(matches!(
            repo.set_task_completed(intruder, plan.daily_tasks[0].id, true)
                .await,
            Err(StorageError::Forbidden)
        ));
        assert!(matches!(
            repo.delete_plan(intruder, plan.id).await,
            Err(StorageError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn deleting_a_week_detaches_its_tasks() {
        let repo = InMemoryRepository::new();
        let owner = UserId::new(1);
        let plan = build_plan();
        let week_id = plan.weekly_goals[0].id;
        let task_count = plan.daily_tasks.len();
        repo.insert_plan(owner, &plan).await.unwrap();

        repo.delete_weekly_goal(owner, week_id).await.unwrap();

        let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
        assert!(fetched.weekly_goals.is_empty());
        assert_eq!(fetched.daily_tasks.len(), task_count);
    }

    #[tokio::test]
    async fn search_filters_listings() {
        let repo = InMemoryRepository::new();
        let owner = UserId::new(1);
        let plan = build_plan();
        repo.insert_plan(owner, &plan).await.unwrap();

        let hits = repo
            .list_plans(
                owner,
                PlanListQuery {
                    search: Some("finals".into()),
                    ..PlanListQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].exam_name, "Finals");

        let misses = repo
            .list_plans(
                owner,
                PlanListQuery {
                    search: Some("midterm".into()),
                    ..PlanListQuery::default()
                },
            )
            .await
            .unwrap();
        assert!(misses.is_empty());
    }
}

use async_trait::async_trait;
use plan_core::model::{DailyTask, PlanId, TaskId, UserId, WeeklyGoalId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, exec_err, map_task_row, ser, user_id_from_i64};
use crate::repository::{StorageError, TaskFilter, TaskRepository};

impl SqliteRepository {
    /// Owner of the plan a task belongs to, or `None` for unknown tasks.
    async fn task_owner(&self, task_id: TaskId) -> Result<Option<UserId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT p.owner_id AS owner_id
            FROM daily_tasks t
            JOIN study_plans p ON p.id = t.plan_id
            WHERE t.id = ?1
            ",
        )
        .bind(task_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        match row {
            Some(row) => Ok(Some(user_id_from_i64(
                row.try_get::<i64, _>("owner_id").map_err(ser)?,
            )?)),
            None => Ok(None),
        }
    }

    async fn guard_task(&self, owner: UserId, task_id: TaskId) -> Result<(), StorageError> {
        match self.task_owner(task_id).await? {
            Some(actual) if actual == owner => Ok(()),
            Some(_) => Err(StorageError::Forbidden),
            None => Err(StorageError::NotFound),
        }
    }

    async fn week_belongs_to_plan(
        &self,
        plan_id: PlanId,
        week_id: WeeklyGoalId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM weekly_goals WHERE id = ?1 AND plan_id = ?2")
            .bind(week_id.to_string())
            .bind(plan_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl TaskRepository for SqliteRepository {
    async fn insert_task(
        &self,
        owner: UserId,
        plan_id: PlanId,
        week: Option<WeeklyGoalId>,
        task: &DailyTask,
    ) -> Result<(), StorageError> {
        self.guard_plan(owner, plan_id).await?;

        if let Some(week_id) = week {
            if !self.week_belongs_to_plan(plan_id, week_id).await? {
                return Err(StorageError::NotFound);
            }
        }

        sqlx::query(
            r"
            INSERT INTO daily_tasks (id, plan_id, weekly_goal_id, name, date, completed, position)
            VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM daily_tasks WHERE plan_id = ?2)
            )
            ",
        )
        .bind(task.id.to_string())
        .bind(plan_id.to_string())
        .bind(week.map(|w| w.to_string()))
        .bind(&task.name)
        .bind(&task.date)
        .bind(i64::from(task.completed))
        .execute(self.pool())
        .await
        .map_err(exec_err)?;
        Ok(())
    }

    async fn set_task_completed(
        &self,
        owner: UserId,
        task_id: TaskId,
        completed: bool,
    ) -> Result<(), StorageError> {
        self.guard_task(owner, task_id).await?;

        // One row backs both the flat list and the nested view, so a single
        // UPDATE keeps them consistent.
        sqlx::query("UPDATE daily_tasks SET completed = ?1 WHERE id = ?2")
            .bind(i64::from(completed))
            .bind(task_id.to_string())
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn list_tasks(
        &self,
        owner: UserId,
        plan_id: PlanId,
        filter: TaskFilter,
    ) -> Result<Vec<DailyTask>, StorageError> {
        self.guard_plan(owner, plan_id).await?;

        if let Some(week_id) = filter.weekly_goal {
            if !self.week_belongs_to_plan(plan_id, week_id).await? {
                return Err(StorageError::NotFound);
            }
        }

        let rows = sqlx::query(
            r"
            SELECT id, name, date, completed FROM daily_tasks
            WHERE plan_id = ?1
              AND (?2 IS NULL OR date = ?2)
              AND (?3 IS NULL OR weekly_goal_id = ?3)
            ORDER BY position ASC
            ",
        )
        .bind(plan_id.to_string())
        .bind(filter.date)
        .bind(filter.weekly_goal.map(|w| w.to_string()))
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(map_task_row(row)?);
        }
        Ok(tasks)
    }

    async fn delete_task(&self, owner: UserId, task_id: TaskId) -> Result<(), StorageError> {
        self.guard_task(owner, task_id).await?;

        sqlx::query("DELETE FROM daily_tasks WHERE id = ?1")
            .bind(task_id.to_string())
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }
}

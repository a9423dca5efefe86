use std::collections::HashMap;

use async_trait::async_trait;
use plan_core::model::{PlanId, StudyPlan, TaskId, UserId, WeeklyGoal, WeeklyGoalId};

use super::SqliteRepository;
use super::mapping::{
    conn, exec_err, map_monthly_goal_row, map_plan_summary_row, map_task_row,
    map_weekly_goal_row, ser, user_id_from_i64, user_id_to_i64, weekly_goal_id_from_text,
};
use crate::repository::{PlanListQuery, PlanRepository, PlanSummary, StorageError};

use sqlx::Row;

impl SqliteRepository {
    /// Owner of a plan row, or `None` when the plan does not exist.
    pub(crate) async fn plan_owner(&self, id: PlanId) -> Result<Option<UserId>, StorageError> {
        let row = sqlx::query("SELECT owner_id FROM study_plans WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;

        match row {
            Some(row) => {
                let owner = user_id_from_i64(row.try_get::<i64, _>("owner_id").map_err(ser)?)?;
                Ok(Some(owner))
            }
            None => Ok(None),
        }
    }

    /// Resolves a plan's owner and rejects mismatches.
    pub(crate) async fn guard_plan(
        &self,
        owner: UserId,
        id: PlanId,
    ) -> Result<(), StorageError> {
        match self.plan_owner(id).await? {
            Some(actual) if actual == owner => Ok(()),
            Some(_) => Err(StorageError::Forbidden),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl PlanRepository for SqliteRepository {
    async fn insert_plan(&self, owner: UserId, plan: &StudyPlan) -> Result<(), StorageError> {
        // Nested copies share identity with flat-list rows, so each task is
        // one row carrying its optional week attachment.
        let week_of_task: HashMap<TaskId, WeeklyGoalId> = plan
            .weekly_goals
            .iter()
            .flat_map(|week| week.tasks.iter().map(|t| (t.id, week.id)))
            .collect();

        let mut tx = self.pool().begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO study_plans (id, owner_id, exam_name, month, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(plan.id.to_string())
        .bind(user_id_to_i64(owner)?)
        .bind(&plan.exam_name)
        .bind(&plan.month)
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await
        .map_err(exec_err)?;

        for (position, goal) in plan.monthly_goals.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO monthly_goals (id, plan_id, goal, completed, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(goal.id.to_string())
            .bind(plan.id.to_string())
            .bind(&goal.goal)
            .bind(i64::from(goal.completed))
            .bind(position_to_i64(position)?)
            .execute(&mut *tx)
            .await
            .map_err(exec_err)?;
        }

        for (position, week) in plan.weekly_goals.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO weekly_goals (id, plan_id, week_number, goal, completed, position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(week.id.to_string())
            .bind(plan.id.to_string())
            .bind(i64::from(week.week_number))
            .bind(&week.goal)
            .bind(i64::from(week.completed))
            .bind(position_to_i64(position)?)
            .execute(&mut *tx)
            .await
            .map_err(exec_err)?;
        }

        for (position, task) in plan.daily_tasks.iter().enumerate() {
            let week_id = week_of_task.get(&task.id).map(ToString::to_string);
            sqlx::query(
                r"
                INSERT INTO daily_tasks (id, plan_id, weekly_goal_id, name, date, completed, position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(task.id.to_string())
            .bind(plan.id.to_string())
            .bind(week_id)
            .bind(&task.name)
            .bind(&task.date)
            .bind(i64::from(task.completed))
            .bind(position_to_i64(position)?)
            .execute(&mut *tx)
            .await
            .map_err(exec_err)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_plan(
        &self,
        owner: UserId,
        id: PlanId,
    ) -> Result<Option<StudyPlan>, StorageError> {
        let plan_row = sqlx::query(
            r"
            SELECT id, owner_id, exam_name, month, created_at
            FROM study_plans WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(plan_row) = plan_row else {
            return Ok(None);
        };

        let actual = user_id_from_i64(plan_row.try_get::<i64, _>("owner_id").map_err(ser)?)?;
        if actual != owner {
            return Err(StorageError::Forbidden);
        }

        let monthly_rows = sqlx::query(
            r"
            SELECT id, goal, completed FROM monthly_goals
            WHERE plan_id = ?1 ORDER BY position ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut monthly_goals = Vec::with_capacity(monthly_rows.len());
        for row in &monthly_rows {
            monthly_goals.push(map_monthly_goal_row(row)?);
        }

        let weekly_rows = sqlx::query(
            r"
            SELECT id, week_number, goal, completed FROM weekly_goals
            WHERE plan_id = ?1 ORDER BY position ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let task_rows = sqlx::query(
            r"
            SELECT id, weekly_goal_id, name, date, completed FROM daily_tasks
            WHERE plan_id = ?1 ORDER BY position ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut daily_tasks = Vec::with_capacity(task_rows.len());
        let mut tasks_by_week: HashMap<WeeklyGoalId, Vec<plan_core::model::DailyTask>> =
            HashMap::new();
        for row in &task_rows {
            let task = map_task_row(row)?;
            if let Some(week_text) = row
                .try_get::<Option<String>, _>("weekly_goal_id")
                .map_err(ser)?
            {
                tasks_by_week
                    .entry(weekly_goal_id_from_text(&week_text)?)
                    .or_default()
                    .push(task.clone());
            }
            daily_tasks.push(task);
        }

        let mut weekly_goals = Vec::with_capacity(weekly_rows.len());
        for row in &weekly_rows {
            let (week_id, week_number, goal, completed) = map_weekly_goal_row(row)?;
            weekly_goals.push(WeeklyGoal {
                id: week_id,
                week_number,
                goal,
                tasks: tasks_by_week.remove(&week_id).unwrap_or_default(),
                completed,
            });
        }

        Ok(Some(StudyPlan {
            id,
            exam_name: plan_row.try_get("exam_name").map_err(ser)?,
            month: plan_row.try_get("month").map_err(ser)?,
            monthly_goals,
            weekly_goals,
            daily_tasks,
            created_at: plan_row.try_get("created_at").map_err(ser)?,
        }))
    }

    async fn list_plans(
        &self,
        owner: UserId,
        query: PlanListQuery,
    ) -> Result<Vec<PlanSummary>, StorageError> {
        let rows = match &query.search {
            Some(search) => {
                let pattern = format!("%{search}%");
                sqlx::query(
                    r"
                    SELECT id, exam_name, month, created_at FROM study_plans
                    WHERE owner_id = ?1 AND (exam_name LIKE ?2 OR month LIKE ?2)
                    ORDER BY created_at DESC, id ASC
                    LIMIT ?3 OFFSET ?4
                    ",
                )
                .bind(user_id_to_i64(owner)?)
                .bind(pattern)
                .bind(i64::from(query.limit))
                .bind(i64::from(query.offset))
                .fetch_all(self.pool())
                .await
            }
            None => {
                sqlx::query(
                    r"
                    SELECT id, exam_name, month, created_at FROM study_plans
                    WHERE owner_id = ?1
                    ORDER BY created_at DESC, id ASC
                    LIMIT ?2 OFFSET ?3
                    ",
                )
                .bind(user_id_to_i64(owner)?)
                .bind(i64::from(query.limit))
                .bind(i64::from(query.offset))
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(conn)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            summaries.push(map_plan_summary_row(row)?);
        }
        Ok(summaries)
    }

    async fn delete_plan(&self, owner: UserId, id: PlanId) -> Result<(), StorageError> {
        self.guard_plan(owner, id).await?;

        sqlx::query("DELETE FROM study_plans WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }
}

fn position_to_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}

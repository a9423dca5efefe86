use async_trait::async_trait;
use plan_core::model::{MonthlyGoal, MonthlyGoalId, PlanId, UserId, WeeklyGoal, WeeklyGoalId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, exec_err, ser, user_id_from_i64};
use crate::repository::{GoalRepository, StorageError};

impl SqliteRepository {
    async fn goal_owner(
        &self,
        table: &'static str,
        goal_id: &str,
    ) -> Result<Option<UserId>, StorageError> {
        // Table name comes from a fixed set, never from input.
        let sql = format!(
            "SELECT p.owner_id AS owner_id FROM {table} g \
             JOIN study_plans p ON p.id = g.plan_id WHERE g.id = ?1"
        );
        let row = sqlx::query(&sql)
            .bind(goal_id)
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

    async fn guard_goal(
        &self,
        owner: UserId,
        table: &'static str,
        goal_id: &str,
    ) -> Result<(), StorageError> {
        match self.goal_owner(table, goal_id).await? {
            Some(actual) if actual == owner => Ok(()),
            Some(_) => Err(StorageError::Forbidden),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl GoalRepository for SqliteRepository {
    async fn insert_weekly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &WeeklyGoal,
    ) -> Result<(), StorageError> {
        self.guard_plan(owner, plan_id).await?;

        let mut tx = self.pool().begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO weekly_goals (id, plan_id, week_number, goal, completed, position)
            VALUES (
                ?1, ?2, ?3, ?4, ?5,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM weekly_goals WHERE plan_id = ?2)
            )
            ",
        )
        .bind(goal.id.to_string())
        .bind(plan_id.to_string())
        .bind(i64::from(goal.week_number))
        .bind(&goal.goal)
        .bind(i64::from(goal.completed))
        .execute(&mut *tx)
        .await
        .map_err(exec_err)?;

        // Nested tasks join the plan's flat list in the same transaction.
        for task in &goal.tasks {
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
            .bind(goal.id.to_string())
            .bind(&task.name)
            .bind(&task.date)
            .bind(i64::from(task.completed))
            .execute(&mut *tx)
            .await
            .map_err(exec_err)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn insert_monthly_goal(
        &self,
        owner: UserId,
        plan_id: PlanId,
        goal: &MonthlyGoal,
    ) -> Result<(), StorageError> {
        self.guard_plan(owner, plan_id).await?;

        sqlx::query(
            r"
            INSERT INTO monthly_goals (id, plan_id, goal, completed, position)
            VALUES (
                ?1, ?2, ?3, ?4,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM monthly_goals WHERE plan_id = ?2)
            )
            ",
        )
        .bind(goal.id.to_string())
        .bind(plan_id.to_string())
        .bind(&goal.goal)
        .bind(i64::from(goal.completed))
        .execute(self.pool())
        .await
        .map_err(exec_err)?;
        Ok(())
    }

    async fn set_weekly_goal_completed(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let id = goal_id.to_string();
        self.guard_goal(owner, "weekly_goals", &id).await?;

        sqlx::query("UPDATE weekly_goals SET completed = ?1 WHERE id = ?2")
            .bind(i64::from(completed))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn set_monthly_goal_completed(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let id = goal_id.to_string();
        self.guard_goal(owner, "monthly_goals", &id).await?;

        sqlx::query("UPDATE monthly_goals SET completed = ?1 WHERE id = ?2")
            .bind(i64::from(completed))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn delete_weekly_goal(
        &self,
        owner: UserId,
        goal_id: WeeklyGoalId,
    ) -> Result<(), StorageError> {
        let id = goal_id.to_string();
        self.guard_goal(owner, "weekly_goals", &id).await?;

        // ON DELETE SET NULL detaches the goal's tasks; their flat-list rows
        // survive as unassigned tasks.
        sqlx::query("DELETE FROM weekly_goals WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn delete_monthly_goal(
        &self,
        owner: UserId,
        goal_id: MonthlyGoalId,
    ) -> Result<(), StorageError> {
        let id = goal_id.to_string();
        self.guard_goal(owner, "monthly_goals", &id).await?;

        sqlx::query("DELETE FROM monthly_goals WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }
}

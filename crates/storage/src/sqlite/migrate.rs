use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: study plans with owner identity, monthly and
/// weekly goals, daily tasks with an optional weekly-goal attachment, and
/// bearer-token sessions. Position columns preserve normalization order so
/// the flat list and nested lists survive round-trips unchanged.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS study_plans (
                    id TEXT PRIMARY KEY,
                    owner_id INTEGER NOT NULL,
                    exam_name TEXT NOT NULL,
                    month TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS monthly_goals (
                    id TEXT PRIMARY KEY,
                    plan_id TEXT NOT NULL,
                    goal TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    position INTEGER NOT NULL,
                    FOREIGN KEY (plan_id) REFERENCES study_plans(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS weekly_goals (
                    id TEXT PRIMARY KEY,
                    plan_id TEXT NOT NULL,
                    week_number INTEGER NOT NULL,
                    goal TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    position INTEGER NOT NULL,
                    FOREIGN KEY (plan_id) REFERENCES study_plans(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // weekly_goal_id is nullable: deleting a week detaches its tasks
        // instead of removing them from the flat list.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS daily_tasks (
                    id TEXT PRIMARY KEY,
                    plan_id TEXT NOT NULL,
                    weekly_goal_id TEXT,
                    name TEXT NOT NULL,
                    date TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    position INTEGER NOT NULL,
                    FOREIGN KEY (plan_id) REFERENCES study_plans(id) ON DELETE CASCADE,
                    FOREIGN KEY (weekly_goal_id) REFERENCES weekly_goals(id) ON DELETE SET NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    expires_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_study_plans_owner_created
                    ON study_plans(owner_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_monthly_goals_plan_position
                    ON monthly_goals(plan_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_weekly_goals_plan_position
                    ON weekly_goals(plan_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_daily_tasks_plan_position
                    ON daily_tasks(plan_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_daily_tasks_plan_date
                    ON daily_tasks(plan_id, date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}

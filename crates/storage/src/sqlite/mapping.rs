use plan_core::model::{
    DailyTask, MonthlyGoal, MonthlyGoalId, PlanId, TaskId, UserId, WeeklyGoalId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{PlanSummary, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps execution errors, surfacing unique-key violations as conflicts.
pub(crate) fn exec_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn uuid_from_text(field: &'static str, v: &str) -> Result<uuid::Uuid, StorageError> {
    uuid::Uuid::parse_str(v)
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn plan_id_from_text(v: &str) -> Result<PlanId, StorageError> {
    Ok(PlanId::from_uuid(uuid_from_text("plan_id", v)?))
}

pub(crate) fn task_id_from_text(v: &str) -> Result<TaskId, StorageError> {
    Ok(TaskId::from_uuid(uuid_from_text("task_id", v)?))
}

pub(crate) fn weekly_goal_id_from_text(v: &str) -> Result<WeeklyGoalId, StorageError> {
    Ok(WeeklyGoalId::from_uuid(uuid_from_text("weekly_goal_id", v)?))
}

pub(crate) fn monthly_goal_id_from_text(v: &str) -> Result<MonthlyGoalId, StorageError> {
    Ok(MonthlyGoalId::from_uuid(uuid_from_text(
        "monthly_goal_id",
        v,
    )?))
}

pub(crate) fn user_id_to_i64(owner: UserId) -> Result<i64, StorageError> {
    i64::try_from(owner.value()).map_err(|_| StorageError::Serialization("owner overflow".into()))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("owner sign overflow".into()))
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn week_number_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid week_number: {v}")))
}

pub(crate) fn map_task_row(row: &SqliteRow) -> Result<DailyTask, StorageError> {
    Ok(DailyTask {
        id: task_id_from_text(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        name: row.try_get("name").map_err(ser)?,
        date: row.try_get("date").map_err(ser)?,
        completed: bool_from_i64(
            "completed",
            row.try_get::<i64, _>("completed").map_err(ser)?,
        )?,
    })
}

/// Maps a weekly goal row; nested tasks are attached by the caller.
pub(crate) fn map_weekly_goal_row(
    row: &SqliteRow,
) -> Result<(WeeklyGoalId, u32, String, bool), StorageError> {
    let id = weekly_goal_id_from_text(row.try_get::<String, _>("id").map_err(ser)?.as_str())?;
    let week_number = week_number_from_i64(row.try_get::<i64, _>("week_number").map_err(ser)?)?;
    let goal: String = row.try_get("goal").map_err(ser)?;
    let completed = bool_from_i64(
        "completed",
        row.try_get::<i64, _>("completed").map_err(ser)?,
    )?;
    Ok((id, week_number, goal, completed))
}

pub(crate) fn map_monthly_goal_row(row: &SqliteRow) -> Result<MonthlyGoal, StorageError> {
    Ok(MonthlyGoal {
        id: monthly_goal_id_from_text(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        goal: row.try_get("goal").map_err(ser)?,
        completed: bool_from_i64(
            "completed",
            row.try_get::<i64, _>("completed").map_err(ser)?,
        )?,
    })
}

pub(crate) fn map_plan_summary_row(row: &SqliteRow) -> Result<PlanSummary, StorageError> {
    Ok(PlanSummary {
        id: plan_id_from_text(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        exam_name: row.try_get("exam_name").map_err(ser)?,
        month: row.try_get("month").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

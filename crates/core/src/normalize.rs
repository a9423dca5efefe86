//! Plan normalizer: turns a loosely-shaped input document into a canonical
//! [`StudyPlan`].
//!
//! Input authors spell the same concept in different ways (`examName` vs
//! `exam`, `tasks` vs `dailyTasks`, …). Each field is resolved through an
//! explicit ordered key list — the first key carrying a usable value wins —
//! so the fallback policy lives in one place and is testable on its own.
//! Resolution never fails; a missing or unusable field falls through to its
//! documented default.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{ParseError, ValidationError};
use crate::model::{DailyTask, MonthlyGoal, PlanId, StudyPlan, WeeklyGoal};

/// Decodes raw text into a generic document.
///
/// # Errors
///
/// Returns [`ParseError`] when the input is not well-formed JSON. This is
/// the only failure mode of parsing; shape problems are the validator's
/// concern.
pub fn parse_document(input: &str) -> Result<Value, ParseError> {
    Ok(serde_json::from_str(input)?)
}

/// Minimal shape check gating normalization.
///
/// Passing validation does not guarantee deeper structure is well-formed;
/// malformed nested entries are absorbed by the field-resolution fallbacks,
/// never raised as errors.
///
/// # Errors
///
/// Returns [`ValidationError`] when the document names no exam
/// (`examName`/`exam` both absent or blank) or carries none of
/// `weeklyGoals`, `monthlyGoals`, `dailyTasks`.
pub fn validate(doc: &Value) -> Result<(), ValidationError> {
    if rules::first(doc, &["examName", "exam"]).is_none() {
        return Err(ValidationError::new("missing examName field"));
    }

    if rules::first(doc, &["weeklyGoals", "monthlyGoals", "dailyTasks"]).is_none() {
        return Err(ValidationError::new(
            "must include at least one of: weeklyGoals, monthlyGoals, or dailyTasks",
        ));
    }

    Ok(())
}

/// Produces a canonical plan from a validated document.
///
/// Never fails and is never partially populated: missing optional sections
/// become empty lists. Every entity gets a freshly minted ID and starts
/// with `completed = false` — completion flags in the input are structure
/// the destination system does not trust.
///
/// `now` stamps `created_at` and feeds the generated month label when the
/// document has none.
#[must_use]
pub fn normalize(doc: &Value, now: DateTime<Utc>) -> StudyPlan {
    let monthly_goals: Vec<MonthlyGoal> = rules::list(doc, &["monthlyGoals"])
        .unwrap_or(&[])
        .iter()
        .map(monthly_goal)
        .collect();

    let weekly_goals: Vec<WeeklyGoal> = rules::list(doc, &["weeklyGoals"])
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .map(|(index, week)| weekly_goal(week, index))
        .collect();

    // Flat list: every week's tasks in week order then in-week order,
    // followed by top-level standalone tasks in input order. Nested copies
    // share IDs with their flat-list counterparts.
    let mut daily_tasks: Vec<DailyTask> = weekly_goals
        .iter()
        .flat_map(|week| week.tasks.iter().cloned())
        .collect();
    daily_tasks.extend(
        rules::list(doc, &["dailyTasks"])
            .unwrap_or(&[])
            .iter()
            .map(task),
    );

    StudyPlan {
        id: PlanId::mint(),
        exam_name: rules::text(doc, &["examName", "exam"]).unwrap_or_else(|| "Exam".to_owned()),
        month: rules::text(doc, &["month"]).unwrap_or_else(|| now.format("%B %Y").to_string()),
        monthly_goals,
        weekly_goals,
        daily_tasks,
        created_at: now,
    }
}

fn monthly_goal(value: &Value) -> MonthlyGoal {
    let goal = match value.as_str() {
        Some(text) => text.to_owned(),
        None => rules::text(value, &["goal", "name"]).unwrap_or_default(),
    };
    MonthlyGoal::new(goal)
}

fn weekly_goal(value: &Value, index: usize) -> WeeklyGoal {
    let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
    let week_number = rules::number(value, &["weekNumber", "week"])
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(position);
    let goal =
        rules::text(value, &["goal", "name"]).unwrap_or_else(|| format!("Week {position}"));
    let tasks: Vec<DailyTask> = rules::list(value, &["tasks", "dailyTasks"])
        .unwrap_or(&[])
        .iter()
        .map(task)
        .collect();

    WeeklyGoal::new(week_number, goal, tasks)
}

fn task(value: &Value) -> DailyTask {
    let name = match value.as_str() {
        Some(text) => text.to_owned(),
        None => rules::text(value, &["name", "task"]).unwrap_or_default(),
    };
    // Absent date stays absent; it is never defaulted to "today".
    let date = rules::text(value, &["date"]).unwrap_or_default();

    DailyTask::new(name, date)
}

/// Ordered field-resolution rules.
///
/// Each lookup walks its key list in priority order and takes the first key
/// carrying a usable value. Null and empty-string values count as absent —
/// `{"examName": null, "exam": "Y"}` resolves to `"Y"` — and a usable key
/// of the wrong type resolves to `None`, which callers turn into the
/// field's default.
pub mod rules {
    use serde_json::Value;

    fn absent(value: &Value) -> bool {
        value.is_null() || value.as_str().is_some_and(str::is_empty)
    }

    /// First usable value among `keys` in the document.
    #[must_use]
    pub fn first<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| doc.get(key))
            .find(|value| !absent(value))
    }

    /// First present key, read as text.
    #[must_use]
    pub fn text(doc: &Value, keys: &[&str]) -> Option<String> {
        first(doc, keys)?.as_str().map(str::to_owned)
    }

    /// First present key, read as a non-negative integer.
    #[must_use]
    pub fn number(doc: &Value, keys: &[&str]) -> Option<u64> {
        first(doc, keys)?.as_u64()
    }

    /// First present key, read as a list.
    #[must_use]
    pub fn list<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a [Value]> {
        first(doc, keys)?.as_array().map(Vec::as_slice)
    }
}

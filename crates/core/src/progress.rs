//! Progress aggregation over a canonical plan.
//!
//! A pure function of the plan's current state: no side effects, no
//! mutation, no ambient clock. "Today" is passed in by the caller so the
//! daily metrics are deterministically testable.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::StudyPlan;

/// Completion counts and ratios at daily, weekly, monthly, and overall
/// granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// `completed_tasks / total_tasks`, rounded to the nearest integer
    /// percent; 0 when the plan has no tasks.
    pub percentage: u32,
    pub daily_total: usize,
    pub daily_completed: usize,
    pub weekly_total: usize,
    pub weekly_completed: usize,
    pub monthly_total: usize,
    pub monthly_completed: usize,
}

/// Derives progress metrics from a plan as of `today`.
///
/// Overall counts run over the flat `daily_tasks` list only — the nested
/// per-week copies would double count. Daily metrics match each task's date
/// string against `today` exactly; dateless tasks never count. Weekly and
/// monthly counts use each goal's own `completed` flag, not the state of
/// nested tasks.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn calculate_progress(plan: &StudyPlan, today: NaiveDate) -> PlanProgress {
    let today = today.format("%Y-%m-%d").to_string();

    let total_tasks = plan.daily_tasks.len();
    let completed_tasks = plan.daily_tasks.iter().filter(|t| t.completed).count();

    let daily_total = plan.daily_tasks.iter().filter(|t| t.date == today).count();
    let daily_completed = plan
        .daily_tasks
        .iter()
        .filter(|t| t.date == today && t.completed)
        .count();

    let weekly_total = plan.weekly_goals.len();
    let weekly_completed = plan.weekly_goals.iter().filter(|g| g.completed).count();

    let monthly_total = plan.monthly_goals.len();
    let monthly_completed = plan.monthly_goals.iter().filter(|g| g.completed).count();

    let percentage = if total_tasks == 0 {
        0
    } else {
        (completed_tasks as f64 / total_tasks as f64 * 100.0).round() as u32
    };

    PlanProgress {
        total_tasks,
        completed_tasks,
        percentage,
        daily_total,
        daily_completed,
        weekly_total,
        weekly_completed,
        monthly_total,
        monthly_completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::time::fixed_now;
    use serde_json::json;

    fn build_plan() -> StudyPlan {
        let doc = json!({
            "examName": "Finals",
            "monthlyGoals": ["M1", "M2"],
            "weeklyGoals": [
                { "goal": "W1", "tasks": [
                    { "name": "t1", "date": "2025-06-01" },
                    { "name": "t2", "date": "2025-06-02" }
                ]},
                { "goal": "W2", "tasks": [{ "name": "t3" }] }
            ],
            "dailyTasks": [{ "name": "s1", "date": "2025-06-01" }]
        });
        normalize(&doc, fixed_now())
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn counts_run_over_the_flat_list_only() {
        let plan = build_plan();
        let progress = calculate_progress(&plan, june_first());
        // Nested copies must not double count.
        assert_eq!(progress.total_tasks, 4);
        assert_eq!(progress.completed_tasks, 0);
        assert_eq!(progress.weekly_total, 2);
        assert_eq!(progress.monthly_total, 2);
    }

    #[test]
    fn daily_metrics_match_today_exactly() {
        let mut plan = build_plan();
        plan.daily_tasks[0].completed = true;

        let progress = calculate_progress(&plan, june_first());
        assert_eq!(progress.daily_total, 2); // t1 and s1
        assert_eq!(progress.daily_completed, 1);

        // A different evaluation date matches nothing.
        let other = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let progress = calculate_progress(&plan, other);
        assert_eq!(progress.daily_total, 0);
        assert_eq!(progress.daily_completed, 0);
    }

    #[test]
    fn dateless_tasks_never_count_toward_daily_metrics() {
        let plan = build_plan();
        // t3 has no date; whatever the evaluation date, only dated tasks count.
        let progress = calculate_progress(&plan, june_first());
        assert!(progress.daily_total < progress.total_tasks);
        let any_date = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        assert_eq!(calculate_progress(&plan, any_date).daily_total, 0);
    }

    #[test]
    fn percentage_is_zero_for_empty_plans() {
        let doc = json!({ "examName": "X", "monthlyGoals": ["G"] });
        let plan = normalize(&doc, fixed_now());
        let progress = calculate_progress(&plan, june_first());
        assert_eq!(progress.total_tasks, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn percentage_rounds_to_nearest_and_stays_in_bounds() {
        let mut plan = build_plan();
        plan.daily_tasks[0].completed = true; // 1/4 = 25%
        assert_eq!(calculate_progress(&plan, june_first()).percentage, 25);

        for task in &mut plan.daily_tasks {
            task.completed = true;
        }
        assert_eq!(calculate_progress(&plan, june_first()).percentage, 100);

        // 1/3 rounds to 33, 2/3 rounds to 67.
        let doc = json!({ "examName": "X", "dailyTasks": ["a", "b", "c"] });
        let mut plan = normalize(&doc, fixed_now());
        plan.daily_tasks[0].completed = true;
        assert_eq!(calculate_progress(&plan, june_first()).percentage, 33);
        plan.daily_tasks[1].completed = true;
        assert_eq!(calculate_progress(&plan, june_first()).percentage, 67);
    }

    #[test]
    fn weekly_flag_is_independent_of_task_state() {
        let mut plan = build_plan();

        // Week done while its tasks stay open.
        plan.weekly_goals[0].completed = true;
        let progress = calculate_progress(&plan, june_first());
        assert_eq!(progress.weekly_completed, 1);
        assert_eq!(progress.completed_tasks, 0);

        // All tasks done while the other week stays open.
        for task in &mut plan.daily_tasks {
            task.completed = true;
        }
        let progress = calculate_progress(&plan, june_first());
        assert_eq!(progress.weekly_completed, 1);
        assert_eq!(progress.completed_tasks, progress.total_tasks);
    }

    #[test]
    fn monthly_flags_count_analogously() {
        let mut plan = build_plan();
        plan.monthly_goals[1].completed = true;
        let progress = calculate_progress(&plan, june_first());
        assert_eq!(progress.monthly_total, 2);
        assert_eq!(progress.monthly_completed, 1);
    }

    #[test]
    fn aggregation_is_pure_and_repeatable() {
        let mut plan = build_plan();
        plan.daily_tasks[1].completed = true;
        let snapshot = plan.clone();

        let first = calculate_progress(&plan, june_first());
        let second = calculate_progress(&plan, june_first());
        assert_eq!(first, second);
        assert_eq!(plan, snapshot);
    }
}

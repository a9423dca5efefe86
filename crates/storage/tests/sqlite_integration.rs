use chrono::Duration;
use plan_core::model::{DailyTask, MonthlyGoal, StudyPlan, UserId, WeeklyGoal};
use plan_core::normalize::normalize;
use plan_core::time::fixed_now;
use serde_json::json;
use storage::repository::{
    GoalRepository, PlanListQuery, PlanRepository, SessionRecord, SessionRepository,
    StorageError, TaskFilter, TaskRepository,
};
use storage::sqlite::SqliteRepository;

fn build_plan() -> StudyPlan {
    let doc = json!({
        "examName": "Finals",
        "month": "June 2025",
        "monthlyGoals": ["Cover syllabus", { "goal": "Two mocks" }],
        "weeklyGoals": [
            { "goal": "Fundamentals", "week": 1, "tasks": [
                { "name": "t1", "date": "2025-06-01" },
                { "name": "t2", "date": "2025-06-02" }
            ]},
            { "goal": "Practice", "week": 2, "dailyTasks": [{ "name": "t3" }] }
        ],
        "dailyTasks": [{ "task": "s1", "date": "2025-06-01" }]
    });
    normalize(&doc, fixed_now())
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_order_and_nesting() {
    let repo = connect("memdb_roundtrip").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    repo.insert_plan(owner, &plan).await.expect("insert");

    let fetched = repo
        .get_plan(owner, plan.id)
        .await
        .expect("fetch")
        .expect("present");

    assert_eq!(fetched, plan);
    assert!(fetched.flat_list_is_superset());

    let names: Vec<&str> = fetched.daily_tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["t1", "t2", "t3", "s1"]);
}

#[tokio::test]
async fn sqlite_flag_flips_are_visible_in_both_views() {
    let repo = connect("memdb_flags").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    let nested_id = plan.weekly_goals[0].tasks[1].id;
    let week_id = plan.weekly_goals[1].id;
    let month_id = plan.monthly_goals[0].id;
    repo.insert_plan(owner, &plan).await.expect("insert");

    repo.set_task_completed(owner, nested_id, true)
        .await
        .expect("flip task");
    repo.set_weekly_goal_completed(owner, week_id, true)
        .await
        .expect("flip week");
    repo.set_monthly_goal_completed(owner, month_id, true)
        .await
        .expect("flip month");

    let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
    assert!(fetched.task(nested_id).unwrap().completed);
    assert!(fetched.weekly_goals[0].tasks[1].completed);
    assert!(fetched.weekly_goals[1].completed);
    // Nested tasks untouched by the week's own flag.
    assert!(!fetched.weekly_goals[1].tasks[0].completed);
    assert!(fetched.monthly_goals[0].completed);
    assert!(!fetched.monthly_goals[1].completed);
}

#[tokio::test]
async fn sqlite_rejects_other_owners() {
    let repo = connect("memdb_owners").await;
    let owner = UserId::new(1);
    let intruder = UserId::new(2);
    let plan = build_plan();
    repo.insert_plan(owner, &plan).await.expect("insert");

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
        repo.delete_weekly_goal(intruder, plan.weekly_goals[0].id)
            .await,
        Err(StorageError::Forbidden)
    ));

    // Unknown rows are a different failure than foreign rows.
    let ghost = build_plan();
    assert!(matches!(
        repo.delete_plan(owner, ghost.id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_task_crud_and_filters() {
    let repo = connect("memdb_tasks").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    let week_id = plan.weekly_goals[0].id;
    repo.insert_plan(owner, &plan).await.expect("insert");

    let extra = DailyTask::new("extra", "2025-06-01");
    repo.insert_task(owner, plan.id, Some(week_id), &extra)
        .await
        .expect("insert task");

    let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.daily_tasks.len(), plan.daily_tasks.len() + 1);
    assert_eq!(fetched.daily_tasks.last().unwrap().id, extra.id);
    assert_eq!(fetched.weekly_goals[0].tasks.len(), 3);

    let dated = repo
        .list_tasks(
            owner,
            plan.id,
            TaskFilter {
                date: Some("2025-06-01".into()),
                weekly_goal: None,
            },
        )
        .await
        .expect("list by date");
    assert_eq!(dated.len(), 3); // t1, s1, extra

    let in_week = repo
        .list_tasks(
            owner,
            plan.id,
            TaskFilter {
                date: None,
                weekly_goal: Some(week_id),
            },
        )
        .await
        .expect("list by week");
    assert_eq!(in_week.len(), 3);

    repo.delete_task(owner, extra.id).await.expect("delete");
    let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.daily_tasks.len(), plan.daily_tasks.len());
}

#[tokio::test]
async fn sqlite_week_delete_detaches_tasks() {
    let repo = connect("memdb_detach").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    let week_id = plan.weekly_goals[0].id;
    let flat_count = plan.daily_tasks.len();
    repo.insert_plan(owner, &plan).await.expect("insert");

    repo.delete_weekly_goal(owner, week_id).await.expect("delete week");

    let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.weekly_goals.len(), 1);
    assert_eq!(fetched.daily_tasks.len(), flat_count);
}

#[tokio::test]
async fn sqlite_goal_inserts_extend_the_plan() {
    let repo = connect("memdb_goals").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    repo.insert_plan(owner, &plan).await.expect("insert");

    let week = WeeklyGoal::new(3, "Review", vec![DailyTask::new("t4", "")]);
    repo.insert_weekly_goal(owner, plan.id, &week)
        .await
        .expect("insert week");
    let month = MonthlyGoal::new("One more mock");
    repo.insert_monthly_goal(owner, plan.id, &month)
        .await
        .expect("insert month");

    let fetched = repo.get_plan(owner, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.weekly_goals.len(), 3);
    assert_eq!(fetched.monthly_goals.len(), 3);
    assert!(fetched.flat_list_is_superset());
    assert_eq!(fetched.daily_tasks.len(), plan.daily_tasks.len() + 1);
}

#[tokio::test]
async fn sqlite_plan_listing_searches_and_pages() {
    let repo = connect("memdb_listing").await;
    let owner = UserId::new(1);

    let finals = build_plan();
    repo.insert_plan(owner, &finals).await.expect("insert finals");

    let doc = json!({ "examName": "Midterm", "month": "April 2025", "monthlyGoals": ["G"] });
    let midterm = normalize(&doc, fixed_now() + Duration::days(1));
    repo.insert_plan(owner, &midterm).await.expect("insert midterm");

    let all = repo
        .list_plans(owner, PlanListQuery::default())
        .await
        .expect("list");
    assert_eq!(all.len(), 2);
    // Newest first.
    assert_eq!(all[0].exam_name, "Midterm");

    let hits = repo
        .list_plans(
            owner,
            PlanListQuery {
                search: Some("june".into()),
                ..PlanListQuery::default()
            },
        )
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].exam_name, "Finals");

    let paged = repo
        .list_plans(
            owner,
            PlanListQuery {
                limit: 1,
                offset: 1,
                ..PlanListQuery::default()
            },
        )
        .await
        .expect("page");
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].exam_name, "Finals");

    let other = repo
        .list_plans(UserId::new(2), PlanListQuery::default())
        .await
        .expect("other owner");
    assert!(other.is_empty());
}

#[tokio::test]
async fn sqlite_sessions_roundtrip() {
    let repo = connect("memdb_sessions").await;
    let record = SessionRecord {
        token: "tok-1".into(),
        user: UserId::new(7),
        expires_at: fixed_now() + Duration::hours(1),
    };

    repo.insert_session(&record).await.expect("insert");
    let fetched = repo.get_session("tok-1").await.expect("get").expect("present");
    assert_eq!(fetched, record);

    assert!(matches!(
        repo.insert_session(&record).await,
        Err(StorageError::Conflict)
    ));

    repo.delete_session("tok-1").await.expect("delete");
    assert!(repo.get_session("tok-1").await.expect("get").is_none());

    assert!(repo.get_session("unknown").await.expect("get").is_none());
}

#[tokio::test]
async fn sqlite_plan_delete_cascades() {
    let repo = connect("memdb_cascade").await;
    let owner = UserId::new(1);
    let plan = build_plan();
    let task_id = plan.daily_tasks[0].id;
    repo.insert_plan(owner, &plan).await.expect("insert");

    repo.delete_plan(owner, plan.id).await.expect("delete");

    assert!(repo.get_plan(owner, plan.id).await.expect("get").is_none());
    assert!(matches!(
        repo.set_task_completed(owner, task_id, true).await,
        Err(StorageError::NotFound)
    ));
}

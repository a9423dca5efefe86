use std::sync::Arc;

use plan_core::Clock;
use plan_core::model::{PlanId, UserId};
use plan_core::progress::{PlanProgress, calculate_progress};
use storage::repository::{PlanRepository, StorageError};

use crate::error::ProgressError;

/// Computes the progress summary for a stored plan.
///
/// The calculation itself is a pure function over the plan; this service
/// only fetches the plan and supplies today's date from its clock.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    plans: Arc<dyn PlanRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, plans: Arc<dyn PlanRepository>) -> Self {
        Self { clock, plans }
    }

    /// Summarize a plan's completion state as of today.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` when the plan is missing, owned by
    /// someone else, or the store is unavailable.
    pub async fn plan_progress(
        &self,
        owner: UserId,
        plan_id: PlanId,
    ) -> Result<PlanProgress, ProgressError> {
        let plan = self
            .plans
            .get_plan(owner, plan_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        Ok(calculate_progress(&plan, self.clock.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use plan_core::normalize::normalize;
    use plan_core::time::{fixed_clock, fixed_now};
    use serde_json::json;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn summarizes_a_stored_plan() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = ProgressService::new(fixed_clock(), repo.clone());
        let owner = UserId::new(1);

        // Fixed clock's date is 2023-11-14; one task lands on it.
        let doc = json!({
            "examName": "Finals",
            "dailyTasks": [
                { "name": "today", "date": "2023-11-14" },
                { "name": "later", "date": "2023-11-20" }
            ]
        });
        let plan = normalize(&doc, fixed_now());
        repo.insert_plan(owner, &plan).await.unwrap();

        let progress = service.plan_progress(owner, plan.id).await.unwrap();
        assert_eq!(progress.total_tasks, 2);
        assert_eq!(progress.completed_tasks, 0);
        assert_eq!(progress.daily_total, 1);
        assert_eq!(progress.percentage, 0);
    }

    #[tokio::test]
    async fn missing_plans_surface_not_found() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = ProgressService::new(fixed_clock(), repo);

        let doc = json!({ "examName": "X", "monthlyGoals": ["G"] });
        let unsaved = normalize(&doc, fixed_now());

        let err = service
            .plan_progress(UserId::new(1), unsaved.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Storage(StorageError::NotFound)));
    }
}

use std::sync::Arc;

use plan_core::Clock;
use storage::repository::Storage;

use crate::auth::Authenticator;
use crate::error::PlannerServicesError;
use crate::plan_service::PlanService;
use crate::progress_service::ProgressService;

/// Bundles the application services over one storage backend.
///
/// Construct once at startup and hand clones to whatever hosts the API.
#[derive(Clone)]
pub struct PlannerServices {
    plans: Arc<PlanService>,
    progress: Arc<ProgressService>,
    auth: Arc<Authenticator>,
}

impl PlannerServices {
    #[must_use]
    fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let plans = Arc::new(PlanService::new(
            clock,
            storage.plans.clone(),
            storage.tasks.clone(),
            storage.goals.clone(),
        ));
        let progress = Arc::new(ProgressService::new(clock, storage.plans.clone()));
        let auth = Arc::new(Authenticator::new(clock, storage.sessions.clone()));
        Self {
            plans,
            progress,
            auth,
        }
    }

    /// Services over an in-memory store. Data lives as long as the process.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    /// Services over a `SQLite` database, running migrations on connect.
    ///
    /// # Errors
    ///
    /// Returns `PlannerServicesError::Sqlite` if the database cannot be
    /// opened or migrated.
    pub async fn sqlite(database_url: &str, clock: Clock) -> Result<Self, PlannerServicesError> {
        let storage = Storage::sqlite(database_url).await?;
        tracing::info!(url = database_url, "planner storage ready");
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn plans(&self) -> Arc<PlanService> {
        self.plans.clone()
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        self.progress.clone()
    }

    #[must_use]
    pub fn auth(&self) -> Arc<Authenticator> {
        self.auth.clone()
    }
}

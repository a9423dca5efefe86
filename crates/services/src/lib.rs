#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod error;
pub mod plan_service;
pub mod progress_service;

pub use plan_core::Clock;

pub use app_services::PlannerServices;
pub use auth::Authenticator;
pub use error::{AuthError, PlanServiceError, PlannerServicesError, ProgressError};
pub use plan_service::PlanService;
pub use progress_service::ProgressService;

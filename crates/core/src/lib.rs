#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod time;

pub use error::{ParseError, ValidationError};
pub use progress::{PlanProgress, calculate_progress};
pub use time::Clock;

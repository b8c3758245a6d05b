use crate::config::Config;
use crate::db::Database;

pub mod category;
pub mod task;
pub mod task_completion;

pub use category::*;
pub use task::*;
pub use task_completion::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

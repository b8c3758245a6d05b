use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::NaiveDate;
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for completion facts
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskCompletionRow {
    pub task_id: String,
    pub completion_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TaskCompletionRow {
    pub fn to_shared(&self) -> Option<shared::CompletionFact> {
        Some(shared::CompletionFact {
            task_id: Uuid::parse_str(&self.task_id).ok()?,
            date: self.completion_date,
            created_at: self.created_at,
        })
    }
}

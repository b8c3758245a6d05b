use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Frequency;
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for tasks
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub title: String,
    pub frequency: String,
    pub reset_day: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn to_shared(&self) -> Option<shared::Task> {
        let frequency = self.frequency.parse().unwrap_or_else(|_| {
            log::warn!(
                "Task {} has unknown frequency {:?}, treating it as daily",
                self.id,
                self.frequency
            );
            Frequency::Daily
        });

        // Anchors only mean something for weekly and monthly tasks
        let reset_day = if frequency.uses_reset_day() {
            self.reset_day
                .and_then(|day| u32::try_from(day).ok())
                .or(frequency.default_reset_day())
        } else {
            None
        };

        Some(shared::Task {
            id: Uuid::parse_str(&self.id).ok()?,
            category_id: Uuid::parse_str(&self.category_id).ok()?,
            title: self.title.clone(),
            frequency,
            reset_day,
            created_at: self.created_at,
        })
    }
}

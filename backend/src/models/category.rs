use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for categories
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl CategoryRow {
    pub fn to_shared(&self) -> Option<shared::Category> {
        Some(shared::Category {
            id: Uuid::parse_str(&self.id).ok()?,
            name: self.name.clone(),
            created_at: self.created_at,
        })
    }
}

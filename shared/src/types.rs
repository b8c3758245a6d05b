use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Category Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

// ============================================================================
// Task Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    #[serde(rename = "one-time", alias = "onetime", alias = "once")]
    OneTime,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::OneTime => "one-time",
        }
    }

    /// Whether periods of this frequency are anchored on a reset day
    pub fn uses_reset_day(&self) -> bool {
        matches!(self, Frequency::Weekly | Frequency::Monthly)
    }

    /// Anchor used when a weekly/monthly task has none: Sunday, or the 1st
    pub fn default_reset_day(&self) -> Option<u32> {
        match self {
            Frequency::Weekly => Some(0),
            Frequency::Monthly => Some(1),
            Frequency::Daily | Frequency::OneTime => None,
        }
    }

    /// Inclusive range of valid reset days, if the frequency has an anchor
    pub fn reset_day_range(&self) -> Option<(u32, u32)> {
        match self {
            Frequency::Weekly => Some((0, 6)),
            Frequency::Monthly => Some((1, 31)),
            Frequency::Daily | Frequency::OneTime => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown frequency: {0}")]
pub struct ParseFrequencyError(pub String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "one-time" | "onetime" | "once" => Ok(Frequency::OneTime),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub frequency: Frequency,
    /// Day of week (0 = Sunday) for weekly tasks, day of month for monthly tasks
    pub reset_day: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub frequency: Option<Frequency>,
    pub category_id: Option<Uuid>,
    pub reset_day: Option<u32>,
}

/// Partial update: only fields that are present change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub frequency: Option<Frequency>,
    pub category_id: Option<Uuid>,
    pub reset_day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithStatus {
    #[serde(flatten)]
    pub task: Task,
    /// Derived from completion facts, never stored
    pub completed: bool,
    pub period_start: NaiveDate,
    pub next_period_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<BTreeMap<NaiveDate, bool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskWithStatus>,
}

// ============================================================================
// Completion Types
// ============================================================================

/// A task was marked done on a calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFact {
    pub task_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionHistoryResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Tasks completed on each day that has at least one completion
    pub days: BTreeMap<NaiveDate, Vec<Uuid>>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_from_str() {
        assert_eq!("daily".parse(), Ok(Frequency::Daily));
        assert_eq!("WEEKLY".parse(), Ok(Frequency::Weekly));
        assert_eq!("Monthly".parse(), Ok(Frequency::Monthly));
        assert_eq!("one-time".parse(), Ok(Frequency::OneTime));
        assert_eq!("once".parse(), Ok(Frequency::OneTime));
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_frequency_serde() {
        assert_eq!(serde_json::to_string(&Frequency::OneTime).unwrap(), "\"one-time\"");
        assert_eq!(serde_json::to_string(&Frequency::Weekly).unwrap(), "\"weekly\"");

        let parsed: Frequency = serde_json::from_str("\"onetime\"").unwrap();
        assert_eq!(parsed, Frequency::OneTime);
    }

    #[test]
    fn test_frequency_reset_day_defaults() {
        assert_eq!(Frequency::Weekly.default_reset_day(), Some(0));
        assert_eq!(Frequency::Monthly.default_reset_day(), Some(1));
        assert_eq!(Frequency::Daily.default_reset_day(), None);
        assert!(!Frequency::OneTime.uses_reset_day());
        assert_eq!(Frequency::Monthly.reset_day_range(), Some((1, 31)));
    }

    #[test]
    fn test_task_with_status_flattens_task() {
        let task = Task {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            title: "Water plants".to_string(),
            frequency: Frequency::Weekly,
            reset_day: Some(0),
            created_at: Utc::now(),
        };
        let status = TaskWithStatus {
            task,
            completed: true,
            period_start: NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
            next_period_start: NaiveDate::from_ymd_opt(2024, 1, 21),
            history: None,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["title"], "Water plants");
        assert_eq!(json["frequency"], "weekly");
        assert_eq!(json["completed"], true);
        assert_eq!(json["period_start"], "2024-01-14");
        assert!(json.get("history").is_none());
    }

    #[test]
    fn test_api_success() {
        let success = ApiSuccess::new("test data");
        assert_eq!(success.data, "test data");
    }
}

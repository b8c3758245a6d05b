use chrono::{NaiveDate, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TaskRow;
use crate::services::ledger::{self, LedgerError};
use crate::services::status::{self, CompletionFacts};
use crate::services::{period, retention};
use shared::{
    CompletionHistoryResponse, CreateTaskRequest, Frequency, Task, TaskWithStatus,
    UpdateTaskRequest,
};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_HISTORY_DAYS: i64 = 366;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),
    #[error("Task not found")]
    NotFound,
    #[error("Category not found")]
    CategoryNotFound,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

fn validate_title(title: Option<&str>) -> Result<String, TaskError> {
    let title = title.map(str::trim).unwrap_or_default();

    if title.is_empty() {
        return Err(TaskError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(TaskError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    Ok(title.to_string())
}

/// The anchor to store for a task: defaulted and range checked for weekly and
/// monthly tasks, always `None` for the others.
fn validate_reset_day(
    frequency: Frequency,
    reset_day: Option<u32>,
) -> Result<Option<u32>, TaskError> {
    let Some((min, max)) = frequency.reset_day_range() else {
        return Ok(None);
    };

    let day = match reset_day.or(frequency.default_reset_day()) {
        Some(day) => day,
        None => return Ok(None),
    };

    if day < min || day > max {
        return Err(TaskError::Validation(format!(
            "reset_day for {} tasks must be between {} and {}",
            frequency, min, max
        )));
    }

    Ok(Some(day))
}

async fn category_is_owned<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: &str,
    category_id: &Uuid,
) -> Result<bool, TaskError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ? AND user_id = ?")
            .bind(category_id.to_string())
            .bind(user_id)
            .fetch_one(executor)
            .await?;

    Ok(count > 0)
}

async fn fetch_owned_task<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: &str,
    task_id: &Uuid,
) -> Result<Task, TaskError> {
    let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id.to_string())
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    row.and_then(|r| r.to_shared()).ok_or(TaskError::NotFound)
}

pub async fn create_task(
    pool: &SqlitePool,
    user_id: &str,
    request: &CreateTaskRequest,
) -> Result<Task, TaskError> {
    let title = validate_title(request.title.as_deref())?;
    let frequency = request
        .frequency
        .ok_or_else(|| TaskError::Validation("Frequency is required".to_string()))?;
    let category_id = request
        .category_id
        .ok_or_else(|| TaskError::Validation("Category is required".to_string()))?;
    let reset_day = validate_reset_day(frequency, request.reset_day)?;

    if !category_is_owned(pool, user_id, &category_id).await? {
        return Err(TaskError::CategoryNotFound);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, user_id, category_id, title, frequency, reset_day, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(user_id)
    .bind(category_id.to_string())
    .bind(&title)
    .bind(frequency.as_str())
    .bind(reset_day)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Task {
        id,
        category_id,
        title,
        frequency,
        reset_day,
        created_at: now,
    })
}

pub async fn list_tasks(
    pool: &SqlitePool,
    user_id: &str,
    category_id: Option<&Uuid>,
) -> Result<Vec<Task>, TaskError> {
    let tasks: Vec<TaskRow> = sqlx::query_as(
        r#"
        SELECT * FROM tasks
        WHERE user_id = ? AND (? IS NULL OR category_id = ?)
        ORDER BY created_at ASC, title ASC
        "#,
    )
    .bind(user_id)
    .bind(category_id.map(|id| id.to_string()))
    .bind(category_id.map(|id| id.to_string()))
    .fetch_all(pool)
    .await?;

    Ok(tasks.iter().filter_map(|t| t.to_shared()).collect())
}

/// List the user's tasks with their derived status.
///
/// All completion facts needed are fetched in one query, from the earliest
/// period start among the tasks (or the retention cutoff when the history is
/// requested) up to `today`.
pub async fn list_tasks_with_status(
    pool: &SqlitePool,
    user_id: &str,
    category_id: Option<&Uuid>,
    include_history: bool,
    today: NaiveDate,
    retention_months: u32,
) -> Result<Vec<TaskWithStatus>, TaskError> {
    let tasks = list_tasks(pool, user_id, category_id).await?;
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let history_since =
        include_history.then(|| retention::retention_cutoff(today, retention_months));
    let earliest_start = tasks
        .iter()
        .map(|t| period::period_start(today, t.frequency, t.reset_day))
        .min()
        .unwrap_or(today);
    let since = history_since.map_or(earliest_start, |h| h.min(earliest_start));

    let facts = ledger::facts_between(pool, user_id, since, today, None).await?;
    let facts = CompletionFacts::new(facts);

    Ok(tasks
        .into_iter()
        .map(|task| status::resolve(task, &facts, today, history_since))
        .collect())
}

/// A single task with its derived status, counting facts up to `today` like
/// [`list_tasks_with_status`]
pub async fn get_task_with_status(
    pool: &SqlitePool,
    user_id: &str,
    task_id: &Uuid,
    today: NaiveDate,
) -> Result<TaskWithStatus, TaskError> {
    let task = fetch_owned_task(pool, user_id, task_id).await?;
    let start = period::period_start(today, task.frequency, task.reset_day);
    let facts = ledger::facts_between(pool, user_id, start, today, Some(task_id)).await?;

    Ok(status::resolve(task, &CompletionFacts::new(facts), today, None))
}

/// Partial edit. A reset day that is not given is kept while the frequency
/// stays the same, otherwise it falls back to the new frequency's default.
pub async fn update_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: &Uuid,
    request: &UpdateTaskRequest,
) -> Result<Task, TaskError> {
    let mut task = fetch_owned_task(pool, user_id, task_id).await?;

    if request.title.is_some() {
        task.title = validate_title(request.title.as_deref())?;
    }
    if let Some(category_id) = request.category_id {
        if !category_is_owned(pool, user_id, &category_id).await? {
            return Err(TaskError::CategoryNotFound);
        }
        task.category_id = category_id;
    }

    let frequency = request.frequency.unwrap_or(task.frequency);
    let requested_reset_day = match request.reset_day {
        Some(day) => Some(day),
        None if frequency == task.frequency => task.reset_day,
        None => None,
    };
    task.reset_day = validate_reset_day(frequency, requested_reset_day)?;
    task.frequency = frequency;

    let result = sqlx::query(
        r#"
        UPDATE tasks SET title = ?, category_id = ?, frequency = ?, reset_day = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&task.title)
    .bind(task.category_id.to_string())
    .bind(task.frequency.as_str())
    .bind(task.reset_day)
    .bind(task_id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(TaskError::NotFound);
    }

    Ok(task)
}

/// Delete a task and its completion facts
pub async fn delete_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: &Uuid,
) -> Result<(), TaskError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TaskError::NotFound);
    }

    Ok(())
}

/// Flip today's completion fact: remove it if present, record it otherwise.
/// Facts for other days are never touched.
pub async fn toggle_today(
    pool: &SqlitePool,
    user_id: &str,
    task_id: &Uuid,
    today: NaiveDate,
) -> Result<TaskWithStatus, TaskError> {
    let mut tx = pool.begin().await?;

    fetch_owned_task(&mut *tx, user_id, task_id).await?;

    if ledger::unrecord(&mut *tx, task_id, today).await? {
        log::debug!("Task {} unmarked for {}", task_id, today);
    } else {
        ledger::record(&mut *tx, task_id, today).await?;
        log::debug!("Task {} marked done for {}", task_id, today);
    }

    tx.commit().await?;

    get_task_with_status(pool, user_id, task_id, today).await
}

/// Explicit reset: remove the facts inside the current period so the task
/// reads as not completed again.
pub async fn reset_task(
    pool: &SqlitePool,
    user_id: &str,
    task_id: &Uuid,
    today: NaiveDate,
) -> Result<TaskWithStatus, TaskError> {
    let task = fetch_owned_task(pool, user_id, task_id).await?;
    let start = period::period_start(today, task.frequency, task.reset_day);

    let removed = ledger::unrecord_since(pool, task_id, start).await?;
    log::debug!(
        "Reset task {}: removed {} completion facts since {}",
        task_id,
        removed,
        start
    );

    get_task_with_status(pool, user_id, task_id, today).await
}

/// Completed task ids per day within `from..=to`.
/// Days without completions are omitted.
pub async fn completion_history(
    pool: &SqlitePool,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    task_id: Option<&Uuid>,
) -> Result<CompletionHistoryResponse, TaskError> {
    if from > to {
        return Err(TaskError::Validation("'from' must not be after 'to'".to_string()));
    }
    if (to - from).num_days() >= MAX_HISTORY_DAYS {
        return Err(TaskError::Validation(format!(
            "History range must be at most {} days",
            MAX_HISTORY_DAYS
        )));
    }
    if let Some(task_id) = task_id {
        fetch_owned_task(pool, user_id, task_id).await?;
    }

    let facts = ledger::facts_between(pool, user_id, from, to, task_id).await?;

    let mut days: BTreeMap<NaiveDate, Vec<Uuid>> = BTreeMap::new();
    for fact in facts {
        days.entry(fact.date).or_default().push(fact.task_id);
    }

    Ok(CompletionHistoryResponse { from, to, days })
}

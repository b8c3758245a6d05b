use chrono::{NaiveDate, Utc};
use shared::CompletionFact;
use sqlx::SqliteExecutor;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TaskCompletionRow;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Record that a task was done on `date`. Returns false if the fact already existed.
pub async fn record<'e>(
    executor: impl SqliteExecutor<'e>,
    task_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, LedgerError> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO task_completions (task_id, completion_date, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(task_id.to_string())
    .bind(date)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove the fact for exactly `date`. Returns false if there was none.
pub async fn unrecord<'e>(
    executor: impl SqliteExecutor<'e>,
    task_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, LedgerError> {
    let result =
        sqlx::query("DELETE FROM task_completions WHERE task_id = ? AND completion_date = ?")
            .bind(task_id.to_string())
            .bind(date)
            .execute(executor)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every fact of one task dated on or after `since`
pub async fn unrecord_since<'e>(
    executor: impl SqliteExecutor<'e>,
    task_id: &Uuid,
    since: NaiveDate,
) -> Result<u64, LedgerError> {
    let result =
        sqlx::query("DELETE FROM task_completions WHERE task_id = ? AND completion_date >= ?")
            .bind(task_id.to_string())
            .bind(since)
            .execute(executor)
            .await?;

    Ok(result.rows_affected())
}

/// All facts for the user's tasks dated on or after `since`
#[cfg_attr(not(test), allow(dead_code))]
pub async fn facts_for<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: &str,
    since: NaiveDate,
) -> Result<Vec<CompletionFact>, LedgerError> {
    let rows: Vec<TaskCompletionRow> = sqlx::query_as(
        r#"
        SELECT c.task_id, c.completion_date, c.created_at
        FROM task_completions c
        JOIN tasks t ON t.id = c.task_id
        WHERE t.user_id = ? AND c.completion_date >= ?
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(executor)
    .await?;

    Ok(rows.iter().filter_map(|row| row.to_shared()).collect())
}

/// Facts for the user's tasks within `from..=to`, optionally for one task only
pub async fn facts_between<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    task_id: Option<&Uuid>,
) -> Result<Vec<CompletionFact>, LedgerError> {
    let rows: Vec<TaskCompletionRow> = sqlx::query_as(
        r#"
        SELECT c.task_id, c.completion_date, c.created_at
        FROM task_completions c
        JOIN tasks t ON t.id = c.task_id
        WHERE t.user_id = ?
          AND c.completion_date >= ?
          AND c.completion_date <= ?
          AND (? IS NULL OR c.task_id = ?)
        ORDER BY c.completion_date ASC
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(task_id.map(|id| id.to_string()))
    .bind(task_id.map(|id| id.to_string()))
    .fetch_all(executor)
    .await?;

    Ok(rows.iter().filter_map(|row| row.to_shared()).collect())
}

/// Delete every fact dated before `before`, across all users
pub async fn sweep<'e>(
    executor: impl SqliteExecutor<'e>,
    before: NaiveDate,
) -> Result<u64, LedgerError> {
    let result = sqlx::query("DELETE FROM task_completions WHERE completion_date < ?")
        .bind(before)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

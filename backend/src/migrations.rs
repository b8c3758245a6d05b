//! Versioned schema migrations.
//!
//! The schema went through three generations:
//!
//! - **Gen0**: tasks carry a mutable `completed` flag and a `last_completed`
//!   timestamp, reset lazily on read.
//! - **Gen1**: tasks gain a `reset_day` anchor and completions are appended to
//!   the `task_completions` ledger, the flag is kept as a cache.
//! - **Gen2**: the flag columns are gone, status is always derived from the
//!   ledger.
//!
//! Each step is recorded in `schema_migrations` and runs in a single
//! transaction together with its version marker. Steps also check the
//! columns they touch, so a legacy database that predates the marker table
//! is brought forward by replaying the list from the start.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{Row, SqliteConnection, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database schema version {0} is newer than this build supports")]
    UnknownVersion(i64),
}

/// Schema generation found by introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    Empty,
    LegacyFlag,
    ResetDayFlag,
    Ledger,
}

type MigrationFn =
    for<'c> fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<(), MigrationError>>;

struct Migration {
    version: i64,
    name: &'static str,
    up: MigrationFn,
}

const MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    applied_at DATETIME NOT NULL
)
"#;

fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "create_base_schema",
            up: create_base_schema,
        },
        Migration {
            version: 2,
            name: "add_reset_day_and_completion_ledger",
            up: add_reset_day_and_completion_ledger,
        },
        Migration {
            version: 3,
            name: "drop_legacy_completion_flags",
            up: drop_legacy_completion_flags,
        },
    ]
}

pub fn latest_version() -> i64 {
    migrations().iter().map(|m| m.version).max().unwrap_or(0)
}

/// Apply every pending migration
pub async fn run(pool: &SqlitePool) -> Result<i64, MigrationError> {
    run_to(pool, latest_version()).await
}

/// Apply pending migrations up to and including `target`
pub async fn run_to(pool: &SqlitePool, target: i64) -> Result<i64, MigrationError> {
    sqlx::query(MIGRATIONS_TABLE).execute(pool).await?;

    let generation = detect_generation(pool).await?;
    let mut current = current_version(pool).await?;
    log::info!(
        "Database schema at version {} ({:?}), target version {}",
        current,
        generation,
        target
    );

    if current > latest_version() {
        return Err(MigrationError::UnknownVersion(current));
    }

    for migration in migrations() {
        if migration.version <= current || migration.version > target {
            continue;
        }

        let mut tx = pool.begin().await?;
        (migration.up)(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("Applied migration {} ({})", migration.version, migration.name);
        current = migration.version;
    }

    Ok(current)
}

pub async fn current_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

pub async fn detect_generation(pool: &SqlitePool) -> Result<SchemaGeneration, MigrationError> {
    let mut conn = pool.acquire().await?;

    if !table_exists(&mut *conn, "tasks").await? {
        return Ok(SchemaGeneration::Empty);
    }

    let has_flag = column_exists(&mut *conn, "tasks", "completed").await?;
    let has_ledger = table_exists(&mut *conn, "task_completions").await?
        && column_exists(&mut *conn, "tasks", "reset_day").await?;

    Ok(match (has_flag, has_ledger) {
        (true, false) => SchemaGeneration::LegacyFlag,
        (true, true) => SchemaGeneration::ResetDayFlag,
        (false, _) => SchemaGeneration::Ledger,
    })
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ? LIMIT 1")
            .bind(table)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool, sqlx::Error> {
    // PRAGMA arguments cannot be bound; callers only pass fixed table names
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.try_get::<String, _>("name").ok())
        .any(|name| name == column))
}

// ----------------------------------------------------------------------------
// Version 1: categories and tasks with the mutable completion flag
// ----------------------------------------------------------------------------

fn create_base_schema(conn: &mut SqliteConnection) -> BoxFuture<'_, Result<(), MigrationError>> {
    Box::pin(async move {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE (user_id, name)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                frequency TEXT NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT 0,
                last_completed DATETIME,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, category_id)")
            .execute(&mut *conn)
            .await?;

        Ok(())
    })
}

// ----------------------------------------------------------------------------
// Version 2: reset-day anchor and the append-only completion ledger
// ----------------------------------------------------------------------------

fn add_reset_day_and_completion_ledger(
    conn: &mut SqliteConnection,
) -> BoxFuture<'_, Result<(), MigrationError>> {
    Box::pin(async move {
        if !column_exists(&mut *conn, "tasks", "reset_day").await? {
            sqlx::query("ALTER TABLE tasks ADD COLUMN reset_day INTEGER")
                .execute(&mut *conn)
                .await?;
        }

        sqlx::query(
            r#"
            UPDATE tasks SET reset_day = CASE frequency
                WHEN 'weekly' THEN 0
                WHEN 'monthly' THEN 1
            END
            WHERE reset_day IS NULL AND frequency IN ('weekly', 'monthly')
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_completions (
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                completion_date DATE NOT NULL,
                created_at DATETIME NOT NULL,
                PRIMARY KEY (task_id, completion_date)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_task_completions_date
            ON task_completions(completion_date)
            "#,
        )
        .execute(&mut *conn)
        .await?;

        if column_exists(&mut *conn, "tasks", "completed").await? {
            backfill_ledger_from_flags(&mut *conn).await?;
        }

        Ok(())
    })
}

async fn backfill_ledger_from_flags(conn: &mut SqliteConnection) -> Result<(), MigrationError> {
    let rows = sqlx::query(
        r#"
        SELECT id, CAST(last_completed AS TEXT) AS last_completed
        FROM tasks
        WHERE completed = 1 AND last_completed IS NOT NULL
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let now = Utc::now();
    let mut backfilled = 0;

    for row in rows {
        let task_id: String = row.try_get("id")?;
        let raw: String = row.try_get("last_completed")?;

        let Some(date) = parse_legacy_completion_date(&raw) else {
            log::warn!(
                "Skipping completion backfill for task {}: unreadable last_completed {:?}",
                task_id,
                raw
            );
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO task_completions (task_id, completion_date, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&task_id)
        .bind(date)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        backfilled += result.rows_affected();
    }

    log::info!("Backfilled {} completion facts from legacy flags", backfilled);
    Ok(())
}

/// Local calendar date of a legacy `last_completed` value.
///
/// Values with an offset are converted to local time. Naive timestamps were
/// written by SQLite's `CURRENT_TIMESTAMP` and are read as UTC.
fn parse_legacy_completion_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).date_naive());
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().with_timezone(&Local).date_naive())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

// ----------------------------------------------------------------------------
// Version 3: drop the cached flag, status is derived from the ledger
// ----------------------------------------------------------------------------

fn drop_legacy_completion_flags(
    conn: &mut SqliteConnection,
) -> BoxFuture<'_, Result<(), MigrationError>> {
    Box::pin(async move {
        for column in ["completed", "last_completed"] {
            if column_exists(&mut *conn, "tasks", column).await? {
                sqlx::query(&format!("ALTER TABLE tasks DROP COLUMN {}", column))
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn empty_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap()
    }

    async fn insert_legacy_task(
        pool: &SqlitePool,
        frequency: &str,
        completed: bool,
        last_completed: Option<&str>,
    ) -> String {
        let category_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO categories (id, user_id, name, created_at) VALUES (?, 'u1', ?, ?)")
            .bind(&category_id)
            .bind(format!("cat-{}", category_id))
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap();

        let task_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, user_id, category_id, title, frequency, completed, last_completed, created_at)
            VALUES (?, 'u1', ?, 'legacy', ?, ?, ?, ?)
            "#,
        )
        .bind(&task_id)
        .bind(&category_id)
        .bind(frequency)
        .bind(completed)
        .bind(last_completed)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

        task_id
    }

    async fn completion_dates(pool: &SqlitePool, task_id: &str) -> Vec<NaiveDate> {
        sqlx::query_scalar(
            r#"
            SELECT completion_date FROM task_completions
            WHERE task_id = ?
            ORDER BY completion_date
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_reaches_ledger_generation() {
        let pool = empty_pool().await;
        sqlx::query(MIGRATIONS_TABLE).execute(&pool).await.unwrap();
        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::Empty);

        let version = run(&pool).await.unwrap();

        assert_eq!(version, latest_version());
        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::Ledger);
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let pool = empty_pool().await;
        run(&pool).await.unwrap();
        let version = run(&pool).await.unwrap();

        assert_eq!(version, latest_version());
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, latest_version());
    }

    #[tokio::test]
    async fn test_generations_in_order() {
        let pool = empty_pool().await;

        run_to(&pool, 1).await.unwrap();
        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::LegacyFlag);

        run_to(&pool, 2).await.unwrap();
        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::ResetDayFlag);

        run_to(&pool, 3).await.unwrap();
        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::Ledger);
    }

    #[tokio::test]
    async fn test_legacy_flag_backfills_ledger() {
        let pool = empty_pool().await;
        run_to(&pool, 1).await.unwrap();

        let ten_days_ago = Local::now() - Duration::days(10);
        let task_id = insert_legacy_task(
            &pool,
            "weekly",
            true,
            Some(&ten_days_ago.to_rfc3339()),
        )
        .await;

        run(&pool).await.unwrap();

        assert_eq!(
            completion_dates(&pool, &task_id).await,
            vec![ten_days_ago.date_naive()]
        );

        let reset_day: Option<i64> = sqlx::query_scalar("SELECT reset_day FROM tasks WHERE id = ?")
            .bind(&task_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(reset_day, Some(0));
    }

    #[tokio::test]
    async fn test_unset_flag_is_not_backfilled() {
        let pool = empty_pool().await;
        run_to(&pool, 1).await.unwrap();

        let task_id = insert_legacy_task(&pool, "daily", false, Some("2024-01-02 08:00:00")).await;
        let monthly_id = insert_legacy_task(&pool, "monthly", true, Some("not a date")).await;

        run(&pool).await.unwrap();

        assert!(completion_dates(&pool, &task_id).await.is_empty());
        assert!(completion_dates(&pool, &monthly_id).await.is_empty());

        let reset_day: Option<i64> = sqlx::query_scalar("SELECT reset_day FROM tasks WHERE id = ?")
            .bind(&monthly_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(reset_day, Some(1));
    }

    #[tokio::test]
    async fn test_legacy_database_without_marker_table() {
        let pool = empty_pool().await;

        // Gen0 database created before migrations were tracked
        {
            let mut conn = pool.acquire().await.unwrap();
            create_base_schema(&mut *conn).await.unwrap();
        }
        let task_id = insert_legacy_task(&pool, "daily", true, Some("2024-05-01")).await;

        run(&pool).await.unwrap();

        assert_eq!(detect_generation(&pool).await.unwrap(), SchemaGeneration::Ledger);
        assert_eq!(
            completion_dates(&pool, &task_id).await,
            vec![NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let pool = empty_pool().await;
        run(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (99, 'future', ?)",
        )
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let err = run(&pool).await.unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(99)));
    }

    #[test]
    fn test_parse_legacy_completion_date() {
        let utc_noon = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            parse_legacy_completion_date(&utc_noon.to_rfc3339()),
            Some(utc_noon.with_timezone(&Local).date_naive())
        );
        assert_eq!(
            parse_legacy_completion_date("2024-03-10 12:00:00"),
            Some(utc_noon.with_timezone(&Local).date_naive())
        );
        assert_eq!(
            parse_legacy_completion_date("2024-03-10"),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
        assert_eq!(parse_legacy_completion_date("yesterday"), None);
    }
}

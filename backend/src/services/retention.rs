use chrono::{Local, Months, NaiveDate};
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tokio::time;

use crate::db::Database;
use crate::services::ledger::{self, LedgerError};

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Configuration for the retention sweeper
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Facts older than this many calendar months are deleted
    pub retention_months: u32,
    /// Time between two sweeps
    pub interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention_months: 3,
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A monthly period never starts more than one calendar month back
const MIN_RETENTION_MONTHS: u32 = 1;

/// Oldest date that is kept: `today` minus `months` calendar months.
///
/// Day-of-month overflow clamps to the end of the target month, so
/// 2024-05-31 minus 3 months is 2024-02-29.
pub fn retention_cutoff(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months.max(MIN_RETENTION_MONTHS)))
        .unwrap_or(NaiveDate::MIN)
}

/// Delete every completion fact dated before the retention cutoff
pub async fn sweep_expired(
    pool: &SqlitePool,
    today: NaiveDate,
    months: u32,
) -> Result<u64, RetentionError> {
    let cutoff = retention_cutoff(today, months);
    let removed = ledger::sweep(pool, cutoff).await?;
    Ok(removed)
}

/// Sweep while holding the writer lock. Failures are logged and swallowed,
/// retention only bounds storage.
pub async fn sweep_best_effort(db: &Database, today: NaiveDate, months: u32) -> Option<u64> {
    let _guard = db.write_lock().await;

    match sweep_expired(db.pool(), today, months).await {
        Ok(removed) => {
            if removed > 0 {
                log::info!(
                    "Retention sweep removed {} completion facts older than {}",
                    removed,
                    retention_cutoff(today, months)
                );
            }
            Some(removed)
        }
        Err(e) => {
            log::error!("Retention sweep failed: {}", e);
            None
        }
    }
}

/// Start the retention sweeper.
/// The startup sweep is done by the caller, the first pass here runs one interval later.
pub async fn start_sweeper(db: Database, config: SweepConfig) {
    log::info!(
        "Retention sweeper started: keeping {} months, sweeping every {} seconds",
        config.retention_months,
        config.interval.as_secs()
    );

    let period = config.interval.max(Duration::from_secs(60));
    let mut interval = time::interval_at(time::Instant::now() + period, period);

    loop {
        interval.tick().await;

        let today = Local::now().date_naive();
        sweep_best_effort(&db, today, config.retention_months).await;
    }
}

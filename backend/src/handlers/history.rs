use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::{Local, NaiveDate};
use shared::ApiSuccess;

use crate::handlers::{internal_error, not_found, parse_id, user_id, validation_error};
use crate::models::AppState;
use crate::services::retention;
use crate::services::tasks::{self as task_service, TaskError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/history", web::get().to(get_history));
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub task_id: Option<String>,
}

fn parse_date(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>, HttpResponse> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some).map_err(|_| {
            validation_error(format!("Invalid '{}' date, expected YYYY-MM-DD", name))
        }),
        None => Ok(None),
    }
}

/// Completion history per day.
///
/// Defaults to the whole retention window ending today. Expired facts are
/// swept first so the answer never includes them.
async fn get_history(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let today = Local::now().date_naive();
    let retention_months = state.config.retention_months;

    let to = match parse_date(query.to.as_deref(), "to") {
        Ok(date) => date.unwrap_or(today),
        Err(response) => return Ok(response),
    };
    let from = match parse_date(query.from.as_deref(), "from") {
        Ok(date) => date.unwrap_or_else(|| retention::retention_cutoff(to, retention_months)),
        Err(response) => return Ok(response),
    };
    let task_id = match query.task_id.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => match parse_id(raw, "task") {
            Ok(id) => Some(id),
            Err(response) => return Ok(response),
        },
        None => None,
    };

    retention::sweep_best_effort(&state.db, today, retention_months).await;

    match task_service::completion_history(state.db.pool(), &user_id, from, to, task_id.as_ref())
        .await
    {
        Ok(history) => Ok(HttpResponse::Ok().json(ApiSuccess::new(history))),
        Err(TaskError::Validation(message)) => Ok(validation_error(message)),
        Err(TaskError::NotFound) => Ok(not_found("Task not found")),
        Err(e) => {
            log::error!("Error loading completion history: {:?}", e);
            Ok(internal_error("Failed to load completion history"))
        }
    }
}

use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::Local;
use shared::{ApiSuccess, CreateTaskRequest, TasksResponse, UpdateTaskRequest};

use crate::handlers::{internal_error, not_found, parse_id, user_id, validation_error};
use crate::models::AppState;
use crate::services::tasks::{self as task_service, TaskError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .route("", web::get().to(list_tasks))
            .route("", web::post().to(create_task))
            .route("/{task_id}", web::put().to(update_task))
            .route("/{task_id}", web::delete().to(delete_task))
            .route("/{task_id}/toggle", web::post().to(toggle_task))
            .route("/{task_id}/reset", web::post().to(reset_task)),
    );
}

#[derive(Debug, serde::Deserialize)]
pub struct ListTasksQuery {
    pub category_id: Option<String>,
    pub include_history: Option<String>,
}

fn parse_flag(raw: Option<&str>) -> Result<bool, HttpResponse> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(validation_error(format!(
            "include_history must be true or false, got {:?}",
            other
        ))),
    }
}

fn task_error_response(e: TaskError, action: &str) -> HttpResponse {
    match e {
        TaskError::Validation(message) => validation_error(message),
        TaskError::NotFound => not_found("Task not found"),
        TaskError::CategoryNotFound => not_found("Category not found"),
        e => {
            log::error!("Error trying to {}: {:?}", action, e);
            internal_error(&format!("Failed to {}", action))
        }
    }
}

async fn list_tasks(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let category_id = match query.category_id.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => match parse_id(raw, "category") {
            Ok(id) => Some(id),
            Err(response) => return Ok(response),
        },
        None => None,
    };

    let include_history = match parse_flag(query.include_history.as_deref()) {
        Ok(flag) => flag,
        Err(response) => return Ok(response),
    };

    let today = Local::now().date_naive();

    match task_service::list_tasks_with_status(
        state.db.pool(),
        &user_id,
        category_id.as_ref(),
        include_history,
        today,
        state.config.retention_months,
    )
    .await
    {
        Ok(tasks) => Ok(HttpResponse::Ok().json(ApiSuccess::new(TasksResponse { tasks }))),
        Err(e) => Ok(task_error_response(e, "list tasks")),
    }
}

async fn create_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let _guard = state.db.write_lock().await;

    match task_service::create_task(state.db.pool(), &user_id, &body).await {
        Ok(task) => Ok(HttpResponse::Created().json(ApiSuccess::new(task))),
        Err(e) => Ok(task_error_response(e, "create task")),
    }
}

async fn update_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let _guard = state.db.write_lock().await;

    match task_service::update_task(state.db.pool(), &user_id, &task_id, &body).await {
        Ok(task) => Ok(HttpResponse::Ok().json(ApiSuccess::new(task))),
        Err(e) => Ok(task_error_response(e, "update task")),
    }
}

async fn delete_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let _guard = state.db.write_lock().await;

    match task_service::delete_task(state.db.pool(), &user_id, &task_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(task_error_response(e, "delete task")),
    }
}

async fn toggle_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let today = Local::now().date_naive();
    let _guard = state.db.write_lock().await;

    match task_service::toggle_today(state.db.pool(), &user_id, &task_id, today).await {
        Ok(task) => Ok(HttpResponse::Ok().json(ApiSuccess::new(task))),
        Err(e) => Ok(task_error_response(e, "toggle task")),
    }
}

async fn reset_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let today = Local::now().date_naive();
    let _guard = state.db.write_lock().await;

    match task_service::reset_task(state.db.pool(), &user_id, &task_id, today).await {
        Ok(task) => Ok(HttpResponse::Ok().json(ApiSuccess::new(task))),
        Err(e) => Ok(task_error_response(e, "reset task")),
    }
}

use actix_web::{web, HttpRequest, HttpResponse};
use shared::ApiError;
use uuid::Uuid;

use crate::middleware::extract_user_id;

pub mod categories;
pub mod history;
pub mod tasks;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let message = err.to_string();
                actix_web::error::InternalError::from_response(err, validation_error(message))
                    .into()
            }))
            .configure(categories::configure)
            .configure(tasks::configure)
            .configure(history::configure),
    );
}

pub(crate) fn validation_error(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError {
        error: "validation_error".to_string(),
        message: message.into(),
    })
}

pub(crate) fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError {
        error: "not_found".to_string(),
        message: message.to_string(),
    })
}

pub(crate) fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiError {
        error: "internal_error".to_string(),
        message: message.to_string(),
    })
}

/// The identity token, or the error response to send when it is missing
pub(crate) fn user_id(req: &HttpRequest) -> Result<String, HttpResponse> {
    extract_user_id(req).map_err(|e| {
        log::error!("Request reached a handler without identity: {}", e);
        HttpResponse::Unauthorized().json(ApiError {
            error: "unauthorized".to_string(),
            message: "Missing user identity".to_string(),
        })
    })
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| validation_error(format!("Invalid {} ID format", what)))
}

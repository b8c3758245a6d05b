use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, CategoriesResponse, CreateCategoryRequest};

use crate::handlers::{internal_error, not_found, parse_id, user_id, validation_error};
use crate::models::AppState;
use crate::services::categories::{self as category_service, CategoryError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/categories")
            .route("", web::get().to(list_categories))
            .route("", web::post().to(create_category))
            .route("/{category_id}", web::delete().to(delete_category)),
    );
}

async fn list_categories(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match category_service::list_categories(state.db.pool(), &user_id).await {
        Ok(categories) => {
            Ok(HttpResponse::Ok().json(ApiSuccess::new(CategoriesResponse { categories })))
        }
        Err(e) => {
            log::error!("Error listing categories: {:?}", e);
            Ok(internal_error("Failed to list categories"))
        }
    }
}

async fn create_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let _guard = state.db.write_lock().await;

    match category_service::create_category(state.db.pool(), &user_id, &body).await {
        Ok(category) => Ok(HttpResponse::Created().json(ApiSuccess::new(category))),
        Err(CategoryError::Validation(message)) => Ok(validation_error(message)),
        Err(CategoryError::DuplicateName) => Ok(HttpResponse::Conflict().json(ApiError {
            error: "duplicate_name".to_string(),
            message: "A category with this name already exists".to_string(),
        })),
        Err(e) => {
            log::error!("Error creating category: {:?}", e);
            Ok(internal_error("Failed to create category"))
        }
    }
}

async fn delete_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match user_id(&req) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let category_id = match parse_id(&path.into_inner(), "category") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let _guard = state.db.write_lock().await;

    match category_service::delete_category(state.db.pool(), &user_id, &category_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(CategoryError::NotFound) => Ok(not_found("Category not found")),
        Err(e) => {
            log::error!("Error deleting category: {:?}", e);
            Ok(internal_error("Failed to delete category"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::app_state;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::{json, Value};

    fn as_alice(req: actix_test::TestRequest) -> actix_test::TestRequest {
        req.cookie(Cookie::new("user_id", "alice"))
    }

    #[actix_web::test]
    async fn test_create_and_list_categories() {
        let state = app_state().await;
        let app = crate::test_app!(state);

        let req = as_alice(actix_test::TestRequest::post().uri("/api/categories"))
            .set_json(json!({ "name": "Kitchen" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["data"]["name"], "Kitchen");

        let req = as_alice(actix_test::TestRequest::get().uri("/api/categories")).to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_duplicate_category_is_conflict() {
        let state = app_state().await;
        let app = crate::test_app!(state);

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let req = as_alice(actix_test::TestRequest::post().uri("/api/categories"))
                .set_json(json!({ "name": "Kitchen" }))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);

            if expected == StatusCode::CONFLICT {
                let body: Value = actix_test::read_body_json(resp).await;
                assert_eq!(body["error"], "duplicate_name");
            }
        }
    }

    #[actix_web::test]
    async fn test_empty_name_is_validation_error() {
        let state = app_state().await;
        let app = crate::test_app!(state);

        let req = as_alice(actix_test::TestRequest::post().uri("/api/categories"))
            .set_json(json!({ "name": "  " }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[actix_web::test]
    async fn test_delete_category() {
        let state = app_state().await;
        let app = crate::test_app!(state);

        let req = as_alice(actix_test::TestRequest::post().uri("/api/categories"))
            .set_json(json!({ "name": "Kitchen" }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = actix_test::TestRequest::delete()
            .uri(&format!("/api/categories/{}", id))
            .cookie(Cookie::new("user_id", "bob"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let uri = format!("/api/categories/{}", id);
        let req = as_alice(actix_test::TestRequest::delete().uri(&uri)).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = as_alice(actix_test::TestRequest::delete().uri("/api/categories/not-a-uuid"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

use actix_web::body::MessageBody;
use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage, HttpRequest};
use uuid::Uuid;

use crate::models::AppState;

pub const DEFAULT_COOKIE_NAME: &str = "user_id";
const COOKIE_MAX_AGE_DAYS: i64 = 3650;
const MAX_TOKEN_LENGTH: usize = 128;

/// Anonymous per-browser identity, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Reads the identity cookie and issues a fresh token when it is missing.
///
/// The token is opaque: it only ever partitions data by equality.
pub async fn assign_identity(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let cookie_name = req
        .app_data::<web::Data<AppState>>()
        .map(|state| state.config.identity_cookie.clone())
        .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

    let existing = req
        .cookie(&cookie_name)
        .map(|c| c.value().trim().to_string())
        .filter(|value| !value.is_empty() && value.len() <= MAX_TOKEN_LENGTH);

    let (token, issued) = match existing {
        Some(token) => (token, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    req.extensions_mut().insert(UserId(token.clone()));

    let mut res = next.call(req).await?;

    if issued {
        log::debug!("Issued new identity token");
        let cookie = Cookie::build(cookie_name, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::days(COOKIE_MAX_AGE_DAYS))
            .finish();
        res.response_mut().add_cookie(&cookie)?;
    }

    Ok(res)
}

/// Extract the user token placed by [`assign_identity`]
pub fn extract_user_id(req: &HttpRequest) -> Result<String, IdentityError> {
    req.extensions()
        .get::<UserId>()
        .map(|user| user.0.clone())
        .ok_or(IdentityError::MissingIdentity)
}

#[derive(Debug)]
pub enum IdentityError {
    MissingIdentity,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::MissingIdentity => write!(f, "Missing user identity"),
        }
    }
}

impl std::error::Error for IdentityError {}

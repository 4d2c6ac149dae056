//! Cookie session gate for the admin API
//!
//! The session cookie carries `<username>_<unix seconds>` and is only checked for presence.
//! There is no signature or expiry check on the server side; the cookie's `Max-Age` is the
//! only lifetime.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::config::SessionConfig;
use crate::db::DEFAULT_ADMIN;

/// Value of the named cookie, if the request carries a non-empty one.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_value(username: &str) -> String {
    format!("{}_{}", username, chrono::Utc::now().timestamp())
}

/// Username encoded in a session value; everything before the last underscore.
pub fn username_from_session(value: &str) -> &str {
    match value.rfind('_') {
        Some(i) => &value[..i],
        None => DEFAULT_ADMIN,
    }
}

pub fn login_cookie(config: &SessionConfig, value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        config.cookie_name, value, config.max_age_secs
    ))
    .map_err(|_| AppError::bad_request("username cannot be stored in a cookie"))
}

pub fn logout_cookie(config: &SessionConfig) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        config.cookie_name
    ))
    .map_err(|_| AppError::internal("invalid cookie name"))
}

/// Middleware for `/api/admin/*`: reject requests without a session cookie.
pub async fn require_session(
    State(st): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if session_cookie(req.headers(), &st.config.session.cookie_name).is_none() {
        return Err(AppError::unauthorized("not logged in"));
    }
    Ok(next.run(req).await)
}

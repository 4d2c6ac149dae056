use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::{done, ok_message};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    db::verify_password,
    errors::NavError,
    models::{ChangePasswordRequest, LoginRequest},
    repository,
    session::{login_cookie, logout_cookie, session_cookie, session_value, username_from_session},
};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 50;

#[derive(Serialize)]
pub struct LoginResponse {
    username: String,
}

#[derive(Serialize)]
pub struct AuthStatus {
    authenticated: bool,
}

#[axum::debug_handler]
pub async fn login(
    State(st): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let username = req.username.clone();
    let valid = st
        .read(move |conn| {
            let stored = repository::password_hash(conn, &req.username)?;
            Ok(stored.is_some_and(|hash| verify_password(&req.password, &hash)))
        })
        .await?;
    if !valid {
        tracing::warn!("Failed login for '{}'", username);
        return Err(AppError::unauthorized("invalid username or password"));
    }

    let cookie = login_cookie(&st.config.session, &session_value(&username))?;
    tracing::info!("User '{}' logged in", username);
    Ok((
        [(header::SET_COOKIE, cookie)],
        ok_message("logged in", Some(LoginResponse { username })),
    ))
}

pub async fn logout(State(st): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let cookie = logout_cookie(&st.config.session)?;
    Ok(([(header::SET_COOKIE, cookie)], done("logged out")))
}

pub async fn check_auth(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: session_cookie(&headers, &st.config.session.cookie_name).is_some(),
    })
}

pub async fn change_password(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let len = req.new_password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "new password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "new password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    if req.new_password != req.confirm_password {
        return Err(AppError::bad_request("new passwords do not match"));
    }
    if req.old_password == req.new_password {
        return Err(AppError::bad_request(
            "new password must differ from the old one",
        ));
    }

    let session = session_cookie(&headers, &st.config.session.cookie_name).unwrap_or_default();
    let username = username_from_session(&session).to_string();

    let user = username.clone();
    st.read(move |conn| {
        let stored = repository::password_hash(conn, &user)?
            .ok_or_else(|| NavError::not_found("user", &user))?;
        if !verify_password(&req.old_password, &stored) {
            return Err(NavError::validation("old_password", "is incorrect"));
        }
        repository::update_password(conn, &user, &req.new_password)
    })
    .await?;

    tracing::info!("Password changed for '{}'", username);
    Ok(done("password changed"))
}

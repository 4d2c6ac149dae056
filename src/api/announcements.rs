use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::{done, ok, ok_message, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    models::{Announcement, AnnouncementInput, IntervalInput},
    repository,
};

pub async fn list_announcements(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Announcement>>>, AppError> {
    let announcements = st
        .read(|conn| repository::list_announcements(conn))
        .await?;
    Ok(ok(announcements))
}

pub async fn get_announcement(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Announcement>>, AppError> {
    let announcement = st
        .read(move |conn| repository::get_announcement(conn, id))
        .await?;
    Ok(ok(announcement))
}

pub async fn create_announcement(
    State(st): State<Arc<AppState>>,
    Json(input): Json<AnnouncementInput>,
) -> Result<Json<ApiResponse<Announcement>>, AppError> {
    if input.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }
    let announcement = st
        .in_transaction(move |tx| repository::create_announcement(tx, &input))
        .await?;
    tracing::info!("Created announcement {}", announcement.id);
    st.changed();
    Ok(ok_message("created", Some(announcement)))
}

pub async fn update_announcement(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<AnnouncementInput>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if input.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }
    st.in_transaction(move |tx| repository::update_announcement(tx, id, &input))
        .await?;
    tracing::info!("Updated announcement {}", id);
    st.changed();
    Ok(done("updated"))
}

pub async fn delete_announcement(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    st.in_transaction(move |tx| repository::delete_announcement(tx, id))
        .await?;
    tracing::info!("Deleted announcement {}", id);
    st.changed();
    Ok(done("deleted"))
}

pub async fn get_interval(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<IntervalInput>>, AppError> {
    let interval = st
        .read(|conn| repository::announcement_interval(conn))
        .await?;
    Ok(ok(IntervalInput { interval }))
}

pub async fn update_interval(
    State(st): State<Arc<AppState>>,
    Json(input): Json<IntervalInput>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    st.in_transaction(move |tx| repository::update_interval(tx, input.interval))
        .await?;
    tracing::info!("Announcement interval set to {} ms", input.interval);
    st.changed();
    Ok(done("updated"))
}

use axum::{extract::State, Json};
use std::sync::Arc;

use super::{ok, ok_message, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    manifest::NavEntry,
    models::PageConfig,
    repository, snapshot,
};

/// Public: the same document as the snapshot, read live from storage.
pub async fn get_nav(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<NavEntry>>>, AppError> {
    let entries = st
        .read(|conn| {
            repository::ensure_page_config(conn)?;
            snapshot::collect_nav(conn)
        })
        .await?;
    Ok(ok(entries))
}

pub async fn get_page_config(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<PageConfig>>, AppError> {
    let config = st
        .read(|conn| repository::ensure_page_config(conn))
        .await?;
    Ok(ok(config))
}

pub async fn update_page_config(
    State(st): State<Arc<AppState>>,
    Json(config): Json<PageConfig>,
) -> Result<Json<ApiResponse<PageConfig>>, AppError> {
    let config = st
        .in_transaction(move |tx| {
            repository::update_page_config(tx, &config)?;
            Ok(config)
        })
        .await?;
    tracing::info!("Page config updated");
    st.changed();
    Ok(ok_message("updated", Some(config)))
}

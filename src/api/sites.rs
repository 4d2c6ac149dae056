use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::{done, ok, ok_message, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    models::{Site, SiteInput, SortRequest},
    repository,
};

pub async fn list_category_sites(
    State(st): State<Arc<AppState>>,
    Path(cat_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Site>>>, AppError> {
    let sites = st
        .read(move |conn| repository::list_sites(conn, cat_id))
        .await?;
    Ok(ok(sites))
}

pub async fn get_site(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Site>>, AppError> {
    let site = st.read(move |conn| repository::get_site(conn, id)).await?;
    Ok(ok(site))
}

pub async fn create_site(
    State(st): State<Arc<AppState>>,
    Json(input): Json<SiteInput>,
) -> Result<Json<ApiResponse<Site>>, AppError> {
    let site = st
        .in_transaction(move |tx| repository::create_site(tx, &input))
        .await?;
    tracing::info!("Created site {} in category {}", site.id, site.cat_id);
    st.changed();
    Ok(ok_message("created", Some(site)))
}

pub async fn update_site(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<SiteInput>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let released = st
        .in_transaction(move |tx| repository::update_site(tx, id, &input))
        .await?;
    tracing::info!("Updated site {}", id);
    st.changed_releasing(&released);
    Ok(done("updated"))
}

pub async fn delete_site(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let released = st
        .in_transaction(move |tx| repository::delete_site(tx, id))
        .await?;
    tracing::info!("Deleted site {}", id);
    st.changed_releasing(&released);
    Ok(done("deleted"))
}

pub async fn sort_sites(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SortRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let count = req.items.len();
    st.in_transaction(move |tx| repository::update_site_sort(tx, &req.items))
        .await?;
    tracing::info!("Reordered {} sites", count);
    st.changed();
    Ok(done("order updated"))
}

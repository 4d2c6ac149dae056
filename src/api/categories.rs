use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::{done, ok, ok_message, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    models::{Category, CategoryInput, SortRequest},
    repository,
};

pub async fn list_categories(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    let categories = st.read(|conn| repository::list_categories(conn)).await?;
    Ok(ok(categories))
}

pub async fn get_category(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let category = st
        .read(move |conn| repository::get_category_with_sites(conn, id))
        .await?;
    Ok(ok(category))
}

pub async fn create_category(
    State(st): State<Arc<AppState>>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let category = st
        .in_transaction(move |tx| repository::create_category(tx, &input))
        .await?;
    tracing::info!("Created category {} '{}'", category.id, category.classify);
    st.changed();
    Ok(ok_message("created", Some(category)))
}

pub async fn update_category(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    st.in_transaction(move |tx| repository::update_category(tx, id, &input))
        .await?;
    tracing::info!("Updated category {}", id);
    st.changed();
    Ok(done("updated"))
}

/// Deletes the category with its sites, then the uploads those sites pointed at.
pub async fn delete_category(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let released = st
        .in_transaction(move |tx| repository::delete_category(tx, id))
        .await?;
    tracing::info!("Deleted category {}", id);
    st.changed_releasing(&released);
    Ok(done("deleted"))
}

pub async fn sort_categories(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SortRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let count = req.items.len();
    st.in_transaction(move |tx| repository::update_category_sort(tx, &req.items))
        .await?;
    tracing::info!("Reordered {} categories", count);
    st.changed();
    Ok(done("order updated"))
}

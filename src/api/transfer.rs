//! Backup archive and plain JSON export/import endpoints.

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{ok_message, uploads::read_upload_form, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    backup::ArchiveImportReport,
    importer::ImportSummary,
};

pub fn backup_file_name() -> String {
    format!(
        "nav_backup_{}.zip",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

pub async fn export_backup(
    State(st): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let archive = st.blocking(|st| st.backup.export_archive()).await?;
    let disposition = format!("attachment; filename={}", backup_file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    ))
}

/// Accepts a multipart `file` holding a `.zip` backup and replaces the whole dataset.
#[axum::debug_handler]
pub async fn import_backup(
    State(st): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ArchiveImportReport>>, AppError> {
    let form = read_upload_form(multipart).await?;
    if !form.file_name.to_ascii_lowercase().ends_with(".zip") {
        return Err(AppError::bad_request("backup must be a .zip file"));
    }
    let limit = st.backup.max_archive_size();
    if form.data.len() as u64 > limit {
        return Err(AppError::payload_too_large(format!(
            "backup is larger than the {} MB limit",
            limit / 1024 / 1024
        )));
    }

    tracing::info!(
        "Importing backup '{}' ({} bytes)",
        form.file_name,
        form.data.len()
    );
    let report = st
        .blocking(move |st| st.backup.import_archive(form.data))
        .await?;
    st.changed();
    Ok(ok_message("backup imported", Some(report)))
}

pub async fn export_json(State(st): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let entries = st.blocking(|st| st.backup.export_json()).await?;
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=nav_data.json",
        )],
        Json(entries),
    ))
}

pub async fn import_json(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<ImportSummary>>, AppError> {
    let summary = st
        .blocking(move |st| st.backup.import_json(&body))
        .await?;
    st.changed();
    Ok(ok_message("imported", Some(summary)))
}

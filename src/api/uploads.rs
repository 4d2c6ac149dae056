use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{done, ok, ok_message, ApiResponse};
use crate::{
    api_errors::AppError,
    app_state::AppState,
    managed_files::{FileListing, ManagedFileInfo, StoredUpload, UploadKind},
};

/// The `file` part of a multipart form plus the optional `type` field.
pub(crate) struct UploadForm {
    pub file_name: String,
    pub data: Vec<u8>,
    pub kind: Option<String>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large("upload exceeds the size limit")
    } else {
        AppError::bad_request(format!("invalid multipart body: {e}"))
    }
}

pub(crate) async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut kind = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some((name, data));
            }
            Some("type") => {
                kind = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| AppError::bad_request("no file uploaded"))?;
    if file_name.is_empty() {
        return Err(AppError::bad_request("uploaded file has no name"));
    }
    Ok(UploadForm {
        file_name,
        data,
        kind,
    })
}

pub async fn upload_file(
    State(st): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<StoredUpload>>, AppError> {
    let form = read_upload_form(multipart).await?;
    if form.data.len() as u64 > st.files.max_upload_size() {
        return Err(AppError::payload_too_large(format!(
            "file is larger than the {} MB limit",
            st.files.max_upload_size() / 1024 / 1024
        )));
    }
    let kind = UploadKind::parse(form.kind.as_deref().unwrap_or_default());

    let stored = st
        .blocking(move |st| st.files.save_upload(kind, &form.file_name, &form.data))
        .await?;
    Ok(ok_message("uploaded", Some(stored)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub path: Option<String>,
    pub filename: Option<String>,
}

pub async fn delete_file(
    State(st): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let target = match (query.path, query.filename) {
        (Some(path), _) if !path.is_empty() => Target::Path(path),
        (_, Some(name)) if !name.is_empty() => Target::Name(name),
        _ => return Err(AppError::bad_request("path or filename is required")),
    };

    st.blocking(move |st| match &target {
        Target::Path(path) => st.files.delete_by_path(path),
        Target::Name(name) => st.files.delete_by_filename(name),
    })
    .await?;
    Ok(done("deleted"))
}

enum Target {
    Path(String),
    Name(String),
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type", default)]
    pub kind: String,
}

pub async fn list_files(
    State(st): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ManagedFileInfo>>>, AppError> {
    let listing = FileListing::parse(&query.kind);
    let files = st.blocking(move |st| Ok(st.files.list(listing))).await?;
    Ok(ok(files))
}

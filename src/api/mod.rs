//! HTTP handlers for the admin API and the public nav endpoint.

pub mod announcements;
pub mod auth;
pub mod categories;
pub mod nav;
pub mod sites;
pub mod transfer;
pub mod uploads;

use axum::Json;
use serde::Serialize;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: None,
        data: Some(data),
    })
}

pub fn ok_message<T: Serialize>(message: &str, data: Option<T>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: Some(message.to_string()),
        data,
    })
}

pub fn done(message: &str) -> Json<ApiResponse<()>> {
    ok_message(message, None)
}

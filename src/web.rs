use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    api::{announcements, auth, categories, nav, sites, transfer, uploads},
    app_state::AppState,
    session::require_session,
};

// Multipart framing on top of the raw file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

fn body_limit(max: u64) -> DefaultBodyLimit {
    let limit = max.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

/// Everything under `/api/admin`, behind the session gate.
fn admin_routes(st: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", put(auth::change_password))
        // categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/categories/sort", put(categories::sort_categories))
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/{id}/sites", get(sites::list_category_sites))
        // sites
        .route("/sites", post(sites::create_site))
        .route("/sites/sort", put(sites::sort_sites))
        .route(
            "/sites/{id}",
            get(sites::get_site)
                .put(sites::update_site)
                .delete(sites::delete_site),
        )
        // announcements
        .route(
            "/announcements",
            get(announcements::list_announcements).post(announcements::create_announcement),
        )
        .route(
            "/announcements/{id}",
            get(announcements::get_announcement)
                .put(announcements::update_announcement)
                .delete(announcements::delete_announcement),
        )
        .route(
            "/announcement-config",
            get(announcements::get_interval).put(announcements::update_interval),
        )
        .route(
            "/page-config",
            get(nav::get_page_config).put(nav::update_page_config),
        )
        // uploads
        .route(
            "/upload",
            post(uploads::upload_file)
                .delete(uploads::delete_file)
                .layer(body_limit(st.config.upload.max_size)),
        )
        .route("/files", get(uploads::list_files))
        // transfer
        .route("/export", get(transfer::export_json))
        .route(
            "/import",
            post(transfer::import_json).layer(body_limit(st.config.backup.max_archive_size)),
        )
        .route("/backup/export", get(transfer::export_backup))
        .route(
            "/backup/import",
            post(transfer::import_backup).layer(body_limit(st.config.backup.max_archive_size)),
        )
        .route_layer(middleware::from_fn_with_state(st.clone(), require_session))
}

/// Build the full application router.
pub fn build_router(st: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/login", post(auth::login))
        .route("/check-auth", get(auth::check_auth))
        .route("/nav", get(nav::get_nav))
        .nest("/admin", admin_routes(&st));

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(healthz))
        .route_service("/nav.json", ServeFile::new(&st.config.snapshot.json_path))
        .nest_service("/uploads", ServeDir::new(&st.config.upload.path))
        .layer(TraceLayer::new_for_http())
        .with_state(st)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

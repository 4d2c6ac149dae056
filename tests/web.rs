//! Router-level tests: session gate, CRUD round trips, uploads and backup import.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

use nav_admin::{web::build_router, AppState, NavConfig};

const BOUNDARY: &str = "nav-admin-test-boundary";

struct TestApp {
    dir: TempDir,
    router: Router,
    state: Arc<AppState>,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = NavConfig::default();
    config.database.path = dir.path().join("data/admin.db");
    config.upload.path = dir.path().join("uploads");
    config.snapshot.json_path = dir.path().join("static/nav.json");

    let (state, _worker) = AppState::open(config).await.expect("Failed to open state");
    TestApp {
        dir,
        router: build_router(state.clone()),
        state,
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn multipart_request(uri: &str, cookie: &str, file_name: &str, data: &[u8], kind: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(kind) = kind {
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"type\"\r\n\r\n{kind}\r\n"
        )
        .unwrap();
    }
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(data);
    write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &TestApp) -> String {
    let req = json_request(
        "POST",
        "/api/login",
        None,
        json!({ "username": "admin", "password": "admin" }),
    );
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn health_and_public_nav_need_no_session() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, get("/api/nav", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["type"], "page_config");
    assert_eq!(body["data"][1]["type"], "announcement_config");

    let (_, body) = send(&app, get("/api/check-auth", None)).await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn admin_routes_require_a_session_cookie() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/api/admin/categories", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, get("/api/admin/files", Some("session="))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = json_request(
        "POST",
        "/api/login",
        None,
        json!({ "username": "admin", "password": "nope" }),
    );
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app).await;
    let (status, body) = send(&app, get("/api/check-auth", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn category_and_site_crud_round_trip() {
    let app = test_app().await;
    let cookie = login(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/categories",
            Some(&cookie),
            json!({ "_id": "tools", "classify": "Tools", "icon": "wrench" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let cat_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["sort_no"], 0);

    for name in ["A", "B"] {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/admin/sites",
                Some(&cookie),
                json!({ "cat_id": cat_id, "name": name, "href": format!("https://{name}.example") }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get(&format!("/api/admin/categories/{cat_id}"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let sites = body["data"]["sites"].as_array().unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[1]["sort_no"], 1);

    let (_, body) = send(&app, get("/api/nav", None)).await;
    assert_eq!(body["data"][2]["_id"], "tools");
    assert_eq!(body["data"][2]["sites"][0]["name"], "A");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/admin/sites", Some(&cookie), json!({ "cat_id": 999, "name": "x", "href": "y" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/admin/categories/sort", Some(&cookie), json!({ "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/categories/{cat_id}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/api/admin/categories/{cat_id}"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_are_typed_and_deleted_with_their_site() {
    let app = test_app().await;
    let cookie = login(&app).await;

    let (status, _) = send(
        &app,
        multipart_request("/api/admin/upload", &cookie, "evil.exe", b"MZ", Some("logo")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        multipart_request("/api/admin/upload", &cookie, "logo.png", b"png", Some("logo")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/logos/"));
    let on_disk = app
        .state
        .config
        .upload
        .path
        .join(url.trim_start_matches("/uploads/"));
    assert!(on_disk.is_file());

    let (_, body) = send(&app, get("/api/admin/files?type=logo", Some(&cookie))).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        json_request("POST", "/api/admin/categories", Some(&cookie), json!({ "_id": "c", "classify": "C" })),
    )
    .await;
    let cat_id = body["data"]["id"].as_i64().unwrap();
    let (_, body) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/sites",
            Some(&cookie),
            json!({ "cat_id": cat_id, "name": "S", "href": "https://s.example", "logo": url }),
        ),
    )
    .await;
    let site_id = body["data"]["id"].as_i64().unwrap();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/sites/{site_id}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!on_disk.exists());
}

#[tokio::test]
async fn backup_import_rejects_traversal_before_writing() {
    let app = test_app().await;
    let cookie = login(&app).await;

    let nav = br#"[{"_id": "announcement_config", "type": "announcement_config", "announcements": []},
                   {"_id": "c1", "classify": "Tools", "sites": []}]"#;
    let archive = zip_of(&[("nav.json", nav), ("uploads/files/../../etc/passwd", b"root")]);

    let (status, body) = send(
        &app,
        multipart_request("/api/admin/backup/import", &cookie, "backup.zip", &archive, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("path traversal"));
    assert!(!app.dir.path().join("etc/passwd").exists());

    let (_, body) = send(&app, get("/api/admin/categories", Some(&cookie))).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (status, _) = send(
        &app,
        multipart_request("/api/admin/backup/import", &cookie, "backup.tar", &archive, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backup_export_then_import_restores_the_dataset() {
    let app = test_app().await;
    let cookie = login(&app).await;

    let doc = json!([
        { "type": "announcement_config", "interval": 3000,
          "announcements": [{ "timestamp": "t1", "content": "hello" }] },
        { "_id": "c1", "classify": "Tools", "icon": "i", "sites": [
            { "name": "A", "href": "https://a.example" },
            { "name": "B", "href": "https://b.example" }
        ]}
    ]);
    let (status, body) = send(&app, json_request("POST", "/api/admin/import", Some(&cookie), doc)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sites"], 2);

    let resp = app
        .router
        .clone()
        .oneshot(get("/api/admin/backup/export", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("nav_backup_"));
    let archive = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();

    let (status, _) = send(
        &app,
        json_request("POST", "/api/admin/import", Some(&cookie), json!([{ "_id": "other", "classify": "Other" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        multipart_request("/api/admin/backup/import", &cookie, "nav_backup.zip", &archive, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["categories"], 1);

    let (_, body) = send(&app, get("/api/nav", None)).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[1]["interval"], 3000);
    assert_eq!(data[1]["announcements"][0]["content"], "hello");
    assert_eq!(data[2]["_id"], "c1");
    let names: Vec<_> = data[2]["sites"].as_array().unwrap().iter().map(|s| s["name"].clone()).collect();
    assert_eq!(names, [json!("A"), json!("B")]);
}

#[tokio::test]
async fn change_password_checks_old_password() {
    let app = test_app().await;
    let cookie = login(&app).await;

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/change-password",
            Some(&cookie),
            json!({ "old_password": "wrong1", "new_password": "secret99", "confirm_password": "secret99" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/change-password",
            Some(&cookie),
            json!({ "old_password": "admin", "new_password": "secret99", "confirm_password": "secret99" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/login", None, json!({ "username": "admin", "password": "secret99" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

//! Export a populated store to a backup archive and restore it into an empty one.

use std::fs;
use tempfile::TempDir;

use nav_admin::{
    backup::BackupService,
    db::{open_pool, SqlitePool},
    repository, NavConfig,
};

struct Store {
    _dir: TempDir,
    config: NavConfig,
    pool: SqlitePool,
    backup: BackupService,
}

fn store() -> Store {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = NavConfig::default();
    config.database.path = dir.path().join("admin.db");
    config.upload.path = dir.path().join("uploads");
    config.snapshot.json_path = dir.path().join("nav.json");
    let pool = open_pool(&config.database.path, 2).expect("Failed to open database");
    let backup = BackupService::new(pool.clone(), &config);
    Store {
        _dir: dir,
        config,
        pool,
        backup,
    }
}

/// Categories and sites compared by external id, name, href and order.
fn dataset(pool: &SqlitePool) -> Vec<(String, String, i64, Vec<(String, String, i64)>)> {
    let conn = pool.get().unwrap();
    repository::list_categories(&conn)
        .unwrap()
        .into_iter()
        .map(|c| {
            let sites = repository::list_sites(&conn, c.id)
                .unwrap()
                .into_iter()
                .map(|s| (s.name, s.href, s.sort_no))
                .collect();
            (c.id_str, c.classify, c.sort_no, sites)
        })
        .collect()
}

const MANIFEST: &str = r#"[
    {"type": "announcement_config", "interval": 7000, "announcements": [
        {"timestamp": "2024-01-01 00:00:00", "content": "first"},
        {"timestamp": "2024-01-02 00:00:00", "content": "second"}
    ]},
    {"_id": "dev", "classify": "Development", "icon": "code", "sites": [
        {"name": "Docs", "href": "/uploads/files/handbook.pdf", "desc": "team handbook", "logo": "/uploads/logos/docs.png"},
        {"name": "Tracker", "href": "https://tracker.example"}
    ]},
    {"_id": "ops", "classify": "Operations", "icon": "server", "sites": [
        {"name": "Status", "href": "https://status.example"}
    ]},
    {"_id": "empty", "classify": "Empty", "icon": ""}
]"#;

#[test]
fn round_trip_preserves_dataset_and_files() {
    let source = store();
    source.backup.import_json(MANIFEST.as_bytes()).unwrap();
    fs::create_dir_all(source.config.upload.path.join("logos")).unwrap();
    fs::create_dir_all(source.config.upload.path.join("files")).unwrap();
    fs::write(source.config.upload.path.join("logos/docs.png"), b"png-bytes").unwrap();
    fs::write(source.config.upload.path.join("files/handbook.pdf"), b"%PDF-1.7").unwrap();

    let archive = source.backup.export_archive().unwrap();

    let target = store();
    let report = target.backup.import_archive(archive).unwrap();
    assert_eq!(report.summary.categories, 3);
    assert_eq!(report.summary.sites, 3);
    assert_eq!(report.summary.announcements, 2);
    assert_eq!(report.extraction.written.len(), 2);
    assert!(report.extraction.skipped.is_empty());

    assert_eq!(dataset(&source.pool), dataset(&target.pool));

    let conn = target.pool.get().unwrap();
    assert_eq!(repository::announcement_interval(&conn).unwrap(), 7000);
    let contents: Vec<String> = repository::list_announcements(&conn)
        .unwrap()
        .into_iter()
        .map(|a| a.content)
        .collect();
    assert_eq!(contents, ["first", "second"]);

    assert_eq!(
        fs::read(target.config.upload.path.join("files/handbook.pdf")).unwrap(),
        b"%PDF-1.7"
    );
    assert_eq!(
        fs::read(target.config.upload.path.join("logos/docs.png")).unwrap(),
        b"png-bytes"
    );
}

#[test]
fn plain_json_export_feeds_plain_json_import() {
    let source = store();
    source.backup.import_json(MANIFEST.as_bytes()).unwrap();
    let exported = serde_json::to_vec(&source.backup.export_json().unwrap()).unwrap();

    let target = store();
    target.backup.import_json(&exported).unwrap();
    assert_eq!(dataset(&source.pool), dataset(&target.pool));
}

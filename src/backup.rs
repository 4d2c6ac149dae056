//! Backup archives and plain JSON transfer
//!
//! Import order is fixed: archive entry checks, manifest checks, transactional replace,
//! then file extraction. Only the first three can fail the import.

use serde::Serialize;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

use crate::archive_validator::{list_entries, ArchiveEntry, ArchiveValidator, MANIFEST_ENTRY};
use crate::config::NavConfig;
use crate::db::SqlitePool;
use crate::errors::{NavError, NavResult};
use crate::extractor::{ExtractReport, UploadExtractor};
use crate::importer::{replace_dataset, ImportSummary};
use crate::managed_files::{FILE_DIR, LOGO_DIR};
use crate::manifest::{Manifest, ManifestPolicy, NavEntry};
use crate::snapshot::collect_manifest;

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveImportReport {
    pub summary: ImportSummary,
    pub extraction: ExtractReport,
}

pub struct BackupService {
    pool: SqlitePool,
    validator: ArchiveValidator,
    extractor: UploadExtractor,
    upload_root: PathBuf,
    max_archive_size: u64,
}

impl BackupService {
    pub fn new(pool: SqlitePool, config: &NavConfig) -> Self {
        Self {
            pool,
            validator: ArchiveValidator::from_config(&config.backup),
            extractor: UploadExtractor::new(config.upload.path.clone(), config.backup.max_entry_size),
            upload_root: config.upload.path.clone(),
            max_archive_size: config.backup.max_archive_size,
        }
    }

    pub fn max_archive_size(&self) -> u64 {
        self.max_archive_size
    }

    /// Build a zip with `nav.json` and every managed file the importer would accept back.
    pub fn export_archive(&self) -> NavResult<Vec<u8>> {
        let manifest = {
            let conn = self.pool.get()?;
            collect_manifest(&conn)?
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| NavError::serialization("backup manifest", e))?;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(MANIFEST_ENTRY, options)
            .map_err(|e| NavError::archive("adding nav.json", e))?;
        zip.write_all(&json)
            .map_err(|e| NavError::io("writing nav.json", e))?;

        let mut added = 0usize;
        for dir in [LOGO_DIR, FILE_DIR] {
            for (path, relative) in files_under(&self.upload_root.join(dir)) {
                let name = format!("uploads/{dir}/{relative}");
                let size = match fs::metadata(&path) {
                    Ok(m) => m.len(),
                    Err(e) => {
                        tracing::warn!("Backup skips {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Err(reason) = self.validator.check_upload(&ArchiveEntry::file(&name, size)) {
                    tracing::warn!("Backup skips {}: {}", name, reason);
                    continue;
                }
                let data = match fs::read(&path) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!("Backup skips {}: {}", path.display(), e);
                        continue;
                    }
                };
                zip.start_file(name.as_str(), options)
                    .map_err(|e| NavError::archive(format!("adding {name}"), e))?;
                zip.write_all(&data)
                    .map_err(|e| NavError::io(format!("writing {name}"), e))?;
                added += 1;
            }
        }

        let cursor = zip
            .finish()
            .map_err(|e| NavError::archive("finishing backup archive", e))?;
        tracing::info!("Exported backup with {} upload files", added);
        Ok(cursor.into_inner())
    }

    /// Validate and import a backup archive, then extract its files. Blocking.
    pub fn import_archive(&self, bytes: Vec<u8>) -> NavResult<ArchiveImportReport> {
        if bytes.len() as u64 > self.max_archive_size {
            return Err(NavError::validation(
                "file",
                format!(
                    "archive is larger than the {} MB limit",
                    self.max_archive_size / 1024 / 1024
                ),
            ));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| NavError::validation("file", "not a valid zip archive"))?;

        let entries = list_entries(&mut archive)?;
        self.validator.validate(&entries)?;

        let manifest_bytes = {
            let entry = archive
                .by_name(MANIFEST_ENTRY)
                .map_err(|e| NavError::archive("opening nav.json", e))?;
            let mut buf = Vec::new();
            entry
                .take(self.validator.max_entry_size())
                .read_to_end(&mut buf)
                .map_err(|e| NavError::io("reading nav.json", e))?;
            buf
        };
        let manifest = Manifest::parse(&manifest_bytes, ManifestPolicy::ARCHIVE)?;

        let summary = {
            let mut conn = self.pool.get()?;
            replace_dataset(&mut conn, &manifest)?
        };

        let extraction = self.extractor.extract(&mut archive);
        Ok(ArchiveImportReport {
            summary,
            extraction,
        })
    }

    /// The plain JSON export: announcement config and categories.
    pub fn export_json(&self) -> NavResult<Vec<NavEntry>> {
        let conn = self.pool.get()?;
        collect_manifest(&conn)
    }

    /// Import a plain JSON manifest. Blocking.
    pub fn import_json(&self, bytes: &[u8]) -> NavResult<ImportSummary> {
        let manifest = Manifest::parse(bytes, ManifestPolicy::PLAIN_JSON)?;
        let mut conn = self.pool.get()?;
        replace_dataset(&mut conn, &manifest)
    }
}

/// Regular files below `dir` with their slash-separated path relative to it.
fn files_under(dir: &Path) -> Vec<(PathBuf, String)> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => pending.push(path),
                Ok(t) if t.is_file() => {
                    if let Ok(relative) = path.strip_prefix(dir) {
                        let relative = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        out.push((path.clone(), relative));
                    }
                }
                _ => {}
            }
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_pool;
    use crate::repository;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: NavConfig,
        service: BackupService,
        pool: SqlitePool,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NavConfig::default();
        config.database.path = dir.path().join("admin.db");
        config.upload.path = dir.path().join("uploads");
        let pool = open_pool(&config.database.path, 2).unwrap();
        let service = BackupService::new(pool.clone(), &config);
        Fixture {
            _dir: dir,
            config,
            service,
            pool,
        }
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const NAV: &[u8] = br#"[
        {"_id": "announcement_config", "type": "announcement_config", "interval": 4000,
         "announcements": [{"timestamp": "t", "content": "hello"}]},
        {"_id": "docs", "classify": "Docs", "icon": "book", "sites": [
            {"name": "Guide", "href": "/uploads/files/guide.pdf", "desc": "", "logo": "/uploads/logos/g.png"}
        ]}
    ]"#;

    #[test]
    fn imports_archive_and_extracts_files() {
        let fx = fixture();
        let archive = zip_of(&[
            ("nav.json", NAV),
            ("uploads/files/guide.pdf", b"%PDF"),
            ("uploads/logos/g.png", b"png"),
        ]);

        let report = fx.service.import_archive(archive).unwrap();
        assert_eq!(report.summary.categories, 1);
        assert_eq!(report.extraction.written.len(), 2);
        assert!(fx.config.upload.path.join("files/guide.pdf").is_file());

        let conn = fx.pool.get().unwrap();
        assert_eq!(repository::announcement_interval(&conn).unwrap(), 4000);
    }

    #[test]
    fn traversal_is_rejected_before_anything_is_written() {
        let fx = fixture();
        let archive = zip_of(&[("nav.json", NAV), ("uploads/files/../../etc/passwd", b"x")]);

        let err = fx.service.import_archive(archive).unwrap_err();
        assert!(matches!(err, NavError::ArchiveRejected(_)));
        assert!(!fx.config.upload.path.join("files").exists());
        let conn = fx.pool.get().unwrap();
        assert!(repository::list_categories(&conn).unwrap().is_empty());
    }

    #[test]
    fn bad_manifest_keeps_existing_data() {
        let fx = fixture();
        fx.service
            .import_json(br#"[{"_id": "keep", "classify": "Keep"}]"#)
            .unwrap();

        let archive = zip_of(&[("nav.json", br#"[{"type": "announcement_config"}]"#)]);
        let err = fx.service.import_archive(archive).unwrap_err();
        assert!(matches!(err, NavError::Manifest(_)));

        let conn = fx.pool.get().unwrap();
        let categories = repository::list_categories(&conn).unwrap();
        assert_eq!(categories[0].id_str, "keep");
    }

    #[test]
    fn garbage_and_oversized_uploads_are_client_errors() {
        let fx = fixture();
        assert!(matches!(
            fx.service.import_archive(b"not a zip".to_vec()),
            Err(NavError::Validation { .. })
        ));
        let too_big = vec![0u8; fx.service.max_archive_size() as usize + 1];
        assert!(matches!(
            fx.service.import_archive(too_big),
            Err(NavError::Validation { .. })
        ));
    }

    #[test]
    fn export_contains_manifest_and_acceptable_files_only() {
        let fx = fixture();
        fx.service.import_json(NAV).unwrap();
        let files = fx.config.upload.path.join("files");
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("guide.pdf"), b"%PDF").unwrap();
        fs::write(files.join("script.sh"), b"#!").unwrap();
        fs::write(files.join("bad name.pdf"), b"x").unwrap();

        let bytes = fx.service.export_archive().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"nav.json".to_string()));
        assert!(names.contains(&"uploads/files/guide.pdf".to_string()));
        assert_eq!(names.len(), 2);

        let entries = list_entries(&mut archive).unwrap();
        assert!(fx.service.validator.validate(&entries).is_ok());
    }
}

//! Best-effort materialisation of `uploads/...` archive entries after an import commits
//!
//! Every destination is re-checked against the upload root here; the archive validator
//! having passed is not taken as proof. Per-entry failures are logged and skipped.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use crate::archive_validator::UPLOADS_ROOT;
use crate::managed_files::{FILE_DIR, LOGO_DIR};
use crate::paths::is_within;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub written: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct UploadExtractor {
    upload_root: PathBuf,
    max_entry_size: u64,
}

impl UploadExtractor {
    pub fn new(upload_root: impl Into<PathBuf>, max_entry_size: u64) -> Self {
        Self {
            upload_root: upload_root.into(),
            max_entry_size,
        }
    }

    /// Destination on disk for an archive entry, or `None` if it would leave the upload root.
    pub fn destination_for(&self, entry_name: &str) -> Option<PathBuf> {
        let relative = entry_name.strip_prefix(UPLOADS_ROOT)?;
        if relative.is_empty() {
            return None;
        }
        let destination = self.upload_root.join(relative);
        match is_within(&self.upload_root, &destination) {
            Ok(true) if destination != self.upload_root => Some(destination),
            _ => None,
        }
    }

    /// Copy every uploads entry of the archive into the upload root. Never fails as a whole.
    pub fn extract<R: Read + Seek>(&self, archive: &mut zip::ZipArchive<R>) -> ExtractReport {
        let mut report = ExtractReport::default();

        for dir in [LOGO_DIR, FILE_DIR] {
            let path = self.upload_root.join(dir);
            if let Err(e) = fs::create_dir_all(&path) {
                tracing::warn!("Cannot create {}: {}", path.display(), e);
            }
        }

        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable archive entry #{}: {}", index, e);
                    report.skipped.push(SkippedEntry {
                        name: format!("#{index}"),
                        reason: "unreadable entry".to_string(),
                    });
                    continue;
                }
            };
            let name = entry.name().to_string();
            if !name.starts_with(UPLOADS_ROOT) || entry.is_dir() {
                continue;
            }

            let skip = |report: &mut ExtractReport, reason: String| {
                tracing::warn!("Skipping upload entry {}: {}", name, reason);
                report.skipped.push(SkippedEntry {
                    name: name.clone(),
                    reason,
                });
            };

            let Some(destination) = self.destination_for(&name) else {
                skip(&mut report, "destination outside the upload root".to_string());
                continue;
            };

            match self.copy_entry(&mut entry, &destination) {
                Ok(()) => report.written.push(name.clone()),
                Err(e) => skip(&mut report, e.to_string()),
            }
        }

        if !report.skipped.is_empty() {
            tracing::warn!(
                "Upload extraction incomplete: {} written, {} skipped",
                report.written.len(),
                report.skipped.len()
            );
        } else {
            tracing::info!("Extracted {} upload files", report.written.len());
        }
        report
    }

    /// Copy at most `max_entry_size` bytes; anything longer or any copy error removes the file.
    fn copy_entry(&self, entry: &mut impl Read, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(destination)?;

        let mut limited = entry.take(self.max_entry_size.saturating_add(1));
        let result = io::copy(&mut limited, &mut out).and_then(|copied| {
            if copied > self.max_entry_size {
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry exceeds {} bytes", self.max_entry_size),
                ))
            } else {
                Ok(())
            }
        });
        drop(out);

        if let Err(e) = result {
            if let Err(remove_err) = fs::remove_file(destination) {
                tracing::warn!(
                    "Could not remove partial file {}: {}",
                    destination.display(),
                    remove_err
                );
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &[u8])]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        let cursor = writer.finish().unwrap();
        zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn writes_upload_entries_and_ignores_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UploadExtractor::new(dir.path(), 1024);
        let mut zip = archive(&[
            ("nav.json", b"[]"),
            ("uploads/logos/", b""),
            ("uploads/logos/a.png", b"png"),
            ("uploads/files/b.pdf", b"pdf"),
        ]);

        let report = extractor.extract(&mut zip);
        assert_eq!(report.written, ["uploads/logos/a.png", "uploads/files/b.pdf"]);
        assert!(report.skipped.is_empty());
        assert_eq!(fs::read(dir.path().join("logos/a.png")).unwrap(), b"png");
        assert!(!dir.path().join("nav.json").exists());
    }

    #[test]
    fn oversized_entries_are_removed_and_do_not_stop_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UploadExtractor::new(dir.path(), 4);
        let mut zip = archive(&[
            ("uploads/files/big.pdf", b"0123456789"),
            ("uploads/files/ok.pdf", b"1234"),
        ]);

        let report = extractor.extract(&mut zip);
        assert_eq!(report.written, ["uploads/files/ok.pdf"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(!dir.path().join("files/big.pdf").exists());
        assert!(dir.path().join("files/ok.pdf").exists());
    }

    #[test]
    fn unbounded_entry_limit_copies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UploadExtractor::new(dir.path(), u64::MAX);
        let mut zip = archive(&[("uploads/files/ok.pdf", b"%PDF-1.7")]);

        let report = extractor.extract(&mut zip);
        assert_eq!(report.written, ["uploads/files/ok.pdf"]);
        assert_eq!(fs::read(dir.path().join("files/ok.pdf")).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn destinations_are_contained() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UploadExtractor::new(dir.path(), 4);
        assert!(extractor.destination_for("uploads/logos/a.png").is_some());
        assert!(extractor.destination_for("uploads/../../etc/passwd").is_none());
        assert!(extractor.destination_for("uploads/").is_none());
        assert!(extractor.destination_for("nav.json").is_none());
    }

    #[test]
    fn creates_managed_directories_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UploadExtractor::new(dir.path().join("uploads"), 4);
        let mut zip = archive(&[("nav.json", b"[]")]);
        let report = extractor.extract(&mut zip);
        assert!(report.written.is_empty());
        assert!(dir.path().join("uploads/logos").is_dir());
        assert!(dir.path().join("uploads/files").is_dir());
    }
}

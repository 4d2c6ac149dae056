//! Files under the upload root that sites reference through `/uploads/...` URLs
//!
//! Covers direct single-file uploads, listing, explicit deletion and the best-effort
//! release of files a site no longer points at.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive_validator::is_safe_file_name;
use crate::config::NavConfig;
use crate::errors::{NavError, NavResult};
use crate::paths::{extension_of, is_within};

/// Public URL prefix under which the upload root is served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";
const RELATIVE_UPLOADS_PREFIX: &str = "./uploads/";

pub const LOGO_DIR: &str = "logos";
pub const FILE_DIR: &str = "files";

pub const LOGO_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "ico"];
pub const DOCUMENT_EXTENSIONS: [&str; 11] = [
    "txt", "pdf", "ppt", "pptx", "xls", "xlsx", "doc", "docx", "rar", "zip", "7z",
];

/// What a direct upload is for; decides the allow-list and the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Logo,
    Document,
    File,
}

impl UploadKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "logo" => Self::Logo,
            "document" => Self::Document,
            _ => Self::File,
        }
    }

    pub fn dir(self) -> &'static str {
        match self {
            Self::Logo => LOGO_DIR,
            Self::Document | Self::File => FILE_DIR,
        }
    }
}

/// Which managed directories a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileListing {
    Logos,
    Files,
    All,
}

impl FileListing {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "logo" => Self::Logos,
            "file" => Self::Files,
            _ => Self::All,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub filename: String,
    pub name: String,
    pub size: u64,
    pub url: String,
    pub path: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedFileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "modTime")]
    pub mod_time: String,
    pub uploaded_at: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ManagedFiles {
    root: PathBuf,
    max_upload_size: u64,
    file_extensions: HashSet<String>,
}

impl ManagedFiles {
    pub fn new<I, S>(root: impl Into<PathBuf>, max_upload_size: u64, file_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: root.into(),
            max_upload_size,
            file_extensions: file_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self::new(
            config.upload.path.clone(),
            config.upload.max_size,
            &config.backup.allowed_extensions,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// Whether an href or logo value points into the upload tree.
    pub fn is_managed(reference: &str) -> bool {
        reference.starts_with(UPLOADS_URL_PREFIX) || reference.starts_with(RELATIVE_UPLOADS_PREFIX)
    }

    /// Map a managed reference to its location on disk, refusing anything outside the root.
    pub fn resolve(&self, reference: &str) -> NavResult<PathBuf> {
        let relative = reference
            .strip_prefix(UPLOADS_URL_PREFIX)
            .or_else(|| reference.strip_prefix(RELATIVE_UPLOADS_PREFIX))
            .ok_or_else(|| NavError::validation("path", "not an uploaded file"))?;

        if relative.is_empty() || relative.contains("..") || relative.contains('\\') {
            return Err(NavError::validation("path", "invalid file path"));
        }

        let candidate = self.root.join(relative);
        let inside = is_within(&self.root, &candidate)
            .map_err(|e| NavError::io("resolving upload path", e))?;
        if !inside || candidate == self.root {
            return Err(NavError::validation("path", "invalid file path"));
        }
        Ok(candidate)
    }

    /// Delete the files behind managed references. Failures are logged and skipped.
    pub fn release<S: AsRef<str>>(&self, references: &[S]) {
        for reference in references {
            let reference = reference.as_ref();
            if !Self::is_managed(reference) {
                continue;
            }
            let path = match self.resolve(reference) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Not releasing '{}': {}", reference, e);
                    continue;
                }
            };
            match fs::remove_file(&path) {
                Ok(()) => tracing::info!("Released managed file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to release {}: {}", path.display(), e),
            }
        }
    }

    fn allows(&self, kind: UploadKind, extension: &str) -> bool {
        match kind {
            UploadKind::Logo => LOGO_EXTENSIONS.contains(&extension),
            UploadKind::Document => DOCUMENT_EXTENSIONS.contains(&extension),
            UploadKind::File => self.file_extensions.contains(extension),
        }
    }

    /// Store a direct upload under a generated name and return its public URL.
    pub fn save_upload(
        &self,
        kind: UploadKind,
        original_name: &str,
        data: &[u8],
    ) -> NavResult<StoredUpload> {
        let size = data.len() as u64;
        if size > self.max_upload_size {
            return Err(NavError::validation(
                "file",
                format!(
                    "file is larger than the {} MB limit",
                    self.max_upload_size / 1024 / 1024
                ),
            ));
        }

        let extension = extension_of(original_name).unwrap_or_default();
        if !self.allows(kind, &extension) {
            let message = match kind {
                UploadKind::Logo => format!("logos must be one of: {}", LOGO_EXTENSIONS.join(", ")),
                UploadKind::Document => {
                    format!("documents must be one of: {}", DOCUMENT_EXTENSIONS.join(", "))
                }
                UploadKind::File => "unsupported file type".to_string(),
            };
            return Err(NavError::validation("file", message));
        }

        let name = generated_name(&extension);
        let dir = self.root.join(kind.dir());
        fs::create_dir_all(&dir).map_err(|e| NavError::io("creating upload directory", e))?;
        fs::write(dir.join(&name), data).map_err(|e| NavError::io("saving upload", e))?;

        let url = format!("{UPLOADS_URL_PREFIX}{}/{name}", kind.dir());
        tracing::info!("Stored upload '{}' as {}", original_name, url);

        Ok(StoredUpload {
            filename: original_name.to_string(),
            name,
            size,
            url: url.clone(),
            path: url,
            original_name: original_name.to_string(),
        })
    }

    pub fn list(&self, listing: FileListing) -> Vec<ManagedFileInfo> {
        let dirs: &[&str] = match listing {
            FileListing::Logos => &[LOGO_DIR],
            FileListing::Files => &[FILE_DIR],
            FileListing::All => &[LOGO_DIR, FILE_DIR],
        };

        let mut out = Vec::new();
        for dir in dirs {
            let entries = match fs::read_dir(self.root.join(dir)) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let metadata = match entry.metadata() {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                let modified = metadata
                    .modified()
                    .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                let url = format!("{UPLOADS_URL_PREFIX}{dir}/{name}");
                out.push(ManagedFileInfo {
                    name,
                    size: metadata.len(),
                    mod_time: modified.clone(),
                    uploaded_at: modified,
                    path: url.clone(),
                    url,
                });
            }
        }
        out
    }

    /// Delete a file given its public `/uploads/...` path.
    pub fn delete_by_path(&self, reference: &str) -> NavResult<()> {
        if !reference.starts_with(UPLOADS_URL_PREFIX) {
            return Err(NavError::validation("path", "invalid file path"));
        }
        let path = self.resolve(reference)?;
        remove_existing(&path, reference)
    }

    /// Delete a file by bare name, looking in `files/` first and then `logos/`.
    pub fn delete_by_filename(&self, name: &str) -> NavResult<()> {
        if !is_safe_file_name(name) {
            return Err(NavError::validation("filename", "invalid file name"));
        }
        let in_files = self.root.join(FILE_DIR).join(name);
        let path = if in_files.is_file() {
            in_files
        } else {
            self.root.join(LOGO_DIR).join(name)
        };
        remove_existing(&path, name)
    }
}

fn remove_existing(path: &Path, label: &str) -> NavResult<()> {
    if !path.is_file() {
        return Err(NavError::not_found("file", label));
    }
    fs::remove_file(path).map_err(|e| NavError::io("deleting upload", e))?;
    tracing::info!("Deleted upload {}", path.display());
    Ok(())
}

fn generated_name(extension: &str) -> String {
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}.{extension}", &random[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BACKUP_EXTENSIONS;

    fn files(root: &Path) -> ManagedFiles {
        ManagedFiles::new(root, 1024, BACKUP_EXTENSIONS)
    }

    #[test]
    fn recognises_managed_references() {
        assert!(ManagedFiles::is_managed("/uploads/logos/a.png"));
        assert!(ManagedFiles::is_managed("./uploads/files/a.pdf"));
        assert!(!ManagedFiles::is_managed("https://example.com/uploads/a.png"));
    }

    #[test]
    fn resolve_refuses_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let managed = files(dir.path());
        assert!(managed.resolve("/uploads/logos/a.png").is_ok());
        assert!(managed.resolve("/uploads/../secret").is_err());
        assert!(managed.resolve("/uploads/").is_err());
        assert!(managed.resolve("https://x/a.png").is_err());
    }

    #[test]
    fn save_upload_checks_kind_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let managed = files(dir.path());

        let stored = managed.save_upload(UploadKind::Logo, "Icon.PNG", b"png").unwrap();
        assert!(stored.url.starts_with("/uploads/logos/"));
        assert!(stored.name.ends_with(".png"));
        assert!(is_safe_file_name(&stored.name));
        assert!(dir.path().join("logos").join(&stored.name).is_file());

        assert!(managed.save_upload(UploadKind::Logo, "doc.pdf", b"x").is_err());
        assert!(managed.save_upload(UploadKind::Document, "icon.png", b"x").is_err());
        assert!(managed.save_upload(UploadKind::File, "run.sh", b"x").is_err());
        assert!(managed
            .save_upload(UploadKind::Document, "big.pdf", &vec![0u8; 2048])
            .is_err());

        let doc = managed.save_upload(UploadKind::Document, "notes.txt", b"hi").unwrap();
        assert!(doc.url.starts_with("/uploads/files/"));
    }

    #[test]
    fn release_deletes_only_managed_files() {
        let dir = tempfile::tempdir().unwrap();
        let managed = files(dir.path());
        fs::create_dir_all(dir.path().join("files")).unwrap();
        fs::write(dir.path().join("files/a.pdf"), b"a").unwrap();
        let outside = dir.path().join("keep.txt");
        fs::write(&outside, b"keep").unwrap();

        managed.release(&[
            "/uploads/files/a.pdf",
            "/uploads/files/missing.pdf",
            "/uploads/../keep.txt",
            "https://example.com",
        ]);

        assert!(!dir.path().join("files/a.pdf").exists());
        assert!(outside.exists());
    }

    #[test]
    fn list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let managed = files(dir.path());
        let logo = managed.save_upload(UploadKind::Logo, "a.png", b"1").unwrap();
        let doc = managed.save_upload(UploadKind::Document, "b.pdf", b"22").unwrap();

        assert_eq!(managed.list(FileListing::All).len(), 2);
        assert_eq!(managed.list(FileListing::Logos).len(), 1);
        assert_eq!(managed.list(FileListing::Files)[0].size, 2);

        managed.delete_by_path(&logo.path).unwrap();
        managed.delete_by_filename(&doc.name).unwrap();
        assert!(managed.list(FileListing::All).is_empty());

        assert!(matches!(
            managed.delete_by_filename(&doc.name),
            Err(NavError::NotFound { .. })
        ));
        assert!(managed.delete_by_filename("../x.pdf").is_err());
        assert!(managed.delete_by_path("/etc/passwd").is_err());
    }
}

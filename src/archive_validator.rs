//! Path and content validation for backup archives
//!
//! Runs over the entry list of an uploaded archive before anything touches the
//! database or the upload tree. The first offending entry rejects the whole archive.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::io::{Read, Seek};
use thiserror::Error;

use crate::config::BackupConfig;
use crate::errors::{NavError, NavResult};
use crate::paths::{base_name, clean_archive_name, extension_of, is_absolute_name};

/// Name of the mandatory manifest entry at the archive root.
pub const MANIFEST_ENTRY: &str = "nav.json";
/// Prefix of every archive entry that carries an uploaded file.
pub const UPLOADS_ROOT: &str = "uploads/";
/// The only subdirectories of the uploads root an archive may populate.
pub const ALLOWED_UPLOAD_PREFIXES: [&str; 2] = ["uploads/logos/", "uploads/files/"];

lazy_static! {
    static ref SAFE_FILE_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_.\-]+$").unwrap();
}

/// Whether a bare file name only uses letters, digits, underscore, hyphen and dot.
pub fn is_safe_file_name(name: &str) -> bool {
    SAFE_FILE_NAME.is_match(name)
}

/// One entry of an archive as seen by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
        }
    }
}

/// Why an archive was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveRejection {
    #[error("path traversal detected in entry '{0}'")]
    PathTraversal(String),
    #[error("{MANIFEST_ENTRY} is larger than {limit} bytes")]
    ManifestTooLarge { limit: u64 },
    #[error("entry '{0}' is outside uploads/logos/ and uploads/files/")]
    ForbiddenUploadPath(String),
    #[error("file type '{extension}' is not allowed (entry '{name}')")]
    DisallowedExtension { name: String, extension: String },
    #[error("entry '{name}' is larger than {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },
    #[error("illegal file name '{0}'")]
    IllegalFileName(String),
    #[error("unexpected entry '{0}'")]
    UnexpectedEntry(String),
    #[error("archive does not contain {MANIFEST_ENTRY}")]
    MissingManifest,
}

/// Validates archive entry lists against the configured allow-list and size limit.
#[derive(Debug, Clone)]
pub struct ArchiveValidator {
    allowed_extensions: HashSet<String>,
    max_entry_size: u64,
}

impl ArchiveValidator {
    pub fn new<I, S>(allowed_extensions: I, max_entry_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            allowed_extensions,
            max_entry_size,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(&config.allowed_extensions, config.max_entry_size)
    }

    pub fn max_entry_size(&self) -> u64 {
        self.max_entry_size
    }

    /// Accept the archive only if every entry passes and the manifest is present.
    pub fn validate(&self, entries: &[ArchiveEntry]) -> Result<(), ArchiveRejection> {
        let mut has_manifest = false;

        for entry in entries {
            reject_traversal(&entry.name)?;

            if entry.is_dir {
                continue;
            }

            if entry.name == MANIFEST_ENTRY {
                if entry.size > self.max_entry_size {
                    return Err(ArchiveRejection::ManifestTooLarge {
                        limit: self.max_entry_size,
                    });
                }
                has_manifest = true;
                continue;
            }

            if entry.name.starts_with(UPLOADS_ROOT) {
                self.check_upload_entry(entry)?;
                continue;
            }

            return Err(ArchiveRejection::UnexpectedEntry(entry.name.clone()));
        }

        if !has_manifest {
            return Err(ArchiveRejection::MissingManifest);
        }
        Ok(())
    }

    /// Checks applied to a single `uploads/...` file entry.
    pub fn check_upload(&self, entry: &ArchiveEntry) -> Result<(), ArchiveRejection> {
        reject_traversal(&entry.name)?;
        self.check_upload_entry(entry)
    }

    fn check_upload_entry(&self, entry: &ArchiveEntry) -> Result<(), ArchiveRejection> {
        let name = &entry.name;

        if !ALLOWED_UPLOAD_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
        {
            return Err(ArchiveRejection::ForbiddenUploadPath(name.clone()));
        }

        let extension = extension_of(name).unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(ArchiveRejection::DisallowedExtension {
                name: name.clone(),
                extension,
            });
        }

        if entry.size > self.max_entry_size {
            return Err(ArchiveRejection::EntryTooLarge {
                name: name.clone(),
                limit: self.max_entry_size,
            });
        }

        let file_name = base_name(name);
        if !is_safe_file_name(file_name) {
            return Err(ArchiveRejection::IllegalFileName(file_name.to_string()));
        }

        Ok(())
    }
}

fn reject_traversal(name: &str) -> Result<(), ArchiveRejection> {
    if name.contains("..") {
        return Err(ArchiveRejection::PathTraversal(name.to_string()));
    }
    let cleaned = clean_archive_name(name);
    if cleaned.starts_with("..") || is_absolute_name(&cleaned) || is_absolute_name(name) {
        return Err(ArchiveRejection::PathTraversal(name.to_string()));
    }
    Ok(())
}

/// Enumerate entry names, sizes and kinds without decompressing anything.
pub fn list_entries<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> NavResult<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| NavError::archive("reading archive entry", e))?;
        entries.push(ArchiveEntry {
            name: file.name().to_string(),
            size: file.size(),
            is_dir: file.is_dir(),
        });
    }
    Ok(entries)
}

//! The nav data wire format
//!
//! The same JSON array shape is used for the public snapshot, the `nav.json` entry of a
//! backup archive and the plain JSON export. Output goes through the typed entries below;
//! input is decoded loosely and checked record by record before anything is stored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::{NavError, NavResult};
use crate::managed_files::UPLOADS_URL_PREFIX;

pub const PAGE_CONFIG_TYPE: &str = "page_config";
pub const ANNOUNCEMENT_CONFIG_TYPE: &str = "announcement_config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfigEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub subtitle: String,
    pub logo: String,
    pub footer_text: String,
    pub icp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementConfigEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub interval: i64,
    pub announcements: Vec<AnnouncementEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementEntry {
    pub id: i64,
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub classify: String,
    pub icon: String,
    pub sites: Vec<SiteEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteEntry {
    pub name: String,
    pub href: String,
    pub desc: String,
    pub logo: String,
}

/// One element of a serialized nav document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NavEntry {
    Page(PageConfigEntry),
    Announcements(AnnouncementConfigEntry),
    Category(CategoryEntry),
}

/// Field-level reasons a decoded manifest is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("nav data is empty")]
    Empty,
    #[error("record {index}: announcement config is missing the _id field")]
    AnnouncementConfigMissingId { index: usize },
    #[error("record {index}: category is missing the _id field")]
    CategoryMissingId { index: usize },
    #[error("record {index}: category is missing the classify field")]
    CategoryMissingName { index: usize },
    #[error("record {index}: site {site} is not an object")]
    SiteNotObject { index: usize, site: usize },
    #[error("record {index}: site {site} is missing the name field")]
    SiteMissingName { index: usize, site: usize },
    #[error("record {index}: site {site} is missing the href field")]
    SiteMissingHref { index: usize, site: usize },
    #[error("record {index}: site {site} has an illegal logo path")]
    LogoTraversal { index: usize, site: usize },
    #[error("record {index}: site {site} has an illegal href path")]
    HrefTraversal { index: usize, site: usize },
}

/// Which optional fields a source of nav data must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestPolicy {
    pub announcement_config_requires_id: bool,
}

impl ManifestPolicy {
    /// `nav.json` inside a backup archive.
    pub const ARCHIVE: Self = Self {
        announcement_config_requires_id: true,
    };
    /// A JSON array posted or read from a plain export file.
    pub const PLAIN_JSON: Self = Self {
        announcement_config_requires_id: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAnnouncement {
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSite {
    pub name: String,
    pub href: String,
    pub desc: String,
    pub logo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedCategory {
    pub id_str: String,
    pub classify: String,
    pub icon: String,
    pub sites: Vec<ImportedSite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    AnnouncementConfig {
        interval: Option<i64>,
        announcements: Vec<ImportedAnnouncement>,
    },
    Category(ImportedCategory),
}

/// A manifest that passed validation, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Decode raw JSON bytes and validate them.
    pub fn parse(bytes: &[u8], policy: ManifestPolicy) -> NavResult<Self> {
        let records: Vec<Map<String, Value>> = serde_json::from_slice(bytes)
            .map_err(|e| NavError::serialization("nav data", e))?;
        Ok(Self::from_records(records, policy)?)
    }

    /// Validate already-decoded records. Nothing is returned unless every record passes.
    pub fn from_records(
        records: Vec<Map<String, Value>>,
        policy: ManifestPolicy,
    ) -> Result<Self, ManifestError> {
        if records.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut entries = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let entry = if is_announcement_config(record) {
                announcement_config(index, record, policy)?
            } else {
                ManifestEntry::Category(category(index, record)?)
            };
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn categories(&self) -> impl Iterator<Item = &ImportedCategory> {
        self.entries.iter().filter_map(|entry| match entry {
            ManifestEntry::Category(category) => Some(category),
            ManifestEntry::AnnouncementConfig { .. } => None,
        })
    }
}

fn is_announcement_config(record: &Map<String, Value>) -> bool {
    str_field(record, "type") == Some(ANNOUNCEMENT_CONFIG_TYPE)
}

fn str_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn owned_or_empty(record: &Map<String, Value>, key: &str) -> String {
    str_field(record, key).unwrap_or_default().to_string()
}

fn announcement_config(
    index: usize,
    record: &Map<String, Value>,
    policy: ManifestPolicy,
) -> Result<ManifestEntry, ManifestError> {
    if policy.announcement_config_requires_id && str_field(record, "_id").is_none() {
        return Err(ManifestError::AnnouncementConfigMissingId { index });
    }

    // JSON numbers arrive as floats when the exporter was not us; truncate like an integer cast.
    let interval = record
        .get("interval")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

    let announcements = record
        .get("announcements")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| ImportedAnnouncement {
                    timestamp: owned_or_empty(item, "timestamp"),
                    content: owned_or_empty(item, "content"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ManifestEntry::AnnouncementConfig {
        interval,
        announcements,
    })
}

fn category(index: usize, record: &Map<String, Value>) -> Result<ImportedCategory, ManifestError> {
    let id_str = str_field(record, "_id").ok_or(ManifestError::CategoryMissingId { index })?;
    let classify =
        str_field(record, "classify").ok_or(ManifestError::CategoryMissingName { index })?;

    let mut sites = Vec::new();
    if let Some(items) = record.get("sites").and_then(Value::as_array) {
        for (position, item) in items.iter().enumerate() {
            sites.push(site(index, position + 1, item)?);
        }
    }

    Ok(ImportedCategory {
        id_str: id_str.to_string(),
        classify: classify.to_string(),
        icon: owned_or_empty(record, "icon"),
        sites,
    })
}

fn site(index: usize, site: usize, item: &Value) -> Result<ImportedSite, ManifestError> {
    let record = item
        .as_object()
        .ok_or(ManifestError::SiteNotObject { index, site })?;
    let name = str_field(record, "name").ok_or(ManifestError::SiteMissingName { index, site })?;
    let href = str_field(record, "href").ok_or(ManifestError::SiteMissingHref { index, site })?;

    let logo = owned_or_empty(record, "logo");
    if logo.contains("..") {
        return Err(ManifestError::LogoTraversal { index, site });
    }
    if href.starts_with(UPLOADS_URL_PREFIX) && href.contains("..") {
        return Err(ManifestError::HrefTraversal { index, site });
    }

    Ok(ImportedSite {
        name: name.to_string(),
        href: href.to_string(),
        desc: owned_or_empty(record, "desc"),
        logo,
    })
}

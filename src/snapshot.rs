//! The `nav.json` snapshot read by the static front end
//!
//! Regeneration requests go through a single worker fed by a one-slot channel: while a
//! run is pending further requests are folded into it, so at most one regeneration is
//! queued at any time. The file is written beside the target and renamed over it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::{NavQuery, SqlitePool, DEFAULT_INTERVAL};
use crate::errors::{NavError, NavResult};
use crate::manifest::{
    AnnouncementConfigEntry, AnnouncementEntry, CategoryEntry, NavEntry, PageConfigEntry,
    SiteEntry, ANNOUNCEMENT_CONFIG_TYPE, PAGE_CONFIG_TYPE,
};
use crate::models::PageConfig;
use crate::repository;

fn page_entry(config: PageConfig) -> PageConfigEntry {
    PageConfigEntry {
        kind: PAGE_CONFIG_TYPE.to_string(),
        title: config.title,
        subtitle: config.subtitle,
        logo: config.logo,
        footer_text: config.footer_text,
        icp: config.icp,
    }
}

fn announcement_entry(interval: i64, announcements: Vec<AnnouncementEntry>) -> AnnouncementConfigEntry {
    AnnouncementConfigEntry {
        id: ANNOUNCEMENT_CONFIG_TYPE.to_string(),
        kind: ANNOUNCEMENT_CONFIG_TYPE.to_string(),
        interval,
        announcements,
    }
}

/// Announcement config with its announcements, failing on any storage error.
pub fn announcement_config<Q: NavQuery>(q: &Q) -> NavResult<AnnouncementConfigEntry> {
    let interval = repository::announcement_interval(q)?;
    let announcements = repository::list_announcements(q)?
        .into_iter()
        .map(|a| AnnouncementEntry {
            id: a.id,
            timestamp: a.timestamp,
            content: a.content,
        })
        .collect();
    Ok(announcement_entry(interval, announcements))
}

/// Every category with its sites in display order, failing on any storage error.
pub fn categories<Q: NavQuery>(q: &Q) -> NavResult<Vec<CategoryEntry>> {
    repository::list_categories(q)?
        .into_iter()
        .map(|category| -> NavResult<CategoryEntry> {
            let sites = repository::list_sites(q, category.id)?
                .into_iter()
                .map(|s| SiteEntry {
                    name: s.name,
                    href: s.href,
                    desc: s.desc,
                    logo: s.logo,
                })
                .collect();
            Ok(CategoryEntry {
                id: category.id_str,
                classify: category.classify,
                icon: category.icon,
                sites,
            })
        })
        .collect()
}

/// The exportable manifest: announcement config followed by categories, no page config.
pub fn collect_manifest<Q: NavQuery>(q: &Q) -> NavResult<Vec<NavEntry>> {
    let mut entries = vec![NavEntry::Announcements(announcement_config(q)?)];
    entries.extend(categories(q)?.into_iter().map(NavEntry::Category));
    Ok(entries)
}

/// The full live document (page config first), failing on any storage error.
pub fn collect_nav<Q: NavQuery>(q: &Q) -> NavResult<Vec<NavEntry>> {
    let page = repository::page_config(q)?.unwrap_or_default();
    let mut entries = vec![NavEntry::Page(page_entry(page))];
    entries.extend(collect_manifest(q)?);
    Ok(entries)
}

/// The snapshot document. Section failures fall back to defaults or are left out.
pub fn collect_snapshot<Q: NavQuery>(q: &Q) -> Vec<NavEntry> {
    let page = match repository::page_config(q) {
        Ok(Some(page)) => page,
        Ok(None) => PageConfig::default(),
        Err(e) => {
            tracing::warn!("Snapshot uses default page config: {}", e);
            PageConfig::default()
        }
    };

    let announcements = announcement_config(q).unwrap_or_else(|e| {
        tracing::warn!("Snapshot uses default announcement config: {}", e);
        announcement_entry(DEFAULT_INTERVAL, Vec::new())
    });

    let mut entries = vec![
        NavEntry::Page(page_entry(page)),
        NavEntry::Announcements(announcements),
    ];

    match repository::list_categories(q) {
        Ok(list) => {
            for category in list {
                let sites = repository::list_sites(q, category.id).unwrap_or_else(|e| {
                    tracing::warn!("Snapshot omits sites of category {}: {}", category.id, e);
                    Vec::new()
                });
                entries.push(NavEntry::Category(CategoryEntry {
                    id: category.id_str,
                    classify: category.classify,
                    icon: category.icon,
                    sites: sites
                        .into_iter()
                        .map(|s| SiteEntry {
                            name: s.name,
                            href: s.href,
                            desc: s.desc,
                            logo: s.logo,
                        })
                        .collect(),
                }));
            }
        }
        Err(e) => tracing::warn!("Snapshot omits categories: {}", e),
    }

    entries
}

/// Write `bytes` to `path` through a sibling temporary file and a rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> NavResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| NavError::io(format!("creating {}", parent.display()), e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|e| NavError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path).map_err(|e| NavError::io(format!("replacing {}", path.display()), e))
}

pub struct SnapshotGenerator {
    pool: SqlitePool,
    output: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotGenerator {
    pub fn new(pool: SqlitePool, output: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            output: output.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Re-read the dataset and replace the snapshot file. Blocking.
    pub fn regenerate(&self) -> NavResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| NavError::internal("snapshot lock poisoned"))?;

        let conn = self.pool.get()?;
        let entries = collect_snapshot(&conn);
        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| NavError::serialization("snapshot", e))?;
        write_atomically(&self.output, &json)?;

        tracing::info!("Snapshot written to {}", self.output.display());
        Ok(())
    }
}

/// Handle used by request handlers to ask for a regeneration without waiting for it.
#[derive(Debug, Clone)]
pub struct SnapshotTrigger {
    tx: mpsc::Sender<()>,
}

impl SnapshotTrigger {
    pub fn request(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("Snapshot regeneration already pending");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("Snapshot worker is gone; regeneration request dropped");
            }
        }
    }
}

/// Start the single regeneration worker. It stops once every trigger is dropped.
pub fn spawn_snapshot_worker(
    generator: std::sync::Arc<SnapshotGenerator>,
) -> (SnapshotTrigger, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let handle = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let generator = generator.clone();
            match tokio::task::spawn_blocking(move || generator.regenerate()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Snapshot regeneration failed: {}", e),
                Err(e) => tracing::error!("Snapshot task panicked: {}", e),
            }
        }
        tracing::debug!("Snapshot worker stopped");
    });
    (SnapshotTrigger { tx }, handle)
}

//! All-or-nothing replacement of the nav dataset from a validated manifest.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::write_transaction;
use crate::errors::{NavError, NavResult};
use crate::manifest::{Manifest, ManifestEntry};
use crate::repository::{insert_announcement, insert_category, insert_site, store_interval};

/// What an import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub categories: usize,
    pub sites: usize,
    pub announcements: usize,
    pub interval: Option<i64>,
}

/// Replace categories, sites, announcements and the rotation interval in one transaction.
///
/// Existing rows are removed first (sites, then categories, then announcements). Categories
/// take their position among category records as sort index; sites take their position
/// inside the category. Any failure drops the transaction, so readers keep seeing the
/// previous dataset.
pub fn replace_dataset(conn: &mut Connection, manifest: &Manifest) -> NavResult<ImportSummary> {
    let tx = write_transaction(conn)
        .map_err(|e| NavError::database("starting import transaction", e))?;

    for table in ["sites", "categories", "announcements"] {
        tx.execute(&format!("DELETE FROM {table}"), [])
            .map_err(|e| NavError::import(format!("clearing {table}"), e))?;
    }

    let mut summary = ImportSummary::default();
    let mut sort_no: i64 = 0;

    for entry in &manifest.entries {
        match entry {
            ManifestEntry::AnnouncementConfig {
                interval,
                announcements,
            } => {
                if let Some(interval) = *interval {
                    store_interval(&tx, interval)
                        .map_err(|e| NavError::import("announcement interval", e))?;
                    summary.interval = Some(interval);
                }
                for (i, announcement) in announcements.iter().enumerate() {
                    insert_announcement(&tx, &announcement.timestamp, &announcement.content)
                        .map_err(|e| NavError::import(format!("announcement {}", i + 1), e))?;
                    summary.announcements += 1;
                }
            }
            ManifestEntry::Category(category) => {
                let cat_id = insert_category(
                    &tx,
                    &category.id_str,
                    &category.classify,
                    &category.icon,
                    sort_no,
                )
                .map_err(|e| NavError::import(format!("category '{}'", category.id_str), e))?;
                sort_no += 1;
                summary.categories += 1;

                for (site_sort, site) in category.sites.iter().enumerate() {
                    insert_site(
                        &tx,
                        cat_id,
                        &site.name,
                        &site.href,
                        &site.desc,
                        &site.logo,
                        site_sort as i64,
                    )
                    .map_err(|e| {
                        NavError::import(
                            format!("site '{}' in category '{}'", site.name, category.id_str),
                            e,
                        )
                    })?;
                    summary.sites += 1;
                }
            }
        }
    }

    tx.commit()
        .map_err(|e| NavError::import("commit", e))?;

    tracing::info!(
        "Imported {} categories, {} sites and {} announcements",
        summary.categories,
        summary.sites,
        summary.announcements
    );
    Ok(summary)
}

//! Row-level reads and writes for categories, sites, announcements and the singletons.
//!
//! Reads are generic over [`NavQuery`] so they work on a pooled connection and inside an
//! open transaction alike. Writes take the transaction explicitly; the caller commits.
//! Mutations that orphan managed files return the references to release once the
//! transaction has committed.

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;

use crate::db::{hash_password, NavQuery, DEFAULT_INTERVAL};
use crate::errors::{NavError, NavResult};
use crate::managed_files::ManagedFiles;
use crate::models::{
    Announcement, AnnouncementInput, Category, CategoryInput, PageConfig, Site, SiteInput,
    SortItem,
};

pub const MAX_CATEGORY_SORT_ITEMS: usize = 100;
pub const MAX_SITE_SORT_ITEMS: usize = 500;
pub const MAX_SORT_NO: i64 = 10_000;

const CATEGORY_COLUMNS: &str = "id, id_str, classify, icon, sort_no";
const SITE_COLUMNS: &str = "id, cat_id, name, href, description, logo, sort_no";

/// Current local time in the display format used for announcements.
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        id_str: row.get(1)?,
        classify: row.get(2)?,
        icon: row.get(3)?,
        sort_no: row.get(4)?,
        sites: None,
    })
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        cat_id: row.get(1)?,
        name: row.get(2)?,
        href: row.get(3)?,
        desc: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        logo: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        sort_no: row.get(6)?,
    })
}

fn announcement_from_row(row: &Row<'_>) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        content: row.get(2)?,
    })
}

fn lookup<T>(result: rusqlite::Result<T>, resource: &str, id: i64) -> NavResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(NavError::not_found(resource, id)),
        Err(e) => Err(NavError::database(format!("loading {resource} {id}"), e)),
    }
}

fn expect_one_row(affected: usize, resource: &str, id: i64) -> NavResult<()> {
    if affected == 0 {
        return Err(NavError::not_found(resource, id));
    }
    Ok(())
}

fn managed_refs<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values
        .into_iter()
        .filter(|v| ManagedFiles::is_managed(v))
        .map(str::to_string)
        .collect()
}

// ---- categories ----

pub fn list_categories<Q: NavQuery>(q: &Q) -> NavResult<Vec<Category>> {
    q.query_many(
        &format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_no, id"),
        [],
        category_from_row,
    )
    .map_err(|e| NavError::database("listing categories", e))
}

pub fn get_category<Q: NavQuery>(q: &Q, id: i64) -> NavResult<Category> {
    lookup(
        q.query_one(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
            params![id],
            category_from_row,
        ),
        "category",
        id,
    )
}

/// A category together with its sites in display order.
pub fn get_category_with_sites<Q: NavQuery>(q: &Q, id: i64) -> NavResult<Category> {
    let mut category = get_category(q, id)?;
    category.sites = Some(list_sites(q, id)?);
    Ok(category)
}

fn category_exists<Q: NavQuery>(q: &Q, id: i64) -> NavResult<bool> {
    q.query_one("SELECT 1 FROM categories WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| NavError::database("checking category", e))
}

/// Insert a category row at an explicit sort position.
pub fn insert_category(
    tx: &Transaction<'_>,
    id_str: &str,
    classify: &str,
    icon: &str,
    sort_no: i64,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO categories (id_str, classify, icon, sort_no) VALUES (?1, ?2, ?3, ?4)",
        params![id_str, classify, icon, sort_no],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Create a category after the current last one.
pub fn create_category(tx: &Transaction<'_>, input: &CategoryInput) -> NavResult<Category> {
    if input.classify.trim().is_empty() {
        return Err(NavError::validation("classify", "must not be empty"));
    }
    let max: i64 = tx.query_one(
        "SELECT COALESCE(MAX(sort_no), -1) FROM categories",
        [],
        |r| r.get(0),
    )?;
    let sort_no = max + 1;
    let id = insert_category(tx, &input.id_str, &input.classify, &input.icon, sort_no)
        .map_err(|e| NavError::database("creating category", e))?;

    Ok(Category {
        id,
        id_str: input.id_str.clone(),
        classify: input.classify.clone(),
        icon: input.icon.clone(),
        sort_no,
        sites: None,
    })
}

pub fn update_category(tx: &Transaction<'_>, id: i64, input: &CategoryInput) -> NavResult<()> {
    if input.classify.trim().is_empty() {
        return Err(NavError::validation("classify", "must not be empty"));
    }
    let affected = tx
        .execute(
            "UPDATE categories SET id_str = ?1, classify = ?2, icon = ?3 WHERE id = ?4",
            params![input.id_str, input.classify, input.icon, id],
        )
        .map_err(|e| NavError::database("updating category", e))?;
    expect_one_row(affected, "category", id)
}

/// Delete a category and its sites. Returns the managed files those sites referenced.
pub fn delete_category(tx: &Transaction<'_>, id: i64) -> NavResult<Vec<String>> {
    get_category(tx, id)?;
    let sites = list_sites(tx, id)?;

    tx.execute("DELETE FROM sites WHERE cat_id = ?1", params![id])
        .map_err(|e| NavError::database("deleting category sites", e))?;
    tx.execute("DELETE FROM categories WHERE id = ?1", params![id])
        .map_err(|e| NavError::database("deleting category", e))?;

    Ok(managed_refs(
        sites
            .iter()
            .flat_map(|s| [s.href.as_str(), s.logo.as_str()]),
    ))
}

// ---- sites ----

pub fn list_sites<Q: NavQuery>(q: &Q, cat_id: i64) -> NavResult<Vec<Site>> {
    q.query_many(
        &format!("SELECT {SITE_COLUMNS} FROM sites WHERE cat_id = ?1 ORDER BY sort_no, id"),
        params![cat_id],
        site_from_row,
    )
    .map_err(|e| NavError::database("listing sites", e))
}

pub fn get_site<Q: NavQuery>(q: &Q, id: i64) -> NavResult<Site> {
    lookup(
        q.query_one(
            &format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1"),
            params![id],
            site_from_row,
        ),
        "site",
        id,
    )
}

/// Insert a site row at an explicit sort position.
pub fn insert_site(
    tx: &Transaction<'_>,
    cat_id: i64,
    name: &str,
    href: &str,
    desc: &str,
    logo: &str,
    sort_no: i64,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO sites (cat_id, name, href, description, logo, sort_no)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![cat_id, name, href, desc, logo, sort_no],
    )?;
    Ok(tx.last_insert_rowid())
}

fn check_site_input(input: &SiteInput) -> NavResult<()> {
    if input.name.trim().is_empty() {
        return Err(NavError::validation("name", "must not be empty"));
    }
    if input.href.trim().is_empty() {
        return Err(NavError::validation("href", "must not be empty"));
    }
    Ok(())
}

/// Create a site at the end of its category.
pub fn create_site(tx: &Transaction<'_>, input: &SiteInput) -> NavResult<Site> {
    check_site_input(input)?;
    let cat_id = input
        .cat_id
        .ok_or_else(|| NavError::validation("cat_id", "is required"))?;
    if !category_exists(tx, cat_id)? {
        return Err(NavError::not_found("category", cat_id));
    }

    let max: i64 = tx.query_one(
        "SELECT COALESCE(MAX(sort_no), -1) FROM sites WHERE cat_id = ?1",
        params![cat_id],
        |r| r.get(0),
    )?;
    let sort_no = max + 1;
    let id = insert_site(
        tx,
        cat_id,
        &input.name,
        &input.href,
        &input.desc,
        &input.logo,
        sort_no,
    )
    .map_err(|e| NavError::database("creating site", e))?;

    Ok(Site {
        id,
        cat_id,
        name: input.name.clone(),
        href: input.href.clone(),
        desc: input.desc.clone(),
        logo: input.logo.clone(),
        sort_no,
    })
}

/// Update a site in place. Returns managed files the old row referenced and the new one does not.
pub fn update_site(tx: &Transaction<'_>, id: i64, input: &SiteInput) -> NavResult<Vec<String>> {
    check_site_input(input)?;
    let old = get_site(tx, id)?;

    tx.execute(
        "UPDATE sites SET name = ?1, href = ?2, description = ?3, logo = ?4 WHERE id = ?5",
        params![input.name, input.href, input.desc, input.logo, id],
    )
    .map_err(|e| NavError::database("updating site", e))?;

    let mut orphaned = Vec::new();
    if old.href != input.href {
        orphaned.push(old.href.as_str());
    }
    if old.logo != input.logo {
        orphaned.push(old.logo.as_str());
    }
    Ok(managed_refs(orphaned))
}

/// Delete a site. Returns the managed files it referenced.
pub fn delete_site(tx: &Transaction<'_>, id: i64) -> NavResult<Vec<String>> {
    let site = get_site(tx, id)?;
    tx.execute("DELETE FROM sites WHERE id = ?1", params![id])
        .map_err(|e| NavError::database("deleting site", e))?;
    Ok(managed_refs([site.href.as_str(), site.logo.as_str()]))
}

// ---- sort ----

/// Shape checks shared by both batch sort operations; no storage access.
pub fn validate_sort_items(items: &[SortItem], max_items: usize) -> NavResult<()> {
    if items.is_empty() {
        return Err(NavError::validation("items", "sort list must not be empty"));
    }
    if items.len() > max_items {
        return Err(NavError::validation(
            "items",
            format!("sort list is too long, at most {max_items} items"),
        ));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.id <= 0 {
            return Err(NavError::validation("id", format!("invalid id {}", item.id)));
        }
        if !(0..=MAX_SORT_NO).contains(&item.sort_no) {
            return Err(NavError::validation(
                "sort_no",
                format!("must be between 0 and {MAX_SORT_NO}"),
            ));
        }
        if !seen.insert(item.id) {
            return Err(NavError::validation(
                "items",
                format!("duplicate id {} in sort list", item.id),
            ));
        }
    }
    Ok(())
}

fn apply_sort(tx: &Transaction<'_>, table: &str, items: &[SortItem]) -> NavResult<()> {
    let sql = format!("UPDATE {table} SET sort_no = ?1 WHERE id = ?2");
    for item in items {
        let affected = tx
            .execute(&sql, params![item.sort_no, item.id])
            .map_err(|e| NavError::database(format!("updating {table} order"), e))?;
        if affected != 1 {
            return Err(NavError::internal(format!(
                "sort update of {table} {} affected {affected} rows",
                item.id
            )));
        }
    }
    Ok(())
}

pub fn update_category_sort(tx: &Transaction<'_>, items: &[SortItem]) -> NavResult<()> {
    validate_sort_items(items, MAX_CATEGORY_SORT_ITEMS)?;
    for item in items {
        if !category_exists(tx, item.id)? {
            return Err(NavError::validation(
                "id",
                format!("category {} does not exist", item.id),
            ));
        }
    }
    apply_sort(tx, "categories", items)
}

pub fn update_site_sort(tx: &Transaction<'_>, items: &[SortItem]) -> NavResult<()> {
    validate_sort_items(items, MAX_SITE_SORT_ITEMS)?;

    let mut category = None;
    for item in items {
        let cat_id: Option<i64> = tx
            .query_one(
                "SELECT cat_id FROM sites WHERE id = ?1",
                params![item.id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| NavError::database("checking site", e))?;
        let cat_id = cat_id.ok_or_else(|| {
            NavError::validation("id", format!("site {} does not exist", item.id))
        })?;
        match category {
            None => category = Some(cat_id),
            Some(first) if first != cat_id => {
                return Err(NavError::validation(
                    "items",
                    "sites from different categories cannot be sorted together",
                ));
            }
            Some(_) => {}
        }
    }
    apply_sort(tx, "sites", items)
}

// ---- announcements ----

pub fn list_announcements<Q: NavQuery>(q: &Q) -> NavResult<Vec<Announcement>> {
    q.query_many(
        "SELECT id, timestamp, content FROM announcements ORDER BY id",
        [],
        announcement_from_row,
    )
    .map_err(|e| NavError::database("listing announcements", e))
}

pub fn get_announcement<Q: NavQuery>(q: &Q, id: i64) -> NavResult<Announcement> {
    lookup(
        q.query_one(
            "SELECT id, timestamp, content FROM announcements WHERE id = ?1",
            params![id],
            announcement_from_row,
        ),
        "announcement",
        id,
    )
}

/// Insert an announcement; an empty timestamp becomes the current local time.
pub fn insert_announcement(
    tx: &Transaction<'_>,
    timestamp: &str,
    content: &str,
) -> rusqlite::Result<Announcement> {
    let timestamp = if timestamp.is_empty() {
        now_timestamp()
    } else {
        timestamp.to_string()
    };
    tx.execute(
        "INSERT INTO announcements (timestamp, content) VALUES (?1, ?2)",
        params![timestamp, content],
    )?;
    Ok(Announcement {
        id: tx.last_insert_rowid(),
        timestamp,
        content: content.to_string(),
    })
}

pub fn create_announcement(
    tx: &Transaction<'_>,
    input: &AnnouncementInput,
) -> NavResult<Announcement> {
    insert_announcement(tx, &input.timestamp, &input.content)
        .map_err(|e| NavError::database("creating announcement", e))
}

pub fn update_announcement(
    tx: &Transaction<'_>,
    id: i64,
    input: &AnnouncementInput,
) -> NavResult<Announcement> {
    let timestamp = if input.timestamp.is_empty() {
        now_timestamp()
    } else {
        input.timestamp.clone()
    };
    let affected = tx
        .execute(
            "UPDATE announcements SET timestamp = ?1, content = ?2 WHERE id = ?3",
            params![timestamp, input.content, id],
        )
        .map_err(|e| NavError::database("updating announcement", e))?;
    expect_one_row(affected, "announcement", id)?;
    Ok(Announcement {
        id,
        timestamp,
        content: input.content.clone(),
    })
}

pub fn delete_announcement(tx: &Transaction<'_>, id: i64) -> NavResult<()> {
    let affected = tx
        .execute("DELETE FROM announcements WHERE id = ?1", params![id])
        .map_err(|e| NavError::database("deleting announcement", e))?;
    expect_one_row(affected, "announcement", id)
}

// ---- singletons ----

pub fn announcement_interval<Q: NavQuery>(q: &Q) -> NavResult<i64> {
    q.query_one(
        "SELECT interval FROM announcement_config WHERE id = 1",
        [],
        |r| r.get::<_, Option<i64>>(0),
    )
    .optional()
    .map(|v| v.flatten().unwrap_or(DEFAULT_INTERVAL))
    .map_err(|e| NavError::database("loading announcement interval", e))
}

/// Store the rotation interval, creating the singleton row if it was lost.
pub fn store_interval(tx: &Transaction<'_>, interval: i64) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO announcement_config (id, interval) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET interval = excluded.interval",
        params![interval],
    )?;
    Ok(())
}

pub fn update_interval(tx: &Transaction<'_>, interval: i64) -> NavResult<()> {
    if interval <= 0 {
        return Err(NavError::validation("interval", "must be greater than zero"));
    }
    store_interval(tx, interval).map_err(|e| NavError::database("updating interval", e))
}

/// Read the page config without creating it.
pub fn page_config<Q: NavQuery>(q: &Q) -> NavResult<Option<PageConfig>> {
    q.query_one(
        "SELECT title, subtitle, logo, footer_text, icp FROM page_config WHERE id = 1",
        [],
        |r| {
            Ok(PageConfig {
                title: r.get::<_, Option<String>>(0)?.unwrap_or_default(),
                subtitle: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
                logo: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                footer_text: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                icp: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(|e| NavError::database("loading page config", e))
}

/// Read the page config, creating the default row first if it is missing.
pub fn ensure_page_config(conn: &Connection) -> NavResult<PageConfig> {
    if let Some(config) = page_config(conn)? {
        return Ok(config);
    }
    let defaults = PageConfig::default();
    conn.execute(
        "INSERT OR IGNORE INTO page_config (id, title, subtitle, logo, footer_text, icp)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
        params![
            defaults.title,
            defaults.subtitle,
            defaults.logo,
            defaults.footer_text,
            defaults.icp
        ],
    )
    .map_err(|e| NavError::database("creating page config", e))?;
    Ok(defaults)
}

pub fn update_page_config(tx: &Transaction<'_>, config: &PageConfig) -> NavResult<()> {
    tx.execute(
        "INSERT INTO page_config (id, title, subtitle, logo, footer_text, icp)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET title = excluded.title, subtitle = excluded.subtitle,
             logo = excluded.logo, footer_text = excluded.footer_text, icp = excluded.icp",
        params![
            config.title,
            config.subtitle,
            config.logo,
            config.footer_text,
            config.icp
        ],
    )
    .map_err(|e| NavError::database("updating page config", e))?;
    Ok(())
}

// ---- users ----

/// Stored password hash for a user, if the user exists.
pub fn password_hash<Q: NavQuery>(q: &Q, username: &str) -> NavResult<Option<String>> {
    q.query_one(
        "SELECT password FROM users WHERE username = ?1",
        params![username],
        |r| r.get(0),
    )
    .optional()
    .map_err(|e| NavError::database("loading user", e))
}

pub fn update_password(conn: &Connection, username: &str, new_password: &str) -> NavResult<()> {
    let hash = hash_password(new_password)?;
    let affected = conn
        .execute(
            "UPDATE users SET password = ?1, updated_at = CURRENT_TIMESTAMP WHERE username = ?2",
            params![hash, username],
        )
        .map_err(|e| NavError::database("updating password", e))?;
    if affected != 1 {
        return Err(NavError::not_found("user", username));
    }
    Ok(())
}

//! SQLite storage: connection pool, schema bootstrap and the read capability shared by
//! plain connections and open transactions.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Params, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::errors::{NavError, NavResult};

pub type SqlitePool = Pool<SqliteConnectionManager>;
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

pub const DEFAULT_INTERVAL: i64 = 5000;
pub const DEFAULT_ADMIN: &str = "admin";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    id_str TEXT NOT NULL,
    classify TEXT NOT NULL,
    icon TEXT NOT NULL,
    sort_no INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cat_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    href TEXT NOT NULL,
    description TEXT,
    logo TEXT,
    sort_no INTEGER DEFAULT 0,
    FOREIGN KEY (cat_id) REFERENCES categories(id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS announcements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    content TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS announcement_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    interval INTEGER DEFAULT 5000
);
CREATE TABLE IF NOT EXISTS page_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    title TEXT DEFAULT 'Site Navigation',
    subtitle TEXT DEFAULT 'Everyday links, one click away',
    logo TEXT DEFAULT '/static/logo.png',
    footer_text TEXT DEFAULT '',
    icp TEXT DEFAULT ''
);
";

/// Single-row and multi-row reads, available on a pooled connection and inside a transaction.
pub trait NavQuery {
    fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>;

    fn query_many<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>;
}

impl NavQuery for Connection {
    fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.query_row(sql, params, map)
    }

    fn query_many<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        let collected = rows.collect::<rusqlite::Result<Vec<T>>>();
        collected
    }
}

impl NavQuery for Transaction<'_> {
    fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn: &Connection = self;
        conn.query_one(sql, params, map)
    }

    fn query_many<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn: &Connection = self;
        conn.query_many(sql, params, map)
    }
}

impl NavQuery for PooledConn {
    fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn: &Connection = self;
        conn.query_one(sql, params, map)
    }

    fn query_many<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn: &Connection = self;
        conn.query_many(sql, params, map)
    }
}

/// Open the pool, creating the parent directory of the database file if needed.
pub fn open_pool(path: &Path, max_size: u32) -> NavResult<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| NavError::io(format!("creating {}", parent.display()), e))?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.pragma_update(None, "foreign_keys", "ON")?;
        c.pragma_update(None, "journal_mode", "WAL")?;
        c.pragma_update(None, "synchronous", "NORMAL")?;
        c.pragma_update(None, "busy_timeout", 3000i64)?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)
        .map_err(|e| NavError::database(format!("opening {}", path.display()), e))?;

    let conn = pool.get()?;
    init_schema(&conn)?;
    Ok(pool)
}

/// Begin a transaction that takes the write lock up front.
///
/// Writers queue on the busy timeout instead of failing when another writer commits
/// between their first read and first write.
pub fn write_transaction(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Create tables and seed the singleton rows and the default account. Idempotent.
pub fn init_schema(conn: &Connection) -> NavResult<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| NavError::database("creating schema", e))?;

    conn.execute(
        "INSERT OR IGNORE INTO announcement_config (id, interval) VALUES (1, ?1)",
        params![DEFAULT_INTERVAL],
    )?;
    conn.execute("INSERT OR IGNORE INTO page_config (id) VALUES (1)", [])?;

    let users: i64 = conn.query_one("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if users == 0 {
        let hash = hash_password(DEFAULT_ADMIN)?;
        conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![DEFAULT_ADMIN, hash],
        )?;
        tracing::warn!(
            "Created default account '{}' with the default password; change it after first login",
            DEFAULT_ADMIN
        );
    }
    Ok(())
}

pub fn hash_password(password: &str) -> NavResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| NavError::internal(format!("password hashing failed: {e}")))
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

use rusqlite::{Connection, Transaction};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backup::BackupService;
use crate::config::NavConfig;
use crate::db::{open_pool, write_transaction, PooledConn, SqlitePool};
use crate::errors::NavResult;
use crate::managed_files::ManagedFiles;
use crate::snapshot::{spawn_snapshot_worker, SnapshotGenerator, SnapshotTrigger};

pub struct AppState {
    pub config: NavConfig,
    pub pool: SqlitePool,
    pub files: ManagedFiles,
    pub backup: BackupService,
    pub snapshot: SnapshotTrigger,
}

impl AppState {
    pub fn new(config: NavConfig, pool: SqlitePool, snapshot: SnapshotTrigger) -> Self {
        let files = ManagedFiles::from_config(&config);
        let backup = BackupService::new(pool.clone(), &config);
        Self {
            config,
            pool,
            files,
            backup,
            snapshot,
        }
    }

    /// Open storage, write the startup snapshot and start the regeneration worker.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn open(config: NavConfig) -> NavResult<(Arc<Self>, JoinHandle<()>)> {
        let db_path = config.database.path.clone();
        let pool_size = config.database.pool_size;
        let pool = tokio::task::spawn_blocking(move || open_pool(&db_path, pool_size)).await??;

        let generator = Arc::new(SnapshotGenerator::new(
            pool.clone(),
            config.snapshot.json_path.clone(),
        ));
        let startup = generator.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || startup.regenerate()).await? {
            tracing::warn!("Startup snapshot failed: {}", e);
        }

        let (trigger, worker) = spawn_snapshot_worker(generator);
        tracing::info!(
            "Storage ready at {}, uploads under {}",
            config.database.path.display(),
            config.upload.path.display()
        );
        Ok((Arc::new(Self::new(config, pool, trigger)), worker))
    }

    /// Run blocking database work on a pooled connection.
    pub async fn with_conn<T, F>(&self, f: F) -> NavResult<T>
    where
        F: FnOnce(&mut PooledConn) -> NavResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    pub async fn read<T, F>(&self, f: F) -> NavResult<T>
    where
        F: FnOnce(&Connection) -> NavResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_conn(move |conn| f(conn)).await
    }

    /// Run `f` in one write transaction; it commits only when `f` succeeds.
    pub async fn in_transaction<T, F>(&self, f: F) -> NavResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> NavResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = write_transaction(conn)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    /// Run blocking work that needs the state itself (file and archive I/O).
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> NavResult<T>
    where
        F: FnOnce(&AppState) -> NavResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let st = self.clone();
        tokio::task::spawn_blocking(move || f(&st)).await?
    }

    /// Call after a mutation commits.
    pub fn changed(&self) {
        self.snapshot.request();
    }

    /// Call after a mutation commits that orphaned managed files.
    pub fn changed_releasing(&self, released: &[String]) {
        self.files.release(released);
        self.snapshot.request();
    }
}

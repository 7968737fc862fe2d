//! Pre-check-in record storage.
//!
//! [`BookingStore`] is the synchronous contract implemented by the SQLite
//! database and by the in-memory store used in tests and local runs.
//! [`RecordStore`] is what the rest of the service holds: it moves every call
//! onto the blocking pool so request handlers and the update worker only ever
//! await it.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection};
use tokio::task;
use tracing::info;

use crate::{
    config::{Config, StoreBackend},
    error::StoreError,
    models::{format_timestamp, BookingRecord},
};

pub const DEFAULT_LATEST_LIMIT: u32 = 5;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 200;

/// A page request after clamping: `size` in `1..=200`, `page >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub size: u32,
}

impl PageWindow {
    pub fn clamped(page: i64, size: i64) -> Self {
        let size = size.clamp(1, MAX_PAGE_SIZE) as u32;
        let page = page.clamp(1, i64::from(u32::MAX)) as u32;
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    /// `ceil(total / size)`, never below 1.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.size)).max(1)
    }
}

pub trait BookingStore: Send + Sync {
    fn insert(&self, last_name: &str, booking_number: &str) -> Result<BookingRecord, StoreError>;
    fn latest(&self, limit: u32) -> Result<Vec<BookingRecord>, StoreError>;
    fn list(&self, window: PageWindow) -> Result<Vec<BookingRecord>, StoreError>;
    fn count(&self) -> Result<u64, StoreError>;
    fn delete(&self, id: i64) -> Result<u64, StoreError>;
}

fn insert_timestamp() -> DateTime<Utc> {
    // Stored with millisecond precision; trim here so the returned record
    // matches what a later read yields.
    Utc::now().trunc_subsecs(3)
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating data directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed opening database {}", path.display()))?;
        Self::init_schema(&conn)
            .with_context(|| format!("Failed initializing schema in {}", path.display()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            CREATE TABLE IF NOT EXISTS reservas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                last_name TEXT NOT NULL,
                booking_number TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<BookingRecord>, StoreError> {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, last_name, booking_number, created_at)| {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map(|v| v.with_timezone(&Utc))
                    .map_err(|err| StoreError::CorruptRow {
                        id,
                        reason: format!("created_at {created_at:?}: {err}"),
                    })?;
                Ok(BookingRecord {
                    id,
                    last_name,
                    booking_number,
                    created_at,
                })
            })
            .collect()
    }
}

impl BookingStore for SqliteStore {
    fn insert(&self, last_name: &str, booking_number: &str) -> Result<BookingRecord, StoreError> {
        let created_at = insert_timestamp();
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO reservas (last_name, booking_number, created_at) VALUES (?1, ?2, ?3)",
            params![last_name, booking_number, format_timestamp(&created_at)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(BookingRecord {
            id,
            last_name: last_name.to_string(),
            booking_number: booking_number.to_string(),
            created_at,
        })
    }

    fn latest(&self, limit: u32) -> Result<Vec<BookingRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_records(
            &conn,
            "SELECT id, last_name, booking_number, created_at
             FROM reservas
             ORDER BY id DESC
             LIMIT ?1",
            params![i64::from(limit)],
        )
    }

    fn list(&self, window: PageWindow) -> Result<Vec<BookingRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_records(
            &conn,
            "SELECT id, last_name, booking_number, created_at
             FROM reservas
             ORDER BY id DESC
             LIMIT ?1 OFFSET ?2",
            params![
                i64::from(window.size),
                i64::try_from(window.offset()).unwrap_or(i64::MAX)
            ],
        )
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM reservas", [], |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }

    fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM reservas WHERE id = ?1", params![id])?;
        Ok(changed as u64)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<i64, BookingRecord>,
}

/// Non-durable store. Ids keep increasing after deletes, like `AUTOINCREMENT`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl BookingStore for MemoryStore {
    fn insert(&self, last_name: &str, booking_number: &str) -> Result<BookingRecord, StoreError> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let record = BookingRecord {
            id: state.last_id,
            last_name: last_name.to_string(),
            booking_number: booking_number.to_string(),
            created_at: insert_timestamp(),
        };
        state.rows.insert(record.id, record.clone());
        Ok(record)
    }

    fn latest(&self, limit: u32) -> Result<Vec<BookingRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .rows
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn list(&self, window: PageWindow) -> Result<Vec<BookingRecord>, StoreError> {
        let state = self.lock()?;
        let skip = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        Ok(state
            .rows
            .values()
            .rev()
            .skip(skip)
            .take(window.size as usize)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.rows.len() as u64)
    }

    fn delete(&self, id: i64) -> Result<u64, StoreError> {
        Ok(u64::from(self.lock()?.rows.remove(&id).is_some()))
    }
}

/// Shared handle to the configured store.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<dyn BookingStore>,
}

impl RecordStore {
    pub fn new(inner: Arc<dyn BookingStore>) -> Self {
        Self { inner }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match config.store_backend {
            StoreBackend::Sqlite => {
                let store = SqliteStore::open(&config.db_path)?;
                info!(path = %config.db_path.display(), "Using SQLite booking store");
                Ok(Self::new(Arc::new(store)))
            }
            StoreBackend::Memory => {
                info!("Using in-memory booking store; records are lost on restart");
                Ok(Self::memory())
            }
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn BookingStore) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || op(inner.as_ref())).await?
    }

    pub async fn insert(
        &self,
        last_name: &str,
        booking_number: &str,
    ) -> Result<BookingRecord, StoreError> {
        let last_name = last_name.to_string();
        let booking_number = booking_number.to_string();
        self.run(move |store| store.insert(&last_name, &booking_number))
            .await
    }

    pub async fn latest(&self, limit: u32) -> Result<Vec<BookingRecord>, StoreError> {
        self.run(move |store| store.latest(limit)).await
    }

    pub async fn list(&self, window: PageWindow) -> Result<Vec<BookingRecord>, StoreError> {
        self.run(move |store| store.list(window)).await
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.run(|store| store.count()).await
    }

    pub async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        self.run(move |store| store.delete(id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::TempDir;

    use super::*;

    fn sqlite_store(dir: &TempDir) -> RecordStore {
        let store = SqliteStore::open(&dir.path().join("data").join("novadesk.sqlite"))
            .expect("open sqlite store");
        RecordStore::new(Arc::new(store))
    }

    fn backends(dir: &TempDir) -> Vec<(&'static str, RecordStore)> {
        vec![("sqlite", sqlite_store(dir)), ("memory", RecordStore::memory())]
    }

    #[test]
    fn page_window_clamps_inputs() {
        assert_eq!(PageWindow::clamped(0, 0), PageWindow { page: 1, size: 1 });
        assert_eq!(PageWindow::clamped(-4, 500), PageWindow { page: 1, size: 200 });
        assert_eq!(PageWindow::clamped(3, 20).offset(), 40);
    }

    #[test]
    fn page_count_rounds_up_with_floor_of_one() {
        let window = PageWindow::clamped(1, 20);
        assert_eq!(window.page_count(0), 1);
        assert_eq!(window.page_count(20), 1);
        assert_eq!(window.page_count(21), 2);
    }

    #[tokio::test]
    async fn insert_then_latest_returns_same_record() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            let inserted = store.insert("García", "78421").await.unwrap();
            let latest = store.latest(1).await.unwrap();
            assert_eq!(latest.len(), 1, "{name}");
            assert_eq!(latest[0], inserted, "{name}");
            assert_eq!(latest[0].last_name, "García", "{name}");
            assert_eq!(latest[0].booking_number, "78421", "{name}");
        }
    }

    #[tokio::test]
    async fn latest_is_newest_first_and_bounded() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            for i in 0..8 {
                store.insert("Lopez", &format!("100{i}")).await.unwrap();
            }
            let latest = store.latest(DEFAULT_LATEST_LIMIT).await.unwrap();
            let ids: Vec<i64> = latest.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![8, 7, 6, 5, 4], "{name}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_get_contiguous_unique_ids() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            let mut handles = Vec::new();
            for i in 0..40 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.insert("Rojas", &format!("{:05}", i)).await
                }));
            }

            let mut ids = BTreeSet::new();
            for handle in handles {
                let record = handle.await.unwrap().unwrap();
                assert!(ids.insert(record.id), "{name}: duplicate id {}", record.id);
            }

            let first = *ids.first().unwrap();
            let expected: BTreeSet<i64> = (first..first + 40).collect();
            assert_eq!(ids, expected, "{name}");
            assert_eq!(store.count().await.unwrap(), 40, "{name}");
        }
    }

    #[tokio::test]
    async fn pages_cover_count_exactly() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            for i in 0..23 {
                store.insert("Soto", &format!("{:04}", i)).await.unwrap();
            }

            let total = store.count().await.unwrap();
            let size = 5;
            let pages = PageWindow::clamped(1, size).page_count(total);
            assert_eq!(pages, 5, "{name}");

            let mut seen = Vec::new();
            for page in 1..=pages as i64 {
                let rows = store.list(PageWindow::clamped(page, size)).await.unwrap();
                seen.extend(rows.into_iter().map(|r| r.id));
            }
            assert_eq!(seen.len() as u64, total, "{name}");
            assert!(seen.windows(2).all(|w| w[0] > w[1]), "{name}: not newest first");

            let past_end = store
                .list(PageWindow::clamped(pages as i64 + 1, size))
                .await
                .unwrap();
            assert!(past_end.is_empty(), "{name}");
        }
    }

    #[tokio::test]
    async fn delete_reports_one_then_zero() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            let record = store.insert("Vega", "5555").await.unwrap();
            assert_eq!(store.delete(record.id).await.unwrap(), 1, "{name}");
            assert_eq!(store.delete(record.id).await.unwrap(), 0, "{name}");
            assert_eq!(store.delete(9_999).await.unwrap(), 0, "{name}");
            assert_eq!(store.count().await.unwrap(), 0, "{name}");
        }
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir) {
            let first = store.insert("Vega", "5555").await.unwrap();
            store.delete(first.id).await.unwrap();
            let second = store.insert("Vega", "6666").await.unwrap();
            assert!(second.id > first.id, "{name}");
        }
    }

    #[tokio::test]
    async fn sqlite_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let inserted = sqlite_store(&dir).insert("Núñez", "20250").await.unwrap();

        let reopened = sqlite_store(&dir);
        let latest = reopened.latest(5).await.unwrap();
        assert_eq!(latest, vec![inserted]);
    }

    #[test]
    fn sqlite_rejects_corrupt_timestamps() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO reservas (last_name, booking_number, created_at) VALUES ('A', '1234', 'yesterday')",
                [],
            )
            .unwrap();

        let err = store.latest(1).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { id: 1, .. }));
    }
}

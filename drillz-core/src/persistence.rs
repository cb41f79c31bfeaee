//! SQLite storage adapter for item records.
//!
//! Each [`ItemRecord`] is encoded (JSON or MessagePack) and stored in a
//! single table shared by every quiz mode, partitioned by namespace:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS item_records (
//!     namespace  TEXT NOT NULL,
//!     item_id    TEXT NOT NULL,
//!     data       BLOB NOT NULL,
//!     codec      TEXT NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT,
//!     PRIMARY KEY (namespace, item_id)
//! );
//! ```
//!
//! - The codec is stored per row, so switching `PersistenceConfig.codec`
//!   never strands old rows.
//! - Optional CRC-32 checksum detects corrupted rows (logged, not fatal).
//! - An LRU read cache absorbs the repeated reads of a practice session;
//!   [`Storage::preload`] fills it in one pass.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::{PersistenceConfig, RecordCodec};
use crate::error::{DrillzError, Result};
use crate::storage::Storage;
use crate::types::{ItemId, ItemRecord};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS item_records (
    namespace  TEXT NOT NULL,
    item_id    TEXT NOT NULL,
    data       BLOB NOT NULL,
    codec      TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT,
    PRIMARY KEY (namespace, item_id)
);";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 (ISO 3309) of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

impl RecordCodec {
    fn tag(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MessagePack => "msgpack",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "json" => Ok(Self::Json),
            "msgpack" => Ok(Self::MessagePack),
            other => Err(DrillzError::Serialization(format!("unknown record codec '{other}'"))),
        }
    }

    fn encode(self, record: &ItemRecord) -> Result<Vec<u8>> {
        match self {
            Self::Json => {
                serde_json::to_vec(record).map_err(|e| DrillzError::Serialization(e.to_string()))
            }
            Self::MessagePack => rmp_serde::to_vec_named(record)
                .map_err(|e| DrillzError::Serialization(e.to_string())),
        }
    }

    fn decode(self, data: &[u8]) -> Result<ItemRecord> {
        match self {
            Self::Json => {
                serde_json::from_slice(data).map_err(|e| DrillzError::Serialization(e.to_string()))
            }
            Self::MessagePack => {
                rmp_serde::from_slice(data).map_err(|e| DrillzError::Serialization(e.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// [`Storage`] backed by an SQLite database.
///
/// # Usage
///
/// ```no_run
/// # use drillz_core::persistence::SqliteStore;
/// # use drillz_core::config::PersistenceConfig;
/// # use drillz_core::{ItemId, Storage};
/// let store = SqliteStore::open("progress.db", "fretboard", &PersistenceConfig::default())?;
/// let record = store.get(&ItemId::from("E-string-fret3"))?;
/// # Ok::<(), drillz_core::error::DrillzError>(())
/// ```
pub struct SqliteStore {
    conn: Connection,
    namespace: String,
    config: PersistenceConfig,
    cache: Option<Mutex<LruCache<ItemId, ItemRecord>>>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("namespace", &self.namespace)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) an SQLite database at `path`, scoped to `namespace`.
    ///
    /// The schema is created if missing. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(
        path: P,
        namespace: impl Into<String>,
        config: &PersistenceConfig,
    ) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        let namespace = namespace.into();
        info!(
            path = %db_path.display(),
            namespace = %namespace,
            wal = config.wal_mode,
            codec = config.codec.tag(),
            "DRILLZ sqlite store opened"
        );

        Ok(Self::from_parts(conn, namespace, config, db_path))
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] on SQLite failures.
    pub fn open_in_memory(
        namespace: impl Into<String>,
        config: &PersistenceConfig,
    ) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_parts(
            conn,
            namespace.into(),
            config,
            PathBuf::from(":memory:"),
        ))
    }

    fn from_parts(
        conn: Connection,
        namespace: String,
        config: &PersistenceConfig,
        db_path: PathBuf,
    ) -> Self {
        let cache =
            NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            conn,
            namespace,
            config: config.clone(),
            cache,
            db_path,
        }
    }

    /// The namespace this handle reads and writes.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn cache_put(&self, id: &ItemId, record: &ItemRecord) {
        if let Some(cache) = &self.cache {
            cache.lock().put(id.clone(), record.clone());
        }
    }

    fn cache_get(&self, id: &ItemId) -> Option<ItemRecord> {
        self.cache.as_ref().and_then(|c| c.lock().get(id).cloned())
    }

    /// Read and decode one row straight from the database.
    fn load_row(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT data, codec, checksum FROM item_records WHERE namespace = ?1 AND item_id = ?2",
        )?;
        let row: Option<(Vec<u8>, String, Option<String>)> = stmt
            .query_row(params![self.namespace, id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;

        let Some((data, codec, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        namespace = %self.namespace,
                        item = %id,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch - possible record corruption"
                    );
                }
            }
        }

        RecordCodec::from_tag(&codec)?.decode(&data).map(Some)
    }

    /// Every item ID stored under this namespace.
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] on SQLite failures.
    pub fn list_items(&self) -> Result<Vec<ItemId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT item_id FROM item_records WHERE namespace = ?1 ORDER BY item_id",
        )?;
        let rows = stmt.query_map(params![self.namespace], |row| row.get::<_, String>(0))?;
        rows.map(|r| r.map(ItemId).map_err(DrillzError::from)).collect()
    }

    /// Number of records stored under this namespace.
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] on SQLite failures.
    pub fn item_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM item_records WHERE namespace = ?1",
            params![self.namespace],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Copy the whole database to `dest_path` via SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// `Ok(true)` if `PRAGMA integrity_check` reports no corruption.
    ///
    /// # Errors
    ///
    /// Returns [`DrillzError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl Storage for SqliteStore {
    fn get(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        if let Some(hit) = self.cache_get(id) {
            return Ok(Some(hit));
        }
        let record = self.load_row(id)?;
        if let Some(r) = &record {
            self.cache_put(id, r);
        }
        Ok(record)
    }

    fn set(&self, id: &ItemId, record: &ItemRecord) -> Result<()> {
        let start = Instant::now();
        let codec = self.config.codec;
        let data = codec.encode(record)?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&data));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO item_records (namespace, item_id, data, codec, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(namespace, item_id) DO UPDATE SET
                data = excluded.data,
                codec = excluded.codec,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![self.namespace, id.as_str(), data, codec.tag(), now, checksum],
        )?;
        self.cache_put(id, record);

        debug!(
            namespace = %self.namespace,
            item = %id,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved item record"
        );
        Ok(())
    }

    fn preload(&self, ids: &[ItemId]) -> Result<()> {
        if self.cache.is_none() {
            return Ok(());
        }
        let start = Instant::now();
        let mut loaded = 0usize;
        for id in ids {
            if self.cache_get(id).is_some() {
                continue;
            }
            if let Some(record) = self.load_row(id)? {
                self.cache_put(id, &record);
                loaded += 1;
            }
        }
        debug!(
            namespace = %self.namespace,
            requested = ids.len(),
            loaded,
            elapsed_us = start.elapsed().as_micros(),
            "Preloaded item records"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record() -> ItemRecord {
        ItemRecord {
            ewma: 1780.5,
            stability: 12.25,
            last_seen_at: Utc::now(),
            last_correct_at: Some(Utc::now()),
            seen_count: 7,
            correct_count: 5,
        }
    }

    fn store_with(codec: RecordCodec) -> SqliteStore {
        let config = PersistenceConfig {
            codec,
            ..PersistenceConfig::default()
        };
        SqliteStore::open_in_memory("test", &config).expect("open")
    }

    #[test]
    fn round_trip_json() {
        let store = store_with(RecordCodec::Json);
        let id = ItemId::from("G#");
        let record = sample_record();
        store.set(&id, &record).expect("save");
        assert_eq!(store.load_row(&id).expect("load").expect("Some"), record);
    }

    #[test]
    fn round_trip_msgpack() {
        let store = store_with(RecordCodec::MessagePack);
        let id = ItemId::from("Bb");
        let record = sample_record();
        store.set(&id, &record).expect("save");
        assert_eq!(store.load_row(&id).expect("load").expect("Some"), record);
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let store = store_with(RecordCodec::Json);
        assert!(store.get(&ItemId::from("nope")).expect("load").is_none());
    }

    #[test]
    fn upsert_overwrites() {
        let store = store_with(RecordCodec::Json);
        let id = ItemId::from("F");
        store.set(&id, &sample_record()).expect("save1");
        let mut second = sample_record();
        second.seen_count = 8;
        store.set(&id, &second).expect("save2");
        assert_eq!(store.load_row(&id).expect("load").expect("Some").seen_count, 8);
        assert_eq!(store.item_count().expect("count"), 1);
    }

    #[test]
    fn namespaces_are_isolated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared.db");
        let config = PersistenceConfig::default();
        let notes = SqliteStore::open(&path, "notes", &config).expect("open notes");
        let chords = SqliteStore::open(&path, "chords", &config).expect("open chords");

        let id = ItemId::from("C");
        notes.set(&id, &sample_record()).expect("save");
        assert!(chords.get(&id).expect("load").is_none());
        assert_eq!(notes.list_items().expect("list"), vec![id]);
        assert_eq!(chords.item_count().expect("count"), 0);
    }

    #[test]
    fn codec_switch_reads_old_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("codec.db");
        let id = ItemId::from("D");
        let record = sample_record();
        {
            let json = PersistenceConfig::default();
            SqliteStore::open(&path, "ns", &json)
                .expect("open")
                .set(&id, &record)
                .expect("save");
        }
        let msgpack = PersistenceConfig {
            codec: RecordCodec::MessagePack,
            ..PersistenceConfig::default()
        };
        let reopened = SqliteStore::open(&path, "ns", &msgpack).expect("reopen");
        assert_eq!(reopened.get(&id).expect("load").expect("Some"), record);
    }

    #[test]
    fn preload_fills_cache() {
        let store = store_with(RecordCodec::Json);
        let a = ItemId::from("a");
        let b = ItemId::from("b");
        store.set(&a, &sample_record()).expect("save");
        store.set(&b, &sample_record()).expect("save");
        if let Some(cache) = &store.cache {
            cache.lock().clear();
        }
        store.preload(&[a.clone(), b.clone(), ItemId::from("missing")]).expect("preload");
        assert!(store.cache_get(&a).is_some());
        assert!(store.cache_get(&b).is_some());
        assert!(store.cache_get(&ItemId::from("missing")).is_none());
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let config = PersistenceConfig {
            cache_capacity: 0,
            ..PersistenceConfig::default()
        };
        let store = SqliteStore::open_in_memory("ns", &config).expect("open");
        let id = ItemId::from("x");
        store.set(&id, &sample_record()).expect("save");
        assert!(store.cache.is_none());
        assert!(store.get(&id).expect("load").is_some());
    }

    #[test]
    fn checksum_mismatch_still_loads() {
        let store = store_with(RecordCodec::Json);
        let id = ItemId::from("E");
        store.set(&id, &sample_record()).expect("save");
        store
            .conn
            .execute(
                "UPDATE item_records SET checksum = 'deadbeef' WHERE item_id = ?1",
                params![id.as_str()],
            )
            .expect("corrupt checksum");
        assert!(store.load_row(&id).expect("load").is_some());
    }

    #[test]
    fn file_based_open_and_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("progress.db");
        let config = PersistenceConfig::default();
        let store = SqliteStore::open(&db_path, "ns", &config).expect("open");
        let id = ItemId::from("A");
        store.set(&id, &sample_record()).expect("save");

        let backup_path = dir.path().join("progress_backup.db");
        store.backup(&backup_path).expect("backup");

        let restored = SqliteStore::open(&backup_path, "ns", &config).expect("open backup");
        assert!(restored.get(&id).expect("load").is_some());
        assert!(restored.integrity_check().expect("check"));
    }

    #[test]
    fn crc32_basic() {
        // Known test vector: CRC-32 of "123456789" = 0xCBF43926
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}

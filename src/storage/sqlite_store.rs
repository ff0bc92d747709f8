use anyhow::{anyhow, Context};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::StateStore;

const DB_FILE_NAME: &str = "apirecorder_state.sqlite";

/// Key-value store backed by a single SQLite table
pub struct SqliteStateStore {
    db: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStateStore {
    pub fn open(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = base_path.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating storage directory {:?}", dir))?;
        }
        let db_path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening database at {:?}", db_path))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Self {
            db: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow!("db mutex poisoned: {}", e))
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("reading key {key}"))?;
        raw.map(|text| serde_json::from_str(&text).with_context(|| format!("decoding key {key}")))
            .transpose()
    }

    fn set_many(&self, entries: &[(String, Value)]) -> anyhow::Result<()> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction()?;
        for (key, value) in entries {
            let payload = serde_json::to_string(value)?;
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, payload, now],
            )
            .with_context(|| format!("writing key {key}"))?;
        }
        tx.commit().context("committing state")?;
        Ok(())
    }

    fn remove(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .with_context(|| format!("removing key {key}"))?;
        }
        tx.commit().context("committing removal")?;
        Ok(())
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

/// Opaque key-value persistence. The playback core owns two keys in here:
/// `watch_history` and `bookmarks`, both JSON arrays.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (Store, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "vidtrack-store-test-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ));
        let store = Store::open(&dir.join("test.db")).expect("open store");
        store.migrate().expect("migrate");
        (store, dir)
    }

    #[test]
    fn get_returns_none_for_missing_key() {
        let (store, dir) = temp_store();
        assert_eq!(store.get("watch_history").expect("get"), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn set_then_get_round_trips_and_overwrites() {
        let (store, dir) = temp_store();
        store.set("bookmarks", "[]").expect("set");
        assert_eq!(store.get("bookmarks").expect("get").as_deref(), Some("[]"));

        store.set("bookmarks", r#"[{"id":"603"}]"#).expect("overwrite");
        assert_eq!(
            store.get("bookmarks").expect("get").as_deref(),
            Some(r#"[{"id":"603"}]"#)
        );
        let _ = std::fs::remove_dir_all(dir);
    }
}

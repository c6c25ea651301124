//! Persisted cache entries.
//!
//! Each [`CacheStore`](super::CacheStore) namespace is mirrored into the
//! `cache_entries` table with its value as JSON. Rows that no longer decode
//! are skipped on load rather than failing startup.

use super::connection::CacheDb;
use super::store::CacheEntry;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::params;

/// One stored row, before the value is decoded.
type RawRow = (String, String, String, String);

fn encode_row<V: Serialize>(key: &str, entry: &CacheEntry<V>) -> Result<RawRow, Error> {
    Ok((
        key.to_string(),
        serde_json::to_string(&entry.value)?,
        entry.timestamp.to_rfc3339(),
        entry.last_used.to_rfc3339(),
    ))
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

impl CacheDb {
    /// Insert or update one entry.
    pub async fn save_entry<V: Serialize>(
        &self, namespace: &str, key: &str, entry: &CacheEntry<V>,
    ) -> Result<(), Error> {
        self.upsert_rows(namespace, vec![encode_row(key, entry)?]).await
    }

    /// Insert or update many entries in one transaction.
    pub async fn save_entries<V: Serialize>(
        &self, namespace: &str, entries: &[(String, CacheEntry<V>)],
    ) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(key, entry)| encode_row(key, entry))
            .collect::<Result<Vec<RawRow>, Error>>()?;
        self.upsert_rows(namespace, rows).await
    }

    async fn upsert_rows(&self, namespace: &str, rows: Vec<RawRow>) -> Result<(), Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (key, value_json, created_at, last_used) in &rows {
                    tx.execute(
                        "INSERT INTO cache_entries (namespace, key, value_json, created_at, last_used)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT(namespace, key) DO UPDATE SET
                            value_json = excluded.value_json,
                            created_at = excluded.created_at,
                            last_used = excluded.last_used",
                        params![namespace, key, value_json, created_at, last_used],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Load every decodable entry of a namespace.
    pub async fn load_entries<V: DeserializeOwned>(
        &self, namespace: &str,
    ) -> Result<Vec<(String, CacheEntry<V>)>, Error> {
        let ns = namespace.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<RawRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, value_json, created_at, last_used FROM cache_entries WHERE namespace = ?1",
                )?;
                let rows = stmt
                    .query_map(params![ns], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<RawRow>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, value_json, created_at, last_used) in rows {
            let value = match serde_json::from_str::<V>(&value_json) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(namespace, key = %key, error = %e, "skipping undecodable cache entry");
                    continue;
                }
            };
            let (Some(timestamp), Some(last_used)) = (parse_time(&created_at), parse_time(&last_used)) else {
                tracing::warn!(namespace, key = %key, "skipping cache entry with invalid timestamps");
                continue;
            };
            entries.push((key, CacheEntry { value, timestamp, last_used }));
        }

        Ok(entries)
    }

    /// Delete the given keys. Returns the number of deleted rows.
    pub async fn delete_entries(&self, namespace: &str, keys: &[String]) -> Result<u64, Error> {
        if keys.is_empty() {
            return Ok(0);
        }
        let namespace = namespace.to_string();
        let keys = keys.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut deleted = 0u64;
                for key in &keys {
                    let count =
                        tx.execute("DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2", params![namespace, key])?;
                    deleted += count as u64;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry of a namespace. Returns the number of deleted rows.
    pub async fn clear_namespace(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE namespace = ?1", params![namespace])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

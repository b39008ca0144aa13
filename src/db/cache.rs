// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File-based result cache.
//!
//! Each cached result set lives in `<cache_dir>/db/<table>/rs--<id>`, where the
//! id is a SHA-256 digest of the statement and its bound values. Entries carry
//! a checksum of their payload and an optional expiry; anything that fails
//! either check is deleted and treated as a miss.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::query::Statement;
use super::row::Row;
use crate::error::{FrameworkError, Result};
use crate::util::{create_dir, random_string};

const FILE_PREFIX: &str = "rs--";
const SALT: &str = "trellis-result-cache";

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix time after which the entry is stale
    expires_at: Option<i64>,
    /// Hex SHA-256 of `payload`
    checksum: String,
    payload: String,
}

/// Result cache for one table.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    lifetime: Option<Duration>,
}

impl ResultCache {
    pub fn new(cache_dir: &Path, table: &str, lifetime: Option<Duration>) -> Self {
        Self {
            dir: cache_dir.join("db").join(table),
            lifetime,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache id of a statement: its SQL text together with its bound values.
    pub fn cache_id(&self, statement: &Statement) -> Result<String> {
        let params = serde_json::to_string(&statement.params)
            .map_err(|e| FrameworkError::Cache(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(SALT.as_bytes());
        hasher.update(statement.sql.as_bytes());
        hasher.update(params.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}"))
    }

    /// Load a cached result set. Missing, stale and corrupt entries are misses.
    pub fn load(&self, id: &str) -> Option<Vec<Row>> {
        let path = self.path_for(id);
        let raw = fs::read_to_string(&path).ok()?;

        let rows = serde_json::from_str::<CacheEntry>(&raw)
            .ok()
            .filter(|entry| {
                entry
                    .expires_at
                    .is_none_or(|at| at > chrono::Utc::now().timestamp())
            })
            .filter(|entry| checksum(&entry.payload) == entry.checksum)
            .and_then(|entry| serde_json::from_str::<Vec<Row>>(&entry.payload).ok());

        if rows.is_none() {
            tracing::debug!(path = %path.display(), "Discarding stale or corrupt cache entry");
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
            }
        }
        rows
    }

    /// Store a result set under `id`.
    pub fn save(&self, id: &str, rows: &[Row]) -> Result<()> {
        create_dir(&self.dir)?;

        let payload =
            serde_json::to_string(rows).map_err(|e| FrameworkError::Cache(e.to_string()))?;
        let entry = CacheEntry {
            expires_at: self
                .lifetime
                .map(|l| chrono::Utc::now().timestamp() + l.as_secs() as i64),
            checksum: checksum(&payload),
            payload,
        };
        let encoded =
            serde_json::to_string(&entry).map_err(|e| FrameworkError::Cache(e.to_string()))?;

        let path = self.path_for(id);
        // Concurrent writers of the same id each get their own temp file.
        let suffix = random_string(8, false, false)
            .map_err(|e| FrameworkError::Cache(e.to_string()))?;
        let tmp = self.dir.join(format!("{FILE_PREFIX}{id}.{suffix}.tmp"));
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove every cached result set of the table.
    pub fn clean(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0usize;
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(FILE_PREFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        tracing::debug!(dir = %self.dir.display(), removed, "Cleaned result cache");
        Ok(())
    }
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

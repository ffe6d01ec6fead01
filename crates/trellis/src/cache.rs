// Trellis
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Key/value cache stores

use crate::application::Application;
use crate::config::Config;
use crate::error::{FrameworkError, FrameworkResult};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// A cached value with an optional expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> FrameworkResult<Option<Value>>;

    /// Store a value; `None` keeps it until forgotten
    fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> FrameworkResult<()>;

    /// Remove a key, returning whether it was present
    fn forget(&self, key: &str) -> FrameworkResult<bool>;

    fn flush(&self) -> FrameworkResult<()>;

    fn has(&self, key: &str) -> FrameworkResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Build the store selected by `cache.driver` (`file` or `array`)
pub fn store_from_config(app: &Application, config: &Config) -> FrameworkResult<Arc<dyn CacheStore>> {
    match config.get_str("cache.driver").unwrap_or("file") {
        "file" => Ok(Arc::new(FileStore::new(app.storage_path("cache/data")))),
        "array" => Ok(Arc::new(ArrayStore::new())),
        other => Err(FrameworkError::config(format!("Unsupported cache driver '{}'", other))),
    }
}

/// In-memory store
#[derive(Default)]
pub struct ArrayStore {
    entries: DashMap<String, CacheEntry>,
}

impl ArrayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for ArrayStore {
    fn get(&self, key: &str) -> FrameworkResult<Option<Value>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> FrameworkResult<()> {
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn forget(&self, key: &str) -> FrameworkResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn flush(&self) -> FrameworkResult<()> {
        self.entries.clear();
        Ok(())
    }
}

/// One JSON file per key, named by the key's hash
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", blake3::hash(key.as_bytes()).to_hex()))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> FrameworkResult<Option<Value>> {
        let path = self.path(key);
        if !path.is_file() {
            return Ok(None);
        }

        let entry: CacheEntry = match serde_json::from_slice(&std::fs::read(&path)?) {
            Ok(entry) => entry,
            Err(_) => {
                std::fs::remove_file(&path)?;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            std::fs::remove_file(&path)?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> FrameworkResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), serde_json::to_vec(&CacheEntry::new(value, ttl))?)?;
        Ok(())
    }

    fn forget(&self, key: &str) -> FrameworkResult<bool> {
        let path = self.path(key);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    fn flush(&self) -> FrameworkResult<()> {
        if self.dir.is_dir() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

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

//! Flattened configuration cache in `storage/cache/config.cache`

use crate::application::Application;
use crate::config::Config;
use crate::error::{FrameworkError, FrameworkResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const CONFIG_CACHE_FILE: &str = "cache/config.cache";

pub struct ConfigCache {
    path: PathBuf,
}

impl ConfigCache {
    pub fn new(app: &Application) -> Self {
        Self {
            path: app.storage_path(CONFIG_CACHE_FILE),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cache back into a nested configuration
    pub fn load(&self) -> FrameworkResult<Config> {
        let contents = std::fs::read(&self.path)?;
        let flat: BTreeMap<String, Value> =
            serde_json::from_slice(&contents).map_err(|e| FrameworkError::config(format!("Corrupt configuration cache {}: {}", self.path.display(), e)))?;
        Ok(Config::from_flat(flat))
    }

    pub fn write(&self, config: &Config) -> FrameworkResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&config.flatten())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Remove the cache file, returning whether one existed
    pub fn clear(&self) -> FrameworkResult<bool> {
        if !self.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        let cache = ConfigCache::new(&app);

        let mut config = Config::default();
        config.set("app.name", json!("Cached"));
        config.set("app.services.providers", json!(["app.*"]));

        assert!(!cache.exists());
        cache.write(&config).unwrap();
        assert!(cache.exists());

        let raw: Value = serde_json::from_slice(&std::fs::read(cache.path()).unwrap()).unwrap();
        assert_eq!(raw["app.name"], "Cached");

        assert_eq!(cache.load().unwrap(), config);
        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn test_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        let cache = ConfigCache::new(&app);
        std::fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        std::fs::write(cache.path(), "not json").unwrap();

        assert!(matches!(cache.load(), Err(FrameworkError::Config { .. })));
    }
}

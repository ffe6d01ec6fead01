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

//! `.env` loading and editing

use crate::error::{FrameworkError, FrameworkResult};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Variables loaded from the project's `.env` file.
///
/// Lookups fall back to the process environment; the process environment is never modified.
#[derive(Debug, Clone, Default)]
pub struct Env {
    path: Option<PathBuf>,
    vars: HashMap<String, String>,
}

impl Env {
    /// Load variables from a `.env` file
    pub fn load(path: &Path) -> FrameworkResult<Self> {
        if !path.is_file() {
            return Err(FrameworkError::MissingEnvFile(path.to_path_buf()));
        }

        let mut vars = HashMap::new();
        let iter = dotenvy::from_path_iter(path).map_err(|e| FrameworkError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        for item in iter {
            let (key, value) = item.map_err(|e| FrameworkError::config(format!("Invalid entry in {}: {}", path.display(), e)))?;
            vars.insert(key, value);
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            vars,
        })
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { path: None, vars }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned().or_else(|| std::env::var(key).ok())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Set `key=value` in a `.env` file, replacing an existing assignment or appending one
pub fn write_value(path: &Path, key: &str, value: &str) -> FrameworkResult<()> {
    if !path.is_file() {
        return Err(FrameworkError::MissingEnvFile(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let pattern = Regex::new(&format!(r"(?m)^{}=.*$", regex::escape(key))).map_err(|e| FrameworkError::framework(e.to_string()))?;
    let line = format!("{}={}", key, value);

    let updated = if pattern.is_match(&contents) {
        pattern.replace(&contents, regex::NoExpand(&line)).into_owned()
    } else if contents.is_empty() || contents.ends_with('\n') {
        format!("{}{}\n", contents, line)
    } else {
        format!("{}\n{}\n", contents, line)
    };

    std::fs::write(path, updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "APP_NAME=\"Trellis App\"\nAPP_DEBUG=true\n# comment\n").unwrap();

        let env = Env::load(&path).unwrap();
        assert_eq!(env.get("APP_NAME").as_deref(), Some("Trellis App"));
        assert_eq!(env.get("APP_DEBUG").as_deref(), Some("true"));
        assert_eq!(env.get("TRELLIS_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn test_missing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Env::load(&dir.path().join(".env")).unwrap_err();
        assert!(matches!(err, FrameworkError::MissingEnvFile(_)));
    }

    #[test]
    fn test_write_value_replaces_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "APP_KEY=old\nAPP_ENV=production").unwrap();

        write_value(&path, "APP_KEY", "base64:$abc").unwrap();
        write_value(&path, "APP_URL", "http://localhost").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "APP_KEY=base64:$abc\nAPP_ENV=production\nAPP_URL=http://localhost\n");
    }
}

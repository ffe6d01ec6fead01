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

//! Session storage drivers

use crate::error::FrameworkResult;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// Storage backend for serialized session payloads
pub trait SessionHandler: Send + Sync {
    fn read(&self, id: &str) -> FrameworkResult<Option<String>>;

    fn write(&self, id: &str, data: &str) -> FrameworkResult<()>;

    fn destroy(&self, id: &str) -> FrameworkResult<()>;

    /// Remove sessions idle for longer than `max_lifetime` seconds, returning how many were removed
    fn gc(&self, max_lifetime: u64) -> FrameworkResult<usize>;
}

/// One file per session under `storage/sessions`
pub struct FileSessionHandler {
    dir: PathBuf,
}

impl FileSessionHandler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // Session ids are alphanumeric; anything else never reaches the filesystem
    fn path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.dir.join(id))
    }
}

impl SessionHandler for FileSessionHandler {
    fn read(&self, id: &str) -> FrameworkResult<Option<String>> {
        match self.path(id) {
            Some(path) if path.is_file() => Ok(Some(std::fs::read_to_string(path)?)),
            _ => Ok(None),
        }
    }

    fn write(&self, id: &str, data: &str) -> FrameworkResult<()> {
        let Some(path) = self.path(id) else {
            return Ok(());
        };
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn destroy(&self, id: &str) -> FrameworkResult<()> {
        if let Some(path) = self.path(id).filter(|p| p.is_file()) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn gc(&self, max_lifetime: u64) -> FrameworkResult<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            // Another collector may have removed the file since the listing
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let idle = now.duration_since(metadata.modified()?).unwrap_or_default();
            if !metadata.is_file() || idle.as_secs() <= max_lifetime {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            debug!("Removed {} expired session files", removed);
        }
        Ok(removed)
    }
}

/// In-memory sessions; lost when the process exits
#[derive(Default)]
pub struct ArraySessionHandler {
    sessions: DashMap<String, (String, DateTime<Utc>)>,
}

impl ArraySessionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: &str, by: Duration) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.1 -= by;
        }
    }
}

impl SessionHandler for ArraySessionHandler {
    fn read(&self, id: &str) -> FrameworkResult<Option<String>> {
        Ok(self.sessions.get(id).map(|entry| entry.0.clone()))
    }

    fn write(&self, id: &str, data: &str) -> FrameworkResult<()> {
        self.sessions.insert(id.to_string(), (data.to_string(), Utc::now()));
        Ok(())
    }

    fn destroy(&self, id: &str) -> FrameworkResult<()> {
        self.sessions.remove(id);
        Ok(())
    }

    fn gc(&self, max_lifetime: u64) -> FrameworkResult<usize> {
        let lifetime = i64::try_from(max_lifetime).ok().and_then(Duration::try_seconds).unwrap_or(Duration::MAX);
        let Some(cutoff) = Utc::now().checked_sub_signed(lifetime) else {
            return Ok(0);
        };
        let before = self.sessions.len();
        self.sessions.retain(|_, (_, touched)| *touched >= cutoff);
        Ok(before - self.sessions.len())
    }
}

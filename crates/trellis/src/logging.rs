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

//! Tracing subscriber setup from the `logging` config section

use crate::application::Application;
use crate::config::Config;
use crate::error::{FrameworkError, FrameworkResult};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// An `EnvFilter` directive such as `info` or `trellis=debug,hyper=warn`
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LogSettings {
    /// Relative `logging.file` paths are resolved against the project root
    pub fn from_config(app: &Application, config: &Config) -> Self {
        let file = config.get_str("logging.file").filter(|path| !path.is_empty()).map(|path| {
            let path = PathBuf::from(path);
            if path.is_absolute() { path } else { app.root_path(&path.to_string_lossy()) }
        });

        Self {
            level: config.string_or("logging.level", DEFAULT_LEVEL),
            file,
        }
    }
}

/// Keeps the file writer flushing until the application shuts down
pub struct LogGuard(Mutex<Option<WorkerGuard>>);

impl LogGuard {
    /// Flush buffered lines and stop the writer thread
    pub fn flush(&self) {
        self.0.lock().take();
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `None` when a subscriber is already installed, as happens in tests and
/// when the binary set one up first.
pub fn init(settings: &LogSettings) -> FrameworkResult<Option<LogGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| FrameworkError::config(format!("Invalid logging.level '{}': {}", settings.level, e)))?;

    let (file_layer, guard) = match settings.file.as_deref() {
        Some(path) => {
            let name = path.file_name().ok_or_else(|| FrameworkError::config(format!("Invalid logging.file '{}'", path.display())))?;
            let dir = path.parent().map(PathBuf::from).unwrap_or_default();
            std::fs::create_dir_all(&dir)?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, name));
            (Some(fmt::layer().with_ansi(false).with_target(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(false)).with(file_layer).try_init();
    if installed.is_err() {
        debug!("A tracing subscriber is already installed; keeping it");
        return Ok(None);
    }

    Ok(Some(LogGuard(Mutex::new(guard))))
}

/// Console-only fallback used by the binaries before configuration is available
pub fn init_default() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let _ = tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(false)).try_init();
}

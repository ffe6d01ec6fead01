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

//! Loading configuration files from the project's config directory

use crate::application::Application;
use crate::config::Config;
use crate::env::Env;
use crate::error::{FrameworkError, FrameworkResult};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions recognized in the config directory
pub const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Reads `config/*.{toml,json,yaml,yml}`; each file stem becomes a top-level key.
///
/// String values may contain `%env:NAME%` and `%path:NAME[/sub]%` placeholders.
pub struct ConfigLoader<'a> {
    app: &'a Application,
    env: &'a Env,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(app: &'a Application, env: &'a Env) -> Self {
        Self { app, env }
    }

    /// Config files in load order
    pub fn files(&self) -> FrameworkResult<Vec<PathBuf>> {
        let dir = self.app.config_path("");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for extension in CONFIG_EXTENSIONS {
            let pattern = dir.join(format!("*.{}", extension));
            let pattern = pattern.to_string_lossy();
            let entries = glob::glob(&pattern).map_err(|e| FrameworkError::config(e.to_string()))?;
            files.extend(entries.filter_map(Result::ok).filter(|path| path.is_file()));
        }
        files.sort();
        Ok(files)
    }

    pub fn load(&self) -> FrameworkResult<Config> {
        let replacer = Replacer::new(self.app, self.env)?;
        let mut items = Map::new();

        for file in self.files()? {
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let mut value = parse_file(&file)?;
            replacer.apply(&mut value);

            if items.contains_key(&stem) {
                warn!("Configuration key '{}' defined by several files; {} wins", stem, file.display());
            }
            debug!("Loaded configuration file {}", file.display());
            items.insert(stem, value);
        }

        Ok(Config::new(items))
    }
}

fn parse_file(path: &Path) -> FrameworkResult<Value> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    let value: Value = match extension {
        "toml" => toml::from_str(&contents).map_err(|e| FrameworkError::config(format!("{}: {}", path.display(), e)))?,
        "json" => serde_json::from_str(&contents).map_err(|e| FrameworkError::config(format!("{}: {}", path.display(), e)))?,
        "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| FrameworkError::config(format!("{}: {}", path.display(), e)))?,
        other => return Err(FrameworkError::config(format!("Unsupported configuration format: {}", other))),
    };

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(FrameworkError::config(format!("{} must contain a table at the top level", path.display()))),
    }
}

struct Replacer<'a> {
    app: &'a Application,
    env: &'a Env,
    pattern: Regex,
}

impl<'a> Replacer<'a> {
    fn new(app: &'a Application, env: &'a Env) -> FrameworkResult<Self> {
        let pattern = Regex::new(r"%(env|path):([A-Za-z0-9_./\-]*)%").map_err(|e| FrameworkError::framework(e.to_string()))?;
        Ok(Self { app, env, pattern })
    }

    fn apply(&self, value: &mut Value) {
        match value {
            Value::String(text) => {
                if let Some(replaced) = self.replace(text) {
                    *value = replaced;
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.apply(item)),
            Value::Object(map) => map.values_mut().for_each(|item| self.apply(item)),
            _ => {}
        }
    }

    fn resolve(&self, kind: &str, name: &str) -> Option<String> {
        match kind {
            "env" => self.env.get(name),
            _ => {
                let (path_name, sub) = name.split_once('/').unwrap_or((name, ""));
                self.app.named_path(path_name, sub).map(|p| p.to_string_lossy().into_owned())
            }
        }
    }

    fn replace(&self, text: &str) -> Option<Value> {
        if !self.pattern.is_match(text) {
            return None;
        }

        // A lone placeholder for a missing variable becomes null instead of an empty string
        if let Some(captures) = self.pattern.captures(text) {
            if captures.get(0).map(|m| m.as_str().len()) == Some(text.len()) {
                return Some(self.resolve(&captures[1], &captures[2]).map(Value::String).unwrap_or(Value::Null));
            }
        }

        let replaced = self.pattern.replace_all(text, |captures: &Captures| self.resolve(&captures[1], &captures[2]).unwrap_or_default());
        Some(Value::String(replaced.into_owned()))
    }
}

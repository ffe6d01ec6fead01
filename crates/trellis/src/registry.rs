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

//! Component lists declared in configuration, merged with the framework defaults

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{FrameworkError, FrameworkResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Component kinds resolved by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Providers,
    Commands,
    Controllers,
    Middleware,
    Listeners,
}

impl ComponentKind {
    pub fn config_key(self) -> &'static str {
        match self {
            ComponentKind::Providers => "app.services.providers",
            ComponentKind::Commands => "app.services.commands",
            ComponentKind::Controllers => "app.routing.controllers",
            ComponentKind::Middleware => "app.routing.middleware",
            ComponentKind::Listeners => "app.events.listeners",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ComponentKind::Providers => "providers",
            ComponentKind::Commands => "commands",
            ComponentKind::Controllers => "controllers",
            ComponentKind::Middleware => "middleware",
            ComponentKind::Listeners => "listeners",
        }
    }
}

/// Default service providers, in registration order
pub const DEFAULT_PROVIDERS: &[&str] = &["encryption", "cookie", "session", "cache", "events", "view", "logging", "exceptions"];

/// Default global middleware, outermost first
pub const DEFAULT_MIDDLEWARE: &[&str] = &["cookie", "session", "csrf", "xss"];

/// Resolves the component names an application uses.
///
/// Each config key holds either a list of names or a `{ load = [..], ignore = [..] }` table.
/// Names may be glob patterns matched against the catalog.
pub struct ApplicationRegistry {
    config: Arc<Config>,
    catalog: Arc<Catalog>,
    memo: Mutex<HashMap<blake3::Hash, Vec<String>>>,
}

impl ApplicationRegistry {
    pub fn new(config: Arc<Config>, catalog: Arc<Catalog>) -> Self {
        Self {
            config,
            catalog,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn providers(&self) -> FrameworkResult<Vec<String>> {
        self.resolve(ComponentKind::Providers)
    }

    pub fn commands(&self) -> FrameworkResult<Vec<String>> {
        self.resolve(ComponentKind::Commands)
    }

    pub fn controllers(&self) -> FrameworkResult<Vec<String>> {
        self.resolve(ComponentKind::Controllers)
    }

    pub fn middleware(&self) -> FrameworkResult<Vec<String>> {
        self.resolve(ComponentKind::Middleware)
    }

    pub fn listeners(&self) -> FrameworkResult<Vec<String>> {
        self.resolve(ComponentKind::Listeners)
    }

    pub fn resolve(&self, kind: ComponentKind) -> FrameworkResult<Vec<String>> {
        let (load, ignore) = self.declared(kind)?;
        let defaults = self.defaults(kind);
        let additions = self.expand(kind, &load)?;
        Ok(self.merge(kind, &defaults, &additions, &ignore))
    }

    /// Framework defaults for a kind. Every framework command is a default command.
    pub fn defaults(&self, kind: ComponentKind) -> Vec<String> {
        let names: &[&str] = match kind {
            ComponentKind::Providers => DEFAULT_PROVIDERS,
            ComponentKind::Middleware => DEFAULT_MIDDLEWARE,
            ComponentKind::Commands => return crate::console::commands::framework_commands().into_iter().map(|(name, _)| name.to_string()).collect(),
            ComponentKind::Controllers | ComponentKind::Listeners => &[],
        };
        names.iter().map(|name| name.to_string()).collect()
    }

    /// `defaults ++ merge` without duplicates, minus `remove`; memoized by a hash of the inputs
    pub fn merge(&self, kind: ComponentKind, defaults: &[String], merge: &[String], remove: &[String]) -> Vec<String> {
        let key = memo_key(kind, defaults, merge, remove);
        if let Some(cached) = self.memo.lock().get(&key) {
            return cached.clone();
        }

        let mut merged: Vec<String> = Vec::with_capacity(defaults.len() + merge.len());
        for name in defaults.iter().chain(merge) {
            if !merged.contains(name) && !remove.contains(name) {
                merged.push(name.clone());
            }
        }

        debug!("Resolved {} {}: {:?}", merged.len(), kind.label(), merged);
        self.memo.lock().insert(key, merged.clone());
        merged
    }

    /// Number of memoized merge results
    pub fn memoized(&self) -> usize {
        self.memo.lock().len()
    }

    fn declared(&self, kind: ComponentKind) -> FrameworkResult<(Vec<String>, Vec<String>)> {
        let key = kind.config_key();
        match self.config.get(key) {
            None | Some(Value::Null) => Ok((Vec::new(), Vec::new())),
            Some(Value::Array(_)) | Some(Value::String(_)) => Ok((self.config.get_string_list(key), Vec::new())),
            Some(Value::Object(_)) => Ok((self.config.get_string_list(&format!("{}.load", key)), self.config.get_string_list(&format!("{}.ignore", key)))),
            Some(_) => Err(FrameworkError::config(format!("'{}' must be a list or a table with load/ignore lists", key))),
        }
    }

    // Glob entries expand against catalog names in registration order; plain names are kept as-is
    fn expand(&self, kind: ComponentKind, entries: &[String]) -> FrameworkResult<Vec<String>> {
        let available = match kind {
            ComponentKind::Providers => self.catalog.providers.names(),
            ComponentKind::Commands => self.catalog.commands.names(),
            ComponentKind::Controllers => self.catalog.controllers.names(),
            ComponentKind::Middleware => self.catalog.middleware.names(),
            ComponentKind::Listeners => self.catalog.listeners.names(),
        };

        let mut expanded = Vec::new();
        for entry in entries {
            if !entry.contains(['*', '?', '[']) {
                expanded.push(entry.clone());
                continue;
            }
            let pattern = glob::Pattern::new(entry).map_err(|e| FrameworkError::config(format!("Invalid pattern '{}': {}", entry, e)))?;
            expanded.extend(available.iter().filter(|name| pattern.matches(name)).cloned());
        }
        Ok(expanded)
    }
}

fn memo_key(kind: ComponentKind, defaults: &[String], merge: &[String], remove: &[String]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.label().as_bytes());
    // Serializing string slices cannot fail
    let payload = serde_json::to_vec(&(defaults, merge, remove)).unwrap_or_default();
    hasher.update(&payload);
    hasher.finalize()
}

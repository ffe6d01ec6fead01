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

//! Configuration repository with dotted-key access

pub mod cache;
pub mod loader;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use cache::ConfigCache;
pub use loader::ConfigLoader;

/// Loaded configuration. Top-level keys are config file stems (`app`, `session`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    items: Map<String, Value>,
}

impl Config {
    pub fn new(items: Map<String, Value>) -> Self {
        Self { items }
    }

    /// Look up a dotted key such as `app.debug`
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.items.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or(default).to_string()
    }

    /// Booleans, also accepting the strings env replacers produce (`"true"`, `"1"`, ...)
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(value) => Some(*value),
            Value::String(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Unsigned integers, also parsing numeric strings
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.get_u64(key).unwrap_or(default)
    }

    /// A list of strings; a single string is treated as a one element list
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
            Some(Value::String(item)) => vec![item.clone()],
            _ => Vec::new(),
        }
    }

    /// Set a dotted key, creating intermediate tables as needed
    pub fn set(&mut self, key: &str, value: Value) {
        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.items;
        for part in parents {
            let entry = current.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            current = map;
        }
        current.insert(last.to_string(), value);
    }

    pub fn all(&self) -> &Map<String, Value> {
        &self.items
    }

    /// Flatten nested tables into dotted keys. Arrays are kept as leaf values.
    pub fn flatten(&self) -> BTreeMap<String, Value> {
        let mut flat = BTreeMap::new();
        for (key, value) in &self.items {
            flatten_into(key, value, &mut flat);
        }
        flat
    }

    /// Rebuild a configuration from dotted keys
    pub fn from_flat(flat: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut config = Self::default();
        for (key, value) in flat {
            config.set(&key, value);
        }
        config
    }
}

fn flatten_into(prefix: &str, value: &Value, flat: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{}.{}", prefix, key), child, flat);
            }
        }
        other => {
            flat.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Config {
        let Value::Object(items) = json!({
            "app": {"debug": "true", "name": "Demo", "services": {"providers": ["app.*"]}},
            "session": {"expire_minutes": 30, "secure": false}
        }) else {
            unreachable!()
        };
        Config::new(items)
    }

    #[test]
    fn test_dotted_access() {
        let config = sample();
        assert_eq!(config.get_str("app.name"), Some("Demo"));
        assert_eq!(config.get_bool("app.debug"), Some(true));
        assert_eq!(config.get_u64("session.expire_minutes"), Some(30));
        assert_eq!(config.get_string_list("app.services.providers"), vec!["app.*".to_string()]);
        assert!(config.get("app.missing.deep").is_none());
        assert!(config.get("session.secure.deeper").is_none());
    }

    #[test]
    fn test_set_creates_tables() {
        let mut config = Config::default();
        config.set("cache.driver", json!("array"));
        config.set("cache.prefix", json!("trellis"));
        assert_eq!(config.get_str("cache.driver"), Some("array"));
        assert_eq!(config.get("cache").unwrap().as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_flatten_and_back() {
        let config = sample();
        let flat = config.flatten();
        assert_eq!(flat.get("app.debug"), Some(&json!("true")));
        assert_eq!(flat.get("app.services.providers"), Some(&json!(["app.*"])));
        assert_eq!(Config::from_flat(flat), config);
    }
}

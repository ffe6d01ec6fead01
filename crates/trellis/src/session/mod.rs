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

//! Sessions: attribute storage keyed by an encrypted cookie id

pub mod handler;

use crate::application::Application;
use crate::config::Config;
use crate::error::{FrameworkError, FrameworkResult};
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use handler::{ArraySessionHandler, FileSessionHandler, SessionHandler};

/// Length of session ids and CSRF tokens
pub const ID_LENGTH: usize = 40;

/// Session attribute holding the CSRF token
pub const TOKEN_KEY: &str = "_token";

/// Random alphanumeric string
pub fn random_string(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Shared handle to the current request's session, stored as a request extension
pub type SessionHandle = Arc<Mutex<Session>>;

/// A single session
pub struct Session {
    id: String,
    name: String,
    attributes: HashMap<String, Value>,
    handler: Arc<dyn SessionHandler>,
    started: bool,
}

impl Session {
    /// Create a session for `id`, or a fresh one when the id is missing or malformed
    pub fn new(name: impl Into<String>, handler: Arc<dyn SessionHandler>, id: Option<String>) -> Self {
        Self {
            id: id.filter(|id| is_valid_id(id)).unwrap_or_else(|| random_string(ID_LENGTH)),
            name: name.into(),
            attributes: HashMap::new(),
            handler,
            started: false,
        }
    }

    /// Load stored attributes and make sure a CSRF token exists
    pub fn start(&mut self) -> FrameworkResult<()> {
        if let Some(data) = self.handler.read(&self.id)? {
            // Unreadable payloads start an empty session
            self.attributes = serde_json::from_str(&data).unwrap_or_default();
        }
        if !self.has(TOKEN_KEY) {
            self.regenerate_token();
        }
        self.started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cookie name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn all(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn flush(&mut self) {
        self.attributes.clear();
    }

    pub fn token(&self) -> Option<&str> {
        self.get(TOKEN_KEY).and_then(Value::as_str)
    }

    pub fn regenerate_token(&mut self) {
        self.put(TOKEN_KEY, Value::String(random_string(ID_LENGTH)));
    }

    /// Give the session a new id, optionally destroying the stored old one
    pub fn migrate(&mut self, destroy: bool) -> FrameworkResult<()> {
        if destroy {
            self.handler.destroy(&self.id)?;
        }
        self.id = random_string(ID_LENGTH);
        Ok(())
    }

    /// Flush the attributes and rotate the id
    pub fn invalidate(&mut self) -> FrameworkResult<()> {
        self.flush();
        self.migrate(true)
    }

    pub fn save(&mut self) -> FrameworkResult<()> {
        let data = serde_json::to_string(&self.attributes)?;
        self.handler.write(&self.id, &data)?;
        self.started = false;
        Ok(())
    }
}

/// Session configuration, read from `session.*`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub driver: String,
    pub cookie: String,
    pub expire_minutes: u64,
    /// Odds of garbage collection per request, as `(chances, out_of)`
    pub lottery: (u64, u64),
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            driver: config.string_or("session.driver", "file"),
            cookie: config.string_or("session.cookie", "trellis_session"),
            expire_minutes: config.u64_or("session.expire_minutes", 120),
            lottery: lottery_from_config(config).unwrap_or(DEFAULT_LOTTERY),
        }
    }

    /// Idle lifetime handed to the handler's garbage collection
    pub fn max_lifetime(&self) -> u64 {
        self.expire_minutes.saturating_mul(60)
    }

    /// Roll the lottery; a zero `out_of` never collects
    pub fn wins_lottery(&self) -> bool {
        let (chances, out_of) = self.lottery;
        out_of > 0 && rand::thread_rng().gen_range(1..=out_of) <= chances
    }
}

const DEFAULT_LOTTERY: (u64, u64) = (2, 100);

// `session.lottery = [chances, out_of]`
fn lottery_from_config(config: &Config) -> Option<(u64, u64)> {
    match config.get("session.lottery")?.as_array()?.as_slice() {
        [chances, out_of] => Some((chances.as_u64()?, out_of.as_u64()?)),
        _ => None,
    }
}

/// Builds sessions on the configured driver
pub struct SessionManager {
    settings: SessionSettings,
    handler: Arc<dyn SessionHandler>,
}

impl SessionManager {
    pub fn new(settings: SessionSettings, handler: Arc<dyn SessionHandler>) -> Self {
        Self { settings, handler }
    }

    pub fn from_app(app: &Application, config: &Config) -> FrameworkResult<Self> {
        let settings = SessionSettings::from_config(config);
        let handler: Arc<dyn SessionHandler> = match settings.driver.as_str() {
            "file" => Arc::new(FileSessionHandler::new(app.storage_path("sessions"))),
            "array" => Arc::new(ArraySessionHandler::new()),
            other => return Err(FrameworkError::config(format!("Unsupported session driver '{}'", other))),
        };
        Ok(Self::new(settings, handler))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    pub fn build(&self, id: Option<String>) -> Session {
        Session::new(self.settings.cookie.clone(), self.handler.clone(), id)
    }

    pub fn gc(&self) -> FrameworkResult<usize> {
        self.handler.gc(self.settings.max_lifetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(
            SessionSettings {
                driver: "array".to_string(),
                cookie: "test_session".to_string(),
                expire_minutes: 5,
                lottery: (1, 1),
            },
            Arc::new(ArraySessionHandler::new()),
        )
    }

    #[test]
    fn test_new_session_gets_valid_id_and_token() {
        let manager = manager();
        let mut session = manager.build(Some("short".to_string()));
        assert_eq!(session.id().len(), ID_LENGTH);
        assert_ne!(session.id(), "short");

        session.start().unwrap();
        assert_eq!(session.token().map(str::len), Some(ID_LENGTH));
        assert_eq!(session.name(), "test_session");
    }

    #[test]
    fn test_attributes_persist_across_requests() {
        let manager = manager();
        let mut first = manager.build(None);
        first.start().unwrap();
        first.put("user", json!(42));
        let token = first.token().map(str::to_string);
        first.save().unwrap();

        let mut second = manager.build(Some(first.id().to_string()));
        second.start().unwrap();
        assert_eq!(second.get("user"), Some(&json!(42)));
        assert_eq!(second.token().map(str::to_string), token);
    }

    #[test]
    fn test_invalidate_rotates_id() {
        let manager = manager();
        let mut session = manager.build(None);
        session.start().unwrap();
        session.put("user", json!(1));
        session.save().unwrap();
        let old = session.id().to_string();

        session.invalidate().unwrap();
        assert_ne!(session.id(), old);
        assert!(!session.has("user"));
        assert_eq!(manager.handler().read(&old).unwrap(), None);
    }

    #[test]
    fn test_settings_lifetime() {
        let mut config = Config::default();
        config.set("session.expire_minutes", json!(30));
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.max_lifetime(), 1800);
        assert_eq!(settings.driver, "file");
        assert_eq!(settings.lottery, (2, 100));
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let mut config = Config::default();
        config.set("session.expire_minutes", json!(u64::MAX));
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.max_lifetime(), u64::MAX);

        let handler = ArraySessionHandler::new();
        handler.write("kept", "{}").unwrap();
        assert_eq!(handler.gc(settings.max_lifetime()).unwrap(), 0);
        assert_eq!(handler.len(), 1);
    }

    #[test]
    fn test_lottery() {
        let mut config = Config::default();
        config.set("session.lottery", json!([1, 1]));
        let mut settings = SessionSettings::from_config(&config);
        assert_eq!(settings.lottery, (1, 1));
        assert!((0..50).all(|_| settings.wins_lottery()));

        settings.lottery = (0, 1);
        assert!((0..50).all(|_| !settings.wins_lottery()));
        settings.lottery = (5, 0);
        assert!(!settings.wins_lottery());

        config.set("session.lottery", json!("often"));
        assert_eq!(SessionSettings::from_config(&config).lottery, (2, 100));
    }
}

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

//! Named component factories
//!
//! Configuration refers to providers, commands, controllers, middleware, listeners and
//! view extensions by name. The catalog maps those names to factories; the framework's
//! own components are registered up front.

use crate::application::Application;
use crate::console::{ConsoleCommand, commands};
use crate::error::{FrameworkError, FrameworkResult};
use crate::events::EventDispatcher;
use crate::middleware::{CookieMiddleware, CsrfMiddleware, Middleware, SessionMiddleware, XssMiddleware};
use crate::providers::{ServiceProvider, framework};
use crate::routing::Controller;
use crate::view::ViewExtension;
use std::sync::Arc;

pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn ServiceProvider> + Send + Sync>;
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn ConsoleCommand> + Send + Sync>;
pub type ControllerFactory = Arc<dyn Fn(&Application) -> FrameworkResult<Arc<dyn Controller>> + Send + Sync>;
pub type MiddlewareFactory = Arc<dyn Fn(&Application) -> FrameworkResult<Arc<dyn Middleware>> + Send + Sync>;
pub type ListenerFactory = Arc<dyn Fn(&Application, &EventDispatcher) -> FrameworkResult<()> + Send + Sync>;
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn ViewExtension> + Send + Sync>;

/// Factories of one component kind, kept in registration order
pub struct Entries<F> {
    kind: &'static str,
    entries: Vec<(String, F)>,
}

impl<F: Clone> Entries<F> {
    fn new(kind: &'static str) -> Self {
        Self { kind, entries: Vec::new() }
    }

    /// Register a factory; an existing entry with the same name is replaced in place
    pub fn insert(&mut self, name: &str, factory: F) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name.to_string(), factory)),
        }
    }

    pub fn get(&self, name: &str) -> FrameworkResult<F> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, factory)| factory.clone())
            .ok_or_else(|| FrameworkError::UnknownComponent {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn provider<P: ServiceProvider + 'static>(make: fn() -> P) -> ProviderFactory {
    Arc::new(move || Box::new(make()) as Box<dyn ServiceProvider>)
}

fn middleware<M: Middleware + 'static>(make: fn(&Application) -> FrameworkResult<M>) -> MiddlewareFactory {
    Arc::new(move |app: &Application| make(app).map(|m| Arc::new(m) as Arc<dyn Middleware>))
}

/// Every factory the application can refer to by name
pub struct Catalog {
    pub providers: Entries<ProviderFactory>,
    pub commands: Entries<CommandFactory>,
    pub controllers: Entries<ControllerFactory>,
    pub middleware: Entries<MiddlewareFactory>,
    pub listeners: Entries<ListenerFactory>,
    pub extensions: Entries<ExtensionFactory>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            providers: Entries::new("provider"),
            commands: Entries::new("command"),
            controllers: Entries::new("controller"),
            middleware: Entries::new("middleware"),
            listeners: Entries::new("listener"),
            extensions: Entries::new("view extension"),
        }
    }

    /// Catalog holding the framework's own providers, middleware and commands
    pub fn with_framework_defaults() -> Self {
        let mut catalog = Self::empty();

        catalog.providers.insert("encryption", provider(|| framework::EncryptionServiceProvider));
        catalog.providers.insert("cookie", provider(|| framework::CookieServiceProvider));
        catalog.providers.insert("session", provider(|| framework::SessionServiceProvider));
        catalog.providers.insert("cache", provider(|| framework::CacheServiceProvider));
        catalog.providers.insert("events", provider(|| framework::EventsServiceProvider));
        catalog.providers.insert("view", provider(|| framework::ViewServiceProvider));
        catalog.providers.insert("logging", provider(|| framework::LoggingServiceProvider));
        catalog.providers.insert("exceptions", provider(|| framework::ExceptionServiceProvider));

        catalog.middleware.insert("cookie", middleware(CookieMiddleware::from_app));
        catalog.middleware.insert("session", middleware(SessionMiddleware::from_app));
        catalog.middleware.insert("csrf", middleware(CsrfMiddleware::from_app));
        catalog.middleware.insert("xss", middleware(|_| Ok(XssMiddleware::new())));

        for (name, factory) in commands::framework_commands() {
            catalog.commands.insert(name, factory);
        }

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_defaults_registered() {
        let catalog = Catalog::with_framework_defaults();
        assert!(catalog.providers.contains("session"));
        assert!(catalog.middleware.contains("csrf"));
        assert!(catalog.commands.contains("maintenance:down"));
        assert!(catalog.controllers.names().is_empty());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut entries: Entries<u8> = Entries::new("number");
        entries.insert("a", 1);
        entries.insert("b", 2);
        entries.insert("a", 3);

        assert_eq!(entries.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(entries.get("a").unwrap(), 3);
    }

    #[test]
    fn test_unknown_entry() {
        let catalog = Catalog::empty();
        let err = catalog.providers.get("nope").err().unwrap();
        assert_eq!(err.to_string(), "Unknown provider 'nope'");
    }
}
